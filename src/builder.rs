//! Assembles the [`DataSourceTree`] from the host application's inputs.

use indexmap::IndexMap;
use tracing::trace;

use crate::tree::{Category, DataSourceNode, DataSourceTree, ValueType};
use crate::value::Value;
use crate::workspace::{ApiResponse, AppState, Clock, PageContext, Table, UserProfile, Workspace};

const AGGREGATES: [(&str, &str); 4] = [
    ("sum", "Sum of"),
    ("avg", "Average of"),
    ("min", "Smallest"),
    ("max", "Largest"),
];

const USER_FIELDS: [(&str, ValueType); 4] = [
    ("name", ValueType::String),
    ("email", ValueType::Email),
    ("id", ValueType::String),
    ("role", ValueType::String),
];

/// Collects builder inputs; [`TreeBuilder::build`] is a pure function of
/// them and the clock.
#[derive(Debug, Clone, Copy)]
pub struct TreeBuilder<'a> {
    app: &'a AppState,
    tables: &'a [Table],
    user: Option<&'a UserProfile>,
    page: Option<&'a PageContext>,
    api_responses: &'a [ApiResponse],
}

impl<'a> TreeBuilder<'a> {
    pub fn new(app: &'a AppState) -> Self {
        Self {
            app,
            tables: &[],
            user: None,
            page: None,
            api_responses: &[],
        }
    }

    pub fn from_workspace(workspace: &'a Workspace) -> Self {
        Self::new(&workspace.app)
            .tables(&workspace.tables)
            .user(workspace.user.as_ref())
            .page(workspace.page.as_ref())
            .api_responses(&workspace.api_responses)
    }

    pub fn tables(mut self, tables: &'a [Table]) -> Self {
        self.tables = tables;
        self
    }

    pub fn user(mut self, user: Option<&'a UserProfile>) -> Self {
        self.user = user;
        self
    }

    pub fn page(mut self, page: Option<&'a PageContext>) -> Self {
        self.page = page;
        self
    }

    pub fn api_responses(mut self, responses: &'a [ApiResponse]) -> Self {
        self.api_responses = responses;
        self
    }

    pub fn build(&self, clock: &dyn Clock) -> DataSourceTree {
        let mut tree = DataSourceTree::new();

        let (app_node, app_value) = app_root(self.app);
        tree.insert_root(app_node, app_value);

        for table in self.tables {
            let (node, rows) = table_root(table);
            tree.insert_root(node, rows);
        }

        let user_value = self.user.map(user_value).unwrap_or(Value::Null);
        for name in ["user", "currentUser"] {
            tree.insert_root(user_root(name), user_value.clone());
        }

        if let Some(page) = self.page {
            let (node, value) = page_root(page);
            tree.insert_root(node, value);
        }

        for (node, value) in system_roots(clock) {
            tree.insert_root(node, value);
        }

        for response in self.api_responses {
            let node = DataSourceNode::root(Category::ApiResponse, &response.name, ValueType::Any);
            tree.insert_root(shape_node(node, &response.sample), response.sample.clone());
        }

        trace!(
            tables = self.tables.len(),
            api_responses = self.api_responses.len(),
            nodes = tree.node_count(),
            "built data source tree"
        );
        tree
    }
}

/// Builds a tree without API responses.
pub fn build(
    app: &AppState,
    tables: &[Table],
    user: Option<&UserProfile>,
    page: Option<&PageContext>,
    clock: &dyn Clock,
) -> DataSourceTree {
    TreeBuilder::new(app)
        .tables(tables)
        .user(user)
        .page(page)
        .build(clock)
}

fn app_root(app: &AppState) -> (DataSourceNode, Value) {
    let node = DataSourceNode::root(Category::AppState, "app", ValueType::Object)
        .describe("Current application");
    let children = vec![
        node.child("name", ValueType::String),
        node.child("id", ValueType::String),
    ];

    let mut value = IndexMap::new();
    value.insert("name".to_string(), Value::string(&app.name));
    value.insert("id".to_string(), Value::string(&app.id));
    (node.with_children(children), Value::object(value))
}

fn table_root(table: &Table) -> (DataSourceNode, Value) {
    let node = DataSourceNode::root(Category::Database, &table.name, ValueType::Array)
        .array(true)
        .describe(format!("All rows of {}", table.name));

    let mut children = vec![node.child("count()", ValueType::Number).describe("Number of rows")];
    for field in table.schema() {
        children.push(
            node.child(&field.name, field.value_type)
                .array(true)
                .describe(format!("{} across all rows", field.name)),
        );
        if field.value_type == ValueType::Number {
            for (aggregate, text) in AGGREGATES {
                children.push(
                    node.child(format!("{}({})", aggregate, field.name), ValueType::Number)
                        .describe(format!("{} {}", text, field.name)),
                );
            }
        }
    }

    (node.with_children(children), Value::array(table.rows.clone()))
}

fn user_root(name: &str) -> DataSourceNode {
    let node = DataSourceNode::root(Category::User, name, ValueType::Object)
        .describe("Signed-in user");
    let children = USER_FIELDS
        .iter()
        .map(|(field, value_type)| node.child(*field, *value_type))
        .collect();
    node.with_children(children)
}

fn user_value(user: &UserProfile) -> Value {
    let mut value = IndexMap::new();
    value.insert("name".to_string(), Value::string(&user.name));
    value.insert("email".to_string(), Value::string(&user.email));
    value.insert("id".to_string(), Value::string(&user.id));
    value.insert("role".to_string(), Value::string(&user.role));
    Value::object(value)
}

fn page_root(page: &PageContext) -> (DataSourceNode, Value) {
    let node = DataSourceNode::root(Category::PageContext, "page", ValueType::Object)
        .describe("Current page");
    let mut children = vec![
        node.child("id", ValueType::String),
        node.child("name", ValueType::String),
    ];

    let mut value = IndexMap::new();
    value.insert("id".to_string(), Value::string(&page.id));
    value.insert("name".to_string(), Value::string(&page.name));
    for (key, param) in &page.params {
        children.push(shape_node(node.child(key, ValueType::Any), param).describe("Page parameter"));
        value.insert(key.clone(), param.clone());
    }
    (node.with_children(children), Value::object(value))
}

fn system_roots(clock: &dyn Clock) -> Vec<(DataSourceNode, Value)> {
    let now = clock.now();
    vec![
        (
            DataSourceNode::root(Category::System, "now", ValueType::Date)
                .describe("Current date and time"),
            Value::string(now.to_rfc3339()),
        ),
        (
            DataSourceNode::root(Category::System, "today", ValueType::Date)
                .describe("Current date"),
            Value::string(now.format("%Y-%m-%d").to_string()),
        ),
        (
            DataSourceNode::root(Category::System, "timestamp", ValueType::Number)
                .describe("Milliseconds since the Unix epoch"),
            Value::int(now.timestamp_millis()),
        ),
    ]
}

/// Gives `node` the shape of `sample`: objects get one child per key,
/// arrays of objects become record lists described by their first element,
/// anything else is typed from the value itself.
fn shape_node(mut node: DataSourceNode, sample: &Value) -> DataSourceNode {
    match sample {
        Value::Object(map) => {
            node.value_type = ValueType::Object;
            node.children = map
                .iter()
                .map(|(key, value)| shape_node(node.child(key, ValueType::Any), value))
                .collect();
        }
        Value::Array(items) => {
            node.is_array = true;
            match items.first() {
                Some(first @ Value::Object(_)) => {
                    node.value_type = ValueType::Array;
                    let record = shape_node(node.clone(), first);
                    node.children = record.children.into_iter().map(spread).collect();
                }
                Some(first) => node.value_type = ValueType::infer(first),
                None => node.value_type = ValueType::Any,
            }
        }
        scalar => node.value_type = ValueType::infer(scalar),
    }
    node
}

/// Marks `node` and everything below it as spanning a list.
fn spread(mut node: DataSourceNode) -> DataSourceNode {
    node.children = node.children.into_iter().map(spread).collect();
    node.array(true)
}
