//! The data source tree: typed nodes describing everything a binding may
//! reference, plus the value snapshot those nodes resolve to.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[serde(alias = "text")]
    String,
    Number,
    Boolean,
    Array,
    Object,
    Date,
    Color,
    Url,
    Email,
    Any,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Array => "array",
            ValueType::Object => "object",
            ValueType::Date => "date",
            ValueType::Color => "color",
            ValueType::Url => "url",
            ValueType::Email => "email",
            ValueType::Any => "any",
        }
    }

    /// Types a sample value. Strings that look like a URL, an e-mail
    /// address, a hex color or an ISO date get the matching semantic type.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Null => ValueType::Any,
            Value::Bool(_) => ValueType::Boolean,
            Value::Number(..) => ValueType::Number,
            Value::Array(_) => ValueType::Array,
            Value::Object(_) => ValueType::Object,
            Value::String(s) => infer_string(s),
        }
    }

    /// Whether values of this type can be summed and averaged.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ValueType::Number | ValueType::Any)
    }
}

fn infer_string(s: &str) -> ValueType {
    if s.starts_with("http://") || s.starts_with("https://") {
        ValueType::Url
    } else if looks_like_email(s) {
        ValueType::Email
    } else if looks_like_color(s) {
        ValueType::Color
    } else if chrono::DateTime::parse_from_rfc3339(s).is_ok()
        || chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
    {
        ValueType::Date
    } else {
        ValueType::String
    }
}

fn looks_like_email(s: &str) -> bool {
    if s.contains(char::is_whitespace) {
        return false;
    }
    match s.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

fn looks_like_color(s: &str) -> bool {
    match s.strip_prefix('#') {
        Some(hex) => matches!(hex.len(), 3 | 6 | 8) && hex.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !matches!(name, "true" | "false" | "null")
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a root comes from. Declaration order is also root lookup order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    AppState,
    Database,
    User,
    PageContext,
    System,
    ApiResponse,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::AppState,
        Category::Database,
        Category::User,
        Category::PageContext,
        Category::System,
        Category::ApiResponse,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::AppState => "appState",
            Category::Database => "database",
            Category::User => "user",
            Category::PageContext => "pageContext",
            Category::System => "system",
            Category::ApiResponse => "apiResponse",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSourceNode {
    pub id: String,
    pub label: String,
    pub value_type: ValueType,
    pub is_array: bool,
    pub path: Vec<String>,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<DataSourceNode>,
}

impl DataSourceNode {
    /// A root node. Its id is qualified by the category.
    pub fn root(category: Category, name: impl Into<String>, value_type: ValueType) -> Self {
        let name = name.into();
        Self {
            id: format!("{}.{}", category.as_str(), name),
            label: name.clone(),
            value_type,
            is_array: false,
            path: vec![name],
            category,
            description: None,
            children: Vec::new(),
        }
    }

    /// A node one level below `self`, sharing its category.
    pub fn child(&self, name: impl Into<String>, value_type: ValueType) -> Self {
        let name = name.into();
        let mut path = self.path.clone();
        path.push(name.clone());
        Self {
            id: format!("{}.{}", self.id, name),
            label: name,
            value_type,
            is_array: false,
            path,
            category: self.category,
            description: None,
            children: Vec::new(),
        }
    }

    pub fn array(mut self, is_array: bool) -> Self {
        self.is_array = is_array;
        self
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_children(mut self, children: Vec<DataSourceNode>) -> Self {
        self.children = children;
        self
    }

    /// Trailing path element; what an expression writes to reach this node.
    pub fn name(&self) -> &str {
        self.path.last().map(String::as_str).unwrap_or("")
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    /// Synthetic call nodes such as `count()` or `sum(price)`.
    pub fn is_call(&self) -> bool {
        self.name().ends_with(')')
    }

    /// The expression that reaches this node, e.g. `products.sum(price)`.
    /// Names that are not identifiers are written as `["first name"]`.
    pub fn expression(&self) -> String {
        let mut out = String::new();
        for (i, name) in self.path.iter().enumerate() {
            if i > 0 && !is_identifier(name) && !name.ends_with(')') {
                out.push_str(&format!("[\"{}\"]", name.replace('\\', "\\\\").replace('"', "\\\"")));
            } else {
                if i > 0 {
                    out.push('.');
                }
                out.push_str(name);
            }
        }
        out
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// A list of records, such as a database table.
    pub fn is_record_list(&self) -> bool {
        self.is_array && self.has_children()
    }

    pub fn find_child(&self, name: &str) -> Option<&DataSourceNode> {
        self.children.iter().find(|child| child.name() == name)
    }

    /// This node and every descendant, depth first in declaration order.
    pub fn walk(&self) -> Vec<&DataSourceNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }
}

/// Roots grouped by category, plus the values they resolve to.
///
/// Built once by [`crate::builder::TreeBuilder`] and never mutated; a new
/// data snapshot means a new tree.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DataSourceTree {
    pub categories: IndexMap<Category, Vec<DataSourceNode>>,
    #[serde(skip)]
    values: IndexMap<String, Value>,
}

impl DataSourceTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a root and the value it resolves to.
    pub fn insert_root(&mut self, node: DataSourceNode, value: Value) {
        self.values.insert(node.id.clone(), value);
        self.categories.entry(node.category).or_default().push(node);
    }

    pub fn roots(&self, category: Category) -> &[DataSourceNode] {
        self.categories.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every root, in category declaration order.
    pub fn all_roots(&self) -> impl Iterator<Item = &DataSourceNode> {
        Category::ALL.iter().flat_map(move |category| self.roots(*category).iter())
    }

    /// Looks a root up by the name an expression uses for it. The first
    /// category in declaration order wins.
    pub fn root(&self, name: &str) -> Option<&DataSourceNode> {
        self.all_roots().find(|node| node.name() == name)
    }

    pub fn root_value(&self, name: &str) -> Option<&Value> {
        self.root(name).and_then(|node| self.values.get(&node.id))
    }

    /// Any node, by id.
    pub fn find(&self, id: &str) -> Option<&DataSourceNode> {
        self.all_roots()
            .flat_map(|root| root.walk())
            .find(|node| node.id == id)
    }

    /// The table root called `name`, if one exists.
    pub fn table(&self, name: &str) -> Option<&DataSourceNode> {
        self.roots(Category::Database)
            .iter()
            .find(|node| node.name() == name)
    }

    /// Every row of table `name` as captured when the tree was built.
    pub fn rows(&self, name: &str) -> Option<&[Value]> {
        self.table(name)
            .and_then(|node| self.values.get(&node.id))
            .and_then(Value::as_array)
    }

    /// Field `field` across every row of table `name`. Rows missing the
    /// field contribute null.
    pub fn column(&self, name: &str, field: &str) -> Option<Vec<Value>> {
        self.rows(name).map(|rows| {
            rows.iter()
                .map(|row| {
                    row.as_object()
                        .and_then(|object| object.get(field))
                        .cloned()
                        .unwrap_or(Value::Null)
                })
                .collect()
        })
    }

    pub fn node_count(&self) -> usize {
        self.all_roots().map(|root| root.walk().len()).sum()
    }
}
