#![allow(dead_code)]

use indexmap::IndexMap;
use magictext::builder::TreeBuilder;
use magictext::classify::{classify, Classification};
use magictext::convert::parse_json;
use magictext::format::value_to_display;
use magictext::interpreter::{render_str, EvaluationContext};
use magictext::template::parse;
use magictext::tree::{DataSourceTree, ValueType};
use magictext::workspace::{ApiResponse, AppState, FixedClock, PageContext, Table, UserProfile};
use magictext::Value;

pub const NOW: &str = "2024-03-05T14:30:00Z";

pub fn clock() -> FixedClock {
    FixedClock::parse(NOW).unwrap()
}

pub fn json(source: &str) -> Value {
    parse_json(source).unwrap()
}

fn rows(source: &str) -> Vec<Value> {
    json(source).as_array().unwrap().to_vec()
}

pub fn app() -> AppState {
    AppState {
        id: "app-1".to_string(),
        name: "Corner Shop".to_string(),
    }
}

pub fn products() -> Table {
    Table {
        rows: rows(
            r#"[{"name": "Hammer", "price": 10, "category": "tools"},
                {"name": "Kite", "price": 25.5, "category": "toys"},
                {"name": "Saw", "price": 4, "category": "tools"}]"#,
        ),
        ..Table::new("products")
            .field("name", ValueType::String)
            .field("price", ValueType::Number)
            .field("category", ValueType::String)
    }
}

/// One row, as in the worked examples.
pub fn single_product() -> Table {
    Table {
        rows: rows(r#"[{"name": "A", "price": 10}]"#),
        ..Table::new("products")
            .field("name", ValueType::String)
            .field("price", ValueType::Number)
    }
}

pub fn empty_table() -> Table {
    Table::new("t").field("field1", ValueType::Number)
}

pub fn user() -> UserProfile {
    UserProfile {
        id: "u-7".to_string(),
        name: "Ada".to_string(),
        email: "ada@example.com".to_string(),
        role: "admin".to_string(),
    }
}

pub fn page() -> PageContext {
    let mut params = IndexMap::new();
    params.insert("productId".to_string(), Value::int(42));
    params.insert("tags".to_string(), json(r#"["new", "sale"]"#));
    PageContext {
        id: "p-1".to_string(),
        name: "Product".to_string(),
        params,
    }
}

pub fn responses() -> Vec<ApiResponse> {
    vec![ApiResponse {
        name: "search".to_string(),
        sample: json(
            r#"{"total": 2, "items": [{"title": "Rust", "link": "https://rust-lang.org",
                 "meta": {"rank": 1}}]}"#,
        ),
    }]
}

/// Products, an empty table, a signed-in user, a page and one API response.
pub fn shop_tree() -> DataSourceTree {
    let app = app();
    let tables = vec![products(), empty_table()];
    let user = user();
    let page = page();
    let responses = responses();
    TreeBuilder::new(&app)
        .tables(&tables)
        .user(Some(&user))
        .page(Some(&page))
        .api_responses(&responses)
        .build(&clock())
}

pub fn minimal_tree() -> DataSourceTree {
    let app = app();
    let tables = vec![single_product(), empty_table()];
    TreeBuilder::new(&app).tables(&tables).build(&clock())
}

pub fn render(raw: &str, tree: &DataSourceTree) -> Value {
    render_str(raw, &EvaluationContext::new(tree))
}

pub fn render_text(raw: &str, tree: &DataSourceTree) -> String {
    value_to_display(&render(raw, tree))
}

pub fn classify_str(raw: &str, tree: &DataSourceTree, in_repeater: bool) -> Classification {
    classify(&parse(raw).unwrap(), tree, in_repeater)
}
