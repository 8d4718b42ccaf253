//! The worked examples for the binding engine, end to end.

mod common;

use common::*;
use magictext::autocomplete::suggest;
use magictext::builder::build;
use magictext::classify::Classification;
use magictext::interpreter::{render_str, EvaluationContext};
use magictext::tree::ValueType;
use magictext::workspace::Table;
use magictext::Value;

#[test]
fn test_count_of_single_row_table() {
    let tree = minimal_tree();
    assert_eq!(render("{{products.count()}}", &tree), Value::int(1));
}

#[test]
fn test_sum_of_single_row_table() {
    let tree = minimal_tree();
    assert_eq!(render("{{products.sum(price)}}", &tree), Value::int(10));
}

#[test]
fn test_repeater_row_with_currency() {
    let tree = minimal_tree();
    let ctx = EvaluationContext::new(&tree).with_item(json(r#"{"name": "A", "price": 10}"#), 0);
    assert_eq!(
        render_str("{{item.name}} - {{item.price|currency}}", &ctx),
        Value::string("A - $10.00")
    );
}

#[test]
fn test_classify_table_and_indexed_field() {
    let tree = minimal_tree();
    assert_eq!(classify_str("{{products}}", &tree, false), Classification::Collection);
    assert_eq!(classify_str("{{products[0].name}}", &tree, false), Classification::Singleton);
}

#[test]
fn test_empty_table_aggregates() {
    let tree = minimal_tree();
    assert_eq!(render("{{t.count()}}", &tree), Value::int(0));
    assert_eq!(render("{{t.sum(field1)}}", &tree), Value::int(0));
}

#[test]
fn test_suggest_partial_root() {
    let tree = minimal_tree();
    let suggestions = suggest("{{prod", 6, &tree);
    let labels: Vec<&str> = suggestions.iter().map(|s| s.label.as_str()).collect();
    assert!(labels.contains(&"products"));
    assert!(!labels.contains(&"user"));
}

#[test]
fn test_local_item_shadows_table_named_item() {
    let tables = vec![Table::new("item")
        .field("x", ValueType::String)
        .row(json(r#"{"x": "from table"}"#))];
    let tree = build(&app(), &tables, None, None, &clock());

    let outside = EvaluationContext::new(&tree);
    assert_eq!(render_str("{{item.x}}", &outside), Value::array(vec![Value::string("from table")]));

    let inside = outside.with_item(json(r#"{"x": "local"}"#), 3);
    assert_eq!(render_str("{{item.x}}", &inside), Value::string("local"));
    assert_eq!(render_str("{{index}}", &inside), Value::int(3));
}

#[test]
fn test_missing_data_renders_neutral_values() {
    let tree = build(&app(), &[], None, None, &clock());
    assert_eq!(render("{{user.name}}", &tree), Value::Null);
    assert_eq!(render("{{products.count()}}", &tree), Value::Null);
    assert_eq!(render_text("Hi {{user.name}}!", &tree), "Hi !");
}
