use std::process::{Command, Output};

const SHOP: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/shop.json");

fn get_magictext_binary() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_magictext"));
    cmd.env_remove("RUST_LOG").env_remove("MAGICTEXT_LOG");
    cmd
}

fn run(args: &[&str]) -> Output {
    get_magictext_binary()
        .args(args)
        .arg("--color")
        .arg("never")
        .output()
        .expect("Failed to execute magictext")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

fn stderr(output: &Output) -> String {
    String::from_utf8(output.stderr.clone()).unwrap()
}

#[test]
fn test_version_flag() {
    let output = get_magictext_binary()
        .arg("--version")
        .output()
        .expect("Failed to execute magictext");

    assert!(output.status.success(), "Version flag should succeed");
    let out = stdout(&output);
    assert!(out.contains("magictext"));
    assert!(out.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_render_single_token_keeps_type() {
    let output = run(&["render", "--data", SHOP, "{{products.count()}}"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).trim(), "3");
}

#[test]
fn test_render_mixed_template() {
    let output = run(&["render", "--data", SHOP, "Hi {{user.name}}, {{products.sum(price) | currency}}"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "\"Hi Ada, $39.50\"");
}

#[test]
fn test_render_with_item() {
    let output = run(&[
        "render",
        "--data",
        SHOP,
        "{{index}}: {{item.name}}",
        "--item",
        r#"{"name": "Kite"}"#,
        "--index",
        "1",
    ]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "\"1: Kite\"");
}

#[test]
fn test_render_pinned_clock() {
    let output = run(&["render", "--data", SHOP, "{{today}}", "--now", "2024-03-05T14:30:00Z"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "\"2024-03-05\"");
}

#[test]
fn test_render_failed_token_warns_but_succeeds() {
    let output = run(&["render", "--data", SHOP, "{{ghost}}"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "null");
    assert!(stderr(&output).contains("warning[E0201]"));
}

#[test]
fn test_render_strict_reports_missing_field() {
    let output = run(&["render", "--data", SHOP, "{{user.nickname}}", "--strict"]);
    assert!(output.status.success());
    assert!(stderr(&output).contains("E0204"));
}

#[test]
fn test_classify() {
    let output = run(&["classify", "--data", SHOP, "{{products}}", "--compact"]);
    assert!(output.status.success());
    assert_eq!(
        stdout(&output).trim(),
        r#"{"expression":"{{products}}","classification":"collection"}"#
    );

    let output = run(&["classify", "--data", SHOP, "{{item.price}}", "--repeater-source", "{{products}}"]);
    assert!(stdout(&output).contains("\"singleton\""));
}

#[test]
fn test_classify_parse_error() {
    let output = run(&["classify", "--data", SHOP, "{{products"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("error[E0101]"));
}

#[test]
fn test_repeater_source_must_be_collection() {
    let output = run(&["classify", "--data", SHOP, "{{item}}", "--repeater-source", "{{user.name}}"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("not a collection"));
}

#[test]
fn test_suggest() {
    let output = run(&["suggest", "--data", SHOP, "{{prod", "--compact"]);
    assert!(output.status.success());
    let suggestions: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let labels: Vec<&str> = suggestions
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["products"]);
}

#[test]
fn test_suggest_with_cursor() {
    let output = run(&["suggest", "--data", SHOP, "{{user.em}} rest", "--cursor", "9"]);
    let suggestions: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(suggestions[0]["insertText"], "user.email");
}

#[test]
fn test_tree() {
    let output = run(&["tree", "--data", SHOP]);
    assert!(output.status.success());
    let tree: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    let products = &tree["categories"]["database"][0];
    assert_eq!(products["id"], "database.products");
    assert_eq!(products["isArray"], true);
    assert_eq!(tree["categories"]["apiResponse"][0]["id"], "apiResponse.search");
}

#[test]
fn test_missing_workspace() {
    let output = run(&["tree", "--data", "/definitely/not/here.json"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("error: cannot read"));
}

#[test]
fn test_invalid_item_json() {
    let output = run(&["render", "--data", SHOP, "{{item}}", "--item", "{nope"]);
    assert!(!output.status.success());
    assert!(stderr(&output).contains("--item is not valid JSON"));
}

#[test]
fn test_completions() {
    let output = get_magictext_binary()
        .args(["complete", "bash"])
        .output()
        .expect("Failed to execute magictext");
    assert!(output.status.success());
    assert!(stdout(&output).contains("magictext"));
}
