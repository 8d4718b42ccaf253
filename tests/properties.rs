//! Property tests over generated expressions and arbitrary editor input.

mod common;

use common::*;
use magictext::autocomplete::suggest;
use magictext::builder::build;
use magictext::interpreter::{render_str, EvaluationContext};
use magictext::template::{parse, parse_template};
use magictext::Value;
use proptest::prelude::*;

const SEGMENTS: [&str; 12] = [
    ".name",
    ".price",
    ".id",
    ".items",
    "[0]",
    "[5]",
    ".count()",
    ".sum(price)",
    ".min()",
    ".filter(p => p.price > 3)",
    ".map(p => p.name)",
    ".filter(item.price < 20)",
];

fn arb_expression(roots: Vec<&'static str>) -> impl Strategy<Value = String> {
    (
        prop::sample::select(roots),
        prop::collection::vec(prop::sample::select(SEGMENTS.to_vec()), 0..4),
    )
        .prop_map(|(root, segments)| format!("{{{{{}{}}}}}", root, segments.concat()))
}

fn arb_pipes() -> impl Strategy<Value = String> {
    prop::collection::vec(
        prop::sample::select(vec![" | currency", " | number(1)", " | date", " | upper", " | shout"]),
        0..3,
    )
    .prop_map(|pipes| pipes.concat())
}

fn is_neutral(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Number(n, _) => *n == 0.0,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.iter().all(is_neutral),
        Value::Object(fields) => fields.values().all(is_neutral),
        _ => false,
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn rendering_is_idempotent(
        expression in arb_expression(vec!["products", "user", "search", "page", "t", "today"]),
        pipes in arb_pipes(),
    ) {
        let raw = format!("{}{}", &expression[..expression.len() - 2], pipes) + "}}";
        let tree = shop_tree();
        let ctx = EvaluationContext::new(&tree);
        prop_assert_eq!(render_str(&raw, &ctx), render_str(&raw, &ctx));
    }

    #[test]
    fn missing_data_is_neutral(
        expression in arb_expression(vec!["products", "user", "currentUser", "app", "ghost", "item", "page"]),
    ) {
        prop_assume!(parse(&expression).is_ok());
        let tree = build(&Default::default(), &[], None, None, &clock());
        let value = render_str(&expression, &EvaluationContext::new(&tree));
        prop_assert!(is_neutral(&value), "{} rendered {:?}", expression, value);
    }

    #[test]
    fn template_scanning_never_panics(raw in "[{}a-z.|\\[\\]()\"' 0-9é]{0,40}") {
        let _ = parse_template(&raw);
    }

    #[test]
    fn suggest_never_panics(raw in "[{}a-z.|\\[\\]()\"' 0-9é]{0,40}", cursor in 0usize..48) {
        let tree = shop_tree();
        let _ = suggest(&raw, cursor, &tree);
    }
}
