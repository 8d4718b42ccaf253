use crate::ast::{BinaryOp, Call, Expr, Lambda, ParsedExpression, PipeOp, Segment, Template, TemplatePart, UnaryOp};
use crate::diagnostic::Span;
use crate::format::value_to_display;
use crate::template::parse_template;
use crate::tree::{Category, DataSourceNode, DataSourceTree};
use crate::value::Value;
use super::builtins;
use super::error::EvalError;
use super::scope::LocalScope;
use super::value_utils::{compare, loose_equals, strict_equals};
use std::cmp::Ordering;
use std::rc::Rc;
use tracing::debug;

/// Variable bound to the current row inside a repeater or a bare predicate.
pub const ITEM: &str = "item";

/// Variable bound to the current row's position.
pub const INDEX: &str = "index";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EvalOptions {
    /// Missing fields and out-of-range indices are errors instead of null.
    pub strict: bool,
}

/// What an evaluation may read: the tree snapshot and the local scope chain.
///
/// Contexts are never mutated; [`EvaluationContext::child`] returns a new
/// context whose scope links to this one.
#[derive(Debug, Clone)]
pub struct EvaluationContext<'a> {
    tree: &'a DataSourceTree,
    scope: Option<Rc<LocalScope>>,
    options: EvalOptions,
}

impl<'a> EvaluationContext<'a> {
    pub fn new(tree: &'a DataSourceTree) -> Self {
        Self {
            tree,
            scope: None,
            options: EvalOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EvalOptions) -> Self {
        self.options = options;
        self
    }

    /// A child context with extra local bindings.
    pub fn child<I>(&self, bindings: I) -> Self
    where
        I: IntoIterator<Item = (Rc<str>, Value)>,
    {
        let mut scope = match &self.scope {
            Some(parent) => LocalScope::with_parent(parent.clone()),
            None => LocalScope::new(),
        };
        for (name, value) in bindings {
            scope = scope.bind(name, value);
        }
        Self {
            tree: self.tree,
            scope: Some(Rc::new(scope)),
            options: self.options,
        }
    }

    /// The context for one repeater row.
    pub fn with_item(&self, item: Value, index: usize) -> Self {
        self.child([
            (Rc::from(ITEM), item),
            (Rc::from(INDEX), Value::int(index as i64)),
        ])
    }

    pub fn tree(&self) -> &'a DataSourceTree {
        self.tree
    }

    pub fn scope(&self) -> Option<&LocalScope> {
        self.scope.as_deref()
    }

    pub fn options(&self) -> EvalOptions {
        self.options
    }
}

/// The value being walked, and the table it still spans every row of.
///
/// Aggregations over a table read the full row set captured in the tree,
/// so the table survives field access and `filter`, and is dropped by
/// indexing, `map` and nested field access.
struct Walk<'t> {
    value: Value,
    table: Option<&'t DataSourceNode>,
    field: Option<String>,
}

/// Resolves `expression` against `ctx`, then applies its pipes.
pub fn evaluate(expression: &ParsedExpression, ctx: &EvaluationContext) -> Result<Value, EvalError> {
    let mut walk = resolve_root(&expression.root, ctx)?;

    for segment in &expression.segments {
        walk = match segment {
            Segment::Field(name) => field_step(walk, name, ctx)?,
            Segment::Index(index) => Walk {
                value: index_value(&walk.value, *index, ctx.options)?,
                table: None,
                field: None,
            },
            Segment::Call(call) => call_step(walk, call, ctx)?,
        };
    }

    let mut value = walk.value;
    for pipe in &expression.pipes {
        if let PipeOp::Unknown(name) = &pipe.op {
            debug!(pipe = %name, "unknown pipe left the value unchanged");
        }
        value = builtins::apply_pipe(pipe, value);
    }
    Ok(value)
}

fn resolve_root<'t>(name: &str, ctx: &EvaluationContext<'t>) -> Result<Walk<'t>, EvalError> {
    if let Some(value) = ctx.scope().and_then(|scope| scope.get(name)) {
        return Ok(Walk {
            value: value.clone(),
            table: None,
            field: None,
        });
    }

    let tree = ctx.tree();
    match tree.root(name) {
        Some(node) => Ok(Walk {
            value: tree.root_value(name).cloned().unwrap_or(Value::Null),
            table: (node.category == Category::Database).then_some(node),
            field: None,
        }),
        None => Err(EvalError::unknown_root(name)),
    }
}

fn field_step<'t>(walk: Walk<'t>, name: &str, ctx: &EvaluationContext<'t>) -> Result<Walk<'t>, EvalError> {
    let value = field_value(&walk.value, name, ctx.options)?;
    let (table, field) = match (walk.table, walk.field) {
        (Some(table), None) => (Some(table), Some(name.to_string())),
        _ => (None, None),
    };
    Ok(Walk { value, table, field })
}

/// Object lookup; on an array, the field of every element.
pub fn field_value(value: &Value, name: &str, options: EvalOptions) -> Result<Value, EvalError> {
    match value {
        Value::Object(map) => match map.get(name) {
            Some(found) => Ok(found.clone()),
            None if options.strict => Err(EvalError::field_not_found(name)),
            None => Ok(Value::Null),
        },
        Value::Array(items) => Ok(Value::array(builtins::project(items, name))),
        _ if options.strict => Err(EvalError::field_not_found(name)),
        _ => Ok(Value::Null),
    }
}

pub fn index_value(value: &Value, index: usize, options: EvalOptions) -> Result<Value, EvalError> {
    match value {
        Value::Array(items) => match items.get(index) {
            Some(found) => Ok(found.clone()),
            None if options.strict => Err(EvalError::out_of_range(index, items.len())),
            None => Ok(Value::Null),
        },
        Value::Null if options.strict => Err(EvalError::out_of_range(index, 0)),
        other if options.strict => Err(EvalError::type_mismatch(format!(
            "cannot index into {}",
            other.type_name()
        ))),
        _ => Ok(Value::Null),
    }
}

fn call_step<'t>(walk: Walk<'t>, call: &Call, ctx: &EvaluationContext<'t>) -> Result<Walk<'t>, EvalError> {
    match call {
        Call::Filter(lambda) => {
            let items = collection(&walk.value, call.name())?;
            let mut kept = Vec::with_capacity(items.len());
            for (index, item) in items.iter().enumerate() {
                if apply_lambda(lambda, item, index, ctx)?.is_truthy() {
                    kept.push(item.clone());
                }
            }
            Ok(Walk {
                value: Value::array(kept),
                ..walk
            })
        }
        Call::Map(lambda) => {
            let items = collection(&walk.value, call.name())?;
            let mapped = items
                .iter()
                .enumerate()
                .map(|(index, item)| apply_lambda(lambda, item, index, ctx))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Walk {
                value: Value::array(mapped),
                table: None,
                field: None,
            })
        }
        Call::Unknown { name, .. } => Err(EvalError::unknown_function(name)),
        _ => Ok(Walk {
            value: aggregate(&walk, call, ctx.tree())?,
            table: None,
            field: None,
        }),
    }
}

fn aggregate(walk: &Walk, call: &Call, tree: &DataSourceTree) -> Result<Value, EvalError> {
    let values = match walk.table {
        Some(table) => {
            let rows = tree.rows(table.name()).unwrap_or(&[]);
            match call.field().or(walk.field.as_deref()) {
                Some(field) => {
                    if !matches!(call, Call::Count) {
                        check_numeric(table, field, call)?;
                    }
                    builtins::project(rows, field)
                }
                None => rows.to_vec(),
            }
        }
        None => {
            let items = collection(&walk.value, call.name())?;
            match call.field() {
                Some(field) => builtins::project(&items, field),
                None => items,
            }
        }
    };

    builtins::aggregate(call, &values).ok_or_else(|| EvalError::unknown_function(call.name()))
}

fn check_numeric(table: &DataSourceNode, field: &str, call: &Call) -> Result<(), EvalError> {
    match table.find_child(field) {
        Some(node) if !node.value_type.is_numeric() => Err(EvalError::type_mismatch(format!(
            "`{}` needs a number field, but `{}.{}` is {}",
            call.name(),
            table.name(),
            field,
            node.value_type
        ))),
        _ => Ok(()),
    }
}

/// Elements of a collection; null reads as empty.
fn collection(value: &Value, call: &str) -> Result<Vec<Value>, EvalError> {
    match value {
        Value::Array(items) => Ok(items.to_vec()),
        Value::Null => Ok(Vec::new()),
        other => Err(EvalError::type_mismatch(format!(
            "`{}` needs a collection, found {}",
            call,
            other.type_name()
        ))),
    }
}

fn apply_lambda(lambda: &Lambda, item: &Value, index: usize, ctx: &EvaluationContext) -> Result<Value, EvalError> {
    let index = Value::int(index as i64);
    let child = match lambda.params.as_slice() {
        [] => ctx.child([(Rc::from(ITEM), item.clone()), (Rc::from(INDEX), index)]),
        [element] => ctx.child([(element.clone(), item.clone())]),
        [element, position, ..] => ctx.child([(element.clone(), item.clone()), (position.clone(), index)]),
    };
    evaluate_expr(&lambda.body, &child)
}

fn evaluate_expr(expr: &Expr, ctx: &EvaluationContext) -> Result<Value, EvalError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Path(path) => evaluate(path, ctx),
        Expr::Unary(op, operand) => {
            let value = evaluate_expr(operand, ctx)?;
            eval_unary_op(op, &value)
        }
        Expr::Binary(BinaryOp::And, left, right) => {
            let left = evaluate_expr(left, ctx)?;
            if left.is_truthy() {
                evaluate_expr(right, ctx)
            } else {
                Ok(left)
            }
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            let left = evaluate_expr(left, ctx)?;
            if left.is_truthy() {
                Ok(left)
            } else {
                evaluate_expr(right, ctx)
            }
        }
        Expr::Binary(op, left, right) => {
            let left = evaluate_expr(left, ctx)?;
            let right = evaluate_expr(right, ctx)?;
            eval_binary_op(&left, op, &right)
        }
    }
}

fn eval_unary_op(op: &UnaryOp, value: &Value) -> Result<Value, EvalError> {
    match (op, value) {
        (UnaryOp::Not, value) => Ok(Value::Bool(!value.is_truthy())),
        (UnaryOp::Neg, Value::Null) => Ok(Value::Null),
        (UnaryOp::Neg, value) => match value.to_number() {
            Some(n) => Ok(Value::number(-n)),
            None => Err(EvalError::type_mismatch(format!("cannot negate {}", value.type_name()))),
        },
    }
}

fn eval_binary_op(left: &Value, op: &BinaryOp, right: &Value) -> Result<Value, EvalError> {
    let ordered = |accept: fn(Ordering) -> bool| Value::Bool(compare(left, right).is_some_and(accept));
    match op {
        BinaryOp::Eq => Ok(Value::Bool(loose_equals(left, right))),
        BinaryOp::NotEq => Ok(Value::Bool(!loose_equals(left, right))),
        BinaryOp::StrictEq => Ok(Value::Bool(strict_equals(left, right))),
        BinaryOp::StrictNotEq => Ok(Value::Bool(!strict_equals(left, right))),
        BinaryOp::Greater => Ok(ordered(Ordering::is_gt)),
        BinaryOp::Less => Ok(ordered(Ordering::is_lt)),
        BinaryOp::GreaterEq => Ok(ordered(Ordering::is_ge)),
        BinaryOp::LessEq => Ok(ordered(Ordering::is_le)),
        BinaryOp::Add => match (left, right) {
            (Value::String(_), _) | (_, Value::String(_)) => {
                let mut combined = value_to_display(left);
                combined.push_str(&value_to_display(right));
                Ok(Value::from(combined))
            }
            _ => arithmetic(left, op, right),
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => arithmetic(left, op, right),
        BinaryOp::And | BinaryOp::Or => Ok(if left.is_truthy() == matches!(op, BinaryOp::And) {
            right.clone()
        } else {
            left.clone()
        }),
    }
}

fn arithmetic(left: &Value, op: &BinaryOp, right: &Value) -> Result<Value, EvalError> {
    if left.is_null() || right.is_null() {
        return Ok(Value::Null);
    }
    let (Some(a), Some(b)) = (left.to_number(), right.to_number()) else {
        return Err(EvalError::type_mismatch(format!(
            "cannot apply `{}` to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        )));
    };
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div | BinaryOp::Mod if b == 0.0 => return Err(EvalError::DivisionByZero),
        BinaryOp::Div => a / b,
        BinaryOp::Mod => a % b,
        _ => unreachable!("non-arithmetic operator `{}`", op.symbol()),
    };
    Ok(Value::number(result))
}

/// A token that failed while rendering, with the error it raised.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenError {
    pub span: Span,
    pub expression: String,
    pub error: EvalError,
}

/// Renders a template. A template that is exactly one token yields that
/// token's value; otherwise every part is stringified and concatenated.
/// Failed tokens become null (or empty text).
pub fn render(template: &Template, ctx: &EvaluationContext) -> Value {
    render_with_diagnostics(template, ctx).0
}

/// [`render`], also reporting every token that failed.
pub fn render_with_diagnostics(template: &Template, ctx: &EvaluationContext) -> (Value, Vec<TokenError>) {
    let mut errors = Vec::new();
    let mut resolve = |expression: &ParsedExpression| match evaluate(expression, ctx) {
        Ok(value) => value,
        Err(error) => {
            debug!(token = %expression, %error, "binding degraded to null");
            errors.push(TokenError {
                span: expression.span,
                expression: expression.to_string(),
                error,
            });
            Value::Null
        }
    };

    let value = match template.single_token() {
        Some(expression) => resolve(expression),
        None => {
            let mut out = String::new();
            for part in &template.parts {
                match part {
                    TemplatePart::Text(text) => out.push_str(text),
                    TemplatePart::Token(expression) => out.push_str(&value_to_display(&resolve(expression))),
                }
            }
            Value::from(out)
        }
    };
    (value, errors)
}

/// Parses and renders `raw`. Text that does not parse as a template is
/// returned unchanged.
pub fn render_str(raw: &str, ctx: &EvaluationContext) -> Value {
    match parse_template(raw) {
        Ok(template) => render(&template, ctx),
        Err(error) => {
            debug!(%error, "template did not parse; rendering it as text");
            Value::string(raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::convert::parse_json;
    use crate::template::parse;
    use crate::tree::ValueType;
    use crate::workspace::{AppState, FixedClock, Table, UserProfile};

    fn make_tree() -> DataSourceTree {
        let products = Table {
            name: "products".into(),
            fields: vec![],
            rows: parse_json(
                r#"[{"name": "A", "price": 10, "category": "tools"},
                    {"name": "B", "price": "5", "category": "toys"},
                    {"name": "C", "category": "tools"}]"#,
            )
            .unwrap()
            .as_array()
            .unwrap()
            .to_vec(),
        }
        .field("name", ValueType::String)
        .field("price", ValueType::Number)
        .field("category", ValueType::String);
        let user = UserProfile {
            id: "u1".into(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            role: "admin".into(),
        };
        let clock = FixedClock::parse("2024-03-05T14:30:00Z").unwrap();
        build(&AppState::default(), &[products], Some(&user), None, &clock)
    }

    fn eval(tree: &DataSourceTree, raw: &str) -> Result<Value, EvalError> {
        evaluate(&parse(raw).unwrap(), &EvaluationContext::new(tree))
    }

    #[test]
    fn test_aggregations_over_table() {
        let tree = make_tree();
        assert_eq!(eval(&tree, "{{products.count()}}"), Ok(Value::int(3)));
        assert_eq!(eval(&tree, "{{products.sum(price)}}"), Ok(Value::int(15)));
        assert_eq!(eval(&tree, "{{products.avg(price)}}"), Ok(Value::int(5)));
        assert_eq!(eval(&tree, "{{products.max(price)}}"), Ok(Value::int(10)));
        assert_eq!(eval(&tree, "{{products.price.min()}}"), Ok(Value::int(5)));
    }

    #[test]
    fn test_aggregation_ignores_earlier_filter() {
        let tree = make_tree();
        assert_eq!(
            eval(&tree, r#"{{products.filter(p => p.category == "toys").count()}}"#),
            Ok(Value::int(3))
        );
        assert_eq!(
            eval(&tree, "{{products.map(p => p.price).count()}}"),
            Ok(Value::int(3))
        );
    }

    #[test]
    fn test_aggregating_text_field_is_a_type_mismatch() {
        let tree = make_tree();
        assert!(matches!(
            eval(&tree, "{{products.sum(name)}}"),
            Err(EvalError::TypeMismatch { .. })
        ));
        assert!(matches!(
            eval(&tree, "{{user.name.count()}}"),
            Err(EvalError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_field_across_rows_and_index() {
        let tree = make_tree();
        assert_eq!(eval(&tree, "{{products[1].name}}"), Ok(Value::string("B")));
        assert_eq!(
            eval(&tree, "{{products.name}}"),
            Ok(parse_json(r#"["A", "B", "C"]"#).unwrap())
        );
        assert_eq!(eval(&tree, "{{products[9].name}}"), Ok(Value::Null));
        assert_eq!(eval(&tree, "{{user.nickname}}"), Ok(Value::Null));
    }

    #[test]
    fn test_strict_mode() {
        let tree = make_tree();
        let ctx = EvaluationContext::new(&tree).with_options(EvalOptions { strict: true });
        let out_of_range = evaluate(&parse("{{products[9]}}").unwrap(), &ctx);
        assert_eq!(out_of_range, Err(EvalError::out_of_range(9, 3)));
        let missing = evaluate(&parse("{{user.nickname}}").unwrap(), &ctx);
        assert_eq!(missing, Err(EvalError::field_not_found("nickname")));
    }

    #[test]
    fn test_filter_and_map() {
        let tree = make_tree();
        assert_eq!(
            eval(&tree, r#"{{products.filter(p => p.category === "tools")[1].name}}"#),
            Ok(Value::string("C"))
        );
        assert_eq!(
            eval(&tree, "{{products.filter(item.price > 6).name}}"),
            Ok(parse_json(r#"["A"]"#).unwrap())
        );
        assert_eq!(
            eval(&tree, "{{products.map((p, i) => i * 2)}}"),
            Ok(parse_json("[0, 2, 4]").unwrap())
        );
    }

    #[test]
    fn test_lambda_sees_outer_item() {
        let tree = make_tree();
        let category = parse_json(r#"{"name": "tools"}"#).unwrap();
        let ctx = EvaluationContext::new(&tree).with_item(category, 0);
        let expression = parse("{{products.filter(p => p.category == item.name).count()}}").unwrap();
        assert_eq!(evaluate(&expression, &ctx), Ok(Value::int(3)));
        let names = parse("{{products.filter(p => p.category == item.name).name}}").unwrap();
        assert_eq!(evaluate(&names, &ctx), Ok(parse_json(r#"["A", "C"]"#).unwrap()));
    }

    #[test]
    fn test_local_item_shadows_table() {
        let table = Table::new("item").field("x", ValueType::Number);
        let clock = FixedClock::parse("2024-03-05T14:30:00Z").unwrap();
        let tree = build(&AppState::default(), &[table], None, None, &clock);
        let ctx = EvaluationContext::new(&tree).with_item(Value::string("row"), 4);
        assert_eq!(evaluate(&parse("{{item}}").unwrap(), &ctx), Ok(Value::string("row")));
        assert_eq!(evaluate(&parse("{{index}}").unwrap(), &ctx), Ok(Value::int(4)));
    }

    #[test]
    fn test_unknown_root_and_function() {
        let tree = make_tree();
        assert_eq!(eval(&tree, "{{prodcts}}"), Err(EvalError::unknown_root("prodcts")));
        assert_eq!(eval(&tree, "{{item.name}}"), Err(EvalError::unknown_root("item")));
        assert_eq!(
            eval(&tree, "{{products.reverse()}}"),
            Err(EvalError::unknown_function("reverse"))
        );
    }

    #[test]
    fn test_predicate_operators() {
        let tree = make_tree();
        assert_eq!(
            eval(&tree, "{{products.filter(p => !(p.price >= 10) && p.price).name}}"),
            Ok(parse_json(r#"["B"]"#).unwrap())
        );
        assert_eq!(
            eval(&tree, "{{products.map(p => p.price || 0)}}"),
            Ok(parse_json(r#"[10, "5", 0]"#).unwrap())
        );
        assert_eq!(
            eval(&tree, "{{products.map(p => p.name + '-' + p.price % 3)}}"),
            Ok(parse_json(r#"["A-1", "B-2", "C-"]"#).unwrap())
        );
        assert_eq!(
            eval(&tree, "{{products.map(p => p.price / 0)}}"),
            Err(EvalError::DivisionByZero)
        );
    }

    #[test]
    fn test_render_mixed_and_single() {
        let tree = make_tree();
        let ctx = EvaluationContext::new(&tree);
        assert_eq!(render_str("{{products.count()}}", &ctx), Value::int(3));
        assert_eq!(
            render_str("Hi {{user.name}}, {{products.count()}} items{{nothing}}", &ctx),
            Value::string("Hi Ada, 3 items")
        );
        assert_eq!(render_str("{{products[0].price | currency}}", &ctx), Value::string("$10.00"));
        assert_eq!(render_str("{{products.min(price)}}", &ctx), Value::int(5));
    }

    #[test]
    fn test_render_with_diagnostics_reports_spans() {
        let tree = make_tree();
        let ctx = EvaluationContext::new(&tree);
        let template = parse_template("Total: {{prodcts.count()}}").unwrap();
        let (value, errors) = render_with_diagnostics(&template, &ctx);
        assert_eq!(value, Value::string("Total: "));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].span, Span::new(7, 26));
        assert_eq!(errors[0].error, EvalError::unknown_root("prodcts"));
    }

    #[test]
    fn test_render_str_keeps_unparseable_text() {
        let tree = make_tree();
        let ctx = EvaluationContext::new(&tree);
        assert_eq!(render_str("a }} b", &ctx), Value::string("a }} b"));
        assert_eq!(
            render_str("Prix: {{ item.prix € }}", &ctx),
            Value::string("Prix: {{ item.prix € }}")
        );
        assert_eq!(render_str("Hi {{ é", &ctx), Value::string("Hi {{ é"));
    }
}
