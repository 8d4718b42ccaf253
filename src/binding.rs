//! Bindings as stored on component properties, and the checks that keep a
//! property from receiving a value of the wrong shape.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::classify::{classify, classify_template, Classification, RepeaterScope};
use crate::diagnostic::{Diagnostic, Label, Span};
use crate::interpreter::parser::ParseError;
use crate::interpreter::{render_str, EvaluationContext};
use crate::template::{parse, parse_template};
use crate::tree::{DataSourceNode, DataSourceTree};
use crate::value::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BindingExpression {
    Static { value: Value },
    Dynamic { expression: String },
}

impl BindingExpression {
    pub fn dynamic(expression: impl Into<String>) -> Self {
        Self::Dynamic {
            expression: expression.into(),
        }
    }

    /// The value to hand to the widget. Never fails.
    pub fn resolve(&self, ctx: &EvaluationContext) -> Value {
        match self {
            BindingExpression::Static { value } => value.clone(),
            BindingExpression::Dynamic { expression } => render_str(expression, ctx),
        }
    }

    pub fn classify(
        &self,
        tree: &DataSourceTree,
        repeater: Option<&RepeaterScope>,
    ) -> Result<Classification, ParseError> {
        match self {
            BindingExpression::Static { value } => Ok(match value {
                Value::Array(_) => Classification::Collection,
                _ => Classification::Singleton,
            }),
            BindingExpression::Dynamic { expression } => {
                Ok(classify_template(&parse_template(expression)?, tree, repeater))
            }
        }
    }
}

/// What a component property can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Accepts {
    Collection,
    Singleton,
    Any,
}

impl Accepts {
    /// An `Any` classification is only admitted by an `Any` property.
    pub fn admits(&self, classification: Classification) -> bool {
        match self {
            Accepts::Any => true,
            Accepts::Collection => classification == Classification::Collection,
            Accepts::Singleton => classification == Classification::Singleton,
        }
    }
}

impl fmt::Display for Accepts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Accepts::Collection => write!(f, "a collection"),
            Accepts::Singleton => write!(f, "a single value"),
            Accepts::Any => write!(f, "any value"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindingError {
    Parse(ParseError),
    /// The binding classifies as something the property does not accept.
    Mismatch {
        expected: Accepts,
        found: Classification,
    },
}

impl BindingError {
    pub fn code(&self) -> &'static str {
        match self {
            BindingError::Parse(err) => err.kind.code(),
            BindingError::Mismatch { .. } => "E0301",
        }
    }

    pub fn to_diagnostic(&self, source: &str) -> Diagnostic {
        match self {
            BindingError::Parse(err) => err.to_diagnostic(),
            BindingError::Mismatch { expected, found } => Diagnostic::error(self.to_string())
                .with_code(self.code())
                .with_label(Label::primary(Span::new(0, source.len()), format!("this is {}", found)))
                .with_help(match expected {
                    Accepts::Collection => "bind a table, a list, or a `filter`/`map` result",
                    _ => "index into the list or aggregate it, e.g. `[0]` or `.count()`",
                }),
        }
    }
}

impl fmt::Display for BindingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingError::Parse(err) => write!(f, "{}", err),
            BindingError::Mismatch { expected, found } => {
                write!(f, "classification mismatch: expected {}, found {}", expected, found)
            }
        }
    }
}

impl std::error::Error for BindingError {}

impl From<ParseError> for BindingError {
    fn from(err: ParseError) -> Self {
        BindingError::Parse(err)
    }
}

/// Checks that `binding` has a shape the property accepts.
pub fn validate_binding(
    binding: &BindingExpression,
    accepts: Accepts,
    tree: &DataSourceTree,
    repeater: Option<&RepeaterScope>,
) -> Result<Classification, BindingError> {
    let found = binding.classify(tree, repeater)?;
    if accepts.admits(found) {
        Ok(found)
    } else {
        Err(BindingError::Mismatch {
            expected: accepts,
            found,
        })
    }
}

/// Nodes a picker may offer for a property: collection roots for
/// collection properties; every single-value node (plus the repeater's
/// `item` fields and `index`) for single-value properties.
pub fn available_sources<'t>(
    tree: &'t DataSourceTree,
    accepts: Accepts,
    repeater: Option<&'t RepeaterScope>,
) -> Vec<&'t DataSourceNode> {
    let local = repeater.into_iter().flat_map(|scope| {
        scope.item.children.iter().chain(std::iter::once(&scope.index))
    });

    match accepts {
        Accepts::Collection => tree.all_roots().filter(|node| node.is_array).collect(),
        Accepts::Singleton => tree
            .all_roots()
            .flat_map(|root| root.walk())
            .filter(|node| is_singleton(tree, node))
            .chain(local.filter(|node| !node.is_array))
            .collect(),
        Accepts::Any => tree
            .all_roots()
            .flat_map(|root| root.walk())
            .chain(repeater.into_iter().flat_map(|scope| {
                scope.item.walk().into_iter().chain(std::iter::once(&scope.index))
            }))
            .collect(),
    }
}

/// Whether the expression reaching `node` classifies as a single value.
fn is_singleton(tree: &DataSourceTree, node: &DataSourceNode) -> bool {
    parse(&node.expression())
        .map(|expression| classify(&expression, tree, false) == Classification::Singleton)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::tree::ValueType;
    use crate::workspace::{AppState, FixedClock, Table};

    fn make_tree() -> DataSourceTree {
        let tables = vec![Table::new("products")
            .field("name", ValueType::String)
            .field("price", ValueType::Number)];
        let clock = FixedClock::parse("2024-03-05T14:30:00Z").unwrap();
        build(&AppState::default(), &tables, None, None, &clock)
    }

    #[test]
    fn test_validate_matching_bindings() {
        let tree = make_tree();
        let table = BindingExpression::dynamic("{{products}}");
        assert_eq!(
            validate_binding(&table, Accepts::Collection, &tree, None),
            Ok(Classification::Collection)
        );
        let label = BindingExpression::dynamic("Total: {{products.count()}}");
        assert_eq!(
            validate_binding(&label, Accepts::Singleton, &tree, None),
            Ok(Classification::Singleton)
        );
    }

    #[test]
    fn test_validate_rejects_mismatch() {
        let tree = make_tree();
        let err = validate_binding(&BindingExpression::dynamic("{{products}}"), Accepts::Singleton, &tree, None)
            .unwrap_err();
        assert_eq!(
            err,
            BindingError::Mismatch {
                expected: Accepts::Singleton,
                found: Classification::Collection
            }
        );
        assert_eq!(err.to_diagnostic("{{products}}").code.as_deref(), Some("E0301"));
    }

    #[test]
    fn test_any_only_fits_any() {
        let tree = make_tree();
        let unknown = BindingExpression::dynamic("{{mystery}}");
        assert!(validate_binding(&unknown, Accepts::Singleton, &tree, None).is_err());
        assert!(validate_binding(&unknown, Accepts::Collection, &tree, None).is_err());
        assert_eq!(validate_binding(&unknown, Accepts::Any, &tree, None), Ok(Classification::Any));
    }

    #[test]
    fn test_static_bindings() {
        let tree = make_tree();
        let text = BindingExpression::Static { value: Value::string("Hi") };
        assert!(validate_binding(&text, Accepts::Singleton, &tree, None).is_ok());
        let list = BindingExpression::Static { value: Value::array(vec![Value::int(1)]) };
        assert!(validate_binding(&list, Accepts::Collection, &tree, None).is_ok());
    }

    #[test]
    fn test_parse_errors_surface() {
        let tree = make_tree();
        let broken = BindingExpression::dynamic("{{products");
        assert!(matches!(
            validate_binding(&broken, Accepts::Any, &tree, None),
            Err(BindingError::Parse(_))
        ));
    }

    #[test]
    fn test_binding_serde_tag() {
        let binding: BindingExpression =
            serde_json::from_str(r#"{"type": "dynamic", "expression": "{{user.name}}"}"#).unwrap();
        assert_eq!(binding, BindingExpression::dynamic("{{user.name}}"));
    }

    #[test]
    fn test_available_sources() {
        let tree = make_tree();
        let collections = available_sources(&tree, Accepts::Collection, None);
        let ids: Vec<&str> = collections.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["database.products"]);

        let scope = RepeaterScope::for_source(&tree, &parse("{{products}}").unwrap()).unwrap();
        let singles = available_sources(&tree, Accepts::Singleton, Some(&scope));
        let ids: Vec<&str> = singles.iter().map(|n| n.id.as_str()).collect();
        assert!(ids.contains(&"user.user.name"));
        assert!(ids.contains(&"pageContext.item.name"));
        assert!(ids.contains(&"pageContext.index"));
        assert!(!ids.contains(&"database.products"));
        assert!(ids.contains(&"database.products.count()"));
        assert!(ids.contains(&"database.products.sum(price)"));
        assert!(!ids.contains(&"database.products.price"));
    }
}
