//! Design-time shape of a binding: one value, a list, or unknown.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ast::{Call, ParsedExpression, Segment, Template};
use crate::interpreter::evaluator::{INDEX, ITEM};
use crate::tree::{Category, DataSourceNode, DataSourceTree, ValueType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Classification {
    Collection,
    Singleton,
    Any,
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Collection => write!(f, "collection"),
            Classification::Singleton => write!(f, "singleton"),
            Classification::Any => write!(f, "any"),
        }
    }
}

/// Classifies without evaluating. `in_repeater` makes `item` and `index`
/// resolvable.
pub fn classify(parsed: &ParsedExpression, tree: &DataSourceTree, in_repeater: bool) -> Classification {
    if parsed.segments.iter().any(|segment| matches!(segment, Segment::Call(Call::Unknown { .. }))) {
        return Classification::Any;
    }

    if parsed.root == ITEM || parsed.root == INDEX {
        if !in_repeater {
            // A table may still be called `item`.
            if tree.root(&parsed.root).is_none() {
                return Classification::Any;
            }
        } else {
            return match parsed.segments.last() {
                Some(Segment::Call(Call::Filter(_) | Call::Map(_))) => Classification::Collection,
                _ => Classification::Singleton,
            };
        }
    }

    let Some(root) = tree.root(&parsed.root) else {
        return Classification::Any;
    };

    if parsed.segments.is_empty() {
        return if root.is_array {
            Classification::Collection
        } else {
            Classification::Singleton
        };
    }

    if let Some(Segment::Call(Call::Filter(_) | Call::Map(_))) = parsed.segments.last() {
        return Classification::Collection;
    }

    let reduced = parsed.segments.iter().any(|segment| {
        matches!(segment, Segment::Index(_)) || matches!(segment, Segment::Call(call) if call.is_aggregate())
    });
    if reduced {
        return Classification::Singleton;
    }

    // Field access, possibly after filter/map: a collection once any step
    // spans a list.
    let mut node = Some(root);
    let mut across = root.is_array;
    for segment in &parsed.segments {
        if let Segment::Field(name) = segment {
            node = node.and_then(|current| current.find_child(name));
            across |= node.is_some_and(|current| current.is_array);
        }
    }
    if across {
        Classification::Collection
    } else {
        Classification::Singleton
    }
}

/// [`classify`] inside the repeater described by `repeater`, if any.
pub fn classify_in_scope(
    parsed: &ParsedExpression,
    tree: &DataSourceTree,
    repeater: Option<&RepeaterScope>,
) -> Classification {
    classify(parsed, tree, repeater.is_some())
}

/// A template is classified by its token when it is exactly one token;
/// static text and mixed text are single values.
pub fn classify_template(
    template: &Template,
    tree: &DataSourceTree,
    repeater: Option<&RepeaterScope>,
) -> Classification {
    match template.single_token() {
        Some(expression) => classify_in_scope(expression, tree, repeater),
        None => Classification::Singleton,
    }
}

/// Local names a repeater adds: `item` shaped like one record of the bound
/// collection, and `index`.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeaterScope {
    pub item: DataSourceNode,
    pub index: DataSourceNode,
}

impl RepeaterScope {
    /// Scope for a repeater bound to `source`. `None` unless the source is a
    /// collection.
    pub fn for_source(tree: &DataSourceTree, source: &ParsedExpression) -> Option<Self> {
        if classify(source, tree, false) != Classification::Collection {
            return None;
        }

        let item = DataSourceNode::root(Category::PageContext, ITEM, ValueType::Object)
            .describe(format!("Current row of {}", source));
        let fields = record_node(tree, source)
            .map(|record| {
                record
                    .children
                    .iter()
                    .filter(|child| !child.is_call())
                    .map(|child| rebase(child, &item))
                    .collect()
            })
            .unwrap_or_default();

        Some(Self {
            item: item.with_children(fields),
            index: DataSourceNode::root(Category::PageContext, INDEX, ValueType::Number)
                .describe("Position of the current row"),
        })
    }

    /// A scope with an `item` of unknown shape.
    pub fn untyped() -> Self {
        Self {
            item: DataSourceNode::root(Category::PageContext, ITEM, ValueType::Any),
            index: DataSourceNode::root(Category::PageContext, INDEX, ValueType::Number),
        }
    }

    pub fn roots(&self) -> [&DataSourceNode; 2] {
        [&self.item, &self.index]
    }

    pub fn root(&self, name: &str) -> Option<&DataSourceNode> {
        self.roots().into_iter().find(|node| node.name() == name)
    }
}

/// The node whose children describe one element of `source`.
fn record_node<'t>(tree: &'t DataSourceTree, source: &ParsedExpression) -> Option<&'t DataSourceNode> {
    let mut node = tree.root(&source.root)?;
    for segment in &source.segments {
        match segment {
            Segment::Field(name) => node = node.find_child(name)?,
            Segment::Call(Call::Filter(_)) => {}
            _ => return None,
        }
    }
    node.is_record_list().then_some(node)
}

/// Copies a record field under `parent`. Within one record only fields
/// holding lists of records stay lists; the tree marks every field below a
/// list as spanning it.
fn rebase(node: &DataSourceNode, parent: &DataSourceNode) -> DataSourceNode {
    let mut rebased = parent
        .child(node.name(), node.value_type)
        .array(node.value_type == ValueType::Array);
    rebased.description = node.description.clone();
    rebased.children = node
        .children
        .iter()
        .filter(|child| !child.is_call())
        .map(|child| rebase(child, &rebased))
        .collect();
    rebased
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::template::{parse, parse_template};
    use crate::workspace::{AppState, FixedClock, Table};

    fn make_tree() -> DataSourceTree {
        let tables = vec![Table::new("products")
            .field("name", ValueType::String)
            .field("price", ValueType::Number)];
        let clock = FixedClock::parse("2024-03-05T14:30:00Z").unwrap();
        build(&AppState::default(), &tables, None, None, &clock)
    }

    fn check(raw: &str, in_repeater: bool) -> Classification {
        classify(&parse(raw).unwrap(), &make_tree(), in_repeater)
    }

    #[test]
    fn test_normative_examples() {
        assert_eq!(check("{{products}}", false), Classification::Collection);
        assert_eq!(check("{{user.name}}", false), Classification::Singleton);
        assert_eq!(check("{{products[0].name}}", false), Classification::Singleton);
        assert_eq!(check("{{products.count()}}", false), Classification::Singleton);
        assert_eq!(check("{{products.filter(p => p.price > 1)}}", false), Classification::Collection);
        assert_eq!(check("{{item.name}}", true), Classification::Singleton);
    }

    #[test]
    fn test_repeater_names() {
        assert_eq!(check("{{index}}", true), Classification::Singleton);
        assert_eq!(check("{{item}}", true), Classification::Singleton);
        assert_eq!(check("{{item.name}}", false), Classification::Any);
        assert_eq!(check("{{index}}", false), Classification::Any);
    }

    #[test]
    fn test_unknowns_are_any() {
        assert_eq!(check("{{nothing.here}}", false), Classification::Any);
        assert_eq!(check("{{products.reverse()}}", false), Classification::Any);
    }

    #[test]
    fn test_field_across_collection() {
        assert_eq!(check("{{products.price}}", false), Classification::Collection);
        assert_eq!(check("{{products.filter(p => p.price > 1).name}}", false), Classification::Collection);
        assert_eq!(check("{{products.map(p => p.price).max()}}", false), Classification::Singleton);
        assert_eq!(check("{{app.name}}", false), Classification::Singleton);
        assert_eq!(check("{{today}}", false), Classification::Singleton);
    }

    #[test]
    fn test_templates() {
        let tree = make_tree();
        let mixed = parse_template("Total: {{products.count()}}").unwrap();
        assert_eq!(classify_template(&mixed, &tree, None), Classification::Singleton);
        let single = parse_template("{{products}}").unwrap();
        assert_eq!(classify_template(&single, &tree, None), Classification::Collection);
        let text = parse_template("plain").unwrap();
        assert_eq!(classify_template(&text, &tree, None), Classification::Singleton);
    }

    #[test]
    fn test_repeater_scope_for_table() {
        let tree = make_tree();
        let scope = RepeaterScope::for_source(&tree, &parse("{{products}}").unwrap()).unwrap();
        let names: Vec<&str> = scope.item.children.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["name", "price"]);
        assert!(scope.item.children.iter().all(|c| !c.is_array));
        assert_eq!(scope.item.find_child("price").unwrap().id, "pageContext.item.price");
        assert_eq!(scope.index.value_type, ValueType::Number);
    }

    #[test]
    fn test_repeater_scope_rejects_singletons() {
        let tree = make_tree();
        assert!(RepeaterScope::for_source(&tree, &parse("{{user.name}}").unwrap()).is_none());
        let mapped = RepeaterScope::for_source(&tree, &parse("{{products.map(p => p.name)}}").unwrap());
        assert!(mapped.unwrap().item.children.is_empty());
    }
}
