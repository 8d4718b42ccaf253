use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

/// One level of local bindings with a link to the enclosing level.
///
/// Scopes are built once and never changed afterwards: entering a repeater
/// row or a lambda call creates a child that points at its parent, and
/// lookups walk from the innermost level outwards.
#[derive(Debug, Clone, Default)]
pub struct LocalScope {
    bindings: HashMap<Rc<str>, Value>,
    parent: Option<Rc<LocalScope>>,
}

impl LocalScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parent(parent: Rc<LocalScope>) -> Self {
        Self {
            bindings: HashMap::with_capacity(2),
            parent: Some(parent),
        }
    }

    /// Repeater row scope: `item` and `index`.
    pub fn for_item(item: Value, index: usize) -> Self {
        Self::new()
            .bind("item", item)
            .bind("index", Value::int(index as i64))
    }

    pub fn bind(mut self, name: impl Into<Rc<str>>, value: Value) -> Self {
        self.bindings.insert(name.into(), value);
        self
    }

    /// Looks `name` up from this level outwards.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self.bindings.get(name) {
            Some(value) => Some(value),
            None => self.parent.as_deref().and_then(|parent| parent.get(name)),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn parent(&self) -> Option<&Rc<LocalScope>> {
        self.parent.as_ref()
    }

    pub fn depth(&self) -> usize {
        1 + self.parent.as_ref().map_or(0, |parent| parent.depth())
    }
}
