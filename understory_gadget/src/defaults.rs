// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-context default overrides.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;
use tracing::trace;

use crate::class::Class;
use crate::value::Value;

/// Default values overriding the static defaults of class properties.
///
/// Overrides are keyed by `(class name, property key)`. Resolution walks the
/// class's ancestor chain, most specific first, so an override registered on
/// a base class applies to subclasses unless a subclass override shadows it.
/// Overrides only affect gadgets constructed after they are added.
///
/// # Example
///
/// ```rust
/// use understory_gadget::{ClassBuilder, Context, PropertyBuilder, Props, Value};
///
/// let ctx = Context::new();
/// let base = ClassBuilder::new("Base")
///     .property(PropertyBuilder::new("color").default("red").build())
///     .build();
/// let sub = base.extend("Sub").build();
///
/// ctx.defaults().add("Base", "color", "blue");
/// assert_eq!(ctx.defaults().resolve(&sub, "color"), Some(Value::from("blue")));
///
/// ctx.defaults().add("Sub", "color", "green");
/// let g = sub.construct_in(&ctx, &Props::new()).unwrap();
/// assert_eq!(g.get("color"), Some(Value::from("green")));
///
/// ctx.defaults().remove("Sub", "color");
/// ctx.defaults().remove("Base", "color");
/// let g = sub.construct_in(&ctx, &Props::new()).unwrap();
/// assert_eq!(g.get("color"), Some(Value::from("red")));
/// ```
#[derive(Debug, Default)]
pub struct Defaults {
    table: RefCell<HashMap<Rc<str>, HashMap<Rc<str>, Value>>>,
}

impl Defaults {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the override for `key` on `class`, returning the previous one.
    pub fn add(&self, class: &str, key: &str, value: impl Into<Value>) -> Option<Value> {
        let value = value.into();
        trace!(class, key, ?value, "default override added");
        self.table
            .borrow_mut()
            .entry_ref(class)
            .or_default()
            .insert(Rc::from(key), value)
    }

    /// Removes the override for `key` on `class`, returning it.
    pub fn remove(&self, class: &str, key: &str) -> Option<Value> {
        let mut table = self.table.borrow_mut();
        let keys = table.get_mut(class)?;
        let removed = keys.remove(key);
        if keys.is_empty() {
            table.remove(class);
        }
        if removed.is_some() {
            trace!(class, key, "default override removed");
        }
        removed
    }

    /// Returns `true` if `class` itself has an override for `key`.
    #[must_use]
    pub fn has(&self, class: &str, key: &str) -> bool {
        self.table
            .borrow()
            .get(class)
            .is_some_and(|keys| keys.contains_key(key))
    }

    /// Returns the override registered on `class` itself for `key`.
    #[must_use]
    pub fn get(&self, class: &str, key: &str) -> Option<Value> {
        self.table.borrow().get(class)?.get(key).cloned()
    }

    /// Returns the most specific override for `key` along the ancestor chain
    /// of `class`.
    #[must_use]
    pub fn resolve(&self, class: &Class, key: &str) -> Option<Value> {
        class
            .ancestors()
            .find_map(|ancestor| self.get(ancestor.name(), key))
    }

    /// Removes every override.
    pub fn clear(&self) {
        self.table.borrow_mut().clear();
    }

    /// Returns the number of overrides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.borrow().values().map(HashMap::len).sum()
    }

    /// Returns `true` if there are no overrides.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.table.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;

    #[test]
    fn add_get_has_remove() {
        let defaults = Defaults::new();
        assert_eq!(defaults.add("A", "k", 1), None);
        assert_eq!(defaults.add("A", "k", 2), Some(Value::Int(1)));
        assert!(defaults.has("A", "k"));
        assert!(!defaults.has("A", "other"));
        assert_eq!(defaults.get("A", "k"), Some(Value::Int(2)));
        assert_eq!(defaults.len(), 1);

        assert_eq!(defaults.remove("A", "k"), Some(Value::Int(2)));
        assert_eq!(defaults.remove("A", "k"), None);
        assert!(defaults.is_empty());
    }

    #[test]
    fn resolve_walks_ancestors_most_specific_first() {
        let a = ClassBuilder::new("A").build();
        let b = a.extend("B").build();
        let c = b.extend("C").build();

        let defaults = Defaults::new();
        defaults.add("A", "k", "from a");
        assert_eq!(defaults.resolve(&c, "k"), Some(Value::from("from a")));

        defaults.add("B", "k", "from b");
        assert_eq!(defaults.resolve(&c, "k"), Some(Value::from("from b")));
        assert_eq!(defaults.resolve(&a, "k"), Some(Value::from("from a")));

        defaults.remove("B", "k");
        assert_eq!(defaults.resolve(&c, "k"), Some(Value::from("from a")));
        defaults.clear();
        assert_eq!(defaults.resolve(&c, "k"), None);
    }
}
