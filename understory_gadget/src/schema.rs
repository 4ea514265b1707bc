// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ordered per-class property tables.

use std::rc::Rc;

use crate::property::PropertyEntry;

#[derive(Clone, Debug)]
struct Slot {
    seq: u64,
    entry: Rc<PropertyEntry>,
}

/// The ordered collection of [`PropertyEntry`] values declared for a class.
///
/// Entries enumerate by `(order, declaration sequence)` ascending.
/// Redeclaring a key replaces the entry but keeps its original sequence
/// number, so an override without an explicit `order` stays where the
/// overridden entry was.
///
/// Cloning a schema is cheap (entries are shared) and produces an
/// independent table; this is how subclasses snapshot their parent.
///
/// # Example
///
/// ```rust
/// use understory_gadget::{PropertyBuilder, Schema};
///
/// let mut schema = Schema::new();
/// schema.declare(PropertyBuilder::new("b").build());
/// schema.declare(PropertyBuilder::new("a").build());
/// schema.declare(PropertyBuilder::new("first").order(-1).build());
///
/// let keys: Vec<_> = schema.keys().collect();
/// assert_eq!(keys, ["first", "b", "a"]);
/// ```
#[derive(Clone, Debug, Default)]
pub struct Schema {
    slots: Vec<Slot>,
    next_seq: u64,
}

impl Schema {
    /// Creates an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares `entry`, replacing any entry with the same key.
    ///
    /// Returns the replaced entry.
    pub fn declare(&mut self, entry: PropertyEntry) -> Option<Rc<PropertyEntry>> {
        let entry = Rc::new(entry);
        match self.slots.iter().position(|s| s.entry.key() == entry.key()) {
            Some(at) => {
                let seq = self.slots[at].seq;
                let old = self.slots.remove(at);
                self.insert(Slot { seq, entry });
                Some(old.entry)
            }
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.insert(Slot { seq, entry });
                None
            }
        }
    }

    fn insert(&mut self, slot: Slot) {
        let key = (slot.entry.order(), slot.seq);
        let at = self
            .slots
            .partition_point(|s| (s.entry.order(), s.seq) <= key);
        self.slots.insert(at, slot);
    }

    /// Removes the entry for `key`, returning it.
    pub fn clear(&mut self, key: &str) -> Option<Rc<PropertyEntry>> {
        let at = self.slots.iter().position(|s| &**s.entry.key() == key)?;
        Some(self.slots.remove(at).entry)
    }

    /// Returns the entry for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Rc<PropertyEntry>> {
        self.slots
            .iter()
            .find(|s| &**s.entry.key() == key)
            .map(|s| &s.entry)
    }

    /// Returns `true` if `key` is declared.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Iterates over entries in enumeration order.
    pub fn entries(&self) -> impl Iterator<Item = &Rc<PropertyEntry>> {
        self.slots.iter().map(|s| &s.entry)
    }

    /// Iterates over keys in enumeration order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| &**s.entry.key())
    }

    /// Iterates over the keys of serializable entries in enumeration order.
    pub fn serializable_keys(&self) -> impl Iterator<Item = &str> {
        self.slots
            .iter()
            .filter(|s| s.entry.is_serializable())
            .map(|s| &**s.entry.key())
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing is declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::property::{DefaultValue, PropertyBuilder};
    use crate::value::Value;

    fn keys(schema: &Schema) -> Vec<&str> {
        schema.keys().collect()
    }

    #[test]
    fn ties_keep_declaration_order() {
        let mut schema = Schema::new();
        for key in ["c", "a", "b"] {
            schema.declare(PropertyBuilder::new(key).build());
        }
        assert_eq!(keys(&schema), ["c", "a", "b"]);
    }

    #[test]
    fn order_sorts_before_sequence() {
        let mut schema = Schema::new();
        schema.declare(PropertyBuilder::new("late").order(5).build());
        schema.declare(PropertyBuilder::new("mid").build());
        schema.declare(PropertyBuilder::new("early").order(-5).build());
        assert_eq!(keys(&schema), ["early", "mid", "late"]);
    }

    #[test]
    fn redeclare_keeps_sequence_and_takes_new_order() {
        let mut schema = Schema::new();
        schema.declare(PropertyBuilder::new("a").default(1).build());
        schema.declare(PropertyBuilder::new("b").build());
        schema.declare(PropertyBuilder::new("c").build());

        let old = schema.declare(PropertyBuilder::new("a").default(2).build());
        assert!(old.is_some());
        assert_eq!(keys(&schema), ["a", "b", "c"]);
        assert!(matches!(
            schema.get("a").map(|e| e.default_value()),
            Some(DefaultValue::Literal(Value::Int(2)))
        ));

        schema.declare(PropertyBuilder::new("a").order(1).build());
        assert_eq!(keys(&schema), ["b", "c", "a"]);
        assert_eq!(schema.len(), 3);
    }

    #[test]
    fn clear_and_clone_are_independent() {
        let mut base = Schema::new();
        base.declare(PropertyBuilder::new("x").build());
        base.declare(PropertyBuilder::new("y").build());

        let mut copy = base.clone();
        copy.clear("x");
        assert_eq!(keys(&copy), ["y"]);
        assert_eq!(keys(&base), ["x", "y"]);
        assert!(base.clear("missing").is_none());
    }

    #[test]
    fn serializable_keys_skip_derived() {
        let mut schema = Schema::new();
        schema.declare(PropertyBuilder::new("w").build());
        schema.declare(
            PropertyBuilder::new("area")
                .cached(|_, _| false, |_| Value::Null)
                .build(),
        );
        schema.declare(PropertyBuilder::new("h").build());
        let serializable: Vec<_> = schema.serializable_keys().collect();
        assert_eq!(serializable, ["w", "h"]);
    }
}
