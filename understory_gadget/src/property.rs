// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Property declarations.
//!
//! This module provides [`PropertyEntry`], one schema-governed field of a
//! class, and [`PropertyBuilder`] for ergonomic construction.

use std::fmt;
use std::rc::Rc;

use crate::error::GadgetError;
use crate::gadget::Gadget;
use crate::props::Props;
use crate::value::Value;

/// Computes a default, or a full initial value, from the owner and its construction input.
pub type Resolver = Box<dyn Fn(&Gadget, &Props) -> Value>;

/// Transforms the stored value on every read.
pub type GetHook = Box<dyn Fn(&Gadget, &Value) -> Value>;

/// Coerces or rejects a value before it is stored.
pub type SetHook = Box<dyn Fn(&Gadget, Value) -> Result<Value, GadgetError>>;

/// Decides whether a cached value must be recomputed.
pub type DirtyCheck = Box<dyn Fn(&Gadget, &Value) -> bool>;

/// Recomputes a derived value.
pub type Recompute = Box<dyn Fn(&Gadget) -> Value>;

bitflags::bitflags! {
    /// Behavior flags of a property.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u8 {
        /// Assignment and deletion fail once the owner is ready.
        const READONLY     = 0b0000_0001;
        /// Changes raise "modified" events.
        const EVENTABLE    = 0b0000_0010;
        /// Nested gadgets and arrays are linked; their changes are re-raised.
        const LINK         = 0b0000_0100;
        /// The value is part of the owner's snapshot (not purely derived).
        const SERIALIZABLE = 0b0000_1000;
    }
}

impl Default for PropertyFlags {
    fn default() -> Self {
        Self::EVENTABLE | Self::SERIALIZABLE
    }
}

/// Where the fallback value of a property comes from.
pub enum DefaultValue {
    /// A fixed value.
    Literal(Value),
    /// A value computed from the owner and its construction input.
    Resolver(Resolver),
}

impl DefaultValue {
    pub(crate) fn resolve(&self, owner: &Gadget, props: &Props) -> Value {
        match self {
            Self::Literal(value) => value.clone(),
            Self::Resolver(resolve) => resolve(owner, props),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => f.debug_tuple("Literal").field(value).finish(),
            Self::Resolver(_) => f.write_str("Resolver(..)"),
        }
    }
}

/// How the value of a property is produced.
pub enum PropertyKind {
    /// Resolved at construction and stored on assignment.
    Stored,
    /// Computed lazily on read, and again whenever `dirty` reports the cached
    /// value stale.
    Cached {
        /// Staleness predicate over the cached value.
        dirty: DirtyCheck,
        /// Produces a fresh value.
        recompute: Recompute,
    },
    /// Computed lazily on read, and again after any of `deps` changed.
    Dependent {
        /// Sibling keys this value is derived from.
        deps: Vec<Rc<str>>,
        /// Produces a fresh value.
        recompute: Recompute,
    },
}

impl PropertyKind {
    /// Returns `true` for the derived kinds.
    #[must_use]
    pub fn is_derived(&self) -> bool {
        !matches!(self, Self::Stored)
    }
}

impl fmt::Debug for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stored => f.write_str("Stored"),
            Self::Cached { .. } => f.write_str("Cached"),
            Self::Dependent { deps, .. } => f.debug_struct("Dependent").field("deps", deps).finish_non_exhaustive(),
        }
    }
}

/// One schema-governed field of a class.
///
/// Entries are immutable and shared between the class schema and every
/// instance built from it. Build them with [`PropertyBuilder`].
pub struct PropertyEntry {
    key: Rc<str>,
    source_key: Rc<str>,
    default: DefaultValue,
    flags: PropertyFlags,
    order: i32,
    parse: Option<Resolver>,
    get: Option<GetHook>,
    set: Option<SetHook>,
    kind: PropertyKind,
}

impl PropertyEntry {
    /// Returns the property key.
    #[must_use]
    #[inline]
    pub fn key(&self) -> &Rc<str> {
        &self.key
    }

    /// Returns the key read from construction input.
    #[must_use]
    #[inline]
    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    /// Returns the static default.
    #[must_use]
    pub fn default_value(&self) -> &DefaultValue {
        &self.default
    }

    /// Returns the behavior flags.
    #[must_use]
    #[inline]
    pub fn flags(&self) -> PropertyFlags {
        self.flags
    }

    /// Returns the enumeration order.
    #[must_use]
    #[inline]
    pub fn order(&self) -> i32 {
        self.order
    }

    /// Returns how the value is produced.
    #[must_use]
    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    /// Returns whether the property is readonly after construction.
    #[must_use]
    #[inline]
    pub fn is_readonly(&self) -> bool {
        self.flags.contains(PropertyFlags::READONLY)
    }

    /// Returns whether changes raise "modified" events.
    #[must_use]
    #[inline]
    pub fn is_eventable(&self) -> bool {
        self.flags.contains(PropertyFlags::EVENTABLE)
    }

    /// Returns whether nested reactive values are linked.
    #[must_use]
    #[inline]
    pub fn is_link(&self) -> bool {
        self.flags.contains(PropertyFlags::LINK)
    }

    /// Returns whether the value is part of snapshots.
    #[must_use]
    #[inline]
    pub fn is_serializable(&self) -> bool {
        self.flags.contains(PropertyFlags::SERIALIZABLE)
    }

    /// Returns whether the property has a `get` hook.
    #[must_use]
    pub fn has_get_hook(&self) -> bool {
        self.get.is_some()
    }

    /// Returns whether the property has a `set` hook.
    #[must_use]
    pub fn has_set_hook(&self) -> bool {
        self.set.is_some()
    }

    /// Resolves the initial value: `parse` hook, else the input's
    /// `source_key`, else the default chain.
    ///
    /// The default chain is: context override (most specific class first),
    /// then the static default, then the `get` hook applied to it.
    pub(crate) fn initial_value(&self, owner: &Gadget, props: &Props) -> Value {
        if let Some(parse) = &self.parse {
            return parse(owner, props);
        }
        if let Some(value) = props.get(&self.source_key) {
            return value.clone();
        }
        let fallback = owner
            .context()
            .defaults()
            .resolve(owner.class(), &self.key)
            .unwrap_or_else(|| self.default.resolve(owner, props));
        match &self.get {
            Some(get) => get(owner, &fallback),
            None => fallback,
        }
    }

    /// Runs the `set` hook, if any.
    pub(crate) fn coerce(&self, owner: &Gadget, value: Value) -> Result<Value, GadgetError> {
        match &self.set {
            Some(set) => set(owner, value),
            None => Ok(value),
        }
    }

    /// Runs the `get` hook, if any.
    pub(crate) fn read(&self, owner: &Gadget, current: &Value) -> Option<Value> {
        self.get.as_ref().map(|get| get(owner, current))
    }

    /// Returns `true` if assigning `key` invalidates this property.
    pub(crate) fn depends_on(&self, key: &str) -> bool {
        match &self.kind {
            PropertyKind::Dependent { deps, .. } => deps.iter().any(|d| &**d == key),
            _ => false,
        }
    }
}

impl fmt::Debug for PropertyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyEntry")
            .field("key", &self.key)
            .field("source_key", &self.source_key)
            .field("default", &self.default)
            .field("flags", &self.flags)
            .field("order", &self.order)
            .field("kind", &self.kind)
            .field("has_parse", &self.parse.is_some())
            .field("has_get", &self.get.is_some())
            .field("has_set", &self.set.is_some())
            .finish_non_exhaustive()
    }
}

/// Builder for [`PropertyEntry`].
///
/// # Example
///
/// ```rust
/// use understory_gadget::{GadgetError, PropertyBuilder, PropertyFlags, Value};
///
/// let width = PropertyBuilder::new("width")
///     .default(100)
///     .source_key("w")
///     .order(-1)
///     .set(|_, value| match value {
///         Value::Int(n) if n < 0 => Err(GadgetError::rejected("width", "negative")),
///         other => Ok(other),
///     })
///     .build();
///
/// assert_eq!(&**width.key(), "width");
/// assert_eq!(width.source_key(), "w");
/// assert_eq!(width.flags(), PropertyFlags::EVENTABLE | PropertyFlags::SERIALIZABLE);
///
/// let id = PropertyBuilder::new("id").readonly().build();
/// assert!(id.is_readonly());
/// ```
pub struct PropertyBuilder {
    key: Rc<str>,
    source_key: Option<Rc<str>>,
    default: DefaultValue,
    flags: PropertyFlags,
    order: i32,
    parse: Option<Resolver>,
    get: Option<GetHook>,
    set: Option<SetHook>,
    kind: PropertyKind,
}

impl PropertyBuilder {
    /// Starts a stored, eventable, serializable property with a null default.
    #[must_use]
    pub fn new(key: impl Into<Rc<str>>) -> Self {
        Self {
            key: key.into(),
            source_key: None,
            default: DefaultValue::Literal(Value::Null),
            flags: PropertyFlags::default(),
            order: 0,
            parse: None,
            get: None,
            set: None,
            kind: PropertyKind::Stored,
        }
    }

    /// Reads the initial value from `source_key` instead of the property key.
    #[must_use]
    pub fn source_key(mut self, source_key: impl Into<Rc<str>>) -> Self {
        self.source_key = Some(source_key.into());
        self
    }

    /// Sets a literal default.
    #[must_use]
    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = DefaultValue::Literal(value.into());
        self
    }

    /// Computes the default from the owner and its construction input.
    #[must_use]
    pub fn default_with<F>(mut self, resolve: F) -> Self
    where
        F: Fn(&Gadget, &Props) -> Value + 'static,
    {
        self.default = DefaultValue::Resolver(Box::new(resolve));
        self
    }

    /// Makes the property readonly once the owner is ready.
    #[must_use]
    pub fn readonly(mut self) -> Self {
        self.flags.insert(PropertyFlags::READONLY);
        self
    }

    /// Sets whether changes raise "modified" events (default `true`).
    #[must_use]
    pub fn eventable(mut self, eventable: bool) -> Self {
        self.flags.set(PropertyFlags::EVENTABLE, eventable);
        self
    }

    /// Links nested gadgets, arrays and lists assigned to this property.
    #[must_use]
    pub fn link(mut self) -> Self {
        self.flags.insert(PropertyFlags::LINK);
        self
    }

    /// Sets whether the property is part of snapshots.
    #[must_use]
    pub fn serializable(mut self, serializable: bool) -> Self {
        self.flags.set(PropertyFlags::SERIALIZABLE, serializable);
        self
    }

    /// Sets the enumeration order (default `0`, lower first).
    #[must_use]
    pub fn order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    /// Replaces initial value resolution entirely.
    #[must_use]
    pub fn parse<F>(mut self, parse: F) -> Self
    where
        F: Fn(&Gadget, &Props) -> Value + 'static,
    {
        self.parse = Some(Box::new(parse));
        self
    }

    /// Transforms the value on every read; the result is cached as the stored value.
    #[must_use]
    pub fn get<F>(mut self, get: F) -> Self
    where
        F: Fn(&Gadget, &Value) -> Value + 'static,
    {
        self.get = Some(Box::new(get));
        self
    }

    /// Coerces or rejects every assignment, including the initial one.
    #[must_use]
    pub fn set<F>(mut self, set: F) -> Self
    where
        F: Fn(&Gadget, Value) -> Result<Value, GadgetError> + 'static,
    {
        self.set = Some(Box::new(set));
        self
    }

    /// Makes the property a lazily computed cache.
    ///
    /// Derived properties are not serializable unless re-enabled afterwards.
    #[must_use]
    pub fn cached<D, R>(mut self, dirty: D, recompute: R) -> Self
    where
        D: Fn(&Gadget, &Value) -> bool + 'static,
        R: Fn(&Gadget) -> Value + 'static,
    {
        self.kind = PropertyKind::Cached {
            dirty: Box::new(dirty),
            recompute: Box::new(recompute),
        };
        self.flags.remove(PropertyFlags::SERIALIZABLE);
        self
    }

    /// Makes the property a value derived from sibling keys.
    ///
    /// Derived properties are not serializable unless re-enabled afterwards.
    #[must_use]
    pub fn dependent<I, K, R>(mut self, deps: I, recompute: R) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Rc<str>>,
        R: Fn(&Gadget) -> Value + 'static,
    {
        self.kind = PropertyKind::Dependent {
            deps: deps.into_iter().map(Into::into).collect(),
            recompute: Box::new(recompute),
        };
        self.flags.remove(PropertyFlags::SERIALIZABLE);
        self
    }

    /// Builds the [`PropertyEntry`].
    #[must_use]
    pub fn build(self) -> PropertyEntry {
        PropertyEntry {
            source_key: self.source_key.unwrap_or_else(|| self.key.clone()),
            key: self.key,
            default: self.default,
            flags: self.flags,
            order: self.order,
            parse: self.parse,
            get: self.get,
            set: self.set,
            kind: self.kind,
        }
    }
}

impl fmt::Debug for PropertyBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBuilder")
            .field("key", &self.key)
            .field("flags", &self.flags)
            .field("order", &self.order)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let entry = PropertyBuilder::new("x").build();
        assert_eq!(&**entry.key(), "x");
        assert_eq!(entry.source_key(), "x");
        assert_eq!(entry.order(), 0);
        assert!(entry.is_eventable());
        assert!(entry.is_serializable());
        assert!(!entry.is_readonly());
        assert!(!entry.is_link());
        assert!(!entry.kind().is_derived());
        assert!(matches!(entry.default_value(), DefaultValue::Literal(Value::Null)));
    }

    #[test]
    fn builder_flags() {
        let entry = PropertyBuilder::new("children")
            .link()
            .readonly()
            .eventable(false)
            .build();
        assert_eq!(entry.flags(), PropertyFlags::LINK | PropertyFlags::READONLY | PropertyFlags::SERIALIZABLE);
    }

    #[test]
    fn derived_kinds_are_not_serializable() {
        let cached = PropertyBuilder::new("area")
            .cached(|_, _| false, |_| Value::Int(0))
            .build();
        assert!(cached.kind().is_derived());
        assert!(!cached.is_serializable());

        let dependent = PropertyBuilder::new("label")
            .dependent(["first", "last"], |_| Value::Null)
            .serializable(true)
            .build();
        assert!(dependent.is_serializable());
        assert!(dependent.depends_on("last"));
        assert!(!dependent.depends_on("middle"));
    }

    #[test]
    fn debug_hides_hooks() {
        let entry = PropertyBuilder::new("w")
            .default_with(|_, _| Value::Int(1))
            .get(|_, v| v.clone())
            .build();
        let debug = format!("{entry:?}");
        assert!(debug.contains("Resolver(..)"));
        assert!(debug.contains("has_get: true"));
        assert!(debug.contains("has_set: false"));
    }
}
