// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Payloads of "modified" notifications.

use crate::value::Value;

/// What happened to a key.
#[derive(Clone, Debug, PartialEq)]
pub enum Change {
    /// The key now holds this value.
    Set(Value),
    /// The key was deleted (gadgets) or fell off the end (arrays).
    Deleted,
}

/// Payload of a "modified" event raised by a gadget or a reactive array.
///
/// `key` is the property key, or the decimal index for arrays. Changes relayed
/// from linked children are path-qualified with `.`, so a change to `c` on a
/// gadget linked under `b` arrives as `"b.c"`.
///
/// # Example
///
/// ```rust
/// use understory_gadget::{Change, Modified, Value};
///
/// let m = Modified::set("b.c", 3);
/// assert_eq!(m.value(), Some(&Value::Int(3)));
/// assert_eq!(m.path().collect::<Vec<_>>(), ["b", "c"]);
/// assert!(Modified::deleted("x").is_deleted());
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Modified {
    /// Property key or index, path-qualified when relayed.
    pub key: String,
    /// The change.
    pub change: Change,
}

impl Modified {
    /// Builds a [`Change::Set`] payload.
    #[must_use]
    pub fn set(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            key: key.into(),
            change: Change::Set(value.into()),
        }
    }

    /// Builds a [`Change::Deleted`] payload.
    #[must_use]
    pub fn deleted(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            change: Change::Deleted,
        }
    }

    /// Returns the new value, or `None` for a deletion.
    #[must_use]
    pub fn value(&self) -> Option<&Value> {
        match &self.change {
            Change::Set(value) => Some(value),
            Change::Deleted => None,
        }
    }

    /// Returns `true` for a deletion.
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        matches!(self.change, Change::Deleted)
    }

    /// Splits the key into its path segments.
    pub fn path(&self) -> impl Iterator<Item = &str> {
        self.key.split('.')
    }

    /// Prefixes the key with `prefix`, as done when relaying to a parent.
    pub(crate) fn qualified(&self, prefix: &str) -> Self {
        Self {
            key: format!("{prefix}.{}", self.key),
            change: self.change.clone(),
        }
    }
}
