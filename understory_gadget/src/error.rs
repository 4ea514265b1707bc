// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error type shared by every gadget operation.

use thiserror::Error;

/// Errors raised by schema-governed access, linking, and generation.
///
/// These all indicate a programming mistake at the call site and are
/// returned immediately; nothing is retried or swallowed. Soft data-quality
/// issues such as duplicate registrations are logged instead (see
/// [`Context::register_class`](crate::Context::register_class)).
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum GadgetError {
    /// A readonly property was assigned or deleted after construction.
    #[error("property `{key}` of `{class}` is readonly")]
    ReadonlyViolation {
        /// Class of the instance.
        class: String,
        /// The readonly property.
        key: String,
    },

    /// Linking a value would make a gadget (transitively) contain itself.
    #[error("linking `{key}` would create a cycle")]
    HierarchyCycle {
        /// Property key or array index that was being linked.
        key: String,
    },

    /// A declaration named a class that is not registered in the context.
    #[error("no class registered as `{class}`")]
    UnresolvedReference {
        /// The unknown class name.
        class: String,
    },

    /// The key is not part of the class schema.
    #[error("`{class}` has no property `{key}`")]
    UnknownProperty {
        /// Class of the instance.
        class: String,
        /// The unknown key.
        key: String,
    },

    /// The instance was destroyed and no longer accepts mutation.
    #[error("`{class}` instance has been destroyed")]
    Destroyed {
        /// Class of the instance.
        class: String,
    },

    /// A value did not have the requested type.
    #[error("expected {expected}, found {found}")]
    TypeMismatch {
        /// Requested type.
        expected: &'static str,
        /// Kind of the stored value.
        found: &'static str,
    },

    /// A `set` hook refused the assigned value.
    #[error("value for `{key}` rejected: {reason}")]
    Rejected {
        /// The property being assigned.
        key: String,
        /// Why the value was refused.
        reason: String,
    },

    /// An array index lies too far past the end to be padded.
    #[error("index {index} is out of range for an array of length {len}")]
    IndexOutOfRange {
        /// The requested index.
        index: usize,
        /// Length of the array.
        len: usize,
    },

    /// A generator template was malformed.
    #[error("invalid template: {reason}")]
    InvalidTemplate {
        /// What was wrong with it.
        reason: String,
    },
}

impl GadgetError {
    /// Convenience constructor for [`GadgetError::Rejected`], for use in `set` hooks.
    #[must_use]
    pub fn rejected(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Rejected {
            key: key.into(),
            reason: reason.into(),
        }
    }
}
