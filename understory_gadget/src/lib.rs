// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Gadget: schema-driven reactive objects.
//!
//! A [`Gadget`] is an object whose fields are declared by its [`Class`]'s
//! schema. Every read and write goes through an accessor layer that applies
//! the declared defaults, hooks and flags, and raises change notifications
//! through [`understory_emitter`] channels.
//!
//! ## Core Concepts
//!
//! ### Classes and schemas
//!
//! A [`Class`] is built with [`ClassBuilder`] from [`PropertyEntry`] values
//! (see [`PropertyBuilder`]). A subclass starts from a snapshot of its
//! parent's [`Schema`]; it may override or remove entries without affecting
//! the parent, and later edits to the parent do not reach it.
//!
//! ### Construction
//!
//! [`Class::construct`] resolves each property in schema order:
//!
//! 1. a `parse` hook, if present, decides the value outright;
//! 2. otherwise the construction [`Props`] entry named by the property's
//!    source key;
//! 3. otherwise the default: a [`Context`] override for the class or its
//!    nearest ancestor, then the static default, passed through the `get`
//!    hook if there is one.
//!
//! The `set` hook then coerces or rejects the value. No events are raised
//! during construction, and readonly properties are still writable. Once
//! construction finishes the gadget is *ready*.
//!
//! ### Change notification
//!
//! Once ready, every effective assignment raises exactly one "modified"
//! event with the key and [`Change`]. Assigning an identical value (see
//! [`Value::same`]) is a no-op.
//!
//! Properties flagged `link` relay the changes of nested gadgets and
//! [`ReactiveArray`]s to the owner with path-qualified keys such as
//! `"child.x"` or `"items.3.label"`. Links never form cycles: an assignment
//! that would make a gadget contain itself fails with
//! [`GadgetError::HierarchyCycle`].
//!
//! ### Context
//!
//! The [`Context`] owns the class registry used by the generator, the
//! default override table ([`Defaults`]), named singletons, the
//! `created`/`destroyed` buses and named signal buses. One context is
//! current per thread; [`Context::install`] swaps it for a scope.
//!
//! ## Minimal example
//!
//! ```rust
//! use understory_gadget::{ClassBuilder, Context, Modified, PropertyBuilder, Props, Value};
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! let ctx = Context::new();
//! let point = ClassBuilder::new("Point")
//!     .property(PropertyBuilder::new("x").default(0).build())
//!     .property(PropertyBuilder::new("y").default(0).readonly().build())
//!     .build();
//! let holder = ClassBuilder::new("Holder")
//!     .property(PropertyBuilder::new("point").link().build())
//!     .build();
//!
//! let p = point.construct_in(&ctx, &Props::new().with("y", 2)).unwrap();
//! let h = holder.construct_in(&ctx, &Props::new().with("point", p.clone())).unwrap();
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! h.on_modified(move |e| sink.borrow_mut().push(e.payload.clone()));
//!
//! p.set("x", 5).unwrap();
//! assert_eq!(*seen.borrow(), [Modified::set("point.x", 5)]);
//! assert!(p.set("y", 3).is_err());
//! assert_eq!(p.get("y"), Some(Value::Int(2)));
//! ```
//!
//! ## Features
//!
//! - `json`: build generator [`Template`]s from `serde_json` documents.
//!
//! ## Threading
//!
//! Gadgets, arrays and contexts are single-threaded handles (`Rc` based)
//! and dispatch synchronously.

mod array;
mod change;
mod class;
mod context;
mod defaults;
mod error;
mod gadget;
mod generator;
pub mod hierarchy;
mod id;
mod link;
mod property;
mod props;
mod schema;
mod value;

pub use array::{ArrayEvent, ReactiveArray, WeakArray};
pub use change::{Change, Modified};
pub use class::{Class, ClassBuilder, PostConstruct, PreConstruct};
pub use context::{Context, ContextGuard, LifecycleEvent, SignalEvent};
pub use defaults::Defaults;
pub use error::GadgetError;
pub use gadget::{DestroyedEvent, Gadget, Lifecycle, ModifiedEvent, WeakGadget};
pub use generator::{Declaration, Template};
pub use id::GadgetId;
pub use property::{
    DefaultValue, DirtyCheck, GetHook, PropertyBuilder, PropertyEntry, PropertyFlags,
    PropertyKind, Recompute, Resolver, SetHook,
};
pub use props::Props;
pub use schema::Schema;
pub use value::{Opaque, Value};

pub use understory_emitter::{Listen, ListenerId, Owner};
