// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Understory Emitter: deterministic, `no_std` publish/subscribe channels.
//!
//! ## Overview
//!
//! An [`Emitter`] is a per-object channel. Subscribers register callbacks with
//! [`Emitter::listen`] or, for more control, [`Emitter::listen_with`] and a
//! [`Listen`] description. [`Emitter::trigger`] wraps a payload into an
//! [`Event`] carrying the emitter's actor and tag, then invokes every
//! matching listener synchronously.
//!
//! Registrations support:
//!
//! - **Priority**: lower values run first; ties run in registration order.
//! - **Filters**: a predicate over the event decides whether it is delivered.
//! - **One-shot**: the listener is removed before its single invocation.
//! - **Owners**: an [`Owner`] token groups registrations for bulk removal.
//!
//! ## Re-entrancy
//!
//! Dispatch works on a snapshot of the listener list taken when `trigger`
//! starts. Listeners may freely register, remove (including themselves) and
//! trigger again from inside a callback; no borrow is held while a callback
//! runs. Listeners registered during a dispatch first run on the next trigger.
//!
//! ## Failures
//!
//! Callbacks are infallible. A panicking callback is not caught and unwinds
//! out of `trigger`; callers that need isolation wrap their own callbacks.
//!
//! ## Minimal example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use understory_emitter::{Emitter, Listen};
//!
//! let emitter = Emitter::<u32>::new((), "tick");
//! let total = Rc::new(Cell::new(0));
//!
//! let t = total.clone();
//! emitter.listen(move |event| t.set(t.get() + event.payload));
//! let t = total.clone();
//! emitter.listen_with(Listen::new(move |_| t.set(t.get() + 100)).once());
//!
//! emitter.trigger(1);
//! emitter.trigger(2);
//! assert_eq!(total.get(), 103);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod emitter;
mod listener;

pub use emitter::{Emitter, Event};
pub use listener::{Callback, Filter, Listen, ListenerId, Owner};
