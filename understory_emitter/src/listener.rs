// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Listener registration types.
//!
//! This module provides [`Listen`], the builder used to describe a
//! registration, plus the [`ListenerId`] and [`Owner`] handles used to remove
//! registrations again.

use alloc::boxed::Box;
use core::cell::Cell;
use core::fmt;

use crate::emitter::Event;

/// Callback invoked with each delivered event.
pub type Callback<P, A> = Box<dyn Fn(&Event<P, A>)>;

/// Predicate deciding whether an event is delivered to a listener.
pub type Filter<P, A> = Box<dyn Fn(&Event<P, A>) -> bool>;

/// Handle identifying one registration on one [`Emitter`](crate::Emitter).
///
/// Ids are allocated monotonically per emitter and are never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub(crate) u64);

impl ListenerId {
    /// Returns the raw id.
    #[must_use]
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// An opaque token grouping registrations made on behalf of one subscriber.
///
/// Registrations bound to an owner can be removed together with
/// [`Emitter::ignore_owner`](crate::Emitter::ignore_owner), which is how a
/// view detaches all of its handlers when it is torn down.
///
/// # Example
///
/// ```rust
/// use understory_emitter::{Emitter, Listen, Owner};
///
/// const VIEW: Owner = Owner::new(7);
///
/// let emitter = Emitter::<u32>::new((), "changed");
/// emitter.listen_with(Listen::new(|_| {}).owner(VIEW));
/// emitter.listen_with(Listen::new(|_| {}).owner(VIEW));
/// emitter.listen(|_| {});
///
/// assert_eq!(emitter.ignore_owner(VIEW), 2);
/// assert_eq!(emitter.len(), 1);
/// ```
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Owner(u64);

impl Owner {
    /// Creates an owner token from a raw value.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw value of this token.
    #[must_use]
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

/// Description of a listener registration.
///
/// Built with [`Listen::new`] and passed to
/// [`Emitter::listen_with`](crate::Emitter::listen_with).
///
/// # Example
///
/// ```rust
/// use understory_emitter::{Emitter, Listen};
///
/// let emitter = Emitter::<i32>::new((), "value");
/// emitter.listen_with(
///     Listen::<i32>::new(|event| assert!(event.payload > 0))
///         .filter(|event| event.payload != 0)
///         .priority(-10)
///         .once(),
/// );
/// emitter.trigger(0);
/// assert_eq!(emitter.len(), 1);
/// emitter.trigger(5);
/// assert!(emitter.is_empty());
/// ```
pub struct Listen<P, A = ()> {
    pub(crate) callback: Callback<P, A>,
    pub(crate) owner: Option<Owner>,
    pub(crate) once: bool,
    pub(crate) filter: Option<Filter<P, A>>,
    pub(crate) priority: i32,
}

impl<P, A> Listen<P, A> {
    /// Creates a registration for `callback` with default options:
    /// no owner, not one-shot, no filter, priority `0`.
    #[must_use]
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&Event<P, A>) + 'static,
    {
        Self {
            callback: Box::new(callback),
            owner: None,
            once: false,
            filter: None,
            priority: 0,
        }
    }

    /// Binds the registration to `owner`.
    #[must_use]
    pub fn owner(mut self, owner: Owner) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Makes the registration one-shot.
    ///
    /// A one-shot listener is removed before its first invocation.
    #[must_use]
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Only delivers events for which `filter` returns `true`.
    ///
    /// A one-shot listener whose filter rejects an event stays registered.
    #[must_use]
    pub fn filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&Event<P, A>) -> bool + 'static,
    {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Sets the dispatch priority. Lower values run first.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl<P, A> fmt::Debug for Listen<P, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listen")
            .field("owner", &self.owner)
            .field("once", &self.once)
            .field("has_filter", &self.filter.is_some())
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// A registered listener, shared between the live list and dispatch snapshots.
pub(crate) struct Entry<P, A> {
    pub(crate) id: ListenerId,
    pub(crate) owner: Option<Owner>,
    pub(crate) once: bool,
    pub(crate) priority: i32,
    /// Set when a one-shot listener has been claimed by a dispatch.
    pub(crate) spent: Cell<bool>,
    pub(crate) filter: Option<Filter<P, A>>,
    pub(crate) callback: Callback<P, A>,
}

impl<P, A> Entry<P, A> {
    pub(crate) fn new(id: ListenerId, listen: Listen<P, A>) -> Self {
        Self {
            id,
            owner: listen.owner,
            once: listen.once,
            priority: listen.priority,
            spent: Cell::new(false),
            filter: listen.filter,
            callback: listen.callback,
        }
    }

    #[inline]
    pub(crate) fn accepts(&self, event: &Event<P, A>) -> bool {
        self.filter.as_ref().is_none_or(|filter| filter(event))
    }
}
