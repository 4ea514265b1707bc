// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The [`Emitter`] channel and the [`Event`] record it delivers.

use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;
use smallvec::SmallVec;

use crate::listener::{Entry, Listen, ListenerId, Owner};

/// Inline capacity of the per-dispatch listener snapshot.
///
/// Most channels carry only a handful of listeners, so dispatch normally
/// avoids a heap allocation.
const SNAPSHOT_CAPACITY: usize = 8;

/// The record delivered to listeners.
///
/// `actor` and `tag` are fixed when the [`Emitter`] is created; `payload` is
/// supplied to [`Emitter::trigger`].
#[derive(Clone, Debug)]
pub struct Event<P, A = ()> {
    /// The object that owns the emitting channel.
    pub actor: A,
    /// Name of the channel, e.g. `"modified"`.
    pub tag: &'static str,
    /// Event specific data.
    pub payload: P,
}

struct Inner<P, A> {
    actor: A,
    tag: &'static str,
    /// Sorted by ascending priority; equal priorities keep registration order.
    listeners: Vec<Rc<Entry<P, A>>>,
    next_id: u64,
}

/// A publish/subscribe channel owned by one object.
///
/// `Emitter` is a cheap handle: clones share the same listener list. It is
/// single-threaded and dispatches synchronously.
///
/// ## Dispatch rules
///
/// - Listeners run in ascending priority; ties run in registration order.
/// - The listener list is snapshotted when [`trigger`](Self::trigger) starts.
///   Listeners added during dispatch first run on the next trigger; listeners
///   removed during dispatch still see the event in progress.
/// - One-shot listeners are removed before they are invoked and never run
///   twice, even when a listener re-enters `trigger`.
/// - A panicking listener is not caught; the panic unwinds out of `trigger`.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use understory_emitter::{Emitter, Listen};
///
/// let emitter = Emitter::<&'static str>::new((), "log");
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let s = seen.clone();
/// emitter.listen(move |e| s.borrow_mut().push(("late", e.payload)));
/// let s = seen.clone();
/// emitter.listen_with(
///     Listen::<&str>::new(move |e| s.borrow_mut().push(("early", e.payload))).priority(-1),
/// );
///
/// emitter.trigger("hello");
/// assert_eq!(*seen.borrow(), vec![("early", "hello"), ("late", "hello")]);
/// ```
pub struct Emitter<P, A = ()> {
    inner: Rc<RefCell<Inner<P, A>>>,
}

impl<P, A> Clone for Emitter<P, A> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<P, A> Emitter<P, A> {
    /// Creates an emitter for `actor` whose events carry `tag`.
    #[must_use]
    pub fn new(actor: A, tag: &'static str) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                actor,
                tag,
                listeners: Vec::new(),
                next_id: 0,
            })),
        }
    }

    /// Returns the tag attached to every event of this emitter.
    #[must_use]
    pub fn tag(&self) -> &'static str {
        self.inner.borrow().tag
    }

    /// Returns the number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.borrow().listeners.len()
    }

    /// Returns `true` if no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().listeners.is_empty()
    }

    /// Returns `true` if `id` is still registered.
    #[must_use]
    pub fn contains(&self, id: ListenerId) -> bool {
        self.inner.borrow().listeners.iter().any(|l| l.id == id)
    }

    /// Returns `true` if both handles refer to the same channel.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Registers `callback` with default options.
    pub fn listen<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&Event<P, A>) + 'static,
    {
        self.listen_with(Listen::new(callback))
    }

    /// Registers a listener described by `listen`.
    ///
    /// Safe to call from inside a listener; the new registration does not see
    /// the event currently being dispatched.
    pub fn listen_with(&self, listen: Listen<P, A>) -> ListenerId {
        let mut inner = self.inner.borrow_mut();
        let id = ListenerId(inner.next_id);
        inner.next_id += 1;
        let entry = Rc::new(Entry::new(id, listen));
        let at = inner
            .listeners
            .partition_point(|l| l.priority <= entry.priority);
        inner.listeners.insert(at, entry);
        id
    }

    /// Removes the registration `id`.
    ///
    /// Returns `false` if it was not registered (already removed, or fired as
    /// a one-shot). Safe to call from inside the listener being removed.
    pub fn ignore(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.borrow_mut();
        if let Some(at) = inner.listeners.iter().position(|l| l.id == id) {
            inner.listeners.remove(at);
            true
        } else {
            false
        }
    }

    /// Removes every registration bound to `owner`, returning how many were removed.
    pub fn ignore_owner(&self, owner: Owner) -> usize {
        let mut inner = self.inner.borrow_mut();
        let before = inner.listeners.len();
        inner.listeners.retain(|l| l.owner != Some(owner));
        before - inner.listeners.len()
    }

    /// Removes all listeners.
    pub fn clear(&self) {
        self.inner.borrow_mut().listeners.clear();
    }
}

impl<P, A: Clone> Emitter<P, A> {
    /// Returns a clone of the actor attached to every event.
    #[must_use]
    pub fn actor(&self) -> A {
        self.inner.borrow().actor.clone()
    }

    /// Builds an [`Event`] from `payload` and delivers it synchronously.
    ///
    /// Returns the number of listeners that were invoked.
    pub fn trigger(&self, payload: P) -> usize {
        let (event, snapshot) = {
            let inner = self.inner.borrow();
            let event = Event {
                actor: inner.actor.clone(),
                tag: inner.tag,
                payload,
            };
            let snapshot: SmallVec<[Rc<Entry<P, A>>; SNAPSHOT_CAPACITY]> =
                inner.listeners.iter().cloned().collect();
            (event, snapshot)
        };

        let mut invoked = 0;
        for entry in snapshot {
            if entry.spent.get() || !entry.accepts(&event) {
                continue;
            }
            if entry.once {
                entry.spent.set(true);
                self.ignore(entry.id);
            }
            (entry.callback)(&event);
            invoked += 1;
        }
        invoked
    }
}

impl<P, A: fmt::Debug> fmt::Debug for Emitter<P, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Emitter")
            .field("actor", &inner.actor)
            .field("tag", &inner.tag)
            .field("listeners", &inner.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::format;
    use alloc::vec;
    use core::cell::Cell;

    type Log = Rc<RefCell<Vec<i32>>>;

    fn log() -> Log {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn push(log: &Log, tag: i32) -> impl Fn(&Event<i32>) + 'static {
        let log = log.clone();
        move |_| log.borrow_mut().push(tag)
    }

    #[test]
    fn event_carries_actor_tag_and_payload() {
        let emitter = Emitter::<i32, &'static str>::new("button", "clicked");
        let seen = Rc::new(RefCell::new(None));
        let s = seen.clone();
        emitter.listen(move |e| *s.borrow_mut() = Some((e.actor, e.tag, e.payload)));
        emitter.trigger(3);
        assert_eq!(*seen.borrow(), Some(("button", "clicked", 3)));
    }

    #[test]
    fn priority_orders_dispatch_and_ties_keep_registration_order() {
        let emitter = Emitter::<i32>::new((), "t");
        let log = log();
        emitter.listen_with(Listen::new(push(&log, 1)).priority(5));
        emitter.listen_with(Listen::new(push(&log, 2)).priority(-5));
        emitter.listen_with(Listen::new(push(&log, 3)).priority(5));
        emitter.listen_with(Listen::new(push(&log, 4)));
        emitter.trigger(0);
        assert_eq!(*log.borrow(), vec![2, 4, 1, 3]);
    }

    #[test]
    fn filter_gates_delivery() {
        let emitter = Emitter::<i32>::new((), "t");
        let log = log();
        let l = log.clone();
        emitter.listen_with(
            Listen::new(move |e: &Event<i32>| l.borrow_mut().push(e.payload))
                .filter(|e| e.payload % 2 == 0),
        );
        for n in 0..5 {
            emitter.trigger(n);
        }
        assert_eq!(*log.borrow(), vec![0, 2, 4]);
    }

    #[test]
    fn once_fires_exactly_once() {
        let emitter = Emitter::<i32>::new((), "t");
        let log = log();
        emitter.listen_with(Listen::new(push(&log, 1)).once());
        assert_eq!(emitter.trigger(0), 1);
        assert_eq!(emitter.trigger(0), 0);
        assert_eq!(emitter.trigger(0), 0);
        assert_eq!(*log.borrow(), vec![1]);
        assert!(emitter.is_empty());
    }

    #[test]
    fn once_with_rejecting_filter_stays_registered() {
        let emitter = Emitter::<i32>::new((), "t");
        let log = log();
        emitter.listen_with(Listen::new(push(&log, 9)).once().filter(|e| e.payload == 2));
        emitter.trigger(1);
        assert_eq!(emitter.len(), 1);
        emitter.trigger(2);
        emitter.trigger(2);
        assert_eq!(*log.borrow(), vec![9]);
    }

    #[test]
    fn once_is_not_rerun_by_reentrant_trigger() {
        let emitter = Emitter::<i32>::new((), "t");
        let log = log();
        let e2 = emitter.clone();
        emitter.listen(move |e| {
            if e.payload == 0 {
                e2.trigger(1);
            }
        });
        emitter.listen_with(Listen::new(push(&log, 7)).once());
        emitter.trigger(0);
        assert_eq!(*log.borrow(), vec![7]);
    }

    #[test]
    fn listener_added_during_dispatch_waits_for_next_trigger() {
        let emitter = Emitter::<i32>::new((), "t");
        let log = log();
        let e2 = emitter.clone();
        let l2 = log.clone();
        emitter.listen_with(
            Listen::new(move |_| {
                e2.listen(push(&l2, 2));
            })
            .once(),
        );
        emitter.trigger(0);
        assert!(log.borrow().is_empty());
        emitter.trigger(0);
        assert_eq!(*log.borrow(), vec![2]);
    }

    #[test]
    fn self_ignore_inside_callback_is_safe() {
        let emitter = Emitter::<i32>::new((), "t");
        let log = log();
        let own_id: Rc<Cell<Option<ListenerId>>> = Rc::new(Cell::new(None));
        let e2 = emitter.clone();
        let id_cell = own_id.clone();
        let l2 = log.clone();
        let id = emitter.listen(move |_| {
            l2.borrow_mut().push(1);
            if let Some(id) = id_cell.get() {
                assert!(e2.ignore(id));
            }
        });
        own_id.set(Some(id));
        emitter.trigger(0);
        emitter.trigger(0);
        assert_eq!(*log.borrow(), vec![1]);
        assert!(!emitter.contains(id));
    }

    #[test]
    fn ignore_during_dispatch_still_delivers_current_event() {
        let emitter = Emitter::<i32>::new((), "t");
        let log = log();
        let victim = Rc::new(Cell::new(None));
        let e2 = emitter.clone();
        let v2 = victim.clone();
        emitter.listen(move |_| {
            if let Some(id) = v2.get() {
                e2.ignore(id);
            }
        });
        victim.set(Some(emitter.listen(push(&log, 5))));
        emitter.trigger(0);
        emitter.trigger(0);
        assert_eq!(*log.borrow(), vec![5]);
    }

    #[test]
    fn ignore_owner_removes_only_that_owner() {
        let emitter = Emitter::<i32>::new((), "t");
        let log = log();
        let a = Owner::new(1);
        emitter.listen_with(Listen::new(push(&log, 1)).owner(a));
        emitter.listen_with(Listen::new(push(&log, 2)).owner(Owner::new(2)));
        assert_eq!(emitter.ignore_owner(a), 1);
        emitter.trigger(0);
        assert_eq!(*log.borrow(), vec![2]);
    }

    #[test]
    fn clear_and_unknown_ignore() {
        let emitter = Emitter::<i32>::new((), "t");
        let id = emitter.listen(|_| {});
        emitter.clear();
        assert!(emitter.is_empty());
        assert!(!emitter.ignore(id));
    }

    #[test]
    #[should_panic(expected = "listener failed")]
    fn listener_panic_propagates_to_trigger() {
        let emitter = Emitter::<i32>::new((), "t");
        emitter.listen(|_| panic!("listener failed"));
        emitter.trigger(0);
    }

    #[test]
    fn debug_reports_listener_count() {
        let emitter = Emitter::<i32, u8>::new(4, "modified");
        emitter.listen(|_| {});
        let debug = format!("{emitter:?}");
        assert!(debug.contains("modified"));
        assert!(debug.contains("listeners: 1"));
    }
}
