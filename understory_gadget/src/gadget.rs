// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gadget instances and their accessor layer.

use std::cell::{Cell, OnceCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;
use tracing::{debug, trace};
use understory_emitter::{Emitter, Event, Listen, ListenerId, Owner};

use crate::change::{Change, Modified};
use crate::class::Class;
use crate::context::Context;
use crate::error::GadgetError;
use crate::hierarchy::{self, Node};
use crate::id::GadgetId;
use crate::link::{self, Link, Relay};
use crate::property::{PropertyEntry, PropertyKind};
use crate::props::Props;
use crate::value::Value;

/// Number of property slots stored inline before spilling to the heap.
const INLINE_CAPACITY: usize = 8;

/// Event delivered to [`Gadget::on_modified`] listeners.
pub type ModifiedEvent = Event<Modified, WeakGadget>;

/// Event delivered to [`Gadget::on_destroyed`] listeners.
pub type DestroyedEvent = Event<GadgetId, WeakGadget>;

/// Lifecycle state of a gadget.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lifecycle {
    /// Properties are being resolved; readonly properties are still writable
    /// and no events are raised.
    Constructing,
    /// Fully constructed.
    Ready,
    /// Destroyed; mutation fails.
    Destroyed,
}

struct Slot {
    entry: Rc<PropertyEntry>,
    value: Value,
    link: Option<Link>,
    /// Derived kinds recompute on read while this is `false`.
    fresh: bool,
}

struct GadgetInner {
    id: GadgetId,
    class: Class,
    context: Context,
    state: Cell<Lifecycle>,
    slots: RefCell<SmallVec<[Slot; INLINE_CAPACITY]>>,
    modified: OnceCell<Emitter<Modified, WeakGadget>>,
    destroyed: OnceCell<Emitter<GadgetId, WeakGadget>>,
}

/// A reactive object: one value per property of its [`Class`].
///
/// `Gadget` is a cheap handle; clones refer to the same instance and `==`
/// compares identity. All access goes through [`get`](Self::get),
/// [`set`](Self::set), [`delete`](Self::delete) and [`keys`](Self::keys),
/// which apply the property hooks, flags and links. Typed APIs are usually
/// thin facades over [`get_as`](Self::get_as) and `set`.
///
/// No internal borrow is held while hooks or listeners run, so both may
/// freely read and write gadgets, including the one being changed.
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use understory_gadget::{ClassBuilder, Context, GadgetError, PropertyBuilder, Props};
///
/// let ctx = Context::new();
/// let point = ClassBuilder::new("Point")
///     .property(PropertyBuilder::new("x").default(0).build())
///     .property(PropertyBuilder::new("y").default(0).readonly().build())
///     .build();
///
/// let p = point.construct_in(&ctx, &Props::new().with("y", 4)).unwrap();
///
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let sink = log.clone();
/// p.on_modified(move |e| sink.borrow_mut().push(e.payload.key.clone()));
///
/// p.set("x", 3).unwrap();
/// p.set("x", 3).unwrap();
/// assert_eq!(p.get_as::<i64>("x"), Ok(3));
/// assert!(matches!(p.set("y", 1), Err(GadgetError::ReadonlyViolation { .. })));
/// assert_eq!(p.get_as::<i64>("y"), Ok(4));
/// assert_eq!(*log.borrow(), ["x"]);
/// ```
#[derive(Clone)]
pub struct Gadget {
    inner: Rc<GadgetInner>,
}

impl Gadget {
    pub(crate) fn construct(class: &Class, ctx: &Context, props: &Props) -> Result<Self, GadgetError> {
        let id = ctx.allocate_id();
        let slots = class
            .entries()
            .into_iter()
            .map(|entry| Slot {
                entry,
                value: Value::Null,
                link: None,
                fresh: false,
            })
            .collect();
        let gadget = Self {
            inner: Rc::new(GadgetInner {
                id,
                class: class.clone(),
                context: ctx.clone(),
                state: Cell::new(Lifecycle::Constructing),
                slots: RefCell::new(slots),
                modified: OnceCell::new(),
                destroyed: OnceCell::new(),
            }),
        };
        trace!(class = class.name(), %id, "constructing gadget");

        if let Some(pre) = class.pre_construct() {
            pre(&gadget, props);
        }
        if let Err(err) = gadget.resolve_all(props) {
            gadget.abort();
            return Err(err);
        }
        if let Some(post) = class.post_construct()
            && let Err(err) = post(&gadget, props)
        {
            gadget.abort();
            return Err(err);
        }

        gadget.inner.state.set(Lifecycle::Ready);
        ctx.track(&gadget);
        ctx.created().trigger(gadget.clone());
        Ok(gadget)
    }

    /// Resolves every stored property in schema order, silently.
    fn resolve_all(&self, props: &Props) -> Result<(), GadgetError> {
        let entries: SmallVec<[Rc<PropertyEntry>; INLINE_CAPACITY]> = self
            .inner
            .slots
            .borrow()
            .iter()
            .map(|slot| slot.entry.clone())
            .collect();
        for (at, entry) in entries.iter().enumerate() {
            if entry.kind().is_derived() {
                continue;
            }
            let value = entry.initial_value(self, props);
            let value = entry.coerce(self, value)?;
            self.store(at, entry, value)?;
        }
        Ok(())
    }

    /// Unwinds a failed construction: links are released, nothing is destroyed.
    fn abort(&self) {
        self.inner.state.set(Lifecycle::Destroyed);
        let links: Vec<Link> = self
            .inner
            .slots
            .borrow_mut()
            .iter_mut()
            .filter_map(|slot| slot.link.take())
            .collect();
        for link in links {
            link.release();
        }
    }

    /// Returns the id allocated by the owning context.
    #[must_use]
    #[inline]
    pub fn id(&self) -> GadgetId {
        self.inner.id
    }

    /// Returns the class this gadget was constructed from.
    #[must_use]
    pub fn class(&self) -> &Class {
        &self.inner.class
    }

    /// Returns the context this gadget was constructed in.
    #[must_use]
    pub fn context(&self) -> &Context {
        &self.inner.context
    }

    /// Returns the lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.get()
    }

    /// Returns `true` once construction has finished and until destruction.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.lifecycle() == Lifecycle::Ready
    }

    /// Returns `true` after [`destroy`](Self::destroy).
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.lifecycle() == Lifecycle::Destroyed
    }

    /// Returns the property keys in schema order.
    #[must_use]
    pub fn keys(&self) -> Vec<Rc<str>> {
        self.inner
            .slots
            .borrow()
            .iter()
            .map(|slot| slot.entry.key().clone())
            .collect()
    }

    /// Returns `true` if `key` is a property of this gadget.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.lookup(key).is_some()
    }

    /// Reads a property.
    ///
    /// Returns `None` only for keys outside the schema. A `get` hook runs on
    /// every read and its result is cached as the stored value; on a linking
    /// property the cached value is relinked like an assignment, silently.
    /// A hook result that would close a link cycle is returned uncached.
    /// Derived properties are recomputed here when stale.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        let (at, entry) = self.lookup(key)?;
        let (current, fresh) = {
            let slots = self.inner.slots.borrow();
            (slots[at].value.clone(), slots[at].fresh)
        };
        let computed = match entry.kind() {
            PropertyKind::Stored => entry.read(self, &current),
            PropertyKind::Cached { dirty, recompute } => {
                (!fresh || dirty(self, &current)).then(|| recompute(self))
            }
            PropertyKind::Dependent { recompute, .. } => (!fresh).then(|| recompute(self)),
        };
        let Some(value) = computed else {
            return Some(current);
        };
        if value.same(&current) {
            self.inner.slots.borrow_mut()[at].fresh = true;
            return Some(value);
        }
        if entry.is_link() && !self.is_destroyed() {
            let Ok((value, link)) = self.attach(&entry, value.clone()) else {
                return Some(value);
            };
            if let Some(previous) = self.commit(at, value.clone(), link) {
                previous.release();
            }
            return Some(value);
        }
        let mut slots = self.inner.slots.borrow_mut();
        slots[at].value = value.clone();
        slots[at].fresh = true;
        Some(value)
    }

    /// Reads a property converted to `T`.
    pub fn get_as<T>(&self, key: &str) -> Result<T, GadgetError>
    where
        T: TryFrom<Value, Error = GadgetError>,
    {
        self.get(key).ok_or_else(|| self.unknown(key))?.try_into()
    }

    /// Assigns a property.
    ///
    /// The `set` hook runs first and may coerce or reject the value. Assigning
    /// a value identical to the current one (see [`Value::same`]) does
    /// nothing. Otherwise the value is stored, linked if the property links,
    /// and one "modified" event is raised if the property is eventable.
    ///
    /// # Errors
    ///
    /// - [`GadgetError::Destroyed`] after destruction.
    /// - [`GadgetError::UnknownProperty`] for keys outside the schema.
    /// - [`GadgetError::ReadonlyViolation`] for readonly properties once ready.
    /// - [`GadgetError::HierarchyCycle`] if linking would create a cycle.
    /// - Whatever the `set` hook returns.
    ///
    /// Nothing changes when an error is returned.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), GadgetError> {
        self.ensure_alive()?;
        let (at, entry) = self.require(key)?;
        if self.is_ready() && entry.is_readonly() {
            return Err(self.readonly(key));
        }
        let value = entry.coerce(self, value.into())?;
        self.store(at, &entry, value)
    }

    /// Reads a property, transforms it with `f` and assigns the result.
    pub fn update<F>(&self, key: &str, f: F) -> Result<(), GadgetError>
    where
        F: FnOnce(Value) -> Value,
    {
        let current = self.get(key).ok_or_else(|| self.unknown(key))?;
        self.set(key, f(current))
    }

    /// Clears a property to [`Value::Null`], unlinking it.
    ///
    /// Raises a [`Change::Deleted`] event when ready and eventable, even if
    /// the value was already null.
    pub fn delete(&self, key: &str) -> Result<(), GadgetError> {
        self.ensure_alive()?;
        let (at, entry) = self.require(key)?;
        if self.is_ready() && entry.is_readonly() {
            return Err(self.readonly(key));
        }
        if let Some(previous) = self.commit(at, Value::Null, None) {
            previous.release();
        }
        if self.is_ready() && entry.is_eventable() {
            self.emit_modified(Modified::deleted(&**entry.key()));
        }
        Ok(())
    }

    /// Returns the serializable properties and their stored values, in
    /// schema order.
    ///
    /// Hooks are not run; this is a read-only view for inspectors.
    #[must_use]
    pub fn snapshot(&self) -> Vec<(Rc<str>, Value)> {
        self.inner
            .slots
            .borrow()
            .iter()
            .filter(|slot| slot.entry.is_serializable())
            .map(|slot| (slot.entry.key().clone(), slot.value.clone()))
            .collect()
    }

    /// Registers a "modified" listener.
    pub fn on_modified<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ModifiedEvent) + 'static,
    {
        self.modified().listen(callback)
    }

    /// Registers a "modified" listener with options.
    pub fn on_modified_with(&self, listen: Listen<Modified, WeakGadget>) -> ListenerId {
        self.modified().listen_with(listen)
    }

    /// Returns the "modified" emitter, creating it on first use.
    #[must_use]
    pub fn modified(&self) -> Emitter<Modified, WeakGadget> {
        self.inner
            .modified
            .get_or_init(|| Emitter::new(self.downgrade(), "modified"))
            .clone()
    }

    /// Registers a "destroyed" listener.
    pub fn on_destroyed<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&DestroyedEvent) + 'static,
    {
        self.destroyed().listen(callback)
    }

    /// Registers a "destroyed" listener with options.
    pub fn on_destroyed_with(&self, listen: Listen<GadgetId, WeakGadget>) -> ListenerId {
        self.destroyed().listen_with(listen)
    }

    /// Returns the "destroyed" emitter, creating it on first use.
    #[must_use]
    pub fn destroyed(&self) -> Emitter<GadgetId, WeakGadget> {
        self.inner
            .destroyed
            .get_or_init(|| Emitter::new(self.downgrade(), "destroyed"))
            .clone()
    }

    /// Destroys the gadget.
    ///
    /// Every link is released and linked children are destroyed too (arrays
    /// have their gadget items destroyed). The "destroyed" event is raised on
    /// this gadget, then on the context. Listeners of both emitters are
    /// dropped afterwards. Destroying twice is a no-op.
    pub fn destroy(&self) {
        if self.is_destroyed() {
            return;
        }
        self.inner.state.set(Lifecycle::Destroyed);
        debug!(class = self.class().name(), id = %self.id(), "destroying gadget");

        let children: Vec<(Link, Value)> = self
            .inner
            .slots
            .borrow_mut()
            .iter_mut()
            .filter_map(|slot| slot.link.take().map(|link| (link, slot.value.clone())))
            .collect();
        for (link, value) in children {
            link.release();
            match value {
                Value::Gadget(child) => child.destroy(),
                Value::Array(child) => child.destroy_items(),
                _ => {}
            }
        }

        if let Some(emitter) = self.inner.destroyed.get().cloned() {
            emitter.trigger(self.id());
            emitter.clear();
        }
        if let Some(emitter) = self.inner.modified.get() {
            emitter.clear();
        }
        let ctx = self.context();
        ctx.untrack(self.id());
        ctx.destroyed().trigger(self.clone());
    }

    /// Returns an [`Owner`] token derived from this gadget's id, for
    /// registering listeners on other emitters on its behalf.
    #[must_use]
    pub fn owner_token(&self) -> Owner {
        Owner::new(self.id().get())
    }

    /// Returns a weak handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakGadget {
        WeakGadget(Rc::downgrade(&self.inner))
    }

    /// Returns `true` if both handles refer to the same instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner).cast::<()>() as usize
    }

    /// Values of the slots that currently hold a link.
    pub(crate) fn linked_values(&self) -> Vec<Value> {
        self.inner
            .slots
            .borrow()
            .iter()
            .filter(|slot| slot.link.is_some())
            .map(|slot| slot.value.clone())
            .collect()
    }

    pub(crate) fn emit_modified(&self, modified: Modified) {
        if let Some(emitter) = self.inner.modified.get().cloned() {
            emitter.trigger(modified);
        }
    }

    /// Stores an already coerced value, linking it when required, and raises
    /// the change event.
    fn store(&self, at: usize, entry: &PropertyEntry, value: Value) -> Result<(), GadgetError> {
        if self.inner.slots.borrow()[at].value.same(&value) {
            return Ok(());
        }
        let (value, link) = self.attach(entry, value)?;
        if let Some(previous) = self.commit(at, value.clone(), link) {
            previous.release();
        }
        if self.is_ready() && entry.is_eventable() {
            self.emit_modified(Modified {
                key: entry.key().to_string(),
                change: Change::Set(value),
            });
        }
        Ok(())
    }

    /// Wraps and links `value` if `entry` links, after the cycle check.
    fn attach(&self, entry: &PropertyEntry, value: Value) -> Result<(Value, Option<Link>), GadgetError> {
        if !(entry.is_link() && value.is_linkable()) {
            return Ok((value, None));
        }
        hierarchy::check(&Node::Gadget(self.clone()), entry.key(), &value)?;
        let value = value.into_reactive();
        let relay = Relay::Gadget {
            owner: self.downgrade(),
            eventable: entry.is_eventable(),
        };
        let link = link::establish(&value, relay, entry.key().clone());
        Ok((value, link))
    }

    /// Writes slot `at` and marks dependents stale, returning the replaced link.
    fn commit(&self, at: usize, value: Value, link: Option<Link>) -> Option<Link> {
        let mut slots = self.inner.slots.borrow_mut();
        let key = slots[at].entry.key().clone();
        let slot = &mut slots[at];
        slot.value = value;
        slot.fresh = true;
        let previous = std::mem::replace(&mut slot.link, link);
        for other in slots.iter_mut() {
            if other.entry.depends_on(&key) {
                other.fresh = false;
            }
        }
        previous
    }

    fn lookup(&self, key: &str) -> Option<(usize, Rc<PropertyEntry>)> {
        self.inner
            .slots
            .borrow()
            .iter()
            .enumerate()
            .find(|(_, slot)| &**slot.entry.key() == key)
            .map(|(at, slot)| (at, slot.entry.clone()))
    }

    fn require(&self, key: &str) -> Result<(usize, Rc<PropertyEntry>), GadgetError> {
        self.lookup(key).ok_or_else(|| self.unknown(key))
    }

    fn ensure_alive(&self) -> Result<(), GadgetError> {
        if self.is_destroyed() {
            Err(GadgetError::Destroyed {
                class: self.class().name().into(),
            })
        } else {
            Ok(())
        }
    }

    fn unknown(&self, key: &str) -> GadgetError {
        GadgetError::UnknownProperty {
            class: self.class().name().into(),
            key: key.into(),
        }
    }

    fn readonly(&self, key: &str) -> GadgetError {
        GadgetError::ReadonlyViolation {
            class: self.class().name().into(),
            key: key.into(),
        }
    }
}

impl PartialEq for Gadget {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Gadget {}

impl fmt::Debug for Gadget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gadget")
            .field("class", &self.class().name())
            .field("id", &self.id())
            .field("lifecycle", &self.lifecycle())
            .finish_non_exhaustive()
    }
}

/// A non-owning [`Gadget`] handle; the actor of gadget events.
#[derive(Clone, Default)]
pub struct WeakGadget(Weak<GadgetInner>);

impl WeakGadget {
    /// Returns the gadget if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<Gadget> {
        self.0.upgrade().map(|inner| Gadget { inner })
    }

    /// Returns `true` if the gadget has not been dropped.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

impl fmt::Debug for WeakGadget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(gadget) => f.debug_tuple("WeakGadget").field(&gadget.id()).finish(),
            None => f.write_str("WeakGadget(<dropped>)"),
        }
    }
}
