// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The process context: class registry, default overrides, buses, singletons
//! and live-instance tracking.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use hashbrown::HashMap;
use tracing::{debug, warn};
use understory_emitter::{Emitter, Event, ListenerId};

use crate::class::Class;
use crate::defaults::Defaults;
use crate::gadget::{Gadget, WeakGadget};
use crate::id::GadgetId;
use crate::value::Value;

/// Key under which [`Context::set_world`] stores the world gadget.
const WORLD: &str = "world";

/// Tracked entries below which dropped gadgets are never swept.
const SWEEP_FLOOR: usize = 64;

thread_local! {
    static CURRENT: RefCell<Option<Context>> = const { RefCell::new(None) };
}

/// Event delivered on the context `created` and `destroyed` buses.
pub type LifecycleEvent = Event<Gadget>;

/// Event delivered on named buses; the actor is the bus name.
pub type SignalEvent = Event<Value, Rc<str>>;

struct ContextInner {
    classes: RefCell<HashMap<Rc<str>, Class>>,
    defaults: Defaults,
    singletons: RefCell<HashMap<Rc<str>, Value>>,
    buses: RefCell<HashMap<Rc<str>, Emitter<Value, Rc<str>>>>,
    created: Emitter<Gadget>,
    destroyed: Emitter<Gadget>,
    tracked: RefCell<HashMap<GadgetId, WeakGadget>>,
    /// Size of `tracked` at which the next sweep of dropped entries runs.
    sweep_at: Cell<usize>,
    next_id: Cell<u64>,
}

/// Shared state for a family of gadgets.
///
/// Each thread has one *current* context, used by [`Class::construct`] and
/// created on first use. Tests typically [`install`](Self::install) a fresh
/// context to isolate themselves; every operation also has a form taking an
/// explicit context.
///
/// `Context` is a cheap handle; clones share state.
///
/// # Example
///
/// ```rust
/// use understory_gadget::{ClassBuilder, Context, PropertyBuilder, Props};
///
/// let ctx = Context::new();
/// let _guard = Context::install(ctx.clone());
///
/// let point = ClassBuilder::new("Point")
///     .property(PropertyBuilder::new("x").build())
///     .build();
/// ctx.register_class(point.clone());
///
/// let p = point.construct(&Props::new()).unwrap();
/// assert!(p.context().ptr_eq(&ctx));
/// assert_eq!(ctx.find(p.id()), Some(p.clone()));
/// assert_eq!(ctx.live_count(), 1);
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Rc<ContextInner>,
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ContextInner {
                classes: RefCell::default(),
                defaults: Defaults::new(),
                singletons: RefCell::default(),
                buses: RefCell::default(),
                created: Emitter::new((), "created"),
                destroyed: Emitter::new((), "destroyed"),
                tracked: RefCell::default(),
                sweep_at: Cell::new(SWEEP_FLOOR),
                next_id: Cell::new(1),
            }),
        }
    }

    /// Returns this thread's current context, creating one if none is set.
    #[must_use]
    pub fn current() -> Self {
        CURRENT.with(|current| current.borrow_mut().get_or_insert_with(Self::new).clone())
    }

    /// Makes `ctx` current until the returned guard is dropped.
    ///
    /// Guards nest; dropping one restores whatever was current before it.
    #[must_use = "dropping this guard restores the previous context"]
    pub fn install(ctx: Self) -> ContextGuard {
        let previous = CURRENT.with(|current| current.replace(Some(ctx)));
        ContextGuard { previous }
    }

    /// Makes `ctx` current, returning the previous one.
    pub fn make_current(ctx: Self) -> Option<Self> {
        CURRENT.with(|current| current.replace(Some(ctx)))
    }

    /// Runs `f` with the current context.
    pub fn with_current<R>(f: impl FnOnce(&Self) -> R) -> R {
        f(&Self::current())
    }

    /// Registers `class` under its name, returning the class it replaced.
    ///
    /// A duplicate name is logged; the newer class wins.
    pub fn register_class(&self, class: Class) -> Option<Class> {
        let name: Rc<str> = class.name().into();
        let previous = self
            .inner
            .classes
            .borrow_mut()
            .insert(name.clone(), class.clone());
        match &previous {
            Some(old) if !old.ptr_eq(&class) => {
                warn!(
                    class = &*name,
                    previous_parent = old.parent().map(Class::name),
                    parent = class.parent().map(Class::name),
                    "duplicate class registration; the newer class replaces the previous one"
                );
            }
            Some(_) => {}
            None => debug!(class = &*name, "class registered"),
        }
        previous
    }

    /// Removes the class registered as `name`.
    pub fn unregister_class(&self, name: &str) -> Option<Class> {
        self.inner.classes.borrow_mut().remove(name)
    }

    /// Returns the class registered as `name`.
    #[must_use]
    pub fn class(&self, name: &str) -> Option<Class> {
        self.inner.classes.borrow().get(name).cloned()
    }

    /// Returns `true` if a class is registered as `name`.
    #[must_use]
    pub fn has_class(&self, name: &str) -> bool {
        self.inner.classes.borrow().contains_key(name)
    }

    /// Returns the registered class names, sorted.
    #[must_use]
    pub fn class_names(&self) -> Vec<Rc<str>> {
        let mut names: Vec<_> = self.inner.classes.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the default override table.
    #[must_use]
    pub fn defaults(&self) -> &Defaults {
        &self.inner.defaults
    }

    /// Stores a named singleton, returning the value it replaced.
    ///
    /// A duplicate name is logged; the newer value wins.
    pub fn register_singleton(&self, name: &str, value: impl Into<Value>) -> Option<Value> {
        let value = value.into();
        let previous = self
            .inner
            .singletons
            .borrow_mut()
            .insert(name.into(), value.clone());
        if let Some(old) = &previous {
            warn!(
                singleton = name,
                previous = ?old,
                value = ?value,
                "duplicate singleton registration; the newer value replaces the previous one"
            );
        }
        previous
    }

    /// Returns the singleton named `name`.
    #[must_use]
    pub fn singleton(&self, name: &str) -> Option<Value> {
        self.inner.singletons.borrow().get(name).cloned()
    }

    /// Removes the singleton named `name`.
    pub fn remove_singleton(&self, name: &str) -> Option<Value> {
        self.inner.singletons.borrow_mut().remove(name)
    }

    /// Sets the current world gadget, returning the previous one.
    ///
    /// Unlike [`register_singleton`](Self::register_singleton), replacing the
    /// world is expected and not logged.
    pub fn set_world(&self, world: Gadget) -> Option<Gadget> {
        self.inner
            .singletons
            .borrow_mut()
            .insert(WORLD.into(), Value::Gadget(world))
            .and_then(|old| old.as_gadget().cloned())
    }

    /// Returns the current world gadget.
    #[must_use]
    pub fn world(&self) -> Option<Gadget> {
        self.singleton(WORLD).and_then(|v| v.as_gadget().cloned())
    }

    /// Returns the named bus, creating it on first use.
    #[must_use]
    pub fn bus(&self, name: &str) -> Emitter<Value, Rc<str>> {
        self.inner
            .buses
            .borrow_mut()
            .entry_ref(name)
            .or_insert_with(|| Emitter::new(Rc::from(name), "signal"))
            .clone()
    }

    /// Returns the bus raised after every successful construction.
    #[must_use]
    pub fn created(&self) -> Emitter<Gadget> {
        self.inner.created.clone()
    }

    /// Returns the bus raised when a gadget is destroyed.
    #[must_use]
    pub fn destroyed(&self) -> Emitter<Gadget> {
        self.inner.destroyed.clone()
    }

    /// Registers a listener on the `created` bus.
    pub fn on_created<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&LifecycleEvent) + 'static,
    {
        self.inner.created.listen(callback)
    }

    /// Registers a listener on the `destroyed` bus.
    pub fn on_destroyed<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&LifecycleEvent) + 'static,
    {
        self.inner.destroyed.listen(callback)
    }

    /// Returns the number of constructed gadgets that are neither destroyed
    /// nor dropped.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.inner
            .tracked
            .borrow()
            .values()
            .filter(|weak| weak.is_alive())
            .count()
    }

    /// Returns the live gadget with `id`.
    #[must_use]
    pub fn find(&self, id: GadgetId) -> Option<Gadget> {
        self.inner.tracked.borrow().get(&id)?.upgrade()
    }

    /// Returns every live gadget, ordered by id.
    #[must_use]
    pub fn live(&self) -> Vec<Gadget> {
        let mut live: Vec<_> = self
            .inner
            .tracked
            .borrow()
            .values()
            .filter_map(WeakGadget::upgrade)
            .collect();
        live.sort_by_key(Gadget::id);
        live
    }

    /// Returns `true` if both handles refer to the same context.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn allocate_id(&self) -> GadgetId {
        let raw = self.inner.next_id.get();
        self.inner.next_id.set(raw + 1);
        GadgetId::new(raw)
    }

    /// Records a ready gadget.
    ///
    /// Gadgets dropped without being destroyed leave dead entries behind;
    /// they are swept once the table doubles past the live count of the
    /// previous sweep, so tracking stays amortized constant per gadget.
    pub(crate) fn track(&self, gadget: &Gadget) {
        let mut tracked = self.inner.tracked.borrow_mut();
        if tracked.len() >= self.inner.sweep_at.get() {
            tracked.retain(|_, weak| weak.is_alive());
            self.inner.sweep_at.set((tracked.len() * 2).max(SWEEP_FLOOR));
        }
        tracked.insert(gadget.id(), gadget.downgrade());
    }

    pub(crate) fn untrack(&self, id: GadgetId) {
        self.inner.tracked.borrow_mut().remove(&id);
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("classes", &self.class_names())
            .field("defaults", &self.inner.defaults.len())
            .field("singletons", &self.inner.singletons.borrow().len())
            .field("buses", &self.inner.buses.borrow().len())
            .field("live", &self.live_count())
            .finish_non_exhaustive()
    }
}

/// Restores the previously current context when dropped.
///
/// Returned by [`Context::install`].
#[must_use = "dropping this guard restores the previous context"]
pub struct ContextGuard {
    previous: Option<Context>,
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

impl fmt::Debug for ContextGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextGuard")
            .field("restores", &self.previous.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::ClassBuilder;
    use crate::props::Props;

    #[test]
    fn install_nests_and_restores() {
        let outer = Context::new();
        let inner = Context::new();
        {
            let _outer = Context::install(outer.clone());
            assert!(Context::current().ptr_eq(&outer));
            {
                let _inner = Context::install(inner.clone());
                assert!(Context::current().ptr_eq(&inner));
            }
            assert!(Context::current().ptr_eq(&outer));
        }
        assert!(!Context::current().ptr_eq(&outer));
    }

    #[test]
    fn current_is_stable_without_install() {
        assert!(Context::current().ptr_eq(&Context::current()));
        let replacement = Context::new();
        Context::make_current(replacement.clone());
        assert!(Context::with_current(|ctx| ctx.ptr_eq(&replacement)));
    }

    #[test]
    fn duplicate_class_registration_replaces() {
        let ctx = Context::new();
        let first = ClassBuilder::new("Thing").build();
        let second = ClassBuilder::new("Thing").build();
        assert!(ctx.register_class(first.clone()).is_none());
        assert_eq!(ctx.register_class(second.clone()), Some(first));
        assert_eq!(ctx.class("Thing"), Some(second));
        assert!(ctx.has_class("Thing"));
        assert_eq!(ctx.class_names(), [Rc::<str>::from("Thing")]);
        assert!(ctx.unregister_class("Thing").is_some());
        assert!(!ctx.has_class("Thing"));
    }

    #[test]
    fn singletons_and_world() {
        let ctx = Context::new();
        assert_eq!(ctx.register_singleton("score", 1), None);
        assert_eq!(ctx.register_singleton("score", 2), Some(Value::Int(1)));
        assert_eq!(ctx.singleton("score"), Some(Value::Int(2)));
        assert_eq!(ctx.remove_singleton("score"), Some(Value::Int(2)));

        let class = ClassBuilder::new("World").build();
        let a = class.construct_in(&ctx, &Props::new()).unwrap();
        let b = class.construct_in(&ctx, &Props::new()).unwrap();
        assert_eq!(ctx.set_world(a.clone()), None);
        assert_eq!(ctx.set_world(b.clone()), Some(a));
        assert_eq!(ctx.world(), Some(b));
    }

    #[test]
    fn named_buses_are_shared() {
        let ctx = Context::new();
        let hits = Rc::new(Cell::new(0));
        let count = hits.clone();
        ctx.bus("score").listen(move |e| {
            assert_eq!(&*e.actor, "score");
            count.set(count.get() + e.payload.as_int().unwrap_or(0));
        });
        ctx.bus("score").trigger(Value::Int(5));
        ctx.bus("other").trigger(Value::Int(100));
        assert_eq!(hits.get(), 5);
    }

    #[test]
    fn lifecycle_buses_and_tracking() {
        let ctx = Context::new();
        let created = Rc::new(Cell::new(0));
        let destroyed = Rc::new(Cell::new(0));
        let c = created.clone();
        ctx.on_created(move |_| c.set(c.get() + 1));
        let d = destroyed.clone();
        ctx.on_destroyed(move |_| d.set(d.get() + 1));

        let class = ClassBuilder::new("Tracked").build();
        let a = class.construct_in(&ctx, &Props::new()).unwrap();
        let b = class.construct_in(&ctx, &Props::new()).unwrap();
        assert_eq!(created.get(), 2);
        assert_eq!(ctx.live(), [a.clone(), b.clone()]);

        a.destroy();
        assert_eq!(destroyed.get(), 1);
        assert_eq!(ctx.live_count(), 1);
        drop(b);
        assert_eq!(ctx.live_count(), 0);
    }

    #[test]
    fn dropped_gadgets_are_swept_from_tracking() {
        let ctx = Context::new();
        let class = ClassBuilder::new("Transient").build();
        for _ in 0..5_000 {
            class.construct_in(&ctx, &Props::new()).unwrap();
        }
        assert!(ctx.inner.tracked.borrow().len() <= SWEEP_FLOOR);
        assert_eq!(ctx.live_count(), 0);

        // Keep every tenth gadget; the table stays within twice the live set.
        let kept: Vec<_> = (0..5_000)
            .filter_map(|i| {
                let g = class.construct_in(&ctx, &Props::new()).unwrap();
                (i % 10 == 0).then_some(g)
            })
            .collect();
        assert_eq!(ctx.live_count(), kept.len());
        assert!(ctx.inner.tracked.borrow().len() <= (kept.len() * 2).max(SWEEP_FLOOR));
        assert!(kept.iter().all(|g| ctx.find(g.id()).is_some()));
    }
}
