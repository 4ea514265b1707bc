// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Gadget classes: a name, a schema and construction hooks.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use crate::context::Context;
use crate::error::GadgetError;
use crate::gadget::Gadget;
use crate::property::PropertyEntry;
use crate::props::Props;
use crate::schema::Schema;

/// Runs before any property is resolved.
pub type PreConstruct = Rc<dyn Fn(&Gadget, &Props)>;

/// Runs after every property is resolved; an `Err` aborts construction.
pub type PostConstruct = Rc<dyn Fn(&Gadget, &Props) -> Result<(), GadgetError>>;

struct ClassInner {
    name: Rc<str>,
    parent: Option<Class>,
    schema: RefCell<Schema>,
    pre_construct: Option<PreConstruct>,
    post_construct: Option<PostConstruct>,
}

/// A gadget class.
///
/// `Class` is a cheap handle. Its schema can still be edited after it is
/// built with [`declare`](Self::declare) and [`clear`](Self::clear); those
/// edits affect gadgets constructed afterwards, and never subclasses that
/// were already built (they hold a snapshot).
///
/// # Example
///
/// ```rust
/// use understory_gadget::{ClassBuilder, Context, PropertyBuilder, Props, Value};
///
/// let ctx = Context::new();
/// let base = ClassBuilder::new("Base")
///     .property(PropertyBuilder::new("k").default(1).build())
///     .build();
/// let sub = base
///     .extend("Sub")
///     .property(PropertyBuilder::new("k").default(2).build())
///     .build();
///
/// // Later edits to the base stay local to it.
/// base.declare(PropertyBuilder::new("k").default(3).build());
///
/// let g = sub.construct_in(&ctx, &Props::new()).unwrap();
/// assert_eq!(g.get("k"), Some(Value::Int(2)));
/// assert!(sub.is_a(&base));
/// ```
#[derive(Clone)]
pub struct Class {
    inner: Rc<ClassInner>,
}

impl Class {
    /// Returns the class name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the class this one extends.
    #[must_use]
    pub fn parent(&self) -> Option<&Self> {
        self.inner.parent.as_ref()
    }

    /// Iterates from this class up through its ancestors, most specific first.
    pub fn ancestors(&self) -> impl Iterator<Item = &Self> {
        std::iter::successors(Some(self), |class| class.parent())
    }

    /// Returns `true` if `other` is this class or one of its ancestors.
    #[must_use]
    pub fn is_a(&self, other: &Self) -> bool {
        self.ancestors().any(|class| class.ptr_eq(other))
    }

    /// Starts a subclass of this class.
    #[must_use]
    pub fn extend(&self, name: impl Into<Rc<str>>) -> ClassBuilder {
        ClassBuilder::new(name).extends(self)
    }

    /// Declares or overrides a property on this class only.
    pub fn declare(&self, entry: PropertyEntry) -> Option<Rc<PropertyEntry>> {
        self.inner.schema.borrow_mut().declare(entry)
    }

    /// Removes a property from this class only.
    pub fn clear(&self, key: &str) -> Option<Rc<PropertyEntry>> {
        self.inner.schema.borrow_mut().clear(key)
    }

    /// Returns a copy of the current schema.
    #[must_use]
    pub fn schema(&self) -> Schema {
        self.inner.schema.borrow().clone()
    }

    /// Returns the entries in enumeration order.
    #[must_use]
    pub fn entries(&self) -> Vec<Rc<PropertyEntry>> {
        self.inner.schema.borrow().entries().cloned().collect()
    }

    /// Returns the entry for `key`.
    #[must_use]
    pub fn entry(&self, key: &str) -> Option<Rc<PropertyEntry>> {
        self.inner.schema.borrow().get(key).cloned()
    }

    /// Returns `true` if `key` is declared.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.inner.schema.borrow().contains(key)
    }

    /// Constructs an instance in the current thread's [`Context`].
    pub fn construct(&self, props: &Props) -> Result<Gadget, GadgetError> {
        self.construct_in(&Context::current(), props)
    }

    /// Constructs an instance in `ctx`.
    pub fn construct_in(&self, ctx: &Context, props: &Props) -> Result<Gadget, GadgetError> {
        Gadget::construct(self, ctx, props)
    }

    /// Returns `true` if both handles refer to the same class.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn pre_construct(&self) -> Option<&PreConstruct> {
        self.inner.pre_construct.as_ref()
    }

    pub(crate) fn post_construct(&self) -> Option<&PostConstruct> {
        self.inner.post_construct.as_ref()
    }
}

impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Class {}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("name", &self.inner.name)
            .field("parent", &self.parent().map(Self::name))
            .field("properties", &self.inner.schema.borrow().len())
            .finish()
    }
}

enum Edit {
    Declare(PropertyEntry),
    Remove(Rc<str>),
}

/// Builder for [`Class`].
///
/// Edits are applied in call order on top of the parent's schema snapshot,
/// which is taken when [`build`](Self::build) runs. Construction hooks not
/// set on the builder are inherited from the parent.
pub struct ClassBuilder {
    name: Rc<str>,
    parent: Option<Class>,
    edits: Vec<Edit>,
    pre_construct: Option<PreConstruct>,
    post_construct: Option<PostConstruct>,
}

impl ClassBuilder {
    /// Starts a root class named `name`.
    #[must_use]
    pub fn new(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            edits: Vec::new(),
            pre_construct: None,
            post_construct: None,
        }
    }

    /// Inherits from `parent`.
    #[must_use]
    pub fn extends(mut self, parent: &Class) -> Self {
        self.parent = Some(parent.clone());
        self
    }

    /// Declares or overrides a property.
    #[must_use]
    pub fn property(mut self, entry: PropertyEntry) -> Self {
        self.edits.push(Edit::Declare(entry));
        self
    }

    /// Removes an inherited (or previously declared) property.
    #[must_use]
    pub fn remove(mut self, key: impl Into<Rc<str>>) -> Self {
        self.edits.push(Edit::Remove(key.into()));
        self
    }

    /// Sets the hook run before properties are resolved.
    #[must_use]
    pub fn pre_construct<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Gadget, &Props) + 'static,
    {
        self.pre_construct = Some(Rc::new(hook));
        self
    }

    /// Sets the hook run after properties are resolved.
    #[must_use]
    pub fn post_construct<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Gadget, &Props) -> Result<(), GadgetError> + 'static,
    {
        self.post_construct = Some(Rc::new(hook));
        self
    }

    /// Builds the [`Class`].
    #[must_use]
    pub fn build(self) -> Class {
        let mut schema = self.parent.as_ref().map(Class::schema).unwrap_or_default();
        for edit in self.edits {
            match edit {
                Edit::Declare(entry) => {
                    schema.declare(entry);
                }
                Edit::Remove(key) => {
                    schema.clear(&key);
                }
            }
        }
        let inherited = self.parent.as_ref();
        let pre_construct = self
            .pre_construct
            .or_else(|| inherited.and_then(|p| p.pre_construct().cloned()));
        let post_construct = self
            .post_construct
            .or_else(|| inherited.and_then(|p| p.post_construct().cloned()));
        Class {
            inner: Rc::new(ClassInner {
                name: self.name,
                parent: self.parent,
                schema: RefCell::new(schema),
                pre_construct,
                post_construct,
            }),
        }
    }
}

impl fmt::Debug for ClassBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("name", &self.name)
            .field("parent", &self.parent.as_ref().map(Class::name))
            .field("edits", &self.edits.len())
            .finish_non_exhaustive()
    }
}
