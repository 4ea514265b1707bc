// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamically typed property values.
//!
//! This module provides [`Value`], the cell type stored by every property and
//! array slot, and [`Opaque`] for carrying arbitrary shared data through it.

use std::any::{Any, type_name};
use std::fmt;
use std::rc::Rc;

use crate::array::ReactiveArray;
use crate::error::GadgetError;
use crate::gadget::Gadget;

/// A property value.
///
/// Values are cheap to clone: strings, lists and nested objects are shared.
///
/// ## Equality
///
/// Two notions of equality exist:
///
/// - [`Value::same`] is *identity* equality, used to decide whether an
///   assignment is a no-op. Primitives (including strings) compare by value;
///   lists, gadgets, arrays and opaque values compare by reference.
/// - `==` additionally compares lists element by element. Gadgets, arrays and
///   opaque values still compare by reference.
///
/// # Example
///
/// ```rust
/// use understory_gadget::Value;
///
/// let a = Value::from(vec![Value::from(1), Value::from(2)]);
/// let b = Value::from(vec![Value::from(1), Value::from(2)]);
/// assert_eq!(a, b);
/// assert!(!a.same(&b));
/// assert!(a.same(&a.clone()));
/// assert!(Value::from("hi").same(&Value::from(String::from("hi"))));
/// ```
#[derive(Clone, Debug, Default)]
pub enum Value {
    /// Absent value.
    #[default]
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Shared string.
    Str(Rc<str>),
    /// Plain ordered sequence. Wrapped into a [`ReactiveArray`] when linked.
    List(Rc<[Value]>),
    /// Nested reactive object.
    Gadget(Gadget),
    /// Reactive ordered collection.
    Array(ReactiveArray),
    /// Arbitrary shared data.
    Opaque(Opaque),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    #[must_use]
    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Identity equality; see the type docs.
    #[must_use]
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Str(a), Self::Str(b)) => a == b,
            (Self::List(a), Self::List(b)) => Rc::ptr_eq(a, b),
            (Self::Gadget(a), Self::Gadget(b)) => a.ptr_eq(b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Opaque(a), Self::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Name of the variant, used in diagnostics.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Gadget(_) => "gadget",
            Self::Array(_) => "array",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Returns the nested gadget, if any.
    #[must_use]
    pub fn as_gadget(&self) -> Option<&Gadget> {
        match self {
            Self::Gadget(g) => Some(g),
            _ => None,
        }
    }

    /// Returns the reactive array, if any.
    #[must_use]
    pub fn as_array(&self) -> Option<&ReactiveArray> {
        match self {
            Self::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Returns the string contents, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer, if any.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns `true` if this value takes part in linking: gadgets, arrays,
    /// and lists (which become arrays).
    #[must_use]
    pub fn is_linkable(&self) -> bool {
        matches!(self, Self::Gadget(_) | Self::Array(_) | Self::List(_))
    }

    /// Wraps a plain [`Value::List`] into a fresh [`ReactiveArray`].
    ///
    /// Every other value is returned unchanged.
    #[must_use]
    pub fn into_reactive(self) -> Self {
        match self {
            Self::List(items) => Self::Array(ReactiveArray::from_values(items.iter().cloned())),
            other => other,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::List(a), Self::List(b)) => a == b,
            _ => self.same(other),
        }
    }
}

macro_rules! value_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Self::Int(i64::from(value))
                }
            }
        )*
    };
}

value_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Self::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Str(Rc::from(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Str(Rc::from(value))
    }
}

impl From<Rc<str>> for Value {
    fn from(value: Rc<str>) -> Self {
        Self::Str(value)
    }
}

impl From<Vec<Self>> for Value {
    fn from(value: Vec<Self>) -> Self {
        Self::List(Rc::from(value))
    }
}

impl From<Gadget> for Value {
    fn from(value: Gadget) -> Self {
        Self::Gadget(value)
    }
}

impl From<ReactiveArray> for Value {
    fn from(value: ReactiveArray) -> Self {
        Self::Array(value)
    }
}

impl From<Opaque> for Value {
    fn from(value: Opaque) -> Self {
        Self::Opaque(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

fn mismatch(expected: &'static str, found: &Value) -> GadgetError {
    GadgetError::TypeMismatch {
        expected,
        found: found.kind_name(),
    }
}

impl TryFrom<Value> for bool {
    type Error = GadgetError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Bool(b) => Ok(b),
            other => Err(mismatch("bool", &other)),
        }
    }
}

impl TryFrom<Value> for i64 {
    type Error = GadgetError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Int(n) => Ok(n),
            other => Err(mismatch("int", &other)),
        }
    }
}

impl TryFrom<Value> for f64 {
    type Error = GadgetError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Float(x) => Ok(x),
            Value::Int(n) => Ok(n as Self),
            other => Err(mismatch("float", &other)),
        }
    }
}

impl TryFrom<Value> for String {
    type Error = GadgetError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Str(s) => Ok(Self::from(&*s)),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl TryFrom<Value> for Rc<str> {
    type Error = GadgetError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Str(s) => Ok(s),
            other => Err(mismatch("string", &other)),
        }
    }
}

impl TryFrom<Value> for Gadget {
    type Error = GadgetError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Gadget(g) => Ok(g),
            other => Err(mismatch("gadget", &other)),
        }
    }
}

impl TryFrom<Value> for ReactiveArray {
    type Error = GadgetError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Array(a) => Ok(a),
            other => Err(mismatch("array", &other)),
        }
    }
}

impl TryFrom<Value> for Opaque {
    type Error = GadgetError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Opaque(o) => Ok(o),
            other => Err(mismatch("opaque", &other)),
        }
    }
}

/// Shared, type-erased data stored in a [`Value`].
///
/// Consumers use this for things the runtime does not interpret, such as
/// texture handles or callbacks. Equality is by reference.
///
/// # Example
///
/// ```rust
/// use understory_gadget::Opaque;
///
/// let value = Opaque::new(42_i32);
/// assert!(value.is::<i32>());
/// assert_eq!(value.downcast_ref::<i32>(), Some(&42));
/// assert_eq!(value.downcast_ref::<f64>(), None);
///
/// let shared = value.clone();
/// assert!(shared.ptr_eq(&value));
/// ```
#[derive(Clone)]
pub struct Opaque {
    inner: Rc<dyn Any>,
    type_name: &'static str,
}

impl Opaque {
    /// Wraps `value`.
    #[must_use]
    pub fn new<T: 'static>(value: T) -> Self {
        Self {
            inner: Rc::new(value),
            type_name: type_name::<T>(),
        }
    }

    /// Returns `true` if the contained value is a `T`.
    #[must_use]
    #[inline]
    pub fn is<T: 'static>(&self) -> bool {
        self.inner.is::<T>()
    }

    /// Attempts to borrow the contained value as a `T`.
    #[must_use]
    pub fn downcast_ref<T: 'static>(&self) -> Option<&T> {
        self.inner.downcast_ref()
    }

    /// Returns the type name recorded at construction.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if both handles share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opaque")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}
