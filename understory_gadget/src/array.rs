// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reactive arrays.

use std::cell::{OnceCell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use understory_emitter::{Emitter, Event, Listen, ListenerId};

use crate::change::{Change, Modified};
use crate::error::GadgetError;
use crate::hierarchy::{self, Node};
use crate::link::{self, Link, Relay};
use crate::value::Value;

/// Event delivered to [`ReactiveArray::on_modified`] listeners.
pub type ArrayEvent = Event<Modified, WeakArray>;

struct Item {
    value: Value,
    link: Option<Link>,
}

struct ArrayInner {
    items: RefCell<Vec<Item>>,
    modified: OnceCell<Emitter<Modified, WeakArray>>,
}

/// An ordered sequence of [`Value`]s that reports changes per index.
///
/// Gadgets and arrays stored in it are linked: their changes are re-raised
/// with the key `"<index>.<nested key>"`. Plain lists are wrapped into a new
/// `ReactiveArray` on insertion.
///
/// ## Notifications
///
/// Every mutation is applied as a whole and then compared slot by slot with
/// the previous contents. One event is raised per changed index, in
/// ascending order, after the change is committed:
///
/// - [`Change::Set`] with the new value for indices that now hold a
///   different value (by [`Value::same`]);
/// - [`Change::Deleted`] for indices past the new end, and for the slot
///   cleared by [`delete`](Self::delete).
///
/// # Example
///
/// ```rust
/// use std::cell::RefCell;
/// use std::rc::Rc;
/// use understory_gadget::{Change, ReactiveArray, Value};
///
/// let array = ReactiveArray::new();
/// let log = Rc::new(RefCell::new(Vec::new()));
/// let sink = log.clone();
/// array.on_modified(move |e| sink.borrow_mut().push(e.payload.clone()));
///
/// array.push("a").unwrap();
/// array.push("b").unwrap();
/// array.splice(0, 1, [Value::from("c")]).unwrap();
///
/// assert_eq!(array.to_vec(), [Value::from("c"), Value::from("b")]);
/// assert_eq!(log.borrow().len(), 3);
/// assert_eq!(log.borrow()[2].key, "0");
/// assert_eq!(log.borrow()[2].change, Change::Set(Value::from("c")));
/// ```
#[derive(Clone)]
pub struct ReactiveArray {
    inner: Rc<ArrayInner>,
}

impl Default for ReactiveArray {
    fn default() -> Self {
        Self::new()
    }
}

impl ReactiveArray {
    /// Most [`Value::Null`] slots [`set`](Self::set) inserts before `index`.
    pub const MAX_PADDING: usize = 1 << 16;

    /// Creates an empty array.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Rc::new(ArrayInner {
                items: RefCell::new(Vec::new()),
                modified: OnceCell::new(),
            }),
        }
    }

    /// Creates an array holding `values`, linking any gadgets and arrays.
    ///
    /// Nested plain lists are wrapped. A new array cannot be part of a link
    /// cycle, so this never fails.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Value>,
    {
        let array = Self::new();
        let items: Vec<Item> = values
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                let value = value.into_reactive();
                let link = array.link(index, &value);
                Item { value, link }
            })
            .collect();
        *array.inner.items.borrow_mut() = items;
        array
    }

    /// Returns the number of items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.items.borrow().len()
    }

    /// Returns `true` if there are no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.items.borrow().is_empty()
    }

    /// Returns the item at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<Value> {
        self.inner
            .items
            .borrow()
            .get(index)
            .map(|item| item.value.clone())
    }

    /// Returns a copy of the items.
    #[must_use]
    pub fn to_vec(&self) -> Vec<Value> {
        self.inner
            .items
            .borrow()
            .iter()
            .map(|item| item.value.clone())
            .collect()
    }

    /// Iterates over a snapshot of the items.
    pub fn iter(&self) -> std::vec::IntoIter<Value> {
        self.to_vec().into_iter()
    }

    /// Assigns `index`, padding with [`Value::Null`] when it is past the end.
    ///
    /// # Errors
    ///
    /// [`GadgetError::IndexOutOfRange`] if `index` lies more than
    /// [`MAX_PADDING`](Self::MAX_PADDING) slots past the end, or
    /// [`GadgetError::HierarchyCycle`] if linking would create a cycle.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<(), GadgetError> {
        let len = self.len();
        if index.saturating_sub(len) > Self::MAX_PADDING {
            return Err(GadgetError::IndexOutOfRange { index, len });
        }
        let [value] = self.admit(index, [value.into()])?;
        let mut next = self.to_vec();
        if index >= next.len() {
            next.resize(index + 1, Value::Null);
        }
        next[index] = value;
        self.commit(next, None);
        Ok(())
    }

    /// Clears `index` to [`Value::Null`] and raises a deletion event for it.
    ///
    /// Returns `false` if `index` is out of bounds.
    pub fn delete(&self, index: usize) -> bool {
        let mut next = self.to_vec();
        let Some(slot) = next.get_mut(index) else {
            return false;
        };
        *slot = Value::Null;
        self.commit(next, Some(index));
        true
    }

    /// Appends `value`.
    pub fn push(&self, value: impl Into<Value>) -> Result<(), GadgetError> {
        let index = self.len();
        let [value] = self.admit(index, [value.into()])?;
        let mut next = self.to_vec();
        next.push(value);
        self.commit(next, None);
        Ok(())
    }

    /// Removes and returns the last item.
    pub fn pop(&self) -> Option<Value> {
        let mut next = self.to_vec();
        let last = next.pop()?;
        self.commit(next, None);
        Some(last)
    }

    /// Removes and returns the first item.
    pub fn shift(&self) -> Option<Value> {
        self.remove(0)
    }

    /// Prepends `value`.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<(), GadgetError> {
        self.insert(0, value)
    }

    /// Inserts `value` at `index`, clamped to the length.
    pub fn insert(&self, index: usize, value: impl Into<Value>) -> Result<(), GadgetError> {
        let mut next = self.to_vec();
        let index = index.min(next.len());
        let [value] = self.admit(index, [value.into()])?;
        next.insert(index, value);
        self.commit(next, None);
        Ok(())
    }

    /// Removes and returns the item at `index`.
    pub fn remove(&self, index: usize) -> Option<Value> {
        let mut next = self.to_vec();
        if index >= next.len() {
            return None;
        }
        let removed = next.remove(index);
        self.commit(next, None);
        Some(removed)
    }

    /// Removes `delete_count` items starting at `start` and inserts `items`
    /// in their place, returning the removed items.
    ///
    /// `start` is clamped to the length and `delete_count` to the number of
    /// items after `start`.
    pub fn splice<I>(&self, start: usize, delete_count: usize, items: I) -> Result<Vec<Value>, GadgetError>
    where
        I: IntoIterator<Item = Value>,
    {
        let mut next = self.to_vec();
        let start = start.min(next.len());
        let end = start + delete_count.min(next.len() - start);
        let inserted = self.admit(start, items.into_iter().collect::<Vec<_>>())?;
        let removed = next.splice(start..end, inserted).collect();
        self.commit(next, None);
        Ok(removed)
    }

    /// Removes every item.
    pub fn clear(&self) {
        self.commit(Vec::new(), None);
    }

    /// Keeps only the items for which `keep` returns `true`.
    pub fn retain<F>(&self, keep: F)
    where
        F: FnMut(&Value) -> bool,
    {
        let mut next = self.to_vec();
        next.retain(keep);
        self.commit(next, None);
    }

    /// Registers a "modified" listener.
    pub fn on_modified<F>(&self, callback: F) -> ListenerId
    where
        F: Fn(&ArrayEvent) + 'static,
    {
        self.modified().listen(callback)
    }

    /// Registers a "modified" listener with options.
    pub fn on_modified_with(&self, listen: Listen<Modified, WeakArray>) -> ListenerId {
        self.modified().listen_with(listen)
    }

    /// Returns the "modified" emitter, creating it on first use.
    #[must_use]
    pub fn modified(&self) -> Emitter<Modified, WeakArray> {
        self.inner
            .modified
            .get_or_init(|| Emitter::new(self.downgrade(), "modified"))
            .clone()
    }

    /// Releases every link and destroys linked gadgets (recursively through
    /// nested arrays). The items themselves are kept.
    pub fn destroy_items(&self) {
        let children: Vec<(Link, Value)> = self
            .inner
            .items
            .borrow_mut()
            .iter_mut()
            .filter_map(|item| item.link.take().map(|link| (link, item.value.clone())))
            .collect();
        for (link, value) in children {
            link.release();
            match value {
                Value::Gadget(child) => child.destroy(),
                Value::Array(child) => child.destroy_items(),
                _ => {}
            }
        }
    }

    /// Returns a weak handle.
    #[must_use]
    pub fn downgrade(&self) -> WeakArray {
        WeakArray(Rc::downgrade(&self.inner))
    }

    /// Returns `true` if both handles refer to the same array.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.inner).cast::<()>() as usize
    }

    /// Values of the items that currently hold a link.
    pub(crate) fn linked_values(&self) -> Vec<Value> {
        self.inner
            .items
            .borrow()
            .iter()
            .filter(|item| item.link.is_some())
            .map(|item| item.value.clone())
            .collect()
    }

    pub(crate) fn emit_modified(&self, modified: Modified) {
        if let Some(emitter) = self.inner.modified.get().cloned() {
            emitter.trigger(modified);
        }
    }

    /// Wraps lists and rejects values that would close a link cycle.
    ///
    /// `first` is the index the first value will land at, used in errors.
    fn admit<C>(&self, first: usize, values: C) -> Result<C, GadgetError>
    where
        C: AsMut<[Value]>,
    {
        let mut values = values;
        let owner = Node::Array(self.clone());
        for (offset, value) in values.as_mut().iter_mut().enumerate() {
            hierarchy::check(&owner, &(first + offset).to_string(), value)?;
            *value = std::mem::take(value).into_reactive();
        }
        Ok(values)
    }

    fn link(&self, index: usize, value: &Value) -> Option<Link> {
        link::establish(value, Relay::Array(self.downgrade()), index.to_string().into())
    }

    /// Replaces the contents with `next`, relinking and notifying per changed
    /// slot. `deleted` forces a deletion event for that index.
    fn commit(&self, next: Vec<Value>, deleted: Option<usize>) {
        let (changed, released) = {
            let mut items = self.inner.items.borrow_mut();
            let old_len = items.len();
            let mut changed = Vec::new();
            let mut released = Vec::new();
            let mut previous = std::mem::take(&mut *items).into_iter();
            for (index, value) in next.into_iter().enumerate() {
                let old = previous.next();
                match old {
                    Some(old) if old.value.same(&value) && deleted != Some(index) => {
                        items.push(old);
                    }
                    old => {
                        released.extend(old.and_then(|item| item.link));
                        changed.push((index, Some(value.clone())));
                        items.push(Item { link: None, value });
                    }
                }
            }
            for (index, old) in (items.len()..old_len).zip(previous) {
                released.extend(old.link);
                changed.push((index, None));
            }
            (changed, released)
        };

        for link in released {
            link.release();
        }
        for (index, value) in &changed {
            if let Some(value) = value {
                let link = self.link(*index, value);
                if let Some(item) = self.inner.items.borrow_mut().get_mut(*index) {
                    item.link = link;
                }
            }
        }
        for (index, value) in changed {
            let change = match value {
                Some(_) if deleted == Some(index) => Change::Deleted,
                Some(value) => Change::Set(value),
                None => Change::Deleted,
            };
            self.emit_modified(Modified {
                key: index.to_string(),
                change,
            });
        }
    }
}

impl fmt::Debug for ReactiveArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.inner.items.borrow().iter().map(|item| &item.value)).finish()
    }
}

/// A non-owning [`ReactiveArray`] handle; the actor of array events.
#[derive(Clone, Default)]
pub struct WeakArray(Weak<ArrayInner>);

impl WeakArray {
    /// Returns the array if it is still alive.
    #[must_use]
    pub fn upgrade(&self) -> Option<ReactiveArray> {
        self.0.upgrade().map(|inner| ReactiveArray { inner })
    }
}

impl fmt::Debug for WeakArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.0.strong_count() > 0 { "alive" } else { "dropped" };
        write!(f, "WeakArray(<{state}>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Log = Rc<RefCell<Vec<Modified>>>;

    fn record(array: &ReactiveArray) -> Log {
        let log: Log = Rc::default();
        let sink = log.clone();
        array.on_modified(move |e| sink.borrow_mut().push(e.payload.clone()));
        log
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().copied().map(Value::from).collect()
    }

    #[test]
    fn pop_and_shift_report_trailing_deletion() {
        let array = ReactiveArray::from_values(ints(&[1, 2, 3]));
        let log = record(&array);

        assert_eq!(array.pop(), Some(Value::Int(3)));
        assert_eq!(*log.borrow(), [Modified::deleted("2")]);

        log.borrow_mut().clear();
        assert_eq!(array.shift(), Some(Value::Int(1)));
        assert_eq!(array.to_vec(), ints(&[2]));
        assert_eq!(*log.borrow(), [Modified::set("0", 2), Modified::deleted("1")]);
    }

    #[test]
    fn unshift_shifts_every_slot() {
        let array = ReactiveArray::from_values(ints(&[1, 2]));
        let log = record(&array);
        array.unshift(0).unwrap();
        assert_eq!(
            *log.borrow(),
            [Modified::set("0", 0), Modified::set("1", 1), Modified::set("2", 2)]
        );
    }

    #[test]
    fn set_pads_with_null() {
        let array = ReactiveArray::new();
        let log = record(&array);
        array.set(2, "x").unwrap();
        assert_eq!(array.to_vec(), [Value::Null, Value::Null, Value::from("x")]);
        assert_eq!(
            *log.borrow(),
            [Modified::set("0", Value::Null), Modified::set("1", Value::Null), Modified::set("2", "x")]
        );
    }

    #[test]
    fn set_far_past_the_end_is_rejected() {
        let array = ReactiveArray::from_values(ints(&[1]));
        let log = record(&array);
        assert_eq!(
            array.set(usize::MAX, 2),
            Err(GadgetError::IndexOutOfRange {
                index: usize::MAX,
                len: 1
            })
        );
        assert_eq!(
            array.set(ReactiveArray::MAX_PADDING + 2, 2),
            Err(GadgetError::IndexOutOfRange {
                index: ReactiveArray::MAX_PADDING + 2,
                len: 1
            })
        );
        assert_eq!(array.to_vec(), ints(&[1]));
        assert!(log.borrow().is_empty());

        array.set(ReactiveArray::MAX_PADDING + 1, 2).unwrap();
        assert_eq!(array.len(), ReactiveArray::MAX_PADDING + 2);
        assert_eq!(array.get(ReactiveArray::MAX_PADDING + 1), Some(Value::Int(2)));
    }

    #[test]
    fn same_value_is_silent() {
        let array = ReactiveArray::from_values(ints(&[1]));
        let log = record(&array);
        array.set(0, 1).unwrap();
        array.retain(|_| true);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn delete_marks_slot() {
        let array = ReactiveArray::from_values(ints(&[1, 2]));
        let log = record(&array);
        assert!(array.delete(0));
        assert!(!array.delete(5));
        assert_eq!(array.get(0), Some(Value::Null));
        assert_eq!(array.len(), 2);
        assert_eq!(*log.borrow(), [Modified::deleted("0")]);
    }

    #[test]
    fn splice_clamps() {
        let array = ReactiveArray::from_values(ints(&[1, 2, 3]));
        let removed = array.splice(1, 10, ints(&[9])).unwrap();
        assert_eq!(removed, ints(&[2, 3]));
        assert_eq!(array.to_vec(), ints(&[1, 9]));

        let removed = array.splice(10, 1, ints(&[4])).unwrap();
        assert!(removed.is_empty());
        assert_eq!(array.to_vec(), ints(&[1, 9, 4]));
    }

    #[test]
    fn nested_arrays_relay_with_index_paths() {
        let inner = ReactiveArray::from_values(ints(&[0]));
        let outer = ReactiveArray::new();
        outer.push(ints(&[7])).unwrap();
        outer.push(inner.clone()).unwrap();
        assert!(outer.get(0).is_some_and(|v| v.as_array().is_some()), "lists are wrapped");

        let log = record(&outer);
        inner.set(0, 5).unwrap();
        assert_eq!(*log.borrow(), [Modified::set("1.0", 5)]);

        // After a shift the nested array lives at index 0.
        outer.shift();
        log.borrow_mut().clear();
        inner.set(0, 6).unwrap();
        assert_eq!(*log.borrow(), [Modified::set("0.0", 6)]);
    }

    #[test]
    fn removed_children_stop_relaying() {
        let inner = ReactiveArray::new();
        let outer = ReactiveArray::from_values([Value::from(inner.clone())]);
        let log = record(&outer);
        outer.clear();
        log.borrow_mut().clear();
        inner.push(1).unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn self_insertion_is_a_cycle() {
        let array = ReactiveArray::new();
        assert_eq!(
            array.push(array.clone()),
            Err(GadgetError::HierarchyCycle { key: "0".into() })
        );
        assert!(array.is_empty());

        let child = ReactiveArray::new();
        array.push(child.clone()).unwrap();
        assert!(child.push(array.clone()).is_err());
        assert!(child.is_empty());
    }

    #[test]
    fn debug_lists_items() {
        let array = ReactiveArray::from_values(ints(&[1]));
        assert_eq!(format!("{array:?}"), "[Int(1)]");
        let weak = array.downgrade();
        assert_eq!(format!("{weak:?}"), "WeakArray(<alive>)");
        drop(array);
        assert!(weak.upgrade().is_none());
    }
}
