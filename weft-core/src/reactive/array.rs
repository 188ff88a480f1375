//! Reactive Arrays
//!
//! Arrays have no per-slot deps. Every read through the tracked accessors
//! subscribes to the array's observer dep, and every mutation (including an
//! index write) notifies it. Values inserted by a mutation are observed
//! before the notification goes out.

use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::observer::{observe, Observer};
use super::value::Value;
use crate::error::{self, ReactiveError};

/// Highest writable index. Writes past the end pad with `Null`, so this also
/// bounds how far one write can grow an array.
pub const MAX_INDEX: usize = u32::MAX as usize - 1;

struct ArrayCell {
    items: RefCell<Vec<Value>>,
    observer: RefCell<Option<Rc<Observer>>>,
    frozen: Cell<bool>,
    raw: Cell<bool>,
}

/// A shared, index-addressed reactive container.
#[derive(Clone)]
pub struct ReactiveArray(Rc<ArrayCell>);

impl ReactiveArray {
    pub fn new() -> Self {
        Self::from_vec(Vec::new())
    }

    /// Wrap existing items in an unobserved array.
    pub fn from_vec(items: Vec<Value>) -> Self {
        Self(Rc::new(ArrayCell {
            items: RefCell::new(items),
            observer: RefCell::new(None),
            frozen: Cell::new(false),
            raw: Cell::new(false),
        }))
    }

    /// Read one element, tracking the array.
    pub fn get(&self, index: usize) -> Option<Value> {
        self.track();
        self.get_untracked(index)
    }

    pub fn get_untracked(&self, index: usize) -> Option<Value> {
        self.0.items.borrow().get(index).cloned()
    }

    /// Length, tracking the array.
    pub fn len(&self) -> usize {
        self.track();
        self.len_untracked()
    }

    pub fn len_untracked(&self) -> usize {
        self.0.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of all elements, tracking the array.
    pub fn to_vec(&self) -> Vec<Value> {
        self.track();
        self.to_vec_untracked()
    }

    pub fn to_vec_untracked(&self) -> Vec<Value> {
        self.0.items.borrow().clone()
    }

    /// Append an element and return the new length.
    pub fn push(&self, value: impl Into<Value>) -> Result<usize, ReactiveError> {
        let value = value.into();
        self.mutate("push", std::slice::from_ref(&value), |items| {
            items.push(value.clone());
            items.len()
        })
    }

    pub fn pop(&self) -> Result<Option<Value>, ReactiveError> {
        self.mutate("pop", &[], Vec::pop)
    }

    /// Remove the first element.
    pub fn shift(&self) -> Result<Option<Value>, ReactiveError> {
        self.mutate("shift", &[], |items| {
            if items.is_empty() {
                None
            } else {
                Some(items.remove(0))
            }
        })
    }

    /// Prepend an element and return the new length.
    pub fn unshift(&self, value: impl Into<Value>) -> Result<usize, ReactiveError> {
        let value = value.into();
        self.mutate("unshift", std::slice::from_ref(&value), |items| {
            items.insert(0, value.clone());
            items.len()
        })
    }

    /// Remove `delete_count` elements at `start` and insert `items` in their
    /// place. Both bounds are clamped to the array. Returns the removed
    /// elements.
    pub fn splice<I>(&self, start: usize, delete_count: usize, items: I) -> Result<Vec<Value>, ReactiveError>
    where
        I: IntoIterator<Item = Value>,
    {
        let inserted: Vec<Value> = items.into_iter().collect();
        self.mutate("splice", &inserted, |current| {
            let start = start.min(current.len());
            let end = start.saturating_add(delete_count).min(current.len());
            current.splice(start..end, inserted.iter().cloned()).collect()
        })
    }

    /// Sort with [`Value::total_cmp`].
    pub fn sort(&self) -> Result<(), ReactiveError> {
        self.sort_by(Value::total_cmp)
    }

    /// Sort with a comparator. The comparator runs against a copy, so it may
    /// read the array.
    pub fn sort_by<F>(&self, compare: F) -> Result<(), ReactiveError>
    where
        F: FnMut(&Value, &Value) -> Ordering,
    {
        let mut sorted = self.to_vec_untracked();
        sorted.sort_by(compare);
        self.mutate("sort", &[], |items| *items = sorted)
    }

    pub fn reverse(&self) -> Result<(), ReactiveError> {
        self.mutate("reverse", &[], |items| items.reverse())
    }

    /// Write one slot, padding with `Null` when `index` is past the end.
    ///
    /// Indexes above [`MAX_INDEX`] are rejected with `InvalidKey`.
    pub fn set(&self, index: usize, value: impl Into<Value>) -> Result<(), ReactiveError> {
        let len = match index.checked_add(1) {
            Some(len) if index <= MAX_INDEX => len,
            _ => {
                let err = ReactiveError::InvalidKey {
                    key: index.to_string(),
                    target: "array",
                };
                error::warn(&err);
                return Err(err);
            }
        };
        let value = value.into();
        self.mutate("set", std::slice::from_ref(&value), |items| {
            if index >= items.len() {
                items.resize(len, Value::Null);
            }
            items[index] = value.clone();
        })
    }

    /// Remove one slot, shifting later elements down.
    pub fn remove(&self, index: usize) -> Result<Option<Value>, ReactiveError> {
        self.splice(index, 1, std::iter::empty())
            .map(|removed| removed.into_iter().next())
    }

    pub fn freeze(&self) {
        self.0.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    pub fn mark_raw(&self) {
        self.0.raw.set(true);
    }

    pub fn is_raw(&self) -> bool {
        self.0.raw.get()
    }

    pub fn observer(&self) -> Option<Rc<Observer>> {
        self.0.observer.borrow().clone()
    }

    pub fn is_observed(&self) -> bool {
        self.0.observer.borrow().is_some()
    }

    pub fn ptr_eq(&self, other: &ReactiveArray) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    pub(crate) fn attach_observer(&self) -> Rc<Observer> {
        let observer = Rc::new(Observer::new());
        *self.0.observer.borrow_mut() = Some(observer.clone());
        for item in self.to_vec_untracked() {
            observe(&item);
        }
        observer
    }

    fn mutate<R, F>(&self, op: &'static str, inserted: &[Value], f: F) -> Result<R, ReactiveError>
    where
        F: FnOnce(&mut Vec<Value>) -> R,
    {
        if self.is_frozen() {
            let err = ReactiveError::Frozen {
                op,
                key: "length".to_string(),
            };
            error::warn(&err);
            return Err(err);
        }

        let result = f(&mut *self.0.items.borrow_mut());

        if let Some(observer) = self.observer() {
            for item in inserted {
                observe(item);
            }
            observer.dep().notify()?;
        }
        Ok(result)
    }

    fn track(&self) {
        if let Some(observer) = self.observer() {
            observer.dep().depend();
        }
    }
}

impl Default for ReactiveArray {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ReactiveArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveArray")
            .field("len", &self.len_untracked())
            .field("observed", &self.is_observed())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ReactiveObject;

    fn numbers(values: &[i32]) -> ReactiveArray {
        ReactiveArray::from_vec(values.iter().copied().map(Value::from).collect())
    }

    #[test]
    fn push_pop_shift_unshift() {
        let arr = numbers(&[1, 2]);
        assert_eq!(arr.push(3).unwrap(), 3);
        assert_eq!(arr.unshift(0).unwrap(), 4);
        assert_eq!(arr.pop().unwrap(), Some(Value::from(3)));
        assert_eq!(arr.shift().unwrap(), Some(Value::from(0)));
        assert_eq!(arr.to_vec_untracked(), vec![Value::from(1), Value::from(2)]);
    }

    #[test]
    fn splice_clamps_bounds() {
        let arr = numbers(&[1, 2, 3]);
        let removed = arr.splice(1, 10, vec![Value::from(9)]).unwrap();
        assert_eq!(removed, vec![Value::from(2), Value::from(3)]);
        assert_eq!(arr.to_vec_untracked(), vec![Value::from(1), Value::from(9)]);

        let removed = arr.splice(50, 1, vec![Value::from(7)]).unwrap();
        assert!(removed.is_empty());
        assert_eq!(arr.len_untracked(), 3);
    }

    #[test]
    fn sort_and_reverse() {
        let arr = numbers(&[3, 1, 2]);
        arr.sort().unwrap();
        assert_eq!(arr.to_vec_untracked(), vec![Value::from(1), Value::from(2), Value::from(3)]);
        arr.reverse().unwrap();
        assert_eq!(arr.get_untracked(0), Some(Value::from(3)));
    }

    #[test]
    fn inserted_items_are_observed() {
        let arr = ReactiveArray::new();
        observe(&Value::from(arr.clone()));

        let obj = ReactiveObject::new();
        arr.push(obj.clone()).unwrap();
        assert!(obj.is_observed());

        let other = ReactiveObject::new();
        arr.set(0, other.clone()).unwrap();
        assert!(other.is_observed());
    }

    #[test]
    fn mutations_notify_container_dep() {
        let arr = ReactiveArray::new();
        let observer = observe(&Value::from(arr.clone())).unwrap();
        assert_eq!(observer.dep().subscriber_count(), 0);
        // Notifying with no subscribers is fine.
        arr.push(1).unwrap();
        arr.remove(0).unwrap();
        assert!(arr.is_empty());
    }

    #[test]
    fn frozen_array_rejects_mutation() {
        let arr = numbers(&[1]);
        arr.freeze();
        assert!(matches!(arr.push(2), Err(ReactiveError::Frozen { op: "push", .. })));
        assert_eq!(arr.len_untracked(), 1);
    }

    #[test]
    fn index_past_limit_is_rejected() {
        let arr = numbers(&[1]);
        observe(&Value::from(arr.clone()));
        for index in [usize::MAX, MAX_INDEX + 1] {
            assert!(matches!(arr.set(index, 2), Err(ReactiveError::InvalidKey { target: "array", .. })));
        }
        assert_eq!(arr.to_vec_untracked(), vec![Value::from(1)]);

        arr.set(3, 4).unwrap();
        assert_eq!(arr.len_untracked(), 4);
        assert_eq!(arr.get_untracked(2), Some(Value::Null));
    }

    #[test]
    fn remove_out_of_range_returns_none() {
        let arr = numbers(&[1]);
        assert_eq!(arr.remove(4).unwrap(), None);
        assert_eq!(arr.len_untracked(), 1);
    }
}
