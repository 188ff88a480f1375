//! Reactive Objects
//!
//! A [`ReactiveObject`] is an ordered string-keyed map of properties. Until it
//! is observed it behaves like plain data. Once observed, every property owns
//! a [`Dep`]:
//!
//! - a read inside a watcher subscribes the watcher to the property's dep, to
//!   the value's own observer dep if the value is an observed container, and
//!   to every element's observer dep if the value is an array;
//! - a write that changes the value (see [`Value::same`]) observes the new
//!   value and notifies the property's dep;
//! - adding or removing a key notifies the object's observer dep.
//!
//! Adding keys goes through the same [`ReactiveObject::set`] as reassigning
//! them, so there is no separate "structural" path to forget about.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use indexmap::IndexMap;

use super::context::{untracked, ReactiveContext};
use super::dep::Dep;
use super::observer::{depend_array, observe, Observer};
use super::value::Value;
use crate::error::{self, ReactiveError};

pub type AccessorGetter = Rc<dyn Fn() -> Value>;
pub type AccessorSetter = Rc<dyn Fn(Value)>;

#[derive(Clone)]
enum Slot {
    Data(Value),
    Accessor {
        get: AccessorGetter,
        set: Option<AccessorSetter>,
    },
}

impl Slot {
    fn read(&self) -> Value {
        match self {
            Slot::Data(value) => value.clone(),
            Slot::Accessor { get, .. } => get(),
        }
    }
}

struct Property {
    slot: Slot,
    dep: Option<Dep>,
}

struct ObjectCell {
    props: RefCell<IndexMap<String, Property>>,
    observer: RefCell<Option<Rc<Observer>>>,
    frozen: Cell<bool>,
    raw: Cell<bool>,
}

/// A shared, string-keyed reactive container.
#[derive(Clone)]
pub struct ReactiveObject(Rc<ObjectCell>);

impl ReactiveObject {
    /// Create an empty, unobserved object.
    pub fn new() -> Self {
        Self(Rc::new(ObjectCell {
            props: RefCell::new(IndexMap::new()),
            observer: RefCell::new(None),
            frozen: Cell::new(false),
            raw: Cell::new(false),
        }))
    }

    /// Create an unobserved object from key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let obj = Self::new();
        {
            let mut props = obj.0.props.borrow_mut();
            for (key, value) in pairs {
                props.insert(
                    key.into(),
                    Property {
                        slot: Slot::Data(value.into()),
                        dep: None,
                    },
                );
            }
        }
        obj
    }

    /// Read a property, tracking it if a watcher is evaluating.
    ///
    /// Reading a missing key of an observed object subscribes to the object's
    /// shape, so the reader re-runs once the key is added.
    pub fn get(&self, key: &str) -> Option<Value> {
        let found = {
            let props = self.0.props.borrow();
            props.get(key).map(|prop| (prop.slot.clone(), prop.dep.clone()))
        };

        let Some((slot, dep)) = found else {
            self.track_shape();
            return None;
        };

        let value = slot.read();
        if let Some(dep) = dep {
            if ReactiveContext::is_active() {
                dep.depend();
                if let Some(observer) = value.observer() {
                    observer.dep().depend();
                    if let Value::Array(arr) = &value {
                        depend_array(arr);
                    }
                }
            }
        }
        Some(value)
    }

    /// Read a property without tracking.
    pub fn get_untracked(&self, key: &str) -> Option<Value> {
        untracked(|| {
            let slot = self.0.props.borrow().get(key).map(|prop| prop.slot.clone());
            slot.map(|slot| slot.read())
        })
    }

    /// Write a property.
    ///
    /// Existing keys are reassigned; the write is dropped when the new value
    /// is [`same`](Value::same) as the current one, and accessor properties
    /// without a setter ignore it. New keys are added as reactive properties
    /// when the object is observed, which notifies the object's shape dep.
    /// Adding keys to root data or writing to a frozen object is refused.
    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> Result<(), ReactiveError> {
        let key = key.into();
        let value = value.into();

        let existing = {
            let props = self.0.props.borrow();
            props.get(&key).map(|prop| (prop.slot.clone(), prop.dep.clone()))
        };
        let Some((slot, dep)) = existing else {
            return self.add_property(key, value);
        };

        if self.is_frozen() {
            return Err(refuse(ReactiveError::Frozen { op: "set", key }));
        }

        let current = untracked(|| slot.read());
        if value.same(&current) {
            return Ok(());
        }

        match &slot {
            Slot::Accessor { set: None, .. } => return Ok(()),
            Slot::Accessor { set: Some(setter), .. } => setter(value.clone()),
            Slot::Data(_) => {
                if let Some(prop) = self.0.props.borrow_mut().get_mut(&key) {
                    prop.slot = Slot::Data(value.clone());
                }
            }
        }

        if let Some(dep) = dep {
            observe(&value);
            dep.notify()?;
        }
        Ok(())
    }

    /// Remove a property, returning its value.
    ///
    /// Notifies the object's shape dep when the object is observed. Removing
    /// from root data or from a frozen object is refused.
    pub fn remove(&self, key: &str) -> Result<Option<Value>, ReactiveError> {
        if self.is_frozen() {
            return Err(refuse(ReactiveError::Frozen {
                op: "delete",
                key: key.to_string(),
            }));
        }

        let observer = self.observer();
        if observer.as_ref().is_some_and(|o| o.is_root()) {
            return Err(refuse(ReactiveError::RootData {
                op: "delete",
                key: key.to_string(),
            }));
        }

        let removed = self.0.props.borrow_mut().shift_remove(key);
        let Some(prop) = removed else {
            return Ok(None);
        };

        if let Some(observer) = observer {
            observer.dep().notify()?;
        }
        Ok(Some(match prop.slot {
            Slot::Data(value) => value,
            Slot::Accessor { .. } => Value::Null,
        }))
    }

    /// Define a read-only accessor property.
    pub fn define_getter<G>(&self, key: impl Into<String>, getter: G)
    where
        G: Fn() -> Value + 'static,
    {
        self.define_slot(
            key.into(),
            Slot::Accessor {
                get: Rc::new(getter),
                set: None,
            },
        );
    }

    /// Define an accessor property with a setter.
    pub fn define_accessor<G, S>(&self, key: impl Into<String>, getter: G, setter: S)
    where
        G: Fn() -> Value + 'static,
        S: Fn(Value) + 'static,
    {
        self.define_slot(
            key.into(),
            Slot::Accessor {
                get: Rc::new(getter),
                set: Some(Rc::new(setter)),
            },
        );
    }

    // Accessors track through their getter, so they get no dep of their own
    // unless the object is observed later.
    fn define_slot(&self, key: String, slot: Slot) {
        self.0
            .props
            .borrow_mut()
            .insert(key, Property { slot, dep: None });
    }

    /// Check for a key, tracking the object's shape.
    pub fn contains_key(&self, key: &str) -> bool {
        self.track_shape();
        self.0.props.borrow().contains_key(key)
    }

    /// Keys in insertion order, tracking the object's shape.
    pub fn keys(&self) -> Vec<String> {
        self.track_shape();
        self.keys_untracked()
    }

    /// Keys in insertion order.
    pub fn keys_untracked(&self) -> Vec<String> {
        self.0.props.borrow().keys().cloned().collect()
    }

    /// Key/value pairs read without tracking.
    pub fn entries_untracked(&self) -> Vec<(String, Value)> {
        let slots: Vec<(String, Slot)> = self
            .0
            .props
            .borrow()
            .iter()
            .map(|(key, prop)| (key.clone(), prop.slot.clone()))
            .collect();
        untracked(|| {
            slots
                .into_iter()
                .map(|(key, slot)| (key, slot.read()))
                .collect()
        })
    }

    /// Number of properties, tracking the object's shape.
    pub fn len(&self) -> usize {
        self.track_shape();
        self.0.props.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The dep behind one property, if the property is reactive.
    pub fn property_dep(&self, key: &str) -> Option<Dep> {
        self.0.props.borrow().get(key).and_then(|prop| prop.dep.clone())
    }

    /// Reject all future writes and never observe this object.
    pub fn freeze(&self) {
        self.0.frozen.set(true);
    }

    pub fn is_frozen(&self) -> bool {
        self.0.frozen.get()
    }

    /// Exclude this object from observation, e.g. an already-rendered
    /// artifact that must stay plain.
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

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &ReactiveObject) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    /// Attach an observer and convert every property.
    ///
    /// The marker goes on first so that a cycle back to this object finds it
    /// already observed.
    pub(crate) fn attach_observer(&self) -> Rc<Observer> {
        let observer = Rc::new(Observer::new());
        *self.0.observer.borrow_mut() = Some(observer.clone());

        let children: Vec<Value> = {
            let mut props = self.0.props.borrow_mut();
            props
                .values_mut()
                .filter_map(|prop| {
                    if prop.dep.is_none() {
                        prop.dep = Some(Dep::new());
                    }
                    match &prop.slot {
                        Slot::Data(value) => Some(value.clone()),
                        Slot::Accessor { .. } => None,
                    }
                })
                .collect()
        };

        for child in &children {
            observe(child);
        }
        observer
    }

    fn add_property(&self, key: String, value: Value) -> Result<(), ReactiveError> {
        if self.is_frozen() {
            return Err(refuse(ReactiveError::Frozen { op: "add", key }));
        }

        match self.observer() {
            Some(observer) if observer.is_root() => {
                Err(refuse(ReactiveError::RootData { op: "add", key }))
            }
            Some(observer) => {
                self.define_reactive(key, value);
                observer.dep().notify()
            }
            None => {
                self.0.props.borrow_mut().insert(
                    key,
                    Property {
                        slot: Slot::Data(value),
                        dep: None,
                    },
                );
                Ok(())
            }
        }
    }

    fn define_reactive(&self, key: String, value: Value) {
        self.0.props.borrow_mut().insert(
            key,
            Property {
                slot: Slot::Data(value.clone()),
                dep: Some(Dep::new()),
            },
        );
        observe(&value);
    }

    fn track_shape(&self) {
        if let Some(observer) = self.observer() {
            observer.dep().depend();
        }
    }
}

impl Default for ReactiveObject {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for ReactiveObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactiveObject")
            .field("keys", &self.keys_untracked())
            .field("observed", &self.is_observed())
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

fn refuse(err: ReactiveError) -> ReactiveError {
    error::warn(&err);
    err
}
