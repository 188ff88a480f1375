//! Observation
//!
//! Observing a container turns plain data into reactive data: the container
//! gets an [`Observer`] marker carrying its shape-change dep, every object
//! property gets its own dep, and nested containers are observed
//! recursively.
//!
//! Observation is idempotent. Observing an already observed container
//! returns its existing observer, and the marker is attached before the walk
//! so cyclic graphs terminate.

use std::cell::Cell;
use std::rc::Rc;

use super::array::ReactiveArray;
use super::dep::Dep;
use super::value::{Key, Value};
use crate::error::{self, ReactiveError};

/// Marker attached to every observed container.
#[derive(Debug)]
pub struct Observer {
    dep: Dep,
    root_count: Cell<u32>,
}

impl Observer {
    pub(crate) fn new() -> Self {
        Self {
            dep: Dep::new(),
            root_count: Cell::new(0),
        }
    }

    /// The container-level dep, notified on key add/remove and on any array
    /// mutation.
    pub fn dep(&self) -> &Dep {
        &self.dep
    }

    /// How many owners use this container as their root data.
    pub fn root_count(&self) -> u32 {
        self.root_count.get()
    }

    /// Root data cannot gain or lose keys at runtime.
    pub fn is_root(&self) -> bool {
        self.root_count.get() > 0
    }
}

thread_local! {
    static SHOULD_OBSERVE: Cell<bool> = const { Cell::new(true) };
}

/// Enable or disable observation of new values.
///
/// Useful when a value handed in from outside must be stored reactively
/// without converting its contents.
pub fn toggle_observing(enabled: bool) {
    SHOULD_OBSERVE.with(|flag| flag.set(enabled));
}

/// Whether new values are currently observed.
pub fn should_observe() -> bool {
    SHOULD_OBSERVE.with(Cell::get)
}

/// Run `f` with observation disabled, restoring the previous setting after.
pub fn without_observing<R, F>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ObservingGuard(should_observe());
    toggle_observing(false);
    f()
}

/// Restores the observation setting on drop, including during unwinding.
struct ObservingGuard(bool);

impl Drop for ObservingGuard {
    fn drop(&mut self) {
        toggle_observing(self.0);
    }
}

/// Observe a value, returning its observer.
///
/// Returns `None` for primitives, frozen or raw containers, and unobserved
/// containers while observation is toggled off.
pub fn observe(value: &Value) -> Option<Rc<Observer>> {
    match value {
        Value::Object(obj) => obj.observer().or_else(|| {
            (should_observe() && !obj.is_frozen() && !obj.is_raw()).then(|| obj.attach_observer())
        }),
        Value::Array(arr) => arr.observer().or_else(|| {
            (should_observe() && !arr.is_frozen() && !arr.is_raw()).then(|| arr.attach_observer())
        }),
        _ => None,
    }
}

/// Observe a value as an owner's root data.
pub fn observe_root(value: &Value) -> Option<Rc<Observer>> {
    let observer = observe(value)?;
    observer.root_count.set(observer.root_count.get() + 1);
    Some(observer)
}

/// Observe a value and hand it back.
pub fn reactive(value: impl Into<Value>) -> Value {
    let value = value.into();
    observe(&value);
    value
}

/// Set a key on a container, adding a reactive property if it is new.
///
/// Arrays take an index and go through the splice path. Objects reassign an
/// existing key or define a new reactive property and notify the container.
/// Returns the stored value.
pub fn set(
    target: &Value,
    key: impl Into<Key>,
    value: impl Into<Value>,
) -> Result<Value, ReactiveError> {
    let key = key.into();
    let value = value.into();
    match target {
        Value::Array(arr) => {
            let index = key.as_index().ok_or_else(|| ReactiveError::InvalidKey {
                key: key.to_string(),
                target: "array",
            })?;
            arr.set(index, value.clone())?;
            Ok(value)
        }
        Value::Object(obj) => {
            obj.set(key.into_name(), value.clone())?;
            Ok(value)
        }
        other => Err(not_a_container("set", other)),
    }
}

/// Delete a key from a container, notifying the container if it is observed.
pub fn delete(target: &Value, key: impl Into<Key>) -> Result<(), ReactiveError> {
    let key = key.into();
    match target {
        Value::Array(arr) => match key.as_index() {
            Some(index) if index < arr.len_untracked() => arr.remove(index).map(|_| ()),
            Some(_) => Ok(()),
            None => Err(ReactiveError::InvalidKey {
                key: key.to_string(),
                target: "array",
            }),
        },
        Value::Object(obj) => obj.remove(&key.into_name()).map(|_| ()),
        other => Err(not_a_container("delete", other)),
    }
}

fn not_a_container(op: &'static str, target: &Value) -> ReactiveError {
    let err = ReactiveError::NotAContainer {
        op,
        target: target.type_name().to_string(),
    };
    error::warn(&err);
    err
}

/// Depend on the observer of every element, recursively for nested arrays.
///
/// Array slots have no per-index dep, so a reader of an array piggybacks on
/// the element containers' shape deps.
pub(crate) fn depend_array(arr: &ReactiveArray) {
    for item in arr.to_vec_untracked() {
        if let Some(observer) = item.observer() {
            observer.dep().depend();
        }
        if let Value::Array(nested) = &item {
            depend_array(nested);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::reactive::ReactiveObject;
    use serde_json::json;
    use std::cell::RefCell;

    #[test]
    fn observe_is_idempotent() {
        let value = Value::from(json!({ "a": 1 }));
        let first = observe(&value).unwrap();
        let second = observe(&value).unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn observe_is_recursive() {
        let value = Value::from(json!({ "a": { "b": [ { "c": 1 } ] } }));
        observe(&value);

        let a = value.as_object().unwrap().get_untracked("a").unwrap();
        assert!(a.observer().is_some());
        let b = a.as_object().unwrap().get_untracked("b").unwrap();
        assert!(b.observer().is_some());
        let c_holder = b.as_array().unwrap().get_untracked(0).unwrap();
        assert!(c_holder.observer().is_some());
    }

    #[test]
    fn primitives_frozen_and_raw_are_not_observed() {
        assert!(observe(&Value::from(3)).is_none());

        let frozen = ReactiveObject::new();
        frozen.freeze();
        assert!(observe(&Value::from(frozen)).is_none());

        let raw = ReactiveObject::new();
        raw.mark_raw();
        assert!(observe(&Value::from(raw)).is_none());
    }

    #[test]
    fn cyclic_graph_terminates() {
        let obj = ReactiveObject::new();
        obj.set("me", obj.clone()).unwrap();
        assert!(observe(&Value::from(obj.clone())).is_some());
        assert!(obj.is_observed());
    }

    #[test]
    fn toggled_off_observation() {
        let value = Value::from(json!({ "a": 1 }));
        let observer = without_observing(|| observe(&value));
        assert!(observer.is_none());
        assert!(should_observe());
        assert!(observe(&value).is_some());
    }

    #[test]
    fn observation_restored_after_panic() {
        let result = std::panic::catch_unwind(|| {
            without_observing(|| panic!("setup failed"));
        });
        assert!(result.is_err());
        assert!(should_observe());
    }

    #[test]
    fn root_counting() {
        let value = Value::from(json!({}));
        let observer = observe_root(&value).unwrap();
        assert!(observer.is_root());
        observe_root(&value);
        assert_eq!(observer.root_count(), 2);
    }

    #[test]
    fn set_on_primitive_warns() {
        let warnings = Rc::new(RefCell::new(Vec::new()));
        let warnings_clone = warnings.clone();
        config::set_warn_handler(move |err| warnings_clone.borrow_mut().push(err.to_string()));

        let err = set(&Value::from(1), "a", 2).unwrap_err();
        assert!(matches!(err, ReactiveError::NotAContainer { op: "set", .. }));
        assert!(delete(&Value::Null, "a").is_err());
        assert_eq!(warnings.borrow().len(), 2);
        config::clear_handlers();
    }

    #[test]
    fn set_and_delete_on_root_are_refused() {
        let value = Value::from(json!({ "a": 1 }));
        observe_root(&value);

        assert!(matches!(
            set(&value, "b", 2),
            Err(ReactiveError::RootData { op: "add", .. })
        ));
        assert!(matches!(
            delete(&value, "a"),
            Err(ReactiveError::RootData { op: "delete", .. })
        ));

        // Existing keys can still be reassigned.
        set(&value, "a", 5).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.get_untracked("a"), Some(Value::from(5)));
        assert_eq!(obj.get_untracked("b"), None);
    }

    #[test]
    fn set_on_array_rejects_huge_index() {
        let value = reactive(json!([1]));
        assert!(matches!(set(&value, usize::MAX, 1), Err(ReactiveError::InvalidKey { .. })));
        assert!(matches!(set(&value, "1099511627776", 1), Err(ReactiveError::InvalidKey { .. })));
        assert_eq!(value.as_array().unwrap().len_untracked(), 1);
    }

    #[test]
    fn set_on_array_pads_with_null() {
        let value = reactive(ReactiveArray::from_vec(vec![Value::from(1)]));
        set(&value, 3, "x").unwrap();
        let arr = value.as_array().unwrap();
        assert_eq!(arr.len_untracked(), 4);
        assert_eq!(arr.get_untracked(2), Some(Value::Null));
        assert_eq!(arr.get_untracked(3), Some(Value::from("x")));
    }

    #[test]
    fn set_on_array_rejects_names() {
        let value = reactive(ReactiveArray::new());
        assert!(matches!(set(&value, "x", 1), Err(ReactiveError::InvalidKey { .. })));
    }

    #[test]
    fn delete_out_of_range_index_is_noop() {
        let value = reactive(ReactiveArray::from_vec(vec![Value::from(1)]));
        delete(&value, 5).unwrap();
        assert_eq!(value.as_array().unwrap().len_untracked(), 1);
    }
}
