//! Deep traversal for `deep` watchers.
//!
//! Walking a value through the tracked accessors subscribes the current
//! watcher to every nested property and container it can reach.

use std::collections::HashSet;

use super::value::Value;

/// Touch every nested property of `value` so the current watcher depends on
/// all of them. Frozen and raw containers are not entered.
pub fn traverse(value: &Value) {
    let mut seen = HashSet::new();
    traverse_inner(value, &mut seen);
}

fn traverse_inner(value: &Value, seen: &mut HashSet<usize>) {
    match value {
        Value::Array(arr) => {
            if arr.is_frozen() || arr.is_raw() || !seen.insert(arr.addr()) {
                return;
            }
            for item in arr.to_vec() {
                traverse_inner(&item, seen);
            }
        }
        Value::Object(obj) => {
            if obj.is_frozen() || obj.is_raw() || !seen.insert(obj.addr()) {
                return;
            }
            for key in obj.keys() {
                if let Some(child) = obj.get(&key) {
                    traverse_inner(&child, seen);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{reactive, ReactiveContext, ReactiveObject, WatchOptions, Watcher};
    use serde_json::json;

    #[test]
    fn traverse_subscribes_to_nested_deps() {
        let state = reactive(json!({ "a": { "b": [ { "c": 1 } ] } }));
        let watcher = Watcher::lazy(|| Ok(Value::Null), WatchOptions::new());

        {
            let _ctx = ReactiveContext::enter(watcher.inner().clone());
            traverse(&state);
        }
        watcher.inner().cleanup_deps();

        let a = state.as_object().unwrap().get_untracked("a").unwrap();
        let b = a.as_object().unwrap().get_untracked("b").unwrap();
        let item = b.as_array().unwrap().get_untracked(0).unwrap();
        let c_dep = item.as_object().unwrap().property_dep("c").unwrap();
        assert!(c_dep.has_subscriber(watcher.id()));
        assert!(b.observer().unwrap().dep().has_subscriber(watcher.id()));
    }

    #[test]
    fn traverse_terminates_on_cycles() {
        let obj = ReactiveObject::new();
        obj.set("me", obj.clone()).unwrap();
        let value = reactive(obj);
        traverse(&value);
    }

    #[test]
    fn frozen_subtree_is_skipped() {
        let inner = ReactiveObject::from_pairs([("x", 1)]);
        inner.freeze();
        let outer = reactive(ReactiveObject::from_pairs([("inner", Value::from(inner.clone()))]));
        let watcher = Watcher::lazy(|| Ok(Value::Null), WatchOptions::new());

        {
            let _ctx = ReactiveContext::enter(watcher.inner().clone());
            traverse(&outer);
        }
        watcher.inner().cleanup_deps();
        assert!(inner.property_dep("x").is_none());
        assert_eq!(watcher.dependency_count(), 2);
    }
}
