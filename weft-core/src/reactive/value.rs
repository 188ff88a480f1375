//! Value Model
//!
//! Everything the reactive store holds is a [`Value`]. Primitives are stored
//! inline; containers are shared handles, so two `Value`s can point at the
//! same object exactly like two references in a dynamic language would.
//!
//! Two notions of equality exist:
//!
//! - `PartialEq` compares primitives by value and containers by identity.
//!   `NaN != NaN`, as for any `f64`.
//! - [`Value::same`] is the write-suppression check. It is `PartialEq` except
//!   that two NaNs compare equal, so writing NaN over NaN is not a change.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::rc::Rc;

use super::array::ReactiveArray;
use super::object::ReactiveObject;
use super::observer::Observer;
use crate::error::ReactiveError;

/// A dynamically typed reactive value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(ReactiveArray),
    Object(ReactiveObject),
}

impl Value {
    /// Write-suppression equality: identity for containers, value for
    /// primitives, and NaN equal to NaN.
    pub fn same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            _ => self == other,
        }
    }

    /// True for arrays and objects.
    pub fn is_container(&self) -> bool {
        matches!(self, Value::Array(_) | Value::Object(_))
    }

    /// True for `Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The number, if this is one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// The boolean, if this is one.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string contents, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// The object handle, if this is an object.
    pub fn as_object(&self) -> Option<&ReactiveObject> {
        match self {
            Value::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// The array handle, if this is an array.
    pub fn as_array(&self) -> Option<&ReactiveArray> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// The observer attached to this value, if it is an observed container.
    pub fn observer(&self) -> Option<Rc<Observer>> {
        match self {
            Value::Object(obj) => obj.observer(),
            Value::Array(arr) => arr.observer(),
            _ => None,
        }
    }

    /// Short name of the variant, used in diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    /// Total order used by [`ReactiveArray::sort`]: by variant first, then by
    /// value. Containers of the same kind compare equal.
    pub fn total_cmp(&self, other: &Value) -> Ordering {
        fn rank(value: &Value) -> u8 {
            match value {
                Value::Null => 0,
                Value::Bool(_) => 1,
                Value::Number(_) => 2,
                Value::String(_) => 3,
                Value::Array(_) => 4,
                Value::Object(_) => 5,
            }
        }

        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => a.total_cmp(b),
            (Value::String(a), Value::String(b)) => a.cmp(b),
            _ => rank(self).cmp(&rank(other)),
        }
    }

    /// Snapshot the value as JSON without tracking any reads.
    ///
    /// NaN and infinities become `null`. Cyclic graphs are rejected.
    pub fn to_json(&self) -> Result<serde_json::Value, ReactiveError> {
        let mut visiting = HashSet::new();
        self.to_json_inner(&mut visiting)
    }

    fn to_json_inner(
        &self,
        visiting: &mut HashSet<usize>,
    ) -> Result<serde_json::Value, ReactiveError> {
        Ok(match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(arr) => {
                let addr = arr.addr();
                if !visiting.insert(addr) {
                    return Err(ReactiveError::Cyclic);
                }
                let items = arr
                    .to_vec_untracked()
                    .iter()
                    .map(|item| item.to_json_inner(visiting))
                    .collect::<Result<Vec<_>, _>>()?;
                visiting.remove(&addr);
                serde_json::Value::Array(items)
            }
            Value::Object(obj) => {
                let addr = obj.addr();
                if !visiting.insert(addr) {
                    return Err(ReactiveError::Cyclic);
                }
                let mut map = serde_json::Map::new();
                for (key, value) in obj.entries_untracked() {
                    map.insert(key, value.to_json_inner(visiting)?);
                }
                visiting.remove(&addr);
                serde_json::Value::Object(map)
            }
        })
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Number(n) => write!(f, "Number({n})"),
            Value::String(s) => write!(f, "String({s:?})"),
            Value::Array(arr) => arr.fmt(f),
            Value::Object(obj) => obj.fmt(f),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Number(n as f64)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ReactiveObject> for Value {
    fn from(obj: ReactiveObject) -> Self {
        Value::Object(obj)
    }
}

impl From<ReactiveArray> for Value {
    fn from(arr: ReactiveArray) -> Self {
        Value::Array(arr)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(ReactiveArray::from_vec(items))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Builds fresh, unobserved containers from JSON.
impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(ReactiveArray::from_vec(items.into_iter().map(Value::from).collect()))
            }
            serde_json::Value::Object(map) => Value::Object(ReactiveObject::from_pairs(
                map.into_iter().map(|(k, v)| (k, Value::from(v))),
            )),
        }
    }
}

/// A property key: a name on objects, an index on arrays.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Key {
    Name(String),
    Index(usize),
}

impl Key {
    /// The key as an array index, if it is one or parses as one.
    pub fn as_index(&self) -> Option<usize> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Name(name) => name.parse().ok(),
        }
    }

    /// The key as a property name.
    pub fn into_name(self) -> String {
        match self {
            Key::Name(name) => name,
            Key::Index(i) => i.to_string(),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Name(name) => f.write_str(name),
            Key::Index(i) => write!(f, "{i}"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}
