//! Dotted path expressions such as `a.b.0.c`, used by path watchers.

use super::value::Value;
use crate::error::ReactiveError;

/// A parsed dotted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Path {
    source: String,
    segments: Vec<String>,
}

impl Path {
    /// Parse a path. Segments may contain word characters and `$`; anything
    /// else, or an empty segment, is rejected.
    pub fn parse(source: &str) -> Result<Self, ReactiveError> {
        let valid = |segment: &str| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_alphanumeric() || c == '_' || c == '$')
        };

        let segments: Vec<String> = source.split('.').map(str::to_string).collect();
        if !segments.iter().all(|s| valid(s)) {
            return Err(ReactiveError::InvalidPath {
                path: source.to_string(),
            });
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Follow the path from `root` through the tracked accessors.
    ///
    /// Numeric segments index arrays. A missing step yields `Null`.
    pub fn resolve(&self, root: &Value) -> Value {
        let mut current = root.clone();
        for segment in &self.segments {
            let next = match &current {
                Value::Object(obj) => obj.get(segment),
                Value::Array(arr) => segment.parse::<usize>().ok().and_then(|i| arr.get(i)),
                _ => None,
            };
            match next {
                Some(value) => current = value,
                None => return Value::Null,
            }
        }
        current
    }
}
