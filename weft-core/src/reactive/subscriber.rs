//! Subscriber types for the reactive system.
//!
//! A Subscriber is anything a [`Dep`](super::Dep) can notify. In practice
//! that is a watcher (render, computed or user watch), but the trait keeps the
//! dependency layer independent of the watcher implementation.

use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::ReactiveError;

/// Unique identifier for a subscriber.
///
/// Ids are handed out in creation order and never reused. The scheduler
/// flushes in ascending id order, so a parent created before its children
/// always updates first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Something that reacts when one of its dependencies changes.
pub trait Subscriber {
    /// Get the subscriber's unique ID.
    fn subscriber_id(&self) -> SubscriberId;

    /// React to a dependency change: mark dirty, run now, or enqueue.
    fn update(self: Rc<Self>) -> Result<(), ReactiveError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscriber_ids_are_unique() {
        let id1 = SubscriberId::new();
        let id2 = SubscriberId::new();
        let id3 = SubscriberId::new();

        assert_ne!(id1, id2);
        assert_ne!(id2, id3);
        assert_ne!(id1, id3);
    }

    #[test]
    fn subscriber_ids_increase() {
        let first = SubscriberId::new();
        let second = SubscriberId::new();
        assert!(first < second);
        assert!(first.raw() < second.raw());
    }
}
