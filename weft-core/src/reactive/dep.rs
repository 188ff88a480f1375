//! Dependency Implementation
//!
//! A Dep is the subscribable point behind one reactive property or one
//! observed container. It holds the ids of the watchers that read it and
//! notifies them when the value (or the container's shape) changes.
//!
//! # How Deps Work
//!
//! 1. When a property is read inside a watcher evaluation, the property's dep
//!    calls [`Dep::depend`], which asks the current watcher to record it.
//!
//! 2. The watcher deduplicates and, the first time it sees the dep, calls
//!    back into [`Dep::add_subscriber`].
//!
//! 3. When the property is written, [`Dep::notify`] snapshots the subscriber
//!    list and updates each live subscriber.
//!
//! Deps hold subscriber ids, never watchers, and watchers hold weak dep
//! handles. Neither side owns the other.

use std::cell::RefCell;
use std::fmt::Debug;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use super::context::ReactiveContext;
use super::runtime::Runtime;
use super::subscriber::SubscriberId;
use crate::config;
use crate::error::ReactiveError;

/// Unique identifier for a dep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepId(u64);

impl DepId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

struct DepInner {
    id: DepId,
    subscribers: RefCell<SmallVec<[SubscriberId; 4]>>,
}

/// A subscribable notification point.
#[derive(Clone)]
pub struct Dep {
    inner: Rc<DepInner>,
}

impl Dep {
    /// Create a dep with no subscribers.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(DepInner {
                id: DepId::next(),
                subscribers: RefCell::new(SmallVec::new()),
            }),
        }
    }

    /// Get the dep's unique ID.
    pub fn id(&self) -> DepId {
        self.inner.id
    }

    /// Append a subscriber. Deduplication is the watcher's job.
    pub fn add_subscriber(&self, id: SubscriberId) {
        self.inner.subscribers.borrow_mut().push(id);
    }

    /// Remove one occurrence of a subscriber.
    pub fn remove_subscriber(&self, id: SubscriberId) {
        let mut subscribers = self.inner.subscribers.borrow_mut();
        if let Some(pos) = subscribers.iter().position(|s| *s == id) {
            subscribers.remove(pos);
        }
    }

    /// Record this dep on the watcher currently evaluating, if any.
    pub fn depend(&self) {
        if let Some(watcher) = ReactiveContext::current() {
            watcher.add_dep(self);
        }
    }

    /// Notify every subscriber that the value behind this dep changed.
    ///
    /// Works on a snapshot, so subscribers may subscribe or unsubscribe while
    /// being notified. When flushing is synchronous the snapshot is sorted so
    /// watchers run in creation order; otherwise the scheduler orders them.
    pub fn notify(&self) -> Result<(), ReactiveError> {
        let mut snapshot = self.inner.subscribers.borrow().clone();
        if !config::config().async_flush {
            snapshot.sort_unstable();
        }

        tracing::trace!(dep = self.id().raw(), subscribers = snapshot.len(), "dep notify");

        for id in snapshot {
            if let Some(subscriber) = Runtime::lookup(id) {
                subscriber.update()?;
            }
        }
        Ok(())
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Check whether a subscriber is registered on this dep.
    pub fn has_subscriber(&self, id: SubscriberId) -> bool {
        self.inner.subscribers.borrow().contains(&id)
    }

    pub(crate) fn downgrade(&self) -> WeakDep {
        WeakDep(Rc::downgrade(&self.inner))
    }
}

impl Default for Dep {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for Dep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dep")
            .field("id", &self.id())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Non-owning dep handle held by watchers.
#[derive(Clone)]
pub(crate) struct WeakDep(Weak<DepInner>);

impl WeakDep {
    pub(crate) fn upgrade(&self) -> Option<Dep> {
        self.0.upgrade().map(|inner| Dep { inner })
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
