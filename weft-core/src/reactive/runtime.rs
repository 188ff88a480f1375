//! Reactive Runtime
//!
//! The runtime is the registry that turns the subscriber handles stored in a
//! [`Dep`](super::Dep) back into live subscribers.
//!
//! # How It Works
//!
//! 1. When a watcher is created, it registers a weak reference to itself.
//!
//! 2. Deps only store [`SubscriberId`]s. When a dep notifies, it looks each id
//!    up here and skips ids whose subscriber has been dropped.
//!
//! 3. When a watcher is dropped, it unregisters itself.
//!
//! The registry is thread-local. Reactive values are `Rc`-based and never
//! cross threads, so a per-thread registry sees every subscriber its deps can
//! name.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use super::subscriber::{Subscriber, SubscriberId};

thread_local! {
    // Weak references, so the registry never keeps a watcher alive.
    static REGISTRY: RefCell<HashMap<SubscriberId, Weak<dyn Subscriber>>> =
        RefCell::new(HashMap::new());
}

/// The per-thread subscriber registry.
pub struct Runtime;

impl Runtime {
    /// Register a subscriber so deps can reach it by id.
    pub fn register(subscriber: &Rc<dyn Subscriber>) {
        let id = subscriber.subscriber_id();
        REGISTRY.with(|registry| {
            registry.borrow_mut().insert(id, Rc::downgrade(subscriber));
        });
    }

    /// Remove a subscriber from the registry.
    ///
    /// Safe to call during thread teardown, when the registry may already be
    /// gone.
    pub fn unregister(id: SubscriberId) {
        let _ = REGISTRY.try_with(|registry| {
            if let Ok(mut registry) = registry.try_borrow_mut() {
                registry.remove(&id);
            }
        });
    }

    /// Resolve an id to a live subscriber.
    pub fn lookup(id: SubscriberId) -> Option<Rc<dyn Subscriber>> {
        REGISTRY.with(|registry| registry.borrow().get(&id).and_then(Weak::upgrade))
    }

    /// Check whether an id is registered and still alive.
    pub fn is_registered(id: SubscriberId) -> bool {
        Self::lookup(id).is_some()
    }

    /// Number of registered subscribers, dead entries included.
    pub fn subscriber_count() -> usize {
        REGISTRY.with(|registry| registry.borrow().len())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::ReactiveError;
    use std::cell::Cell;

    pub(crate) struct MockSubscriber {
        pub(crate) id: SubscriberId,
        pub(crate) updates: Cell<usize>,
    }

    impl MockSubscriber {
        pub(crate) fn new() -> Rc<Self> {
            Rc::new(Self {
                id: SubscriberId::new(),
                updates: Cell::new(0),
            })
        }
    }

    impl Subscriber for MockSubscriber {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn update(self: Rc<Self>) -> Result<(), ReactiveError> {
            self.updates.set(self.updates.get() + 1);
            Ok(())
        }
    }

    #[test]
    fn runtime_registers_and_unregisters() {
        let mock = MockSubscriber::new();
        let id = mock.id;
        let subscriber: Rc<dyn Subscriber> = mock;

        Runtime::register(&subscriber);
        assert!(Runtime::is_registered(id));

        Runtime::unregister(id);
        assert!(!Runtime::is_registered(id));
    }

    #[test]
    fn dropped_subscriber_is_not_resolved() {
        let mock = MockSubscriber::new();
        let id = mock.id;
        let subscriber: Rc<dyn Subscriber> = mock;
        Runtime::register(&subscriber);

        drop(subscriber);
        assert!(Runtime::lookup(id).is_none());
        Runtime::unregister(id);
    }

    #[test]
    fn lookup_dispatches_update() {
        let mock = MockSubscriber::new();
        let subscriber: Rc<dyn Subscriber> = mock.clone();
        Runtime::register(&subscriber);

        let found = Runtime::lookup(mock.id).unwrap();
        found.update().unwrap();
        assert_eq!(mock.updates.get(), 1);
        Runtime::unregister(mock.id);
    }
}
