//! The component-like collaborator that owns watchers.
//!
//! The engine only needs a handful of lifecycle queries and hooks from an
//! owner. All of them have defaults, so an owner that only wants error
//! capture implements one method.

use std::rc::Rc;

use crate::error::ReactiveError;

pub trait Owner {
    /// Whether the owner has been mounted. `updated` hooks only fire for
    /// mounted owners.
    fn is_mounted(&self) -> bool {
        true
    }

    fn is_destroyed(&self) -> bool {
        false
    }

    /// Called after a flush that re-ran this owner's render watcher.
    fn updated(&self) {}

    /// Called after a flush for owners passed to
    /// [`queue_activated`](crate::scheduler::queue_activated).
    fn activated(&self) {}

    /// The next owner up the error-propagation chain.
    fn parent(&self) -> Option<Rc<dyn Owner>> {
        None
    }

    /// Inspect an error raised under this owner. Return `false` to stop it
    /// from propagating further.
    fn error_captured(&self, _err: &ReactiveError, _info: &str) -> bool {
        true
    }
}
