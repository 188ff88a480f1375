//! Reactive Context
//!
//! The reactive context tracks which watcher is currently evaluating.
//! This enables automatic dependency tracking: when a reactive property is
//! read, the current watcher is recorded as a subscriber of its dep.
//!
//! # Implementation
//!
//! We use a thread-local stack of frames. Evaluating a watcher pushes a frame
//! holding the watcher; [`ReactiveContext::untracked`] pushes an empty frame
//! that suspends tracking. Both return a guard that pops the frame on drop,
//! so the stack stays balanced even if an evaluation panics.
//!
//! Only the top frame matters: a computed value evaluated inside a render
//! watcher tracks into the computed watcher, and the render watcher then
//! inherits those deps through [`Watcher::depend`](super::Watcher::depend).

use std::cell::RefCell;
use std::rc::Rc;

use super::subscriber::SubscriberId;
use super::watcher::WatcherInner;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Option<Rc<WatcherInner>>>> = const { RefCell::new(Vec::new()) };
}

/// Guard that pops the context when dropped.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
}

impl ReactiveContext {
    /// Enter a tracking frame for the given watcher.
    pub(crate) fn enter(watcher: Rc<WatcherInner>) -> Self {
        let subscriber_id = Some(watcher.id());
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(Some(watcher)));
        Self { subscriber_id }
    }

    /// Enter a frame in which reads are not tracked.
    pub fn untracked() -> Self {
        CONTEXT_STACK.with(|stack| stack.borrow_mut().push(None));
        Self {
            subscriber_id: None,
        }
    }

    /// Check if a watcher is currently collecting dependencies.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| matches!(stack.borrow().last(), Some(Some(_))))
    }

    /// Get the id of the watcher currently collecting dependencies, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        Self::current().map(|watcher| watcher.id())
    }

    /// Depth of the stack, untracked frames included.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }

    pub(crate) fn current() -> Option<Rc<WatcherInner>> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().cloned().flatten())
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        let _ = CONTEXT_STACK.try_with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(frame) = popped {
                debug_assert_eq!(
                    frame.as_ref().map(|watcher| watcher.id()),
                    self.subscriber_id,
                    "ReactiveContext mismatch"
                );
            }
        });
    }
}

/// Run `f` with dependency tracking suspended.
pub fn untracked<R, F>(f: F) -> R
where
    F: FnOnce() -> R,
{
    let _ctx = ReactiveContext::untracked();
    f()
}
