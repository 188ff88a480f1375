//! Reactive Core
//!
//! This module implements fine-grained dependency tracking over a dynamic
//! value model: observed objects and arrays, the deps behind their
//! properties, and the watchers that read them.
//!
//! # Concepts
//!
//! ## Deps
//!
//! A [`Dep`] is a subscribable point. Every property of an observed object
//! owns one, and every observed container owns one more for changes to its
//! shape (keys added or removed, any array mutation).
//!
//! ## Observation
//!
//! [`observe`] turns plain data into reactive data, recursively. Reads
//! through [`ReactiveObject::get`] and the [`ReactiveArray`] accessors are
//! tracked; writes through [`ReactiveObject::set`] and the array mutators
//! notify.
//!
//! ## Watchers
//!
//! A [`Watcher`] evaluates a getter while recording every dep it reads and
//! re-runs when one of them changes. Re-runs are batched per tick by the
//! [`scheduler`](crate::scheduler). A [`Computed`] value is a lazy watcher
//! that recomputes on read.
//!
//! # Implementation Notes
//!
//! Tracking uses a thread-local context stack: evaluating a watcher pushes
//! it, and a dep read while it is on top subscribes it. Deps store watcher
//! ids and resolve them through the thread-local [`Runtime`] registry, so no
//! strong reference cycle exists between deps and watchers.

mod array;
mod computed;
mod context;
mod dep;
mod object;
mod observer;
mod owner;
mod path;
mod runtime;
mod subscriber;
mod traverse;
mod value;
mod watcher;

pub use array::{ReactiveArray, MAX_INDEX};
pub use computed::Computed;
pub use context::{untracked, ReactiveContext};
pub use dep::{Dep, DepId};
pub use object::{AccessorGetter, AccessorSetter, ReactiveObject};
pub use observer::{
    delete, observe, observe_root, reactive, set, should_observe, toggle_observing,
    without_observing, Observer,
};
pub use owner::Owner;
pub use path::Path;
pub use runtime::Runtime;
pub use subscriber::{Subscriber, SubscriberId};
pub use traverse::traverse;
pub use value::{Key, Value};
pub use watcher::{watch, watch_path, EvalResult, WatchOptions, Watcher};

pub(crate) use watcher::WatcherInner;
