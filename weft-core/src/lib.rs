//! Weft Core
//!
//! This crate provides a fine-grained reactive dependency-tracking engine.
//! It implements:
//!
//! - Observable objects and arrays over a dynamic [`Value`] model
//! - Automatic dependency collection for watchers and computed values
//! - A per-tick scheduler that batches, deduplicates and orders re-runs
//!
//! # Architecture
//!
//! - `reactive`: values, observation, deps, watchers and computed values
//! - `scheduler`: the watcher queue and the tick queue that drives it
//! - `config`: thread-local engine settings and diagnostic handlers
//! - `error`: error types and the warning and error channels
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//!
//! use serde_json::json;
//! use weft_core::reactive::{reactive, Value, WatchOptions, Watcher};
//! use weft_core::scheduler::run_pending_ticks;
//!
//! let state = reactive(json!({ "count": 1 }));
//! let seen = Rc::new(RefCell::new(Vec::new()));
//!
//! let s = state.clone();
//! let log = seen.clone();
//! let _watcher = Watcher::new(
//!     move || Ok(s.as_object().and_then(|o| o.get("count")).unwrap_or_default()),
//!     move |new, old| {
//!         log.borrow_mut().push((new.clone(), old.clone()));
//!         Ok(())
//!     },
//!     WatchOptions::new(),
//! )
//! .unwrap();
//!
//! let obj = state.as_object().unwrap();
//! obj.set("count", 2).unwrap();
//! obj.set("count", 3).unwrap();
//! run_pending_ticks();
//!
//! assert_eq!(seen.borrow().as_slice(), [(Value::from(3), Value::from(1))]);
//! ```

pub mod config;
pub mod error;
pub mod reactive;
pub mod scheduler;

pub use config::Config;
pub use error::{EvalError, ReactiveError};
pub use reactive::{Computed, ReactiveArray, ReactiveObject, Value, WatchOptions, Watcher};
