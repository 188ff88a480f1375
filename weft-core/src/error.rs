//! Errors and Diagnostics
//!
//! Two channels leave the engine:
//!
//! - The **warning channel** ([`warn`]) carries recoverable tracking problems:
//!   structural mutation on a primitive or on root data, writes to frozen
//!   containers, runaway update loops. The operation that triggered it is a
//!   no-op and also returns the error to its caller.
//!
//! - The **error channel** ([`handle_error`]) carries evaluation errors from
//!   user watchers. They are offered to the owner chain first, then to the
//!   global handler installed through [`crate::config::set_error_handler`],
//!   and are logged if nobody claims them.
//!
//! Evaluation errors from internal (render or computed) watchers never reach
//! either channel. They propagate to whoever asked for the evaluation.

use std::rc::Rc;

use thiserror::Error;

use crate::config;
use crate::reactive::{Owner, ReactiveContext, SubscriberId};

/// Errors produced by the reactive engine.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// Structural mutation was attempted on a null or primitive value.
    #[error("cannot {op} reactive property on null or primitive value: {target}")]
    NotAContainer { op: &'static str, target: String },

    /// A key was added to or removed from an owner's root data at runtime.
    #[error("cannot {op} key {key:?} on root data at runtime; declare it upfront")]
    RootData { op: &'static str, key: String },

    /// A frozen container was written to.
    #[error("cannot {op} key {key:?} on a frozen container")]
    Frozen { op: &'static str, key: String },

    /// A key of the wrong shape was used, e.g. a name on an array.
    #[error("invalid key {key:?} for {target}")]
    InvalidKey { key: String, target: &'static str },

    /// A watch expression was not a dot-delimited path.
    #[error("failed watching path {path:?}: only dot-delimited paths are accepted")]
    InvalidPath { path: String },

    /// A getter or callback returned an error.
    #[error("error in {info}: {source}")]
    Evaluation {
        info: String,
        #[source]
        source: EvalError,
    },

    /// A watcher kept re-triggering itself within one flush.
    #[error("possible infinite update loop in watcher {expression:?} (id {id:?}) after {limit} re-runs")]
    InfiniteUpdate {
        id: SubscriberId,
        expression: String,
        limit: usize,
    },

    /// A value graph contains a cycle and cannot be converted.
    #[error("cannot convert a cyclic value graph to JSON")]
    Cyclic,

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Error returned by user getters and callbacks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EvalError {
    message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<ReactiveError> for EvalError {
    fn from(err: ReactiveError) -> Self {
        Self::new(err.to_string())
    }
}

impl From<&str> for EvalError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for EvalError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

/// Emit a diagnostic on the warning channel.
pub fn warn(err: &ReactiveError) {
    if config::config().silent {
        return;
    }
    tracing::warn!(error = %err, "reactive warning");
    if let Some(handler) = config::warn_handler() {
        handler(err);
    }
}

/// Route an evaluation error through the owner chain and the global handler.
///
/// Tracking is suspended while handlers run so that reading reactive state in
/// a handler cannot subscribe the failing watcher to anything.
pub fn handle_error(err: &ReactiveError, owner: Option<Rc<dyn Owner>>, info: &str) {
    let _untracked = ReactiveContext::untracked();

    let mut current = owner;
    while let Some(owner) = current {
        if !owner.error_captured(err, info) {
            return;
        }
        current = owner.parent();
    }

    match config::error_handler() {
        Some(handler) => handler(err, info),
        None => tracing::error!(error = %err, info, "unhandled reactive error"),
    }
}
