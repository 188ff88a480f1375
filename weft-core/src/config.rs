//! Engine Configuration
//!
//! Configuration is thread-local, like the rest of the engine state. The
//! serializable part lives in [`Config`]; the error and warning handlers are
//! closures and are installed separately.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::error::ReactiveError;

/// Tunable engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Defer watcher re-runs to the next tick. When `false`, every queued
    /// watcher flushes immediately and dependencies notify in id order.
    pub async_flush: bool,

    /// How many times one watcher may re-queue itself within a single flush
    /// before the flush is abandoned.
    pub max_update_count: usize,

    /// Suppress the warning channel.
    pub silent: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            async_flush: true,
            max_update_count: 100,
            silent: false,
        }
    }
}

impl Config {
    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, ReactiveError> {
        Ok(serde_json::from_str(json)?)
    }
}

pub type ErrorHandler = Rc<dyn Fn(&ReactiveError, &str)>;
pub type WarnHandler = Rc<dyn Fn(&ReactiveError)>;

thread_local! {
    static CONFIG: RefCell<Config> = RefCell::new(Config::default());
    static ERROR_HANDLER: RefCell<Option<ErrorHandler>> = const { RefCell::new(None) };
    static WARN_HANDLER: RefCell<Option<WarnHandler>> = const { RefCell::new(None) };
}

/// Snapshot of the current configuration.
pub fn config() -> Config {
    CONFIG.with(|config| config.borrow().clone())
}

/// Replace the current configuration.
pub fn set_config(config: Config) {
    CONFIG.with(|current| *current.borrow_mut() = config);
}

/// Modify the current configuration in place.
pub fn update_config<F>(f: F)
where
    F: FnOnce(&mut Config),
{
    CONFIG.with(|config| f(&mut config.borrow_mut()));
}

/// Install the global handler for evaluation errors nobody captured.
pub fn set_error_handler<F>(handler: F)
where
    F: Fn(&ReactiveError, &str) + 'static,
{
    ERROR_HANDLER.with(|slot| *slot.borrow_mut() = Some(Rc::new(handler)));
}

/// Install a handler that receives every warning.
pub fn set_warn_handler<F>(handler: F)
where
    F: Fn(&ReactiveError) + 'static,
{
    WARN_HANDLER.with(|slot| *slot.borrow_mut() = Some(Rc::new(handler)));
}

/// Remove both handlers.
pub fn clear_handlers() {
    ERROR_HANDLER.with(|slot| slot.borrow_mut().take());
    WARN_HANDLER.with(|slot| slot.borrow_mut().take());
}

pub(crate) fn error_handler() -> Option<ErrorHandler> {
    ERROR_HANDLER.with(|slot| slot.borrow().clone())
}

pub(crate) fn warn_handler() -> Option<WarnHandler> {
    WARN_HANDLER.with(|slot| slot.borrow().clone())
}
