//! Computed Values
//!
//! A computed value is a lazy watcher plus a read protocol: re-evaluate if
//! dirty, then hand the watcher's deps to whoever is reading. A render
//! watcher that reads a computed value therefore depends on the same state
//! the computed value depends on, and re-runs when that state changes even
//! though the computed watcher itself only gets marked dirty.

use std::fmt::{self, Debug};

use super::context::ReactiveContext;
use super::object::ReactiveObject;
use super::value::Value;
use super::watcher::{EvalResult, WatchOptions, Watcher};
use crate::error::{handle_error, ReactiveError};

/// A memoized derived value.
#[derive(Clone)]
pub struct Computed {
    watcher: Watcher,
}

impl Computed {
    pub fn new<G>(getter: G) -> Self
    where
        G: Fn() -> EvalResult + 'static,
    {
        Self::with_options(getter, WatchOptions::new())
    }

    /// Create with watcher options, e.g. an owner or an expression label.
    /// The watcher is always lazy.
    pub fn with_options<G>(getter: G, options: WatchOptions) -> Self
    where
        G: Fn() -> EvalResult + 'static,
    {
        Self {
            watcher: Watcher::lazy(getter, options),
        }
    }

    /// Read the value, recomputing it first if a dependency changed.
    pub fn get(&self) -> Result<Value, ReactiveError> {
        if self.watcher.is_dirty() {
            self.watcher.evaluate()?;
        }
        if ReactiveContext::is_active() {
            self.watcher.depend();
        }
        Ok(self.watcher.value())
    }

    pub fn is_dirty(&self) -> bool {
        self.watcher.is_dirty()
    }

    /// The last computed value, without recomputing.
    pub fn cached_value(&self) -> Value {
        self.watcher.value()
    }

    pub fn watcher(&self) -> &Watcher {
        &self.watcher
    }
}

impl Debug for Computed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("dirty", &self.is_dirty())
            .field("value", &self.cached_value())
            .finish()
    }
}

impl ReactiveObject {
    /// Mount a computed value as a read-only property.
    ///
    /// Property reads cannot fail, so an evaluation error is reported through
    /// the error channel and the last good value is served.
    pub fn define_computed(&self, key: impl Into<String>, computed: &Computed) {
        let key = key.into();
        let info = format!("computed property \"{key}\"");
        let computed = computed.clone();
        self.define_getter(key, move || read_or_report(&computed, &info));
    }

    /// Mount a computed value as a property whose writes go to `setter`.
    pub fn define_computed_with_setter<S>(&self, key: impl Into<String>, computed: &Computed, setter: S)
    where
        S: Fn(Value) + 'static,
    {
        let key = key.into();
        let info = format!("computed property \"{key}\"");
        let computed = computed.clone();
        self.define_accessor(key, move || read_or_report(&computed, &info), setter);
    }
}

fn read_or_report(computed: &Computed, info: &str) -> Value {
    computed.get().unwrap_or_else(|err| {
        handle_error(&err, computed.watcher.inner().owner(), info);
        computed.cached_value()
    })
}
