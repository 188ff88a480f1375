//! Watcher Implementation
//!
//! A watcher evaluates a getter while recording every dep it reads, then
//! reacts when any of those deps notifies. The same type backs three roles:
//!
//! - **render watchers** re-run an owner's render function, eagerly, through
//!   the scheduler;
//! - **computed watchers** are `lazy`: a notification only marks them dirty
//!   and the value is recomputed on the next read (see
//!   [`Computed`](super::Computed));
//! - **user watchers** call a callback with the new and old value. Errors in
//!   their getter or callback are reported, never propagated.
//!
//! # Dependency bookkeeping
//!
//! Each evaluation collects a fresh dep set in `new_deps`. Afterwards the
//! watcher unsubscribes from every dep it did not read this time and the
//! fresh set becomes the live one. A dep is subscribed to at most once no
//! matter how often it is read.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::{Rc, Weak};

use indexmap::IndexMap;

use super::context::{untracked, ReactiveContext};
use super::dep::{Dep, DepId, WeakDep};
use super::owner::Owner;
use super::path::Path;
use super::runtime::Runtime;
use super::subscriber::{Subscriber, SubscriberId};
use super::traverse::traverse;
use super::value::Value;
use crate::error::{self, handle_error, EvalError, ReactiveError};
use crate::scheduler;

/// Result of a getter.
pub type EvalResult = Result<Value, EvalError>;

type Getter = Rc<dyn Fn() -> EvalResult>;
type Callback = Rc<dyn Fn(&Value, &Value) -> Result<(), EvalError>>;
type BeforeHook = Rc<dyn Fn()>;

/// Options for creating a [`Watcher`].
#[derive(Clone, Default)]
pub struct WatchOptions {
    deep: bool,
    user: bool,
    lazy: bool,
    sync: bool,
    render: bool,
    immediate: bool,
    before: Option<BeforeHook>,
    owner: Option<Weak<dyn Owner>>,
    expression: Option<String>,
}

impl WatchOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Depend on everything nested inside the value, not just the value.
    pub fn deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }

    /// Report getter and callback errors instead of returning them.
    pub fn user(mut self, user: bool) -> Self {
        self.user = user;
        self
    }

    /// Evaluate on demand only.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Re-run immediately on notification instead of queueing.
    pub fn sync(mut self, sync: bool) -> Self {
        self.sync = sync;
        self
    }

    /// Mark this as the owner's render watcher, which triggers its
    /// `updated` hook after a flush.
    pub fn render(mut self, render: bool) -> Self {
        self.render = render;
        self
    }

    /// For [`watch`]: invoke the callback once on creation.
    pub fn immediate(mut self, immediate: bool) -> Self {
        self.immediate = immediate;
        self
    }

    /// Hook run by the scheduler right before each queued re-run.
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn() + 'static,
    {
        self.before = Some(Rc::new(hook));
        self
    }

    pub fn owner(mut self, owner: &Rc<dyn Owner>) -> Self {
        self.owner = Some(Rc::downgrade(owner));
        self
    }

    /// Label used in diagnostics.
    pub fn expression(mut self, expression: impl Into<String>) -> Self {
        self.expression = Some(expression.into());
        self
    }
}

impl Debug for WatchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchOptions")
            .field("deep", &self.deep)
            .field("user", &self.user)
            .field("lazy", &self.lazy)
            .field("sync", &self.sync)
            .field("render", &self.render)
            .field("immediate", &self.immediate)
            .field("expression", &self.expression)
            .finish_non_exhaustive()
    }
}

pub(crate) struct WatcherInner {
    id: SubscriberId,
    expression: String,
    getter: Getter,
    callback: Callback,
    value: RefCell<Value>,
    deep: bool,
    user: bool,
    lazy: bool,
    sync: bool,
    render: bool,
    before: Option<BeforeHook>,
    owner: Option<Weak<dyn Owner>>,
    dirty: Cell<bool>,
    active: Cell<bool>,
    deps: RefCell<IndexMap<DepId, WeakDep>>,
    new_deps: RefCell<IndexMap<DepId, WeakDep>>,
}

impl WatcherInner {
    pub(crate) fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn expression(&self) -> &str {
        &self.expression
    }

    pub(crate) fn before(&self) -> Option<BeforeHook> {
        self.before.clone()
    }

    pub(crate) fn owner(&self) -> Option<Rc<dyn Owner>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn is_render(&self) -> bool {
        self.render
    }

    /// Evaluate the getter and re-collect dependencies.
    ///
    /// `Ok(None)` means a user getter failed and the error was already
    /// reported; the previous value stands.
    pub(crate) fn get(self: &Rc<Self>) -> Result<Option<Value>, ReactiveError> {
        let result = {
            let _ctx = ReactiveContext::enter(self.clone());
            let result = (self.getter)();
            if self.deep {
                if let Ok(value) = &result {
                    traverse(value);
                }
            }
            result
        };
        self.cleanup_deps();

        match result {
            Ok(value) => Ok(Some(value)),
            Err(source) => {
                let info = format!("getter for watcher \"{}\"", self.expression);
                let err = ReactiveError::Evaluation {
                    info: info.clone(),
                    source,
                };
                if self.user {
                    handle_error(&err, self.owner(), &info);
                    Ok(None)
                } else {
                    Err(err)
                }
            }
        }
    }

    /// Record a dep read during the current evaluation.
    pub(crate) fn add_dep(&self, dep: &Dep) {
        let id = dep.id();
        if self.new_deps.borrow().contains_key(&id) {
            return;
        }
        self.new_deps.borrow_mut().insert(id, dep.downgrade());
        if !self.deps.borrow().contains_key(&id) {
            dep.add_subscriber(self.id);
        }
    }

    /// Drop subscriptions that the last evaluation did not renew.
    pub(crate) fn cleanup_deps(&self) {
        let fresh = std::mem::take(&mut *self.new_deps.borrow_mut());
        let stale = std::mem::replace(&mut *self.deps.borrow_mut(), fresh);

        let deps = self.deps.borrow();
        for (id, weak) in stale {
            if deps.contains_key(&id) {
                continue;
            }
            if let Some(dep) = weak.upgrade() {
                dep.remove_subscriber(self.id);
            }
        }
    }

    /// Re-evaluate and fire the callback if the value changed.
    ///
    /// Containers always count as changed, since they may have been mutated
    /// in place.
    pub(crate) fn run(self: &Rc<Self>) -> Result<(), ReactiveError> {
        if !self.active.get() {
            return Ok(());
        }

        let Some(value) = self.get()? else {
            return Ok(());
        };
        let old = self.value.borrow().clone();
        if value.same(&old) && !value.is_container() && !self.deep {
            return Ok(());
        }

        *self.value.borrow_mut() = value.clone();
        if let Err(source) = (self.callback)(&value, &old) {
            let info = format!("callback for watcher \"{}\"", self.expression);
            let err = ReactiveError::Evaluation {
                info: info.clone(),
                source,
            };
            if self.user {
                handle_error(&err, self.owner(), &info);
            } else {
                return Err(err);
            }
        }
        Ok(())
    }

    pub(crate) fn evaluate(self: &Rc<Self>) -> Result<(), ReactiveError> {
        if let Some(value) = self.get()? {
            *self.value.borrow_mut() = value;
        }
        self.dirty.set(false);
        Ok(())
    }

    /// Make the current watcher depend on everything this watcher depends on.
    pub(crate) fn depend(&self) {
        let deps: Vec<Dep> = self
            .deps
            .borrow()
            .values()
            .filter_map(WeakDep::upgrade)
            .collect();
        for dep in deps {
            dep.depend();
        }
    }

    pub(crate) fn teardown(&self) {
        if !self.active.get() {
            return;
        }
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        for dep in deps.values().filter_map(WeakDep::upgrade) {
            dep.remove_subscriber(self.id);
        }
        self.active.set(false);
    }
}

impl Subscriber for WatcherInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn update(self: Rc<Self>) -> Result<(), ReactiveError> {
        if self.lazy {
            self.dirty.set(true);
            Ok(())
        } else if self.sync {
            self.run()
        } else {
            scheduler::enqueue(self)
        }
    }
}

impl Drop for WatcherInner {
    fn drop(&mut self) {
        if let Ok(deps) = self.deps.try_borrow() {
            for dep in deps.values().filter_map(WeakDep::upgrade) {
                dep.remove_subscriber(self.id);
            }
        }
        Runtime::unregister(self.id);
    }
}

/// Handle to a watcher.
///
/// The watcher lives as long as a handle (or a pending scheduler entry)
/// does. Dropping the last handle unsubscribes it from everything.
#[must_use = "a watcher stops reacting once its handle is dropped"]
#[derive(Clone)]
pub struct Watcher {
    inner: Rc<WatcherInner>,
}

impl Watcher {
    /// Create a watcher. Unless `lazy`, the getter is evaluated right away.
    ///
    /// For a non-user watcher an error from that first evaluation is
    /// returned.
    pub fn new<G, C>(getter: G, callback: C, options: WatchOptions) -> Result<Self, ReactiveError>
    where
        G: Fn() -> EvalResult + 'static,
        C: Fn(&Value, &Value) -> Result<(), EvalError> + 'static,
    {
        let watcher = Self::build(Rc::new(getter), Rc::new(callback), options);
        if !watcher.inner.lazy {
            if let Some(value) = watcher.inner.get()? {
                *watcher.inner.value.borrow_mut() = value;
            }
        }
        Ok(watcher)
    }

    /// Create a watcher on a dotted path under `target`, e.g. `"a.b.c"`.
    pub fn from_path<C>(
        target: &Value,
        path: &str,
        callback: C,
        options: WatchOptions,
    ) -> Result<Self, ReactiveError>
    where
        C: Fn(&Value, &Value) -> Result<(), EvalError> + 'static,
    {
        let parsed = Path::parse(path).inspect_err(error::warn)?;
        let target = target.clone();
        let options = match options.expression {
            Some(_) => options,
            None => options.expression(path),
        };
        Self::new(move || Ok(parsed.resolve(&target)), callback, options)
    }

    /// A lazy watcher with no callback, the basis of computed values.
    pub(crate) fn lazy<G>(getter: G, options: WatchOptions) -> Self
    where
        G: Fn() -> EvalResult + 'static,
    {
        let noop: Callback = Rc::new(|_: &Value, _: &Value| Ok::<(), EvalError>(()));
        Self::build(Rc::new(getter), noop, options.lazy(true))
    }

    fn build(getter: Getter, callback: Callback, options: WatchOptions) -> Self {
        let id = SubscriberId::new();
        let inner = Rc::new(WatcherInner {
            id,
            expression: options.expression.unwrap_or_else(|| format!("#{}", id.raw())),
            getter,
            callback,
            value: RefCell::new(Value::Null),
            deep: options.deep,
            user: options.user,
            lazy: options.lazy,
            sync: options.sync,
            render: options.render,
            before: options.before,
            owner: options.owner,
            dirty: Cell::new(options.lazy),
            active: Cell::new(true),
            deps: RefCell::new(IndexMap::new()),
            new_deps: RefCell::new(IndexMap::new()),
        });

        let subscriber: Rc<dyn Subscriber> = inner.clone();
        Runtime::register(&subscriber);
        tracing::trace!(watcher = id.raw(), lazy = options.lazy, "watcher created");

        Self { inner }
    }

    pub(crate) fn inner(&self) -> &Rc<WatcherInner> {
        &self.inner
    }

    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    pub fn expression(&self) -> &str {
        &self.inner.expression
    }

    /// The last evaluated value.
    pub fn value(&self) -> Value {
        self.inner.value.borrow().clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Re-evaluate now and clear the dirty flag.
    pub fn evaluate(&self) -> Result<(), ReactiveError> {
        self.inner.evaluate()
    }

    /// Subscribe the currently evaluating watcher to all of this watcher's
    /// deps, without re-evaluating.
    pub fn depend(&self) {
        self.inner.depend();
    }

    /// Re-evaluate and fire the callback on change.
    pub fn run(&self) -> Result<(), ReactiveError> {
        self.inner.run()
    }

    /// React as if a dependency had changed.
    pub fn update(&self) -> Result<(), ReactiveError> {
        self.inner.clone().update()
    }

    /// Unsubscribe from every dep and stop reacting. Idempotent.
    pub fn teardown(&self) {
        self.inner.teardown();
    }

    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Check whether this watcher currently depends on `dep`.
    pub fn depends_on(&self, dep: &Dep) -> bool {
        self.inner.deps.borrow().contains_key(&dep.id())
    }
}

impl Debug for Watcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Watcher")
            .field("id", &self.id())
            .field("expression", &self.expression())
            .field("dirty", &self.is_dirty())
            .field("active", &self.is_active())
            .field("dependency_count", &self.dependency_count())
            .finish()
    }
}

/// Watch a getter, calling `callback(new, old)` when its value changes.
///
/// Always a user watcher. With `immediate`, the callback runs once right
/// away with `Null` as the old value.
pub fn watch<G, C>(getter: G, callback: C, options: WatchOptions) -> Result<Watcher, ReactiveError>
where
    G: Fn() -> EvalResult + 'static,
    C: Fn(&Value, &Value) -> Result<(), EvalError> + 'static,
{
    let immediate = options.immediate;
    let watcher = Watcher::new(getter, callback, options.user(true))?;
    if immediate {
        fire_immediate(&watcher);
    }
    Ok(watcher)
}

/// [`watch`] on a dotted path under `target`.
pub fn watch_path<C>(
    target: &Value,
    path: &str,
    callback: C,
    options: WatchOptions,
) -> Result<Watcher, ReactiveError>
where
    C: Fn(&Value, &Value) -> Result<(), EvalError> + 'static,
{
    let immediate = options.immediate;
    let watcher = Watcher::from_path(target, path, callback, options.user(true))?;
    if immediate {
        fire_immediate(&watcher);
    }
    Ok(watcher)
}

fn fire_immediate(watcher: &Watcher) {
    let inner = watcher.inner();
    let value = watcher.value();
    let result = untracked(|| (inner.callback)(&value, &Value::Null));
    if let Err(source) = result {
        let info = format!("callback for immediate watcher \"{}\"", inner.expression);
        let err = ReactiveError::Evaluation {
            info: info.clone(),
            source,
        };
        handle_error(&err, inner.owner(), &info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::reactive;
    use serde_json::json;

    fn read(state: &Value, key: &str) -> Value {
        state
            .as_object()
            .and_then(|obj| obj.get(key))
            .unwrap_or_default()
    }

    #[test]
    fn eager_watcher_collects_deps() {
        let state = reactive(json!({ "a": 1, "b": 2 }));
        let s = state.clone();
        let watcher = Watcher::new(move || Ok(read(&s, "a")), |_, _| Ok(()), WatchOptions::new()).unwrap();

        assert_eq!(watcher.value(), Value::from(1));
        let obj = state.as_object().unwrap();
        assert!(watcher.depends_on(&obj.property_dep("a").unwrap()));
        assert!(!watcher.depends_on(&obj.property_dep("b").unwrap()));
    }

    #[test]
    fn repeated_reads_subscribe_once() {
        let state = reactive(json!({ "a": 1 }));
        let s = state.clone();
        let watcher = Watcher::new(
            move || {
                read(&s, "a");
                read(&s, "a");
                Ok(read(&s, "a"))
            },
            |_, _| Ok(()),
            WatchOptions::new(),
        )
        .unwrap();

        let dep = state.as_object().unwrap().property_dep("a").unwrap();
        assert_eq!(dep.subscriber_count(), 1);
        assert_eq!(watcher.dependency_count(), 1);
    }

    #[test]
    fn lazy_watcher_defers_evaluation() {
        let watcher = Watcher::lazy(|| Ok(Value::from(5)), WatchOptions::new());
        assert!(watcher.is_dirty());
        assert_eq!(watcher.value(), Value::Null);

        watcher.evaluate().unwrap();
        assert!(!watcher.is_dirty());
        assert_eq!(watcher.value(), Value::from(5));
    }

    #[test]
    fn internal_getter_error_propagates() {
        let result = Watcher::new(|| Err(EvalError::new("boom")), |_, _| Ok(()), WatchOptions::new());
        assert!(matches!(result, Err(ReactiveError::Evaluation { .. })));
    }

    #[test]
    fn teardown_is_idempotent() {
        let state = reactive(json!({ "a": 1 }));
        let s = state.clone();
        let watcher = Watcher::new(move || Ok(read(&s, "a")), |_, _| Ok(()), WatchOptions::new()).unwrap();
        let dep = state.as_object().unwrap().property_dep("a").unwrap();

        watcher.teardown();
        watcher.teardown();
        assert!(!watcher.is_active());
        assert_eq!(dep.subscriber_count(), 0);
        assert_eq!(watcher.dependency_count(), 0);
    }

    #[test]
    fn dropping_last_handle_unsubscribes() {
        let state = reactive(json!({ "a": 1 }));
        let s = state.clone();
        let watcher = Watcher::new(move || Ok(read(&s, "a")), |_, _| Ok(()), WatchOptions::new()).unwrap();
        let id = watcher.id();
        let dep = state.as_object().unwrap().property_dep("a").unwrap();
        assert!(Runtime::is_registered(id));

        drop(watcher);
        assert_eq!(dep.subscriber_count(), 0);
        assert!(!Runtime::is_registered(id));
    }

    #[test]
    fn invalid_path_is_rejected() {
        let state = reactive(json!({}));
        let result = Watcher::from_path(&state, "a[0]", |_, _| Ok(()), WatchOptions::new());
        assert!(matches!(result, Err(ReactiveError::InvalidPath { .. })));
    }

    #[test]
    fn expression_defaults_to_path() {
        let state = reactive(json!({ "a": { "b": 3 } }));
        let watcher = Watcher::from_path(&state, "a.b", |_, _| Ok(()), WatchOptions::new()).unwrap();
        assert_eq!(watcher.expression(), "a.b");
        assert_eq!(watcher.value(), Value::from(3));
    }
}
