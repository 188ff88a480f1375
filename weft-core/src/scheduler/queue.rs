//! Watcher Queue
//!
//! Non-lazy, non-sync watchers do not re-run when a dep notifies them. They
//! are queued, and the queue is flushed once per tick:
//!
//! 1. Watchers are deduplicated by id, so any number of writes in one tick
//!    re-run a watcher once.
//! 2. The queue is sorted by id before flushing. Ids follow creation order,
//!    so parents run before children and user watchers created during setup
//!    run before the render watcher created after them.
//! 3. A watcher queued while the flush is running is spliced into the
//!    unflushed part at its sorted position. One with an id lower than the
//!    watcher currently running goes right after it.
//! 4. A watcher that keeps re-queueing itself is stopped after
//!    [`Config::max_update_count`](crate::config::Config) re-runs.
//!
//! After the flush, `activated` hooks and then `updated` hooks run, both in
//! reverse queue order.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use std::time::Instant;

use super::tick::next_tick;
use crate::config;
use crate::error::{self, ReactiveError};
use crate::reactive::{Owner, SubscriberId, Watcher, WatcherInner};

#[derive(Default)]
struct SchedulerState {
    queue: Vec<Rc<WatcherInner>>,
    activated: Vec<Rc<dyn Owner>>,
    has: HashSet<SubscriberId>,
    circular: HashMap<SubscriberId, usize>,
    waiting: bool,
    flushing: bool,
    index: usize,
    flush_started: Option<Instant>,
}

impl SchedulerState {
    fn reset(&mut self) -> (Vec<Rc<WatcherInner>>, Vec<Rc<dyn Owner>>) {
        self.index = 0;
        self.has.clear();
        self.circular.clear();
        self.waiting = false;
        self.flushing = false;
        (
            std::mem::take(&mut self.queue),
            std::mem::take(&mut self.activated),
        )
    }
}

thread_local! {
    static STATE: RefCell<SchedulerState> = RefCell::new(SchedulerState::default());
}

/// Queue a watcher for the next flush.
///
/// Already-queued watchers are ignored. With `async_flush` off the queue is
/// flushed before this returns, and the flush result is returned.
pub fn queue_watcher(watcher: &Watcher) -> Result<(), ReactiveError> {
    enqueue(watcher.inner().clone())
}

pub(crate) fn enqueue(watcher: Rc<WatcherInner>) -> Result<(), ReactiveError> {
    let id = watcher.id();
    let schedule = STATE.with(|state| {
        let mut state = state.borrow_mut();
        if !state.has.insert(id) {
            return false;
        }

        if state.flushing {
            let mut i = state.queue.len();
            while i > state.index + 1 && state.queue[i - 1].id() > id {
                i -= 1;
            }
            state.queue.insert(i, watcher);
        } else {
            state.queue.push(watcher);
        }
        tracing::trace!(watcher = id.raw(), queued = state.queue.len(), "watcher queued");

        if state.waiting {
            return false;
        }
        state.waiting = true;
        true
    });

    if !schedule {
        return Ok(());
    }
    if !config::config().async_flush {
        return flush_scheduler_queue();
    }
    next_tick(flush_scheduler_queue);
    Ok(())
}

/// Register an owner that was re-activated during this cycle. Its
/// `activated` hook runs after the next flush.
pub fn queue_activated(owner: Rc<dyn Owner>) {
    STATE.with(|state| state.borrow_mut().activated.push(owner));
}

/// Run every queued watcher.
///
/// Normally scheduled through the tick queue. An error from a non-user
/// watcher abandons the flush, resets the scheduler and is returned; post
/// flush hooks are skipped in that case.
pub fn flush_scheduler_queue() -> Result<(), ReactiveError> {
    let queued = STATE.with(|state| {
        let mut state = state.borrow_mut();
        state.flush_started = Some(Instant::now());
        state.flushing = true;
        state.queue.sort_by_key(|watcher| watcher.id());
        state.queue.len()
    });
    tracing::debug!(queued, "flush start");

    let limit = config::config().max_update_count;
    let outcome = run_queue(limit);

    let (queue, activated) = STATE.with(|state| state.borrow_mut().reset());
    tracing::debug!(ran = queue.len(), ok = outcome.is_ok(), "flush end");
    outcome?;

    for owner in activated.iter().rev() {
        owner.activated();
    }
    for watcher in queue.iter().rev() {
        if !watcher.is_render() {
            continue;
        }
        if let Some(owner) = watcher.owner() {
            if owner.is_mounted() && !owner.is_destroyed() {
                owner.updated();
            }
        }
    }
    Ok(())
}

// The queue length is re-read every step because running a watcher may
// queue more.
fn run_queue(limit: usize) -> Result<(), ReactiveError> {
    let mut index = 0;
    loop {
        let next = STATE.with(|state| {
            let mut state = state.borrow_mut();
            state.index = index;
            state.queue.get(index).cloned()
        });
        let Some(watcher) = next else {
            return Ok(());
        };

        if let Some(before) = watcher.before() {
            before();
        }
        let id = watcher.id();
        STATE.with(|state| state.borrow_mut().has.remove(&id));
        watcher.run()?;

        let runaway = STATE.with(|state| {
            let mut state = state.borrow_mut();
            if !state.has.contains(&id) {
                return false;
            }
            let count = state.circular.entry(id).or_insert(0);
            *count += 1;
            *count > limit
        });
        if runaway {
            error::warn(&ReactiveError::InfiniteUpdate {
                id,
                expression: watcher.expression().to_string(),
                limit,
            });
            return Ok(());
        }

        index += 1;
    }
}

/// Whether a flush is in progress.
pub fn is_flushing() -> bool {
    STATE.with(|state| state.borrow().flushing)
}

/// Number of watchers currently in the queue.
pub fn queued_count() -> usize {
    STATE.with(|state| state.borrow().queue.len())
}

/// When the most recent flush started.
pub fn current_flush_timestamp() -> Option<Instant> {
    STATE.with(|state| state.borrow().flush_started)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{reactive, Value, WatchOptions};
    use crate::scheduler::run_pending_ticks;
    use serde_json::json;
    use std::cell::RefCell;

    fn bump(state: &Value, key: &str) {
        let obj = state.as_object().unwrap();
        let n = obj.get_untracked(key).and_then(|v| v.as_f64()).unwrap_or_default();
        obj.set(key, n + 1.0).unwrap();
    }

    #[test]
    fn writes_in_one_tick_queue_once() {
        let state = reactive(json!({ "a": 0 }));
        let s = state.clone();
        let runs = Rc::new(RefCell::new(0));
        let r = runs.clone();
        let _w = Watcher::new(
            move || Ok(s.as_object().and_then(|o| o.get("a")).unwrap_or_default()),
            move |_, _| {
                *r.borrow_mut() += 1;
                Ok(())
            },
            WatchOptions::new(),
        )
        .unwrap();

        bump(&state, "a");
        bump(&state, "a");
        bump(&state, "a");
        assert_eq!(queued_count(), 1);

        assert_eq!(run_pending_ticks(), 1);
        assert_eq!(*runs.borrow(), 1);
        assert_eq!(queued_count(), 0);
        assert!(!is_flushing());
        assert!(current_flush_timestamp().is_some());
    }

    #[test]
    fn queue_watcher_deduplicates() {
        let watcher = Watcher::new(|| Ok(Value::Null), |_, _| Ok(()), WatchOptions::new()).unwrap();
        queue_watcher(&watcher).unwrap();
        queue_watcher(&watcher).unwrap();
        assert_eq!(queued_count(), 1);
        run_pending_ticks();
        assert_eq!(queued_count(), 0);
    }

    #[test]
    fn before_hook_runs_ahead_of_each_rerun() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let before_log = log.clone();
        let run_log = log.clone();
        let watcher = Watcher::new(
            move || {
                run_log.borrow_mut().push("run");
                Ok(Value::Null)
            },
            |_, _| Ok(()),
            WatchOptions::new().before(move || before_log.borrow_mut().push("before")),
        )
        .unwrap();
        log.borrow_mut().clear();

        queue_watcher(&watcher).unwrap();
        run_pending_ticks();
        assert_eq!(log.borrow().as_slice(), ["before", "run"]);
    }
}
