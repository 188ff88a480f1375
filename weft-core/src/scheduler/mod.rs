//! Scheduling
//!
//! Watchers queued by dep notifications are flushed in batches, one batch
//! per tick. See [`queue`] for the flush rules and [`tick`] for how ticks are
//! driven.

pub mod queue;
pub mod tick;

pub use queue::{
    current_flush_timestamp, flush_scheduler_queue, is_flushing, queue_activated, queue_watcher,
    queued_count,
};
pub use tick::{
    has_pending_tick, next_tick, next_tick_signal, run_pending_ticks, set_tick_driver, ManualTick,
    TickDriver, TickSignal, TokioTick,
};

pub(crate) use queue::enqueue;
