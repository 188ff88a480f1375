//! Tick Queue
//!
//! Deferred callbacks run in batches called ticks. [`next_tick`] appends a
//! callback and, if no tick is pending yet, asks the installed
//! [`TickDriver`] for one. Any number of callbacks queued before the tick
//! runs share it.
//!
//! The default driver is [`ManualTick`], which leaves running the tick to the
//! host through [`run_pending_ticks`]. Inside a Tokio `LocalSet`,
//! [`TokioTick`] spawns a local task per tick instead.

use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use tokio::sync::oneshot;

use crate::error::{handle_error, ReactiveError};

type TickCallback = Box<dyn FnOnce() -> Result<(), ReactiveError>>;

/// Decides when a requested tick actually runs.
pub trait TickDriver {
    /// Arrange for [`run_pending_ticks`] to be called soon, after the
    /// current synchronous work finishes.
    fn request_tick(&self);
}

/// Does nothing on request. The host calls [`run_pending_ticks`] itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct ManualTick;

impl TickDriver for ManualTick {
    fn request_tick(&self) {}
}

/// Runs each tick as a task on the current Tokio `LocalSet`.
///
/// Requesting a tick outside a `LocalSet` panics, as `spawn_local` does.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTick;

impl TickDriver for TokioTick {
    fn request_tick(&self) {
        tokio::task::spawn_local(async {
            run_pending_ticks();
        });
    }
}

struct TickQueue {
    callbacks: Vec<TickCallback>,
    pending: bool,
    driver: Rc<dyn TickDriver>,
}

thread_local! {
    static TICKS: RefCell<TickQueue> = RefCell::new(TickQueue {
        callbacks: Vec::new(),
        pending: false,
        driver: Rc::new(ManualTick),
    });
}

/// Install the driver used for future tick requests.
pub fn set_tick_driver<D>(driver: D)
where
    D: TickDriver + 'static,
{
    TICKS.with(|ticks| ticks.borrow_mut().driver = Rc::new(driver));
}

/// Defer a callback to the next tick.
///
/// An error returned by the callback is routed to the error channel with
/// info `nextTick`.
pub fn next_tick<F>(callback: F)
where
    F: FnOnce() -> Result<(), ReactiveError> + 'static,
{
    let driver = TICKS.with(|ticks| {
        let mut ticks = ticks.borrow_mut();
        ticks.callbacks.push(Box::new(callback));
        if ticks.pending {
            None
        } else {
            ticks.pending = true;
            Some(ticks.driver.clone())
        }
    });

    if let Some(driver) = driver {
        tracing::trace!("tick requested");
        driver.request_tick();
    }
}

/// A future that resolves once every callback queued before it has run.
pub fn next_tick_signal() -> TickSignal {
    let (tx, rx) = oneshot::channel();
    next_tick(move || {
        let _ = tx.send(());
        Ok(())
    });
    TickSignal { rx }
}

/// Returned by [`next_tick_signal`].
#[derive(Debug)]
pub struct TickSignal {
    rx: oneshot::Receiver<()>,
}

impl Future for TickSignal {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        // A dropped sender also counts as done.
        Pin::new(&mut self.rx).poll(cx).map(|_| ())
    }
}

/// Run queued callbacks until none are left and return how many ran.
///
/// Callbacks queued while a batch runs form the next batch.
pub fn run_pending_ticks() -> usize {
    let mut ran = 0;
    loop {
        let batch = TICKS.with(|ticks| {
            let mut ticks = ticks.borrow_mut();
            ticks.pending = false;
            std::mem::take(&mut ticks.callbacks)
        });
        if batch.is_empty() {
            return ran;
        }

        for callback in batch {
            if let Err(err) = callback() {
                handle_error(&err, None, "nextTick");
            }
            ran += 1;
        }
    }
}

/// Whether a tick has been requested and not yet run.
pub fn has_pending_tick() -> bool {
    TICKS.with(|ticks| ticks.borrow().pending)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use std::cell::Cell;

    struct CountingDriver(Rc<Cell<usize>>);

    impl TickDriver for CountingDriver {
        fn request_tick(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn callbacks_share_one_tick() {
        let requests = Rc::new(Cell::new(0));
        set_tick_driver(CountingDriver(requests.clone()));

        next_tick(|| Ok(()));
        next_tick(|| Ok(()));
        assert!(has_pending_tick());
        assert_eq!(requests.get(), 1);

        assert_eq!(run_pending_ticks(), 2);
        assert!(!has_pending_tick());

        next_tick(|| Ok(()));
        assert_eq!(requests.get(), 2);
        run_pending_ticks();
        set_tick_driver(ManualTick);
    }

    #[test]
    fn nested_callbacks_run_in_a_later_batch() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let outer = order.clone();
        next_tick(move || {
            outer.borrow_mut().push(1);
            let inner = outer.clone();
            next_tick(move || {
                inner.borrow_mut().push(3);
                Ok(())
            });
            Ok(())
        });
        let second = order.clone();
        next_tick(move || {
            second.borrow_mut().push(2);
            Ok(())
        });

        assert_eq!(run_pending_ticks(), 3);
        assert_eq!(order.borrow().as_slice(), [1, 2, 3]);
    }

    #[test]
    fn callback_errors_are_reported_as_next_tick() {
        let infos = Rc::new(RefCell::new(Vec::new()));
        let sink = infos.clone();
        config::set_error_handler(move |_, info| sink.borrow_mut().push(info.to_string()));

        next_tick(|| Err(ReactiveError::Cyclic));
        run_pending_ticks();

        assert_eq!(infos.borrow().as_slice(), ["nextTick"]);
        config::clear_handlers();
    }

    #[tokio::test]
    async fn tokio_tick_resolves_signal() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                set_tick_driver(TokioTick);
                let ran = Rc::new(Cell::new(false));
                let flag = ran.clone();
                next_tick(move || {
                    flag.set(true);
                    Ok(())
                });
                next_tick_signal().await;
                assert!(ran.get());
                set_tick_driver(ManualTick);
            })
            .await;
    }
}
