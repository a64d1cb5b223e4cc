//! Timers
//!
//! Timeouts and intervals backed by tokio tasks. These are the usual
//! producers inside a [`Relay`](crate::relay::Relay) setup: the returned
//! [`TimerHandle`] converts into a [`Cleanup`], so a setup can hand it
//! straight back and the relay cancels it before the next setup run.
//!
//! Time follows tokio's clock, so tests drive timers with a paused runtime.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::error::Result;
use crate::reactive::{Cleanup, IntoCleanup};

/// A running timeout or interval.
///
/// Dropping the handle does not stop the timer; call [`cancel`](Self::cancel)
/// or return the handle as an effect cleanup.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Stop the timer. Callbacks that have not started will not run.
    pub fn cancel(&self) {
        self.task.abort();
    }

    /// Check if the timer has stopped (fired, for a timeout, or cancelled).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl IntoCleanup for TimerHandle {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(Cleanup::new(move || self.cancel()))
    }
}

/// Run `f` once after `delay` on the current tokio runtime.
pub fn timeout<F>(delay: Duration, f: F) -> Result<TimerHandle>
where
    F: FnOnce() + Send + 'static,
{
    Ok(timeout_on(&Handle::try_current()?, delay, f))
}

/// Run `f` once after `delay` on the given runtime.
pub fn timeout_on<F>(handle: &Handle, delay: Duration, f: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    let task = handle.spawn(async move {
        time::sleep(delay).await;
        f();
    });
    TimerHandle { task }
}

/// Run `f` every `period`, starting one period from now, on the current
/// tokio runtime.
pub fn interval<F>(period: Duration, f: F) -> Result<TimerHandle>
where
    F: FnMut() + Send + 'static,
{
    Ok(interval_on(&Handle::try_current()?, period, f))
}

/// Run `f` every `period`, starting one period from now, on the given runtime.
pub fn interval_on<F>(handle: &Handle, period: Duration, mut f: F) -> TimerHandle
where
    F: FnMut() + Send + 'static,
{
    let task = handle.spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            f();
        }
    });
    TimerHandle { task }
}
