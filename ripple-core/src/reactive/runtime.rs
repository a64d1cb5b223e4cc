//! Reactive Runtime
//!
//! The runtime is the central coordinator that connects signals, computeds,
//! and effects. It owns the batching state and the queue of effects waiting
//! to run.
//!
//! # How It Works
//!
//! 1. When a signal's value changes, it hands its live subscribers to the
//!    runtime.
//!
//! 2. The runtime opens a batch and, for every subscriber:
//!    a. Lazy nodes (computeds) are marked stale, which forwards to their
//!       own subscribers
//!    b. Eager nodes (effects) are queued, keyed by subscriber ID so each
//!       runs at most once per flush
//!
//! 3. When the outermost batch closes, the queue is flushed in the order
//!    effects were first queued. Writes made by running effects queue more
//!    work behind the current queue (breadth-first).
//!
//! # Thread Safety
//!
//! All runtime state is thread-local. Independent threads get independent
//! batches and queues, so a write on a tokio worker flushes on that worker.
//! Nodes are shared across threads; an effect never runs on two threads at
//! once (see [`Effect`](super::Effect)).

use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;

use super::subscriber::SubscriberId;
use super::context::ReactiveContext;
use crate::config::RuntimeConfig;
use crate::error::ReactiveError;

/// A trait for nodes that can be notified when dependencies change.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this reactive node.
    fn subscriber_id(&self) -> SubscriberId;

    /// Invalidate a lazy node. Called when a dependency changes.
    fn mark_stale(&self);

    /// Re-execute an eager node. Called when the runtime flushes.
    fn run(&self);

    /// Check if this node is an effect (eager) or computed (lazy).
    fn is_eager(&self) -> bool;
}

#[derive(Default)]
struct BatchState {
    depth: usize,
    pending: IndexMap<SubscriberId, Weak<dyn Reactive>>,
}

thread_local! {
    static BATCH: RefCell<BatchState> = RefCell::new(BatchState::default());
    static CONFIG: RefCell<RuntimeConfig> = RefCell::new(RuntimeConfig::default());
}

/// Closes a batch level when dropped, flushing if it was the outermost one.
struct BatchGuard;

impl Drop for BatchGuard {
    fn drop(&mut self) {
        let outermost = BATCH.with(|batch| {
            let mut batch = batch.borrow_mut();
            batch.depth -= 1;
            batch.depth == 0
        });
        if outermost {
            Runtime::flush();
        }
    }
}

/// The per-thread reactive runtime.
pub struct Runtime;

impl Runtime {
    /// Run `f` with effect notification deferred until it returns.
    ///
    /// Nested batches are folded into the outermost one. The queued effects
    /// are flushed when the outermost batch exits, including when `f` panics.
    pub fn batch<R>(f: impl FnOnce() -> R) -> R {
        BATCH.with(|batch| batch.borrow_mut().depth += 1);
        let _guard = BatchGuard;
        f()
    }

    /// Check if a batch (or a flush) is in progress on this thread.
    pub fn is_batching() -> bool {
        BATCH.with(|batch| batch.borrow().depth > 0)
    }

    /// Number of effects waiting for the current batch to close.
    pub fn pending_count() -> usize {
        BATCH.with(|batch| batch.borrow().pending.len())
    }

    /// Install a configuration for this thread.
    pub fn configure(config: RuntimeConfig) {
        CONFIG.with(|c| *c.borrow_mut() = config);
    }

    /// The configuration in effect on this thread.
    pub fn config() -> RuntimeConfig {
        CONFIG.with(|c| c.borrow().clone())
    }

    /// Notify subscribers that a source changed.
    ///
    /// This is the core update propagation mechanism.
    pub(crate) fn propagate(subscribers: Vec<Arc<dyn Reactive>>) {
        if subscribers.is_empty() {
            return;
        }
        tracing::trace!(count = subscribers.len(), "propagating change");

        Self::batch(|| {
            for subscriber in &subscribers {
                if subscriber.is_eager() {
                    Self::enqueue(subscriber);
                } else {
                    subscriber.mark_stale();
                }
            }
        });
    }

    /// Queue an eager node for the next flush. Already-queued nodes keep
    /// their position.
    pub(crate) fn enqueue(node: &Arc<dyn Reactive>) {
        let id = node.subscriber_id();
        BATCH.with(|batch| {
            batch
                .borrow_mut()
                .pending
                .entry(id)
                .or_insert_with(|| Arc::downgrade(node));
        });
    }

    /// Drop a node from the queue, e.g. because it was disposed.
    pub(crate) fn dequeue(id: SubscriberId) {
        // May run from a destructor late in thread teardown.
        let removed = BATCH
            .try_with(|batch| batch.borrow_mut().pending.shift_remove(&id))
            .ok()
            .flatten();
        drop(removed);
    }

    /// Run queued effects until the queue is empty.
    ///
    /// A panicking effect does not strand the rest of the queue: the flush
    /// finishes, then the first panic is resumed.
    fn flush() {
        // Hold a batch level open so writes made by effects are queued
        // behind the current work rather than running re-entrantly.
        BATCH.with(|batch| batch.borrow_mut().depth += 1);
        let _guard = FlushGuard;

        let limit = Self::config().max_effect_reruns;
        let unwinding = std::thread::panicking();
        let mut runs: HashMap<SubscriberId, usize> = HashMap::new();
        let mut panicked: Option<Box<dyn Any + Send>> = None;

        loop {
            let next = BATCH.with(|batch| batch.borrow_mut().pending.shift_remove_index(0));
            let Some((id, node)) = next else {
                break;
            };
            let Some(node) = node.upgrade() else {
                continue;
            };

            let count = runs.entry(id).or_insert(0);
            *count += 1;
            if *count > limit {
                let err = ReactiveError::CycleDetected {
                    subscriber: id,
                    runs: limit,
                };
                tracing::error!(error = %err, "dropping effect from flush");
                continue;
            }

            let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| node.run())) else {
                continue;
            };
            if unwinding {
                // A second panic while unwinding would abort the process.
                tracing::error!(subscriber = ?id, "effect panicked during unwinding flush");
            } else {
                tracing::error!(subscriber = ?id, "effect panicked, finishing flush");
                if panicked.is_none() {
                    panicked = Some(payload);
                }
            }
        }

        if let Some(payload) = panicked {
            panic::resume_unwind(payload);
        }
    }

    /// Get the current subscriber being tracked, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        ReactiveContext::current_subscriber()
    }

    /// Check if we're inside a tracking context.
    pub fn is_tracking() -> bool {
        ReactiveContext::is_active()
    }
}

/// Releases the batch level held by a flush without triggering another one.
struct FlushGuard;

impl Drop for FlushGuard {
    fn drop(&mut self) {
        BATCH.with(|batch| batch.borrow_mut().depth -= 1);
    }
}

/// Run `f` as a batch. See [`Runtime::batch`].
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    Runtime::batch(f)
}
