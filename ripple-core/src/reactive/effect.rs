//! Effect Implementation
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change.
//!
//! # How Effects Work
//!
//! 1. When created, the effect runs its function immediately to establish
//!    initial dependencies.
//!
//! 2. When any dependency changes, the effect is queued with the runtime and
//!    runs when the current batch (or the write's implicit batch) closes.
//!
//! 3. Before re-running, the effect calls the cleanup returned by its
//!    previous run, detaches from every source it read, and then tracks a
//!    fresh set of sources during execution.
//!
//! # Differences from Computed
//!
//! - Computeds return a value; effects do not.
//! - Computeds are lazy (compute on access); effects are eager (run when deps change).
//! - Computeds cache results; effects just run their side effect.
//!
//! # Cleanup
//!
//! The function may return `()`, a [`Cleanup`], or an `Option` of anything
//! that converts into one. The cleanup runs before the next run and when the
//! effect is disposed. This is where timers and listeners get torn down.
//!
//! # Threads
//!
//! At most one run of an effect is in flight. A trigger that arrives while it
//! runs, from this thread or another, makes the active run go again once it
//! returns instead of starting a second one beside it.
//!
//! # Disposal
//!
//! [`Effect::dispose`] runs the final cleanup and detaches the effect for
//! good. Dropping the last handle to an effect does the same, so an effect
//! must be held (directly, in a [`Scope`](super::Scope), or inside another
//! structure) for as long as it should keep running.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::context::{Dependencies, Observer, ReactiveContext};
use super::runtime::{Reactive, Runtime};
use super::subscriber::SubscriberId;

/// A teardown function returned by an effect run.
pub struct Cleanup(Box<dyn FnOnce() + Send>);

impl Cleanup {
    /// Wrap a teardown function.
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self(Box::new(f))
    }

    /// Run the teardown.
    pub fn run(self) {
        (self.0)()
    }
}

impl fmt::Debug for Cleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Cleanup")
    }
}

/// Values an effect function may return.
pub trait IntoCleanup {
    /// Convert into an optional cleanup.
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl IntoCleanup for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl IntoCleanup for Cleanup {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(self)
    }
}

impl<C: IntoCleanup> IntoCleanup for Option<C> {
    fn into_cleanup(self) -> Option<Cleanup> {
        self.and_then(IntoCleanup::into_cleanup)
    }
}

type EffectFn = Box<dyn Fn() -> Option<Cleanup> + Send + Sync>;

/// Keeps at most one run of an effect in flight.
#[derive(Default)]
struct RunState {
    running: bool,

    /// A trigger arrived while running; the active run repeats.
    rerun: bool,
}

pub(crate) struct EffectInner {
    id: SubscriberId,

    /// The effect function.
    run: EffectFn,

    /// Sources read during the last run.
    sources: Mutex<Dependencies>,

    /// Cleanup returned by the last run.
    cleanup: Mutex<Option<Cleanup>>,

    run_state: Mutex<RunState>,

    /// Whether the effect has been disposed.
    disposed: AtomicBool,

    /// Number of times the effect has run.
    run_count: AtomicUsize,

    weak_self: Weak<EffectInner>,
}

impl EffectInner {
    /// Run the effect, or ask the run already in progress (on this thread or
    /// another) to go again once it returns.
    fn execute(&self) {
        {
            let mut state = self.run_state.lock();
            if state.running {
                state.rerun = true;
                return;
            }
            state.running = true;
        }

        loop {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| self.run_once())) {
                *self.run_state.lock() = RunState::default();
                panic::resume_unwind(payload);
            }

            let mut state = self.run_state.lock();
            if !state.rerun || self.disposed.load(Ordering::SeqCst) {
                *state = RunState::default();
                return;
            }
            state.rerun = false;
        }
    }

    fn run_once(&self) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }

        let cleanup = self.cleanup.lock().take();
        if let Some(cleanup) = cleanup {
            cleanup.run();
        }

        // Clear old dependencies
        self.detach();

        let node: Weak<dyn Reactive> = self.weak_self.clone();
        let ctx = ReactiveContext::enter(Observer::new(self.id, node));
        let result = panic::catch_unwind(AssertUnwindSafe(|| (self.run)()));
        let dependencies = ctx.finish();

        let cleanup = match result {
            Ok(cleanup) => cleanup,
            Err(payload) => {
                for source in &dependencies {
                    source.unsubscribe(self.id);
                }
                panic::resume_unwind(payload);
            }
        };

        // Dispose takes the same lock, so it either sees this run's cleanup
        // or this run sees the disposal.
        let mut slot = self.cleanup.lock();
        if self.disposed.load(Ordering::SeqCst) {
            drop(slot);
            for source in &dependencies {
                source.unsubscribe(self.id);
            }
            if let Some(cleanup) = cleanup {
                cleanup.run();
            }
            return;
        }

        *self.sources.lock() = dependencies;
        let stale = std::mem::replace(&mut *slot, cleanup);
        drop(slot);
        self.run_count.fetch_add(1, Ordering::SeqCst);

        if let Some(stale) = stale {
            stale.run();
        }
    }

    fn detach(&self) {
        let sources = std::mem::take(&mut *self.sources.lock());
        for source in &sources {
            source.unsubscribe(self.id);
        }
    }

    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::debug!(effect = ?self.id, "disposing effect");

        Runtime::dequeue(self.id);
        let cleanup = {
            let mut slot = self.cleanup.lock();
            self.detach();
            slot.take()
        };
        if let Some(cleanup) = cleanup {
            cleanup.run();
        }
    }
}

impl Reactive for EffectInner {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn mark_stale(&self) {}

    fn run(&self) {
        self.execute();
    }

    fn is_eager(&self) -> bool {
        true
    }
}

impl Drop for EffectInner {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A side-effecting computation that runs when dependencies change.
///
/// # Example
///
/// ```rust
/// use std::sync::atomic::{AtomicI32, Ordering};
/// use std::sync::Arc;
/// use ripple_core::reactive::{Effect, Signal};
///
/// let count = Signal::new(0);
/// let seen = Arc::new(AtomicI32::new(-1));
///
/// let (source, sink) = (count.clone(), seen.clone());
/// let effect = Effect::new(move || {
///     sink.store(source.get(), Ordering::SeqCst);
/// });
///
/// count.set(5);
/// assert_eq!(seen.load(Ordering::SeqCst), 5);
/// effect.dispose();
/// ```
#[must_use = "dropping the last handle to an Effect disposes it"]
pub struct Effect {
    inner: Arc<EffectInner>,
}

impl Effect {
    /// Create a new effect with the given function.
    ///
    /// The function runs immediately to establish initial dependencies.
    /// Writes it performs are flushed after it returns.
    pub fn new<F, R>(run: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoCleanup,
    {
        let effect = Self::new_lazy(run);
        Runtime::batch(|| effect.execute());
        effect
    }

    /// Create a new effect without running it immediately.
    ///
    /// It tracks nothing until [`execute`](Self::execute) is called.
    pub fn new_lazy<F, R>(run: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: IntoCleanup,
    {
        let run: EffectFn = Box::new(move || run().into_cleanup());
        Self {
            inner: Arc::new_cyclic(|weak_self| EffectInner {
                id: SubscriberId::new(),
                run,
                sources: Mutex::new(Dependencies::new()),
                cleanup: Mutex::new(None),
                run_state: Mutex::new(RunState::default()),
                disposed: AtomicBool::new(false),
                run_count: AtomicUsize::new(0),
                weak_self: weak_self.clone(),
            }),
        }
    }

    /// Get the subscriber ID for this effect.
    pub fn id(&self) -> SubscriberId {
        self.inner.id
    }

    /// Execute the effect function now.
    pub fn execute(&self) {
        self.inner.execute();
    }

    /// Queue the effect to re-run when the current batch closes, or right
    /// away outside a batch.
    pub fn schedule(&self) {
        if self.is_disposed() {
            return;
        }
        let node: Arc<dyn Reactive> = self.inner.clone();
        Runtime::batch(|| Runtime::enqueue(&node));
    }

    /// Dispose of the effect.
    ///
    /// Runs the current cleanup and detaches from all sources. After
    /// disposal, the effect will not run again. Disposing twice is a no-op.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Check if the effect has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    /// Get the number of times the effect has run.
    pub fn run_count(&self) -> usize {
        self.inner.run_count.load(Ordering::SeqCst)
    }

    /// Get the number of sources read during the last run.
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.lock().len()
    }
}

impl Clone for Effect {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("run_count", &self.run_count())
            .field("dependency_count", &self.dependency_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Create an effect. See [`Effect::new`].
pub fn effect<F, R>(run: F) -> Effect
where
    F: Fn() -> R + Send + Sync + 'static,
    R: IntoCleanup,
{
    Effect::new(run)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
