//! Computed Implementation
//!
//! A Computed is a cached derived value that re-evaluates only when its
//! dependencies change.
//!
//! # How Computeds Work
//!
//! 1. On first access, the computed runs its function inside a tracking
//!    context and caches the result.
//!
//! 2. When accessed again, if no dependencies have changed, returns the
//!    cached value.
//!
//! 3. When a dependency changes, the computed is marked dirty and forwards
//!    the notification to its own subscribers. It does not recompute.
//!
//! 4. On next access, it drops its old dependency edges, recomputes, and
//!    records the dependencies read this time (which may differ if the
//!    function branches).
//!
//! # Why This Matters
//!
//! Dirtiness is pushed, values are pulled:
//!
//! - A signal changes
//! - 10 computeds depend on it
//! - Only the computeds actually read will recompute
//! - Computeds that are never read stay dirty (no wasted work)
//!
//! Reading a computed from another reactive scope registers the computed
//! itself as the dependency, not the signals behind it.
//!
//! The function must be a pure derivation. Writing signals from inside it is
//! a caller error the runtime does not detect.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use super::context::{Dependencies, Observer, ReactiveContext};
use super::runtime::{Reactive, Runtime};
use super::signal::Readable;
use super::subscriber::{Source, SourceId, SubscriberId, SubscriberSet};

/// Dirty state for a computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedState {
    /// The cached value is up-to-date.
    Clean,

    /// A dependency changed, or the value was never computed.
    Dirty,
}

pub(crate) struct ComputedInner<T> {
    /// Identity as a subscriber of the values it reads.
    subscriber_id: SubscriberId,

    /// Identity as a source for the values that read it.
    source_id: SourceId,

    compute: Box<dyn Fn() -> T + Send + Sync>,

    /// The cached value (None if never computed).
    value: RwLock<Option<T>>,

    state: Mutex<ComputedState>,

    /// Held while evaluating. Reentrant so a self-read reaches the check
    /// below instead of deadlocking.
    serial: ReentrantMutex<()>,

    /// Set while `compute` runs, to catch a computed reading itself.
    computing: AtomicBool,

    /// Sources read during the last evaluation.
    sources: Mutex<Dependencies>,

    subscribers: SubscriberSet,

    evaluations: AtomicUsize,

    weak_self: Weak<ComputedInner<T>>,
}

impl<T> ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn observer(&self) -> Observer {
        let node: Weak<dyn Reactive> = self.weak_self.clone();
        Observer::new(self.subscriber_id, node)
    }

    fn read(&self) -> T {
        // Mid-evaluation reads go through the serial lock: another thread
        // waits for the result, a self-read trips the check.
        if self.computing.load(Ordering::SeqCst) || *self.state.lock() == ComputedState::Dirty {
            return self.recompute();
        }
        let cached = self.value.read().clone();
        match cached {
            Some(value) => value,
            None => self.recompute(),
        }
    }

    /// Recompute the value.
    ///
    /// This runs the function within a reactive context to track
    /// dependencies. Recomputes are serialized; a thread that waited on
    /// another's recompute takes its result.
    fn recompute(&self) -> T {
        let _serial = self.serial.lock();
        if self.computing.swap(true, Ordering::SeqCst) {
            panic!("computed {:?} read itself during evaluation", self.subscriber_id);
        }

        if *self.state.lock() == ComputedState::Clean {
            let cached = self.value.read().clone();
            if let Some(value) = cached {
                self.computing.store(false, Ordering::SeqCst);
                return value;
            }
        }

        // Marked clean up front so a write landing mid-evaluation leaves it
        // dirty.
        *self.state.lock() = ComputedState::Clean;

        let stale = std::mem::take(&mut *self.sources.lock());
        for source in &stale {
            source.unsubscribe(self.subscriber_id);
        }
        drop(stale);

        let ctx = ReactiveContext::enter(self.observer());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| (self.compute)()));
        let dependencies = ctx.finish();
        self.computing.store(false, Ordering::SeqCst);

        let new_value = match result {
            Ok(value) => value,
            Err(payload) => {
                for source in &dependencies {
                    source.unsubscribe(self.subscriber_id);
                }
                *self.state.lock() = ComputedState::Dirty;
                std::panic::resume_unwind(payload);
            }
        };

        *self.sources.lock() = dependencies;
        *self.value.write() = Some(new_value.clone());
        self.evaluations.fetch_add(1, Ordering::Relaxed);

        new_value
    }

    fn detach(&self) {
        let sources = std::mem::take(&mut *self.sources.lock());
        for source in &sources {
            source.unsubscribe(self.subscriber_id);
        }
    }
}

impl<T> Reactive for ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_stale(&self) {
        {
            let mut state = self.state.lock();
            if *state == ComputedState::Dirty {
                // Subscribers were told the last time this went dirty and
                // nobody has read it since.
                return;
            }
            *state = ComputedState::Dirty;
        }
        Runtime::propagate(self.subscribers.snapshot());
    }

    fn run(&self) {}

    fn is_eager(&self) -> bool {
        false
    }
}

impl<T> Source for ComputedInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn source_id(&self) -> SourceId {
        self.source_id
    }

    fn unsubscribe(&self, subscriber: SubscriberId) {
        self.subscribers.remove(subscriber);
    }
}

impl<T> Drop for ComputedInner<T> {
    fn drop(&mut self) {
        let sources = std::mem::take(self.sources.get_mut());
        for source in &sources {
            source.unsubscribe(self.subscriber_id);
        }
    }
}

/// A cached derived value that recomputes lazily when dependencies change.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Computed, Signal};
///
/// let count = Signal::new(2);
/// let source = count.clone();
/// let doubled = Computed::new(move || source.get() * 2);
///
/// assert_eq!(doubled.get(), 4);
/// count.set(5);
/// assert_eq!(doubled.get(), 10);
/// ```
pub struct Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<ComputedInner<T>>,
}

impl<T> Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new computed with the given function.
    ///
    /// The function is not run immediately. It runs on first access.
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new_cyclic(|weak_self| ComputedInner {
                subscriber_id: SubscriberId::new(),
                source_id: SourceId::new(),
                compute: Box::new(compute),
                value: RwLock::new(None),
                state: Mutex::new(ComputedState::Dirty),
                serial: ReentrantMutex::new(()),
                computing: AtomicBool::new(false),
                sources: Mutex::new(Dependencies::new()),
                subscribers: SubscriberSet::new(),
                evaluations: AtomicUsize::new(0),
                weak_self: weak_self.clone(),
            }),
        }
    }

    /// Get the computed's ID as a source.
    pub fn id(&self) -> SourceId {
        self.inner.source_id
    }

    /// Get the subscriber ID for this computed.
    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Get the current value, recomputing if necessary.
    ///
    /// Inside a reactive context this registers the computed as a dependency.
    pub fn get(&self) -> T {
        if let Some(observer) = ReactiveContext::current_observer() {
            self.inner.subscribers.insert(&observer);
            ReactiveContext::track_dependency(self.inner.clone());
        }
        self.inner.read()
    }

    /// Get the current value, recomputing if necessary, without tracking.
    pub fn peek(&self) -> T {
        self.inner.read()
    }

    /// Get the current dirty state.
    pub fn state(&self) -> ComputedState {
        *self.inner.state.lock()
    }

    /// Check if the computed has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }

    /// Number of times the function has been evaluated.
    pub fn evaluation_count(&self) -> usize {
        self.inner.evaluations.load(Ordering::Relaxed)
    }

    /// Get the number of dependents.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Get the number of sources read during the last evaluation.
    pub fn dependency_count(&self) -> usize {
        self.inner.sources.lock().len()
    }

    /// Drop all dependency edges and mark the value dirty.
    ///
    /// Dependents are notified as if a source had changed. The next read
    /// recomputes and re-subscribes.
    pub fn invalidate(&self) {
        self.inner.detach();
        *self.inner.state.lock() = ComputedState::Dirty;
        Runtime::propagate(self.inner.subscribers.snapshot());
    }
}

impl<T> Readable<T> for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Computed::get(self)
    }

    fn peek(&self) -> T {
        Computed::peek(self)
    }
}

impl<T> Clone for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Computed<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.source_id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Create a computed. See [`Computed::new`].
pub fn computed<T, F>(compute: F) -> Computed<T>
where
    T: Clone + Send + Sync + 'static,
    F: Fn() -> T + Send + Sync + 'static,
{
    Computed::new(compute)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
