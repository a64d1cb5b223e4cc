//! Signal Implementation
//!
//! A Signal is the fundamental reactive primitive. It holds a value and
//! tracks which computations depend on it.
//!
//! # How Signals Work
//!
//! 1. When a signal is read with [`Signal::get`] within a reactive context
//!    (computed/effect), the signal registers that context as a subscriber.
//!    [`Signal::peek`] reads without registering anything.
//!
//! 2. When a signal is written with a value its equality check considers
//!    different, the value is stored and all subscribers are handed to the
//!    runtime for propagation.
//!
//! 3. Propagation marks computeds stale and queues effects. Outside a batch
//!    the queue is flushed before `set` returns.
//!
//! # Equality
//!
//! [`Signal::new`] compares with `PartialEq`: writing an equal value is a
//! no-op. [`Signal::new_with_equality`] takes a custom comparison and
//! [`Signal::new_always_notify`] skips comparison entirely, which is what
//! signals over non-comparable values (closures, handles) use.
//!
//! # Thread Safety
//!
//! Signals are `Send + Sync` and cheap to clone; clones share state. The value
//! is protected by a `RwLock`, the subscriber set by a `Mutex`.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::context::untrack;
use super::effect::Effect;
use super::runtime::Runtime;
use super::subscriber::{Source, SourceId, SubscriberId, SubscriberSet};

/// Values that can be read reactively.
///
/// Implemented by [`Signal`], [`Computed`](super::Computed) and
/// [`Relay`](crate::relay::Relay) so combinators can accept any of them.
pub trait Readable<T>: Clone + Send + Sync + 'static {
    /// Read the value, registering a dependency in the current context.
    fn get(&self) -> T;

    /// Read the value without registering a dependency.
    fn peek(&self) -> T;
}

fn partial_eq<T: PartialEq>(a: &T, b: &T) -> bool {
    a == b
}

pub(crate) struct SignalInner<T> {
    id: SourceId,
    value: RwLock<T>,
    equals: Option<fn(&T, &T) -> bool>,
    subscribers: SubscriberSet,
}

impl<T> Source for SignalInner<T>
where
    T: Send + Sync + 'static,
{
    fn source_id(&self) -> SourceId {
        self.id
    }

    fn unsubscribe(&self, subscriber: SubscriberId) {
        self.subscribers.remove(subscriber);
    }
}

/// A reactive signal holding a value of type T.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Signal;
///
/// let count = Signal::new(0);
///
/// // Read the value
/// assert_eq!(count.get(), 0);
///
/// // Update the value (notifies subscribers)
/// count.set(5);
/// assert_eq!(count.peek(), 5);
/// ```
pub struct Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<SignalInner<T>>,
}

impl<T> Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new signal that ignores writes of an equal value.
    pub fn new(value: T) -> Self
    where
        T: PartialEq,
    {
        Self::build(value, Some(partial_eq::<T>))
    }

    /// Create a signal with a custom equality check.
    pub fn new_with_equality(value: T, equals: fn(&T, &T) -> bool) -> Self {
        Self::build(value, Some(equals))
    }

    /// Create a signal that notifies on every write.
    pub fn new_always_notify(value: T) -> Self {
        Self::build(value, None)
    }

    fn build(value: T, equals: Option<fn(&T, &T) -> bool>) -> Self {
        Self {
            inner: Arc::new(SignalInner {
                id: SourceId::new(),
                value: RwLock::new(value),
                equals,
                subscribers: SubscriberSet::new(),
            }),
        }
    }

    /// Get the signal's unique ID.
    pub fn id(&self) -> SourceId {
        self.inner.id
    }

    /// Get the current value.
    ///
    /// If called within a reactive context, this also registers the
    /// current computation as a subscriber.
    pub fn get(&self) -> T {
        self.track();
        self.inner.value.read().clone()
    }

    /// Get the current value without tracking dependencies.
    pub fn peek(&self) -> T {
        self.inner.value.read().clone()
    }

    /// Run `f` against the current value without cloning it. Tracked.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.read())
    }

    fn track(&self) {
        if let Some(observer) = ReactiveContext::current_observer() {
            self.inner.subscribers.insert(&observer);
            ReactiveContext::track_dependency(self.inner.clone());
        }
    }

    /// Set a new value and notify subscribers.
    ///
    /// Returns without notifying if the equality check reports the new value
    /// equal to the current one.
    pub fn set(&self, value: T) {
        if let Some(equals) = self.inner.equals {
            if equals(&self.inner.value.read(), &value) {
                return;
            }
        }

        // The old value is dropped after the lock is released: its destructor
        // may read this signal.
        let previous = std::mem::replace(&mut *self.inner.value.write(), value);
        drop(previous);

        if Runtime::config().trace_writes {
            tracing::trace!(signal = self.inner.id.raw(), "signal written");
        }
        self.notify();
    }

    /// Update the value using a function.
    ///
    /// This is useful for updates that depend on the current value.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&T) -> T,
    {
        let new_value = f(&self.inner.value.read());
        self.set(new_value);
    }

    /// Notify all subscribers that the value has changed.
    fn notify(&self) {
        Runtime::propagate(self.inner.subscribers.snapshot());
    }

    /// Call `listener` with the current value now and after every change.
    ///
    /// The listener's own reads are not tracked. Dropping or disposing the
    /// returned effect unsubscribes.
    pub fn subscribe<F>(&self, listener: F) -> Effect
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let signal = self.clone();
        Effect::new(move || {
            let value = signal.get();
            untrack(|| listener(&value));
        })
    }

    /// Get the number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }
}

impl<T> Readable<T> for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Signal::get(self)
    }

    fn peek(&self) -> T {
        Signal::peek(self)
    }
}

impl<T> Clone for Signal<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Signal<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.read())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

/// Create a signal. See [`Signal::new`].
pub fn signal<T>(value: T) -> Signal<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    Signal::new(value)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Mutex;

    #[test]
    fn signal_get_and_set() {
        let signal = Signal::new(0);
        assert_eq!(signal.get(), 0);

        signal.set(42);
        assert_eq!(signal.get(), 42);
    }

    #[test]
    fn signal_update() {
        let signal = Signal::new(10);
        signal.update(|v| v + 5);
        assert_eq!(signal.get(), 15);
    }

    #[test]
    fn signal_subscribe_sees_every_change() {
        let signal = Signal::new(0);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let subscription = signal.subscribe(move |v| seen_clone.lock().unwrap().push(*v));

        signal.set(1);
        signal.set(2);
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);

        subscription.dispose();
        signal.set(3);
        // Should not have been called again
        assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2]);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn writing_equal_value_is_a_no_op() {
        let signal = Signal::new(7);
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let _sub = signal.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.set(7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        signal.set(8);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn always_notify_signal_fires_on_equal_write() {
        let signal = Signal::new_always_notify(7);
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();
        let _sub = signal.subscribe(move |_| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        signal.set(7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn custom_equality_decides_what_counts_as_a_change() {
        fn same_len(a: &String, b: &String) -> bool {
            a.len() == b.len()
        }

        let signal = Signal::new_with_equality("abc".to_string(), same_len);
        signal.set("xyz".to_string());
        assert_eq!(signal.peek(), "abc");

        signal.set("abcd".to_string());
        assert_eq!(signal.peek(), "abcd");
    }

    #[test]
    fn peek_does_not_subscribe() {
        let signal = Signal::new(1);
        let reader = signal.clone();
        let _effect = Effect::new(move || {
            reader.peek();
        });
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn signal_clone_shares_state() {
        let signal1 = Signal::new(0);
        let signal2 = signal1.clone();

        signal1.set(42);
        assert_eq!(signal2.get(), 42);

        signal2.set(100);
        assert_eq!(signal1.get(), 100);
    }

    #[test]
    fn signal_ids_are_unique() {
        let s1 = Signal::new(0);
        let s2 = Signal::new(0);
        let s3 = Signal::new(0);

        assert_ne!(s1.id(), s2.id());
        assert_ne!(s2.id(), s3.id());
        assert_ne!(s1.id(), s3.id());
    }
}
