//! Relays and the combinators built on them
//!
//! A [`Relay`] is a signal whose value is produced from outside the graph:
//! a timer, a callback, a finished future. Its setup function receives a
//! [`Setter`] and a [`Getter`] for the backing signal, may read other signals
//! (which makes the relay re-run its setup when they change), and may return
//! a cleanup that tears the producer down.
//!
//! The setup runs inside an effect owned by the relay, so the previous
//! producer is always cleaned up before the next one starts: a relay never
//! has two live producers.
//!
//! [`previous`], [`debounced`], [`derived`] and [`query`] are all a relay
//! plus a [`Computed`](crate::reactive::Computed).

mod previous;
mod debounced;
mod derived;

use std::fmt::Debug;

use crate::reactive::{untrack, Effect, IntoCleanup, Readable, Signal, SourceId};

pub use previous::{previous, previous_or};
pub use debounced::debounced;
pub use derived::{derived, query, AsyncState, Derived, QueryConfig};

/// Writes a relay's value. Handed to the setup function.
pub struct Setter<T>
where
    T: Clone + Send + Sync + 'static,
{
    signal: Signal<T>,
}

impl<T> Setter<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Write the relay's value.
    pub fn set(&self, value: T) {
        self.signal.set(value);
    }

    /// Write a value derived from the current one.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        self.signal.update(f);
    }
}

impl<T> Clone for Setter<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

/// Reads a relay's value without tracking. Handed to the setup function.
///
/// The read is untracked so a relay never depends on its own output.
pub struct Getter<T>
where
    T: Clone + Send + Sync + 'static,
{
    signal: Signal<T>,
}

impl<T> Getter<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Read the relay's current value.
    pub fn get(&self) -> T {
        self.signal.peek()
    }
}

impl<T> Clone for Getter<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
        }
    }
}

/// A signal driven by an externally produced, reactively re-armed source.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Cleanup, Signal};
/// use ripple_core::relay::Relay;
///
/// let multiplier = Signal::new(2);
/// let factor = multiplier.clone();
/// let relay = Relay::new(0, move |set, _get| {
///     // Stands in for a listener registration
///     set.set(10 * factor.get());
///     Cleanup::new(|| { /* unregister */ })
/// });
///
/// assert_eq!(relay.get(), 20);
/// multiplier.set(3);
/// assert_eq!(relay.get(), 30);
/// ```
pub struct Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    signal: Signal<T>,
    effect: Effect,
}

impl<T> Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a relay over a fresh signal holding `initial`.
    pub fn new<F, R>(initial: T, setup: F) -> Self
    where
        T: PartialEq,
        F: Fn(Setter<T>, Getter<T>) -> R + Send + Sync + 'static,
        R: IntoCleanup,
    {
        Self::from_signal(Signal::new(initial), setup)
    }

    /// Create a relay that drives an existing signal.
    ///
    /// The setup runs once immediately.
    pub fn from_signal<F, R>(signal: Signal<T>, setup: F) -> Self
    where
        F: Fn(Setter<T>, Getter<T>) -> R + Send + Sync + 'static,
        R: IntoCleanup,
    {
        let backing = signal.clone();
        let effect = Effect::new(move || {
            tracing::debug!(relay = backing.id().raw(), "running relay setup");
            setup(
                Setter {
                    signal: backing.clone(),
                },
                Getter {
                    signal: backing.clone(),
                },
            )
        });
        Self { signal, effect }
    }

    /// Get the relay's ID (that of its backing signal).
    pub fn id(&self) -> SourceId {
        self.signal.id()
    }

    /// Read the value, registering a dependency in the current context.
    pub fn get(&self) -> T {
        self.signal.get()
    }

    /// Read the value without tracking.
    pub fn peek(&self) -> T {
        self.signal.peek()
    }

    /// The backing signal.
    pub fn signal(&self) -> Signal<T> {
        self.signal.clone()
    }

    /// Number of times the setup has run.
    pub fn setup_count(&self) -> usize {
        self.effect.run_count()
    }

    /// Tear down the current producer and stop re-running the setup.
    ///
    /// The relay keeps its last value.
    pub fn dispose(&self) {
        untrack(|| self.effect.dispose());
    }

    /// Check if the relay has been disposed.
    pub fn is_disposed(&self) -> bool {
        self.effect.is_disposed()
    }
}

impl<T> Readable<T> for Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn get(&self) -> T {
        Relay::get(self)
    }

    fn peek(&self) -> T {
        Relay::peek(self)
    }
}

impl<T> Clone for Relay<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            signal: self.signal.clone(),
            effect: self.effect.clone(),
        }
    }
}

impl<T> Debug for Relay<T>
where
    T: Clone + Send + Sync + Debug + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("signal", &self.signal)
            .field("effect", &self.effect)
            .finish()
    }
}

/// Create a relay. See [`Relay::new`].
pub fn relay<T, F, R>(initial: T, setup: F) -> Relay<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    F: Fn(Setter<T>, Getter<T>) -> R + Send + Sync + 'static,
    R: IntoCleanup,
{
    Relay::new(initial, setup)
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
