//! Incremental reconciliation of reactive collections
//!
//! [`map_signal_array`] keeps a mapped vector aligned with a reactive
//! `Vec<T>`; [`array_effect`] runs a per-item effect with cleanup. Both diff
//! each new collection against the previous one and only touch the items
//! that were added or removed: an item that survives a change keeps its
//! mapped value (or its running effect) untouched.
//!
//! Removing an item drops its shadow entry, so a mapped value is disposed by
//! its `Drop` impl and an item effect by its cleanup. Reordering counts as
//! removal plus addition.

mod diff;
mod reconcile;

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::reactive::{untrack, Effect, IntoCleanup, Readable, Signal};

pub use diff::{apply_patch, diff, PatchOp};
use reconcile::{reconcile, ItemCleanup, Reconciler};

/// Mapped view of a reactive collection. Created by [`map_signal_array`].
///
/// Dropping the last handle stops tracking the input and drops every mapped
/// value.
pub struct MappedArray<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    output: Signal<Vec<U>>,
    state: Arc<Mutex<Reconciler<T, U>>>,
    effect: Effect,
}

impl<T, U> MappedArray<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    /// The mapped values, tracked.
    pub fn get(&self) -> Vec<U> {
        self.output.get()
    }

    /// The mapped values, untracked.
    pub fn peek(&self) -> Vec<U> {
        self.output.peek()
    }

    /// The output signal.
    pub fn signal(&self) -> Signal<Vec<U>> {
        self.output.clone()
    }

    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop tracking the input and drop every mapped value.
    ///
    /// The output becomes empty.
    pub fn dispose(&self) {
        untrack(|| self.effect.dispose());
        let drained = self.state.lock().close();
        drop(drained);
        self.output.set(Vec::new());
        tracing::debug!("mapped array disposed");
    }
}

impl<T, U> Readable<Vec<U>> for MappedArray<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    fn get(&self) -> Vec<U> {
        MappedArray::get(self)
    }

    fn peek(&self) -> Vec<U> {
        MappedArray::peek(self)
    }
}

impl<T, U> Clone for MappedArray<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            output: self.output.clone(),
            state: Arc::clone(&self.state),
            effect: self.effect.clone(),
        }
    }
}

impl<T, U> fmt::Debug for MappedArray<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedArray")
            .field("len", &self.len())
            .field("effect", &self.effect)
            .finish()
    }
}

/// Map each item of `input` with `setup`, comparing items with `PartialEq`.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use ripple_core::array::map_signal_array;
/// use ripple_core::reactive::Signal;
///
/// let names = Signal::new(vec!["ada", "grace"]);
/// let cards = map_signal_array(&names, |name| Arc::new(name.to_uppercase()));
/// let ada = cards.get()[0].clone();
///
/// names.set(vec!["ada", "alan", "grace"]);
/// let now = cards.get();
/// assert_eq!(*now[1], "ALAN");
/// assert!(Arc::ptr_eq(&now[0], &ada));
/// ```
pub fn map_signal_array<T, U, S, F>(input: &S, setup: F) -> MappedArray<T, U>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    S: Readable<Vec<T>>,
    F: Fn(&T) -> U + Send + Sync + 'static,
{
    map_signal_array_by(input, setup, T::eq)
}

/// Map each item of `input` with `setup`, comparing items with `eq`.
///
/// `setup` runs untracked, once per added item, with no lock held: it may
/// read the array it is building.
pub fn map_signal_array_by<T, U, S, F, E>(input: &S, setup: F, eq: E) -> MappedArray<T, U>
where
    T: Clone + Send + Sync + 'static,
    U: Clone + Send + Sync + 'static,
    S: Readable<Vec<T>>,
    F: Fn(&T) -> U + Send + Sync + 'static,
    E: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    let output = Signal::new_always_notify(Vec::new());
    let state = Arc::new(Mutex::new(Reconciler::new()));

    let (source, sink, shared) = (input.clone(), output.clone(), state.clone());
    let effect = Effect::new(move || {
        let next = source.get();
        if reconcile(&shared, next, &eq, &setup) {
            let mapped = shared.lock().shadow().to_vec();
            sink.set(mapped);
        }
    });

    MappedArray {
        output,
        state,
        effect,
    }
}

/// Per-item effect over a reactive collection. Created by [`array_effect`].
///
/// Dropping the last handle stops tracking and runs every item cleanup.
pub struct ArrayEffect<T>
where
    T: Clone + Send + Sync + 'static,
{
    state: Arc<Mutex<Reconciler<T, ItemCleanup>>>,
    effect: Effect,
}

impl<T> ArrayEffect<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Number of items with a live effect.
    pub fn len(&self) -> usize {
        self.state.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stop tracking and run every item cleanup.
    pub fn dispose(&self) {
        untrack(|| self.effect.dispose());
        // Cleanups run outside the lock
        let drained = self.state.lock().close();
        drop(drained);
        tracing::debug!("array effect disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.effect.is_disposed()
    }
}

impl<T> Clone for ArrayEffect<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            effect: self.effect.clone(),
        }
    }
}

impl<T> fmt::Debug for ArrayEffect<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayEffect")
            .field("len", &self.len())
            .field("effect", &self.effect)
            .finish()
    }
}

/// Run `f` for every item added to `input`, and its cleanup when the item is
/// removed. Items compare with `PartialEq`.
pub fn array_effect<T, S, F, R>(input: &S, f: F) -> ArrayEffect<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    S: Readable<Vec<T>>,
    F: Fn(&T) -> R + Send + Sync + 'static,
    R: IntoCleanup,
{
    array_effect_by(input, f, T::eq)
}

/// [`array_effect`] with a custom item equality.
pub fn array_effect_by<T, S, F, R, E>(input: &S, f: F, eq: E) -> ArrayEffect<T>
where
    T: Clone + Send + Sync + 'static,
    S: Readable<Vec<T>>,
    F: Fn(&T) -> R + Send + Sync + 'static,
    R: IntoCleanup,
    E: Fn(&T, &T) -> bool + Send + Sync + 'static,
{
    let state = Arc::new(Mutex::new(Reconciler::new()));

    let (source, shared) = (input.clone(), state.clone());
    let effect = Effect::new(move || {
        let next = source.get();
        reconcile(&shared, next, &eq, |item| ItemCleanup::new(f(item).into_cleanup()));
    });

    ArrayEffect { state, effect }
}
