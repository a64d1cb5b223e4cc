//! One-step lag of a reactive value.

use crate::reactive::{Cleanup, Computed, Readable, Signal};

use super::Relay;

/// Track the value `source` held before its latest change.
///
/// `None` until `source` changes for the first time.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Signal;
/// use ripple_core::relay::previous;
///
/// let value = Signal::new(1);
/// let before = previous(&value);
/// assert_eq!(before.get(), None);
///
/// value.set(2);
/// assert_eq!(before.get(), Some(1));
/// ```
pub fn previous<T, S>(source: &S) -> Computed<Option<T>>
where
    T: Clone + Send + Sync + 'static,
    S: Readable<T>,
{
    let input = source.clone();
    let lagged = Relay::from_signal(Signal::new_always_notify(None), move |set, _| {
        let current = input.get();
        // Runs right before the next setup, while `current` is still the old value
        Cleanup::new(move || set.set(Some(current)))
    });
    Computed::new(move || lagged.get())
}

/// Like [`previous`], but starts at `initial` instead of `None`.
pub fn previous_or<T, S>(source: &S, initial: T) -> Computed<T>
where
    T: Clone + Send + Sync + 'static,
    S: Readable<T>,
{
    let input = source.clone();
    let lagged = Relay::from_signal(Signal::new_always_notify(initial), move |set, _| {
        let current = input.get();
        Cleanup::new(move || set.set(current))
    });
    Computed::new(move || lagged.get())
}
