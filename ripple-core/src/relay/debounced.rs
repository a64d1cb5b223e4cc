//! Time-debounced view of a reactive value.

use std::time::Duration;

use tokio::runtime::Handle;

use crate::error::Result;
use crate::reactive::{Computed, Readable};
use crate::timer;

use super::Relay;

/// Follow `source`, but only commit a value once it has stayed unchanged for
/// `delay`.
///
/// Every change re-arms the timer, so a burst of writes closer together than
/// `delay` commits only the last one, `delay` after it was written. The timer
/// runs on the tokio runtime current at construction.
///
/// # Errors
///
/// [`ReactiveError::NoRuntime`](crate::error::ReactiveError::NoRuntime) when
/// called outside a tokio runtime.
pub fn debounced<T, S>(source: &S, delay: Duration) -> Result<Computed<T>>
where
    T: Clone + PartialEq + Send + Sync + 'static,
    S: Readable<T>,
{
    let handle = Handle::try_current()?;
    let input = source.clone();

    let settled = Relay::new(source.peek(), move |set, _| {
        let latest = input.get();
        timer::timeout_on(&handle, delay, move || set.set(latest))
    });
    Ok(Computed::new(move || settled.get()))
}
