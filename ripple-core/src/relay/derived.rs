//! Async results projected into the graph.
//!
//! [`derived`] runs a future every time the signals read while creating it
//! change, and exposes its progress as `data`, `is_loading` and `error`.
//! Each run bumps a generation counter when it is superseded; a result whose
//! generation is no longer current is dropped, so a slow early call can never
//! overwrite a faster later one. The check and the write happen under the
//! generation lock, which the re-run also takes, so a result finishing on a
//! worker thread cannot land between a re-run's bump and its `loading` write.
//!
//! A future that panics settles as [`AsyncState::aborted`]; the panic is
//! logged at `error` level.

use std::cell::Cell;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::ReentrantMutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;

use crate::error::Result;
use crate::reactive::{Cleanup, Computed, Signal};

use super::{Relay, Setter};

/// Generation of the latest call. Reentrant because a commit can propagate
/// into a re-run on the same thread.
type Generation = Arc<ReentrantMutex<Cell<u64>>>;

/// Progress of the latest async call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AsyncState<T, E> {
    pub data: Option<T>,
    pub is_loading: bool,
    pub error: Option<E>,
}

impl<T, E> AsyncState<T, E> {
    /// A call is in flight and nothing has settled yet.
    pub fn loading() -> Self {
        Self {
            data: None,
            is_loading: true,
            error: None,
        }
    }

    /// The call finished with `outcome`.
    pub fn settled(outcome: std::result::Result<T, E>) -> Self {
        match outcome {
            Ok(data) => Self {
                data: Some(data),
                is_loading: false,
                error: None,
            },
            Err(error) => Self {
                data: None,
                is_loading: false,
                error: Some(error),
            },
        }
    }

    /// The call ended without a result, e.g. because its future panicked.
    pub fn aborted() -> Self {
        Self {
            data: None,
            is_loading: false,
            error: None,
        }
    }
}

/// Write `state` if `started` is still the current generation.
fn commit<T, E>(
    generation: &Generation,
    started: u64,
    set: &Setter<AsyncState<T, E>>,
    state: AsyncState<T, E>,
) where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    let current = generation.lock();
    if current.get() != started {
        tracing::debug!(generation = started, "discarding superseded result");
        return;
    }
    set.set(state);
}

/// Handle returned by [`derived`] and [`query`].
///
/// Dropping the last handle stops re-running and discards in-flight results.
pub struct Derived<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    relay: Relay<AsyncState<T, E>>,
    data: Computed<Option<T>>,
    is_loading: Computed<bool>,
    error: Computed<Option<E>>,
}

impl<T, E> Derived<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Result of the latest call, `None` while loading or after an error.
    pub fn data(&self) -> Computed<Option<T>> {
        self.data.clone()
    }

    /// Whether the latest call is still in flight.
    pub fn is_loading(&self) -> Computed<bool> {
        self.is_loading.clone()
    }

    /// Error of the latest call.
    pub fn error(&self) -> Computed<Option<E>> {
        self.error.clone()
    }

    /// The whole state, tracked.
    pub fn state(&self) -> AsyncState<T, E> {
        self.relay.get()
    }

    /// Number of calls started so far.
    pub fn run_count(&self) -> usize {
        self.relay.setup_count()
    }

    /// Stop re-running. Results still in flight are discarded.
    pub fn dispose(&self) {
        self.relay.dispose();
    }
}

impl<T, E> Clone for Derived<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            relay: self.relay.clone(),
            data: self.data.clone(),
            is_loading: self.is_loading.clone(),
            error: self.error.clone(),
        }
    }
}

impl<T, E> fmt::Debug for Derived<T, E>
where
    T: Clone + Send + Sync + fmt::Debug + 'static,
    E: Clone + Send + Sync + fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Derived")
            .field("state", &self.relay.peek())
            .field("run_count", &self.run_count())
            .finish()
    }
}

/// Track an async computation.
///
/// `get_future` runs synchronously inside the relay setup, so every signal it
/// reads before returning its future is a dependency. When one changes, the
/// state resets to loading and a new future starts; the old one keeps running
/// but its result is ignored.
///
/// # Errors
///
/// [`ReactiveError::NoRuntime`](crate::error::ReactiveError::NoRuntime) when
/// called outside a tokio runtime.
pub fn derived<T, E, F, Fut>(get_future: F) -> Result<Derived<T, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
{
    let handle = Handle::try_current()?;
    let generation: Generation = Arc::new(ReentrantMutex::new(Cell::new(0)));

    let relay = Relay::from_signal(
        Signal::new_always_notify(AsyncState::loading()),
        move |set, _| {
            let started = generation.lock().get();
            set.set(AsyncState::loading());

            let task = handle.spawn(get_future());
            let current = generation.clone();
            handle.spawn(async move {
                let state = match task.await {
                    Ok(outcome) => AsyncState::settled(outcome),
                    Err(err) if err.is_panic() => {
                        tracing::error!(generation = started, "derived future panicked");
                        AsyncState::aborted()
                    }
                    Err(_) => return,
                };
                commit(&current, started, &set, state);
            });

            let generation = generation.clone();
            Cleanup::new(move || {
                let current = generation.lock();
                current.set(current.get() + 1);
            })
        },
    );

    let state = relay.signal();
    let data = Computed::new(move || state.with(|s| s.data.clone()));
    let state = relay.signal();
    let is_loading = Computed::new(move || state.with(|s| s.is_loading));
    let state = relay.signal();
    let error = Computed::new(move || state.with(|s| s.error.clone()));

    Ok(Derived {
        relay,
        data,
        is_loading,
        error,
    })
}

/// What [`query`] runs: a key for diagnostics and the call itself.
pub struct QueryConfig<Q> {
    pub query_key: String,
    pub query_fn: Q,
}

impl<Q> QueryConfig<Q> {
    pub fn new(query_key: impl Into<String>, query_fn: Q) -> Self {
        Self {
            query_key: query_key.into(),
            query_fn,
        }
    }
}

/// [`derived`] over a [`QueryConfig`] produced by `get_config`.
///
/// Signals read by `get_config` (typically the inputs baked into the key)
/// re-run the query.
pub fn query<T, E, C, Q, Fut>(get_config: C) -> Result<Derived<T, E>>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
    C: Fn() -> QueryConfig<Q> + Send + Sync + 'static,
    Q: FnOnce() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>> + Send + 'static,
{
    derived(move || {
        let config = get_config();
        tracing::debug!(query_key = %config.query_key, "running query");
        (config.query_fn)()
    })
}
