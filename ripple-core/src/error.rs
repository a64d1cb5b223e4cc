//! Error types for the reactive runtime.
//!
//! Most reactive operations cannot fail: reads, writes and effect runs are
//! infallible by construction. The errors here cover the edges where the
//! runtime meets the outside world (an async runtime, a configuration file)
//! and the diagnostics it emits when a graph refuses to settle.

use thiserror::Error;

use crate::reactive::SubscriberId;

/// Errors surfaced by the reactive runtime.
#[derive(Debug, Error)]
pub enum ReactiveError {
    /// A timer or async derivation was created outside a tokio runtime.
    #[error("no tokio runtime available to drive timers and tasks: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// An effect kept re-scheduling itself within a single flush.
    #[error("effect {subscriber:?} re-ran {runs} times in one flush without settling")]
    CycleDetected {
        /// The effect that was cut off.
        subscriber: SubscriberId,
        /// How many times it ran before being dropped from the flush.
        runs: usize,
    },

    /// The runtime configuration could not be parsed.
    #[error("invalid runtime configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ReactiveError>;
