//! Ripple Core
//!
//! This crate provides a fine-grained reactive runtime. It implements:
//!
//! - Reactive primitives (signals, computeds, effects, batches, scopes)
//! - Relays: signals driven by timers, callbacks and futures
//! - Combinators built on relays (`previous`, `debounced`, `derived`, `query`)
//! - Incremental reconciliation of reactive collections
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Core reactive primitives and dependency tracking
//! - `relay`: Externally driven signals and the combinators built on them
//! - `timer`: Tokio-backed timeouts and intervals for relay producers
//! - `array`: Edit-script diffing and per-item mapping/effects over collections
//! - `config`: Per-thread runtime configuration
//! - `error`: Error types
//!
//! # Example
//!
//! ```rust
//! use std::sync::atomic::{AtomicI32, Ordering};
//! use std::sync::Arc;
//! use ripple_core::reactive::{batch, Computed, Effect, Signal};
//!
//! // Create a signal
//! let count = Signal::new(0);
//!
//! // Create a derived value
//! let source = count.clone();
//! let doubled = Computed::new(move || source.get() * 2);
//!
//! // Create an effect
//! let seen = Arc::new(AtomicI32::new(0));
//! let (reader, sink) = (doubled.clone(), seen.clone());
//! let _effect = Effect::new(move || {
//!     sink.store(reader.get(), Ordering::SeqCst);
//! });
//!
//! // Update the signal; the effect runs once for the whole batch
//! batch(|| {
//!     count.set(4);
//!     count.set(5);
//! });
//! assert_eq!(seen.load(Ordering::SeqCst), 10);
//! ```

pub mod array;
pub mod config;
pub mod error;
pub mod reactive;
pub mod relay;
pub mod timer;

pub use config::RuntimeConfig;
pub use error::{ReactiveError, Result};
pub use reactive::{batch, untrack, Computed, Effect, Scope, Signal};
pub use relay::Relay;
