//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, computeds, and
//! effects, plus the batching runtime that schedules them.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a computed or effect), the signal
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are notified.
//!
//! ## Computeds
//!
//! A Computed is a derived value that caches its result. It is marked dirty
//! when one of its dependencies changes and re-evaluates on the next read.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its
//! dependencies change. Effects are used to synchronize reactive state with
//! external systems, and may hand back a cleanup to run before their next run.
//!
//! ## Batches
//!
//! A batch defers effect notification until a group of writes completes, so
//! an effect touched by several writes runs once.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to automatically
//! detect dependencies. When a signal is read, we check if there is an active
//! tracking context and, if so, register the dependency. Subscriber sets hold
//! weak references; ownership of effects stays with whoever holds the handle.

mod signal;
mod context;
mod subscriber;
mod computed;
mod effect;
mod runtime;
mod scope;

pub use signal::{signal, Readable, Signal};
pub use context::{untrack, Observer, ReactiveContext};
pub use subscriber::{Source, SourceId, SubscriberId};
pub use computed::{computed, Computed, ComputedState};
pub use effect::{effect, Cleanup, Effect, IntoCleanup};
pub use runtime::{batch, Reactive, Runtime};
pub use scope::Scope;
