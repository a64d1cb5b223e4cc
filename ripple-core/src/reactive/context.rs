//! Reactive Context
//!
//! The reactive context tracks which computation is currently running.
//! This enables automatic dependency tracking: when a signal is read,
//! we can register the current computation as a dependent.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! When entering a reactive context (e.g., running a computed or effect), we
//! push the observer onto the stack. When the computation completes, we pop it
//! and hand the collected sources back to the caller.
//!
//! This design supports nested reactive contexts (e.g., a computed that reads
//! from another computed). An untracked frame can be pushed to shield reads
//! from whatever computation encloses them.

use std::cell::RefCell;
use std::sync::{Arc, Weak};

use smallvec::SmallVec;

use super::runtime::Reactive;
use super::subscriber::{Source, SubscriberId};

/// Sources collected while a computation ran.
pub(crate) type Dependencies = SmallVec<[Arc<dyn Source>; 4]>;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// The computation a read should be attributed to.
#[derive(Clone)]
pub struct Observer {
    id: SubscriberId,
    node: Weak<dyn Reactive>,
}

impl Observer {
    /// Create an observer for a reactive node.
    pub fn new(id: SubscriberId, node: Weak<dyn Reactive>) -> Self {
        Self { id, node }
    }

    /// The observing subscriber's ID.
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub(crate) fn node(&self) -> Weak<dyn Reactive> {
        self.node.clone()
    }
}

/// An entry in the reactive context stack.
struct ContextEntry {
    /// `None` for an untracked frame.
    observer: Option<Observer>,
    /// Sources read during this computation, deduplicated by ID.
    dependencies: Dependencies,
}

/// Guard that pops the context when dropped.
///
/// This ensures the context stack is properly maintained even if
/// the computation panics.
pub struct ReactiveContext {
    subscriber_id: Option<SubscriberId>,
    finished: bool,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given observer.
    ///
    /// While this context is active, any signals that are read will
    /// register the observer as a dependent.
    pub fn enter(observer: Observer) -> Self {
        let subscriber_id = Some(observer.id);
        Self::push(Some(observer));
        Self {
            subscriber_id,
            finished: false,
        }
    }

    /// Enter a frame in which reads register nothing.
    pub fn enter_untracked() -> Self {
        Self::push(None);
        Self {
            subscriber_id: None,
            finished: false,
        }
    }

    fn push(observer: Option<Observer>) {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                observer,
                dependencies: SmallVec::new(),
            });
        });
    }

    /// Check if reads are currently being tracked.
    pub fn is_active() -> bool {
        Self::current_observer().is_some()
    }

    /// Get the current observer, if reads are being tracked.
    pub fn current_observer() -> Option<Observer> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.observer.clone())
        })
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .and_then(|entry| entry.observer.as_ref().map(|o| o.id))
        })
    }

    /// Record a dependency on the given source.
    ///
    /// This is called by signals and computeds when they are read.
    pub fn track_dependency(source: Arc<dyn Source>) {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            let Some(entry) = stack.last_mut() else {
                return;
            };
            if entry.observer.is_none() {
                return;
            }
            let id = source.source_id();
            if !entry.dependencies.iter().any(|s| s.source_id() == id) {
                entry.dependencies.push(source);
            }
        });
    }

    /// Leave the context and return the sources read while it was active.
    pub(crate) fn finish(mut self) -> Dependencies {
        self.finished = true;
        Self::pop(self.subscriber_id)
    }

    fn pop(expected: Option<SubscriberId>) -> Dependencies {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();
            match popped {
                Some(entry) => {
                    debug_assert_eq!(
                        entry.observer.as_ref().map(|o| o.id),
                        expected,
                        "ReactiveContext mismatch"
                    );
                    entry.dependencies
                }
                None => SmallVec::new(),
            }
        })
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        if !self.finished {
            Self::pop(self.subscriber_id);
        }
    }
}

/// Run `f` without attributing any of its reads to the enclosing computation.
pub fn untrack<R>(f: impl FnOnce() -> R) -> R {
    let _ctx = ReactiveContext::enter_untracked();
    f()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::SourceId;

    struct TestSource(SourceId);

    impl Source for TestSource {
        fn source_id(&self) -> SourceId {
            self.0
        }
        fn unsubscribe(&self, _subscriber: SubscriberId) {}
    }

    fn observer() -> Observer {
        let node: Weak<dyn Reactive> = Weak::<crate::reactive::effect::EffectInner>::new();
        Observer::new(SubscriberId::new(), node)
    }

    fn source() -> Arc<dyn Source> {
        Arc::new(TestSource(SourceId::new()))
    }

    #[test]
    fn context_tracks_subscriber() {
        let obs = observer();
        let id = obs.id();

        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());

        {
            let _ctx = ReactiveContext::enter(obs);

            assert!(ReactiveContext::is_active());
            assert_eq!(ReactiveContext::current_subscriber(), Some(id));
        }

        // Context should be cleaned up after drop
        assert!(!ReactiveContext::is_active());
        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn context_collects_deduplicated_dependencies() {
        let ctx = ReactiveContext::enter(observer());
        let a = source();
        let b = source();

        ReactiveContext::track_dependency(a.clone());
        ReactiveContext::track_dependency(b.clone());
        ReactiveContext::track_dependency(a.clone());

        let deps = ctx.finish();
        let ids: Vec<_> = deps.iter().map(|s| s.source_id()).collect();
        assert_eq!(ids, vec![a.source_id(), b.source_id()]);
        assert!(!ReactiveContext::is_active());
    }

    #[test]
    fn nested_contexts() {
        let outer = observer();
        let inner = observer();
        let (id1, id2) = (outer.id(), inner.id());

        {
            let _ctx1 = ReactiveContext::enter(outer);
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));

            {
                let _ctx2 = ReactiveContext::enter(inner);
                assert_eq!(ReactiveContext::current_subscriber(), Some(id2));
            }

            // After inner context drops, outer should be current
            assert_eq!(ReactiveContext::current_subscriber(), Some(id1));
        }

        assert!(ReactiveContext::current_subscriber().is_none());
    }

    #[test]
    fn untracked_frame_hides_outer_observer() {
        let ctx = ReactiveContext::enter(observer());

        untrack(|| {
            assert!(!ReactiveContext::is_active());
            ReactiveContext::track_dependency(source());
        });

        assert!(ReactiveContext::is_active());
        assert!(ctx.finish().is_empty());
    }
}
