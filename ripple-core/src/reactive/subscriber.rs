//! Subscriber types for the reactive system.
//!
//! A subscriber is any computation that depends on reactive values: computeds
//! and effects. A source is anything a subscriber can depend on: signals and
//! computeds. Computeds are both.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::Mutex;

use super::context::Observer;
use super::runtime::Reactive;

/// Unique identifier for a subscriber.
///
/// Each subscriber (computed, effect, or other reactive computation) gets a
/// unique ID when created. This ID keys subscriber sets and the pending-effect
/// queue, which is how duplicate subscriptions and duplicate runs are avoided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    ///
    /// Uses an atomic counter to ensure uniqueness across threads.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a source of reactive values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u64);

impl SourceId {
    /// Generate a new unique source ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for SourceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Something a subscriber can depend on.
///
/// Subscribers keep the sources they read during their last run so they can
/// detach themselves before re-running or on disposal.
pub trait Source: Send + Sync {
    /// The source's unique ID.
    fn source_id(&self) -> SourceId;

    /// Remove a subscriber from this source.
    fn unsubscribe(&self, subscriber: SubscriberId);
}

/// Ordered set of subscribers held by a source.
///
/// Entries are weak: a source never keeps a subscriber alive. Insertion order
/// is preserved so notification order is deterministic.
#[derive(Default)]
pub(crate) struct SubscriberSet {
    entries: Mutex<IndexMap<SubscriberId, Weak<dyn Reactive>>>,
}

impl SubscriberSet {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&self, observer: &Observer) {
        self.entries
            .lock()
            .entry(observer.id())
            .or_insert_with(|| observer.node());
    }

    pub(crate) fn remove(&self, id: SubscriberId) {
        self.entries.lock().shift_remove(&id);
    }

    /// Upgrade every live subscriber, pruning the ones that have been dropped.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn Reactive>> {
        let mut entries = self.entries.lock();
        entries.retain(|_, node| node.strong_count() > 0);
        entries.values().filter_map(Weak::upgrade).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
