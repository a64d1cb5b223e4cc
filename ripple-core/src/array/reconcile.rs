//! Shadow state shared by [`MappedArray`](super::MappedArray) and
//! [`ArrayEffect`](super::ArrayEffect).

use std::fmt;

use parking_lot::Mutex;

use crate::reactive::{untrack, Cleanup};

use super::diff::{apply_patch, diff};

/// Last seen collection plus one shadow entry per item, kept aligned.
pub(crate) struct Reconciler<T, S> {
    snapshot: Vec<T>,
    shadow: Vec<S>,
    closed: bool,
}

impl<T, S> Reconciler<T, S>
where
    T: Clone,
{
    pub(crate) fn new() -> Self {
        Self {
            snapshot: Vec::new(),
            shadow: Vec::new(),
            closed: false,
        }
    }

    pub(crate) fn shadow(&self) -> &[S] {
        &self.shadow
    }

    /// Number of items in the last seen collection.
    pub(crate) fn len(&self) -> usize {
        self.snapshot.len()
    }

    /// Stop reconciling and hand back every entry, so the caller can drop
    /// them after releasing the lock.
    pub(crate) fn close(&mut self) -> Vec<S> {
        self.closed = true;
        self.snapshot.clear();
        std::mem::take(&mut self.shadow)
    }
}

/// Bring the shadow in `shared` in line with `next`. Returns whether anything
/// was added or removed.
///
/// Removed entries are dropped before any entry is created. Both happen with
/// the lock released, so item callbacks may read the collection back; `create`
/// runs untracked.
pub(crate) fn reconcile<T, S>(
    shared: &Mutex<Reconciler<T, S>>,
    next: Vec<T>,
    eq: impl Fn(&T, &T) -> bool,
    create: impl FnMut(&T) -> S,
) -> bool
where
    T: Clone,
{
    let items = next.len();
    let (patch, mut shadow) = {
        let mut state = shared.lock();
        if state.closed {
            return false;
        }
        let patch = diff(&state.snapshot, &next, eq);
        state.snapshot = next;
        if patch.is_empty() {
            return false;
        }
        (patch, std::mem::take(&mut state.shadow))
    };

    tracing::trace!(ops = patch.len(), items, "reconciling collection");
    untrack(|| apply_patch(&mut shadow, &patch, create));

    let mut state = shared.lock();
    if state.closed {
        // Closed by a callback; the entries go now
        drop(state);
        drop(shadow);
        return false;
    }
    state.shadow = shadow;
    true
}

/// Per-item cleanup that runs when the shadow entry is dropped.
pub(crate) struct ItemCleanup(Option<Cleanup>);

impl ItemCleanup {
    pub(crate) fn new(cleanup: Option<Cleanup>) -> Self {
        Self(cleanup)
    }
}

impl Drop for ItemCleanup {
    fn drop(&mut self) {
        if let Some(cleanup) = self.0.take() {
            cleanup.run();
        }
    }
}

impl fmt::Debug for ItemCleanup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ItemCleanup")
            .field(&self.0.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn unchanged_collection_reports_no_change() {
        let rec: Mutex<Reconciler<u8, u8>> = Mutex::new(Reconciler::new());
        assert!(reconcile(&rec, vec![1, 2], |a, b| a == b, |v| *v));
        assert!(!reconcile(&rec, vec![1, 2], |a, b| a == b, |v| *v));
        assert_eq!(rec.lock().shadow(), &[1, 2]);
    }

    #[test]
    fn dropped_entries_run_their_cleanup_once() {
        let runs = Arc::new(AtomicUsize::new(0));
        let rec = Mutex::new(Reconciler::new());
        let counter = runs.clone();
        reconcile(&rec, vec!['a', 'b'], |a, b| a == b, |_| {
            let counter = counter.clone();
            ItemCleanup::new(Some(Cleanup::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })))
        });

        reconcile(&rec, vec!['a'], |a, b| a == b, |_| ItemCleanup::new(None));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert_eq!(rec.lock().len(), 1);

        drop(rec);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn callbacks_can_read_the_shared_state() {
        let rec: Arc<Mutex<Reconciler<u8, usize>>> = Arc::new(Mutex::new(Reconciler::new()));
        let inner = rec.clone();
        reconcile(&rec, vec![1, 2, 3], |a, b| a == b, |_| inner.lock().len());

        assert_eq!(rec.lock().shadow(), &[3, 3, 3]);
    }

    #[test]
    fn closing_mid_reconcile_drops_the_new_entries() {
        let runs = Arc::new(AtomicUsize::new(0));
        let rec = Arc::new(Mutex::new(Reconciler::new()));
        let (inner, counter) = (rec.clone(), runs.clone());

        let changed = reconcile(&rec, vec!['a', 'b'], |a, b| a == b, |_| {
            drop(inner.lock().close());
            let counter = counter.clone();
            ItemCleanup::new(Some(Cleanup::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })))
        });

        assert!(!changed);
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        assert_eq!(rec.lock().len(), 0);
        assert!(!reconcile(&rec, vec!['c'], |a, b| a == b, |_| ItemCleanup::new(None)));
    }
}
