//! Integration Tests for the Reactive Runtime
//!
//! These tests drive signals, computeds, effects, relays and collection
//! reconciliation together through the public API.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ripple_core::array::{array_effect, map_signal_array};
use ripple_core::reactive::{batch, untrack, Cleanup, Computed, Effect, Runtime, Scope, Signal};
use ripple_core::relay::{debounced, previous, Relay};
use ripple_core::{timer, RuntimeConfig};

/// A batch of writes to one signal re-runs a dependent effect once.
#[test]
fn batched_writes_run_effect_once() {
    let count = Signal::new(0);
    let runs = Arc::new(AtomicUsize::new(0));
    let (source, counter) = (count.clone(), runs.clone());

    let _effect = Effect::new(move || {
        source.get();
        counter.fetch_add(1, Ordering::SeqCst);
    });

    batch(|| {
        count.set(1);
        count.set(2);
        count.set(3);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    });
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Computeds stay lazy and cached through a chain.
#[test]
fn computed_chain_is_lazy_and_cached() {
    let base = Signal::new(5);
    let evaluations = Arc::new(AtomicUsize::new(0));

    let (source, counter) = (base.clone(), evaluations.clone());
    let doubled = Computed::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        source.get() * 2
    });
    let inner = doubled.clone();
    let plus_ten = Computed::new(move || inner.get() + 10);

    assert_eq!(plus_ten.get(), 20);
    assert_eq!(plus_ten.get(), 20);
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);

    base.set(10);
    assert_eq!(evaluations.load(Ordering::SeqCst), 1);
    assert_eq!(plus_ten.get(), 30);
    assert_eq!(evaluations.load(Ordering::SeqCst), 2);
}

/// Effects reading several computeds over one signal see a consistent view.
#[test]
fn diamond_settles_with_one_run_per_write() {
    let base = Signal::new(1);
    let (a, b) = (base.clone(), base.clone());
    let left = Computed::new(move || a.get() + 1);
    let right = Computed::new(move || b.get() * 10);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (l, r, sink) = (left.clone(), right.clone(), seen.clone());
    let _effect = Effect::new(move || {
        sink.lock().unwrap().push((l.get(), r.get()));
    });

    base.set(2);
    assert_eq!(*seen.lock().unwrap(), vec![(2, 10), (3, 20)]);
}

/// A panic inside a batch still flushes the effects it queued.
#[test]
fn panicking_batch_still_flushes() {
    let count = Signal::new(0);
    let seen = Arc::new(AtomicI32::new(-1));
    let (source, sink) = (count.clone(), seen.clone());
    let _effect = Effect::new(move || {
        sink.store(source.get(), Ordering::SeqCst);
    });

    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        batch(|| {
            count.set(7);
            panic!("write failed halfway");
        })
    }));

    assert!(result.is_err());
    assert_eq!(seen.load(Ordering::SeqCst), 7);
    assert!(!Runtime::is_batching());
}

/// An effect that keeps invalidating itself is cut off at the configured cap.
#[test]
fn runaway_effect_is_cut_off() {
    Runtime::configure(RuntimeConfig::default().with_max_effect_reruns(10));

    let count = Signal::new(0);
    let source = count.clone();
    let effect = Effect::new(move || {
        let value = source.get();
        source.set(value + 1);
    });

    // One initial run plus the capped reruns
    assert_eq!(effect.run_count(), 11);
    assert_eq!(count.peek(), 11);
    assert_eq!(Runtime::pending_count(), 0);

    Runtime::configure(RuntimeConfig::default());
}

/// Untracked reads inside an effect do not subscribe it.
#[test]
fn untracked_reads_do_not_subscribe() {
    let tracked = Signal::new(0);
    let ignored = Signal::new(0);
    let runs = Arc::new(AtomicUsize::new(0));
    let (t, i, counter) = (tracked.clone(), ignored.clone(), runs.clone());

    let _effect = Effect::new(move || {
        t.get();
        untrack(|| i.get());
        counter.fetch_add(1, Ordering::SeqCst);
    });

    ignored.set(1);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
    tracked.set(1);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

/// Disposing a scope tears down every effect created through it.
#[test]
fn scope_disposes_its_effects() {
    let count = Signal::new(0);
    let cleanups = Arc::new(AtomicUsize::new(0));
    let scope = Scope::new();

    for _ in 0..3 {
        let (source, counter) = (count.clone(), cleanups.clone());
        let _effect = scope.effect(move || {
            source.get();
            let counter = counter.clone();
            Cleanup::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
        });
    }
    assert_eq!(count.subscriber_count(), 3);

    scope.dispose();
    assert_eq!(cleanups.load(Ordering::SeqCst), 3);
    assert_eq!(count.subscriber_count(), 0);
}

/// A relay-backed counter stops when its enabling signal flips off.
#[tokio::test(start_paused = true)]
async fn relay_counter_stops_when_disabled() {
    let enabled = Signal::new(true);
    let gate = enabled.clone();

    let counter = Relay::new(0u32, move |set, get| {
        if !gate.get() {
            return None;
        }
        timer::interval(Duration::from_millis(1000), move || set.set(get.get() + 1)).ok()
    });

    tokio::time::sleep(Duration::from_millis(2500)).await;
    assert_eq!(counter.get(), 2);

    enabled.set(false);
    tokio::time::sleep(Duration::from_millis(5000)).await;
    assert_eq!(counter.get(), 2);
    assert_eq!(counter.setup_count(), 2);
}

/// `previous` and `debounced` compose over the same source.
#[tokio::test(start_paused = true)]
async fn previous_and_debounced_over_one_source() {
    let query = Signal::new(String::from("r"));
    let last = previous(&query);
    let settled = debounced(&query, Duration::from_millis(300)).unwrap();

    query.set("ru".into());
    tokio::time::sleep(Duration::from_millis(100)).await;
    query.set("rus".into());

    assert_eq!(last.get(), Some("ru".to_string()));
    assert_eq!(settled.get(), "r");

    tokio::time::sleep(Duration::from_millis(350)).await;
    assert_eq!(settled.get(), "rus");
}

/// Mapped items survive unrelated edits; per-item effects follow membership.
#[test]
fn collection_reconciliation_end_to_end() {
    let todos = Signal::new(vec!["write", "test", "ship"]);
    let labels = map_signal_array(&todos, |todo| Arc::new(format!("[ ] {todo}")));
    let active = Arc::new(Mutex::new(Vec::new()));

    let registry = active.clone();
    let _watchers = array_effect(&todos, move |todo| {
        registry.lock().unwrap().push(*todo);
        let (registry, todo) = (registry.clone(), *todo);
        Cleanup::new(move || registry.lock().unwrap().retain(|t| *t != todo))
    });

    let first = labels.get();
    todos.set(vec!["write", "ship", "celebrate"]);
    let second = labels.get();

    assert!(Arc::ptr_eq(&first[0], &second[0]));
    assert!(Arc::ptr_eq(&first[2], &second[1]));
    assert_eq!(*second[2], "[ ] celebrate");
    assert_eq!(*active.lock().unwrap(), vec!["write", "ship", "celebrate"]);
}

/// An effect that panics mid-flush neither strands the effects queued behind
/// it nor stays subscribed.
#[test]
fn panicking_effect_does_not_strand_the_flush() {
    let count = Signal::new(0);
    let source = count.clone();
    let failing = Effect::new(move || {
        if source.get() > 0 {
            panic!("effect failed");
        }
    });

    let runs = Arc::new(AtomicUsize::new(0));
    let (source, counter) = (count.clone(), runs.clone());
    let _sibling = Effect::new(move || {
        source.get();
        counter.fetch_add(1, Ordering::SeqCst);
    });

    let result = panic::catch_unwind(AssertUnwindSafe(|| count.set(1)));
    assert!(result.is_err());
    assert_eq!(runs.load(Ordering::SeqCst), 2);
    assert!(!Runtime::is_batching());

    failing.dispose();
    assert_eq!(count.subscriber_count(), 1);

    count.set(2);
    assert_eq!(runs.load(Ordering::SeqCst), 3);
}

/// Writes from several worker threads re-run a relay one setup at a time,
/// and disposal leaves no producer behind.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn relay_keeps_one_producer_under_concurrent_writes() {
    let trigger = Signal::new(0u32);
    let live = Arc::new(AtomicI32::new(0));
    let peak = Arc::new(AtomicI32::new(0));

    let (input, live_count, peak_count) = (trigger.clone(), live.clone(), peak.clone());
    let relay = Relay::new(0u32, move |set, _| {
        let value = input.get();
        let now = live_count.fetch_add(1, Ordering::SeqCst) + 1;
        peak_count.fetch_max(now, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        set.set(value);

        let live_count = live_count.clone();
        Cleanup::new(move || {
            live_count.fetch_sub(1, Ordering::SeqCst);
        })
    });

    let writers: Vec<_> = (1..=4u32)
        .map(|value| {
            let trigger = trigger.clone();
            tokio::spawn(async move { trigger.set(value) })
        })
        .collect();
    for writer in writers {
        writer.await.unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 1);
    assert_eq!(live.load(Ordering::SeqCst), 1);

    relay.dispose();
    assert_eq!(live.load(Ordering::SeqCst), 0);
}
