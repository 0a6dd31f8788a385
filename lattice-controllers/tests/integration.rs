//! Integration tests for the reactive engine.
//!
//! These tests verify that signals, memos, effects and scopes work together
//! through the runtime without any manual invalidation.

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use lattice_controllers::graph::NodeId;
use lattice_controllers::reactive::{
    untrack, Effect, EffectScope, Memo, MemoState, ReactiveContext, ReactiveMap, Runtime, Signal,
};

/// A memo is invalidated by the signal it read.
#[test]
fn memo_tracks_signal_dependency() {
    let signal = Signal::new(10);

    let source = signal.clone();
    let memo = Memo::new(move || source.get() * 2);

    assert_eq!(memo.get(), 20);
    assert_eq!(signal.subscriber_count(), 1);

    signal.set(5);
    assert_eq!(memo.state(), MemoState::Dirty);
    assert_eq!(memo.get(), 10);
}

/// An effect re-runs on its own when a signal it read changes.
#[test]
fn effect_tracks_signal_dependency() {
    let signal = Signal::new(0);
    let observed = Arc::new(AtomicI32::new(-1));

    let _effect = Effect::new({
        let (signal, observed) = (signal.clone(), observed.clone());
        move || observed.store(signal.get(), Ordering::SeqCst)
    });
    assert_eq!(observed.load(Ordering::SeqCst), 0);

    signal.set(42);
    assert_eq!(observed.load(Ordering::SeqCst), 42);
}

#[test]
fn memo_caches_expensive_computation() {
    let compute_count = Arc::new(AtomicI32::new(0));
    let counter = compute_count.clone();

    let memo = Memo::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        42
    });

    for _ in 0..4 {
        assert_eq!(memo.get(), 42);
    }
    assert_eq!(compute_count.load(Ordering::SeqCst), 1);
}

/// Memo chains propagate without any manual dirty marking.
#[test]
fn memo_depends_on_memo() {
    let base = Signal::new(5);

    let source = base.clone();
    let doubled = Memo::new(move || source.get() * 2);
    let inner = doubled.clone();
    let plus_ten = Memo::new(move || inner.get() + 10);

    assert_eq!(plus_ten.get(), 20);

    base.set(10);
    assert_eq!(doubled.get(), 20);
    assert_eq!(plus_ten.get(), 30);
}

/// A diamond runs its effect once per write and never sees a stale memo.
#[test]
fn diamond_runs_effect_once_with_fresh_values() {
    let base = Signal::new(1);
    let (a, b) = (base.clone(), base.clone());
    let left = Memo::new(move || a.get() + 1);
    let right = Memo::new(move || b.get() * 10);

    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let _effect = Effect::new({
        let (left, right, seen) = (left.clone(), right.clone(), seen.clone());
        move || seen.lock().push(left.get() + right.get())
    });

    base.set(2);
    assert_eq!(*seen.lock(), vec![12, 23]);
}

#[test]
fn disposed_effect_does_not_run() {
    let signal = Signal::new(0);
    let run_count = Arc::new(AtomicI32::new(0));

    let effect = Effect::new({
        let (signal, runs) = (signal.clone(), run_count.clone());
        move || {
            signal.get();
            runs.fetch_add(1, Ordering::SeqCst);
        }
    });
    assert_eq!(run_count.load(Ordering::SeqCst), 1);

    effect.dispose();
    signal.set(1);
    effect.execute();
    assert_eq!(run_count.load(Ordering::SeqCst), 1);
    assert_eq!(signal.subscriber_count(), 0);
}

/// Nested contexts keep their dependencies apart.
#[test]
fn nested_reactive_contexts() {
    let (outer_id, inner_id) = (NodeId::new(), NodeId::new());
    let (one, two, three) = (NodeId::new(), NodeId::new(), NodeId::new());

    let outer = ReactiveContext::enter(outer_id);
    ReactiveContext::track_dependency(one);
    ReactiveContext::track_dependency(two);

    {
        let inner = ReactiveContext::enter(inner_id);
        ReactiveContext::track_dependency(three);
        ReactiveContext::track_dependency(three);
        assert_eq!(inner.take_dependencies().as_slice(), &[three]);
    }

    assert_eq!(outer.take_dependencies().as_slice(), &[one, two]);
}

#[test]
fn untracked_reads_do_not_subscribe() {
    let signal = Signal::new(3);
    let runs = Arc::new(AtomicI32::new(0));

    let _effect = Effect::new({
        let (signal, runs) = (signal.clone(), runs.clone());
        move || {
            untrack(|| signal.get());
            runs.fetch_add(1, Ordering::SeqCst);
        }
    });

    signal.set(4);
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

/// Stopping a scope detaches everything it owns from the graph.
#[test]
fn stopped_scope_releases_graph_edges() {
    let signal = Signal::new(1);
    let scope = EffectScope::new();

    let source = signal.clone();
    let _effect = scope
        .effect(move || {
            source.get();
        })
        .unwrap();
    let source = signal.clone();
    let memo = scope.memo(move || source.get() + 1).unwrap();
    assert_eq!(memo.get(), 2);
    assert_eq!(Runtime::dependent_count(signal.id()), 2);

    scope.stop();
    assert_eq!(Runtime::dependent_count(signal.id()), 0);

    signal.set(9);
    assert_eq!(memo.get(), 2);
}

#[test]
fn map_keys_track_structure() {
    let map = ReactiveMap::new();
    map.insert("a", 1);

    let lengths = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let _effect = Effect::new({
        let (map, lengths) = (map.clone(), lengths.clone());
        move || lengths.lock().push(map.len())
    });

    map.insert("a", 2);
    map.insert("b", 3);
    map.remove("a");
    assert_eq!(*lengths.lock(), vec![1, 2, 1]);
}

#[test]
#[should_panic(expected = "reactive update depth exceeded")]
fn self_writing_effect_hits_the_depth_limit() {
    let signal = Signal::new(0);
    let _effect = Effect::new({
        let signal = signal.clone();
        move || {
            let current = signal.get();
            signal.set(current + 1);
        }
    });
    signal.set(100);
}
