//! Integration tests for concurrent use of cloned store handles
//!
//! Dispatches and topology changes from several threads must be processed
//! one step at a time, in a single order every observer agrees on.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use composable_store_core::action::UPDATE_ACTION;
use composable_store_core::{reducer_map, Action};
use composable_store_runtime::{FeatureConfig, ReducerChangeKind, Store, StoreConfig};
use composable_store_testing::fixtures::{counter_reducer, INCREMENT};
use composable_store_testing::helpers::{collect_n, init_test_tracing};
use serde_json::json;
use std::collections::BTreeMap;
use std::thread;

// ============================================================================
// Test Fixtures
// ============================================================================

const DISPATCHERS: usize = 4;
const DISPATCHES_PER_THREAD: usize = 250;
const FEATURES: usize = 10;

fn tagged_increment(worker: usize, seq: usize) -> Action {
    Action::new(INCREMENT).with("thread", worker).with("seq", seq)
}

/// Register `f0..f9`, unregistering the even ones right away.
fn churn_features(store: &Store) {
    for index in 0..FEATURES {
        let key = format!("f{index}");
        store
            .register_feature(key.clone(), counter_reducer(), FeatureConfig::default())
            .unwrap();
        if index % 2 == 0 {
            store.unregister_feature(&key).unwrap();
        }
    }
}

fn expected_changes() -> Vec<(ReducerChangeKind, String)> {
    let mut changes = Vec::new();
    for index in 0..FEATURES {
        let key = format!("f{index}");
        changes.push((ReducerChangeKind::FeaturesAdded, key.clone()));
        if index % 2 == 0 {
            changes.push((ReducerChangeKind::FeaturesRemoved, key));
        }
    }
    changes
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_concurrent_dispatch_and_topology_changes_are_totally_ordered() {
    init_test_tracing();
    let store = Store::configure(
        reducer_map([("counter", counter_reducer())]),
        StoreConfig::default().with_channel_capacity(4096),
    )
    .unwrap();
    let states = store.observe_state();
    let actions = store.observe_actions();
    let changes = store.observe_reducer_changes();

    thread::scope(|scope| {
        for worker in 0..DISPATCHERS {
            let handle = store.clone();
            scope.spawn(move || {
                for seq in 0..DISPATCHES_PER_THREAD {
                    handle.dispatch(tagged_increment(worker, seq)).unwrap();
                }
            });
        }
        let handle = store.clone();
        scope.spawn(move || churn_features(&handle));
    });

    let total = DISPATCHERS * DISPATCHES_PER_THREAD;
    let expected = expected_changes();

    // Final state
    let odd_keys: Vec<String> = (1..FEATURES).step_by(2).map(|i| format!("f{i}")).collect();
    assert_eq!(store.feature_keys(), odd_keys);
    assert_eq!(store.state().get("counter").unwrap(), json!(total));
    for key in &odd_keys {
        let count = store.state().get(key).unwrap().as_i64().unwrap();
        assert!((0..=total as i64).contains(&count), "{key} = {count}");
    }
    assert_eq!(store.reducer_version(), expected.len() as u64);

    // Reducer changes arrive in commit order with consecutive versions
    let seen = collect_n(changes, expected.len()).await;
    for (index, change) in seen.iter().enumerate() {
        assert_eq!(change.version, index as u64 + 1);
        assert_eq!((change.kind, change.keys[0].clone()), expected[index]);
    }

    // Each thread's dispatches keep their order; every update is seen once
    let seen = collect_n(actions, total + expected.len()).await;
    let mut next_seq: BTreeMap<u64, u64> = BTreeMap::new();
    let mut updates = 0;
    for action in &seen {
        if action.is(UPDATE_ACTION) {
            updates += 1;
            continue;
        }
        let worker = action.get("thread").and_then(|v| v.as_u64()).unwrap();
        let seq = action.get("seq").and_then(|v| v.as_u64()).unwrap();
        let expected_seq = next_seq.entry(worker).or_insert(0);
        assert_eq!(seq, *expected_seq, "thread {worker} out of order");
        *expected_seq += 1;
    }
    assert_eq!(updates, expected.len());

    // Published counters never skip or go back
    let seen = collect_n(states, 1 + total + expected.len()).await;
    let counters: Vec<i64> = seen
        .iter()
        .map(|state| state.get("counter").and_then(|c| c.as_i64()).unwrap())
        .collect();
    assert!(counters.windows(2).all(|pair| pair[1] == pair[0] || pair[1] == pair[0] + 1));
    assert_eq!(counters.last().copied(), Some(total as i64));
}

#[test]
fn test_cloned_handles_share_one_store() {
    init_test_tracing();
    let store = Store::configure(reducer_map([("counter", counter_reducer())]), StoreConfig::default())
        .unwrap();
    let clone = store.clone();

    clone
        .register_feature("shared", counter_reducer(), FeatureConfig::default())
        .unwrap();
    store.dispatch(Action::new(INCREMENT)).unwrap();

    assert!(store.has_feature("shared"));
    assert_eq!(clone.state(), json!({ "counter": 1, "shared": 1 }));
    assert_eq!(clone.reducer_version(), store.reducer_version());
}
