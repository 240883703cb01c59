//! Property tests: replaying the same inputs yields the same store.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect/panic

use composable_store_core::{reducer_map, Action, ReducerMap};
use composable_store_runtime::{FeatureConfig, Store, StoreConfig};
use composable_store_testing::fixtures::{counter_reducer, ADD, DECREMENT, INCREMENT};
use composable_store_testing::properties::{counter_action, counter_actions, feature_key, malformed_action};
use proptest::prelude::*;
use serde_json::json;
use std::collections::BTreeSet;

fn counter_store() -> Store {
    Store::configure(reducer_map([("counter", counter_reducer())]), StoreConfig::default()).unwrap()
}

/// Expected counter value after `actions`, starting at zero.
fn fold_counter(actions: &[Action]) -> i64 {
    actions.iter().fold(0, |count, action| match action.action_type() {
        Some(INCREMENT) => count + 1,
        Some(DECREMENT) => count - 1,
        Some(ADD) => count + action.get("by").and_then(serde_json::Value::as_i64).unwrap_or(0),
        _ => count,
    })
}

proptest! {
    #[test]
    fn replay_is_deterministic(actions in counter_actions(40)) {
        let first = counter_store();
        let second = counter_store();

        for action in &actions {
            first.dispatch(action.clone()).unwrap();
            second.dispatch(action.clone()).unwrap();
        }

        prop_assert_eq!(first.state(), second.state());
        prop_assert_eq!(first.state(), json!({ "counter": fold_counter(&actions) }));
        prop_assert_eq!(first.actions_processed(), actions.len() as u64 + 1);
    }

    #[test]
    fn register_then_unregister_restores_keys(
        keys in prop::collection::btree_set(feature_key(), 1..6),
        actions in counter_actions(10),
    ) {
        let store = Store::configure(ReducerMap::new(), StoreConfig::default()).unwrap();
        let before = store.state();

        for key in &keys {
            store.register_feature(key.clone(), counter_reducer(), FeatureConfig::default()).unwrap();
        }
        for action in actions {
            store.dispatch(action).unwrap();
        }
        prop_assert_eq!(store.feature_keys(), keys.iter().cloned().collect::<Vec<_>>());

        store.remove_features(&keys).unwrap();

        prop_assert!(store.feature_keys().is_empty());
        prop_assert_eq!(store.state(), before);
        prop_assert_eq!(store.reducer_version(), keys.len() as u64 + 1);
    }

    #[test]
    fn malformed_actions_never_fail_or_change_state(
        prefix in counter_actions(10),
        malformed in prop::collection::vec(malformed_action(), 1..10),
    ) {
        let store = counter_store();
        for action in prefix {
            store.dispatch(action).unwrap();
        }
        let before = store.state();

        for action in malformed {
            prop_assert!(store.dispatch(action).is_ok());
        }

        prop_assert!(store.state().is_same(&before));
    }

    #[test]
    fn feature_keys_stay_sorted_and_unique(
        keys in prop::collection::vec(feature_key(), 1..10),
        action in counter_action(),
    ) {
        let store = Store::configure(ReducerMap::new(), StoreConfig::default()).unwrap();
        let mut expected = BTreeSet::new();

        for key in keys {
            let result = store.register_feature(key.clone(), counter_reducer(), FeatureConfig::default());
            prop_assert_eq!(result.is_ok(), expected.insert(key));
        }
        store.dispatch(action).unwrap();

        prop_assert_eq!(store.feature_keys(), expected.iter().cloned().collect::<Vec<_>>());
        prop_assert_eq!(store.state().keys(), store.feature_keys());
    }
}
