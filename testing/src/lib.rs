//! # Composable Store Testing
//!
//! Testing utilities and helpers for the Composable Store state container.
//!
//! This crate provides:
//! - Fixture reducers and meta-reducers that record what they saw
//! - A Given-When-Then [`ReducerTest`]
//! - Stream helpers with timeouts for observing a store
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```
//! use composable_store_runtime::{FeatureConfig, Store, StoreConfig};
//! use composable_store_core::{Action, ReducerMap};
//! use composable_store_testing::fixtures::{counter_reducer, INCREMENT};
//! use composable_store_testing::helpers::collect_n;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let store = Store::configure(ReducerMap::new(), StoreConfig::default()).unwrap();
//! let states = store.observe_state();
//!
//! store.register_feature("counter", counter_reducer(), FeatureConfig::default()).unwrap();
//! store.dispatch(Action::new(INCREMENT)).unwrap();
//!
//! let seen = collect_n(states, 3).await;
//! assert_eq!(seen[2], json!({ "counter": 1 }));
//! # });
//! ```


pub use reducer_test::ReducerTest;

/// Fixture reducers, meta-reducers and producers.
pub mod fixtures {
    use composable_store_core::{
        meta_reducer_fn, reducer_fn, Action, BoxedMetaReducer, BoxedReducer, InitialState,
        ReduceResult, ReducerError, State,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Increments the counter.
    pub const INCREMENT: &str = "INC";
    /// Decrements the counter.
    pub const DECREMENT: &str = "DEC";
    /// Adds the action's `by` field to the counter.
    pub const ADD: &str = "ADD";

    /// Counter reducer: default 0, handles [`INCREMENT`], [`DECREMENT`]
    /// and [`ADD`], returns the incoming state untouched otherwise.
    #[must_use]
    pub fn counter_reducer() -> BoxedReducer {
        reducer_fn(|state: Option<&State>, action: &Action| -> ReduceResult {
            let Some(current) = state else {
                return Ok(State::leaf(0));
            };
            let count = current.as_i64().unwrap_or(0);
            let next = match action.action_type() {
                Some(INCREMENT) => count + 1,
                Some(DECREMENT) => count - 1,
                Some(ADD) => count + action.get("by").and_then(serde_json::Value::as_i64).unwrap_or(0),
                _ => return Ok(current.clone()),
            };
            Ok(State::leaf(next))
        })
    }

    /// An action adding `by` to the counter.
    #[must_use]
    pub fn add(by: i64) -> Action {
        Action::new(ADD).with("by", by)
    }

    /// Reducer that keeps the incoming state (default `null`) and fails on
    /// `action_type`.
    #[must_use]
    pub fn failing_reducer(action_type: &'static str) -> BoxedReducer {
        reducer_fn(move |state: Option<&State>, action: &Action| -> ReduceResult {
            if action.is(action_type) {
                return Err(ReducerError::rejected(format!("refusing {action_type}")));
            }
            Ok(state.cloned().unwrap_or_else(|| State::leaf(serde_json::Value::Null)))
        })
    }

    /// Shared, ordered log of fixture events.
    #[derive(Debug, Clone, Default)]
    pub struct CallLog(Arc<Mutex<Vec<String>>>);

    impl CallLog {
        /// An empty log.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Append an entry.
        pub fn push(&self, entry: impl Into<String>) {
            self.0
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(entry.into());
        }

        /// Copy of every entry so far.
        #[must_use]
        pub fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).clone()
        }

        /// Forget every entry.
        pub fn clear(&self) {
            self.0.lock().unwrap_or_else(PoisonError::into_inner).clear();
        }
    }

    /// Meta-reducer logging `"{name}:enter"` before and `"{name}:exit"`
    /// after the wrapped reducer runs.
    #[must_use]
    pub fn recording_meta_reducer(name: &'static str, log: CallLog) -> BoxedMetaReducer {
        meta_reducer_fn(move |inner: BoxedReducer| {
            let log = log.clone();
            reducer_fn(move |state: Option<&State>, action: &Action| -> ReduceResult {
                log.push(format!("{name}:enter"));
                let result = inner.reduce(state, action);
                log.push(format!("{name}:exit"));
                result
            })
        })
    }

    /// Meta-reducer logging the incoming state (as JSON, or `"absent"`) for
    /// every action.
    #[must_use]
    pub fn state_logging_meta_reducer(log: CallLog) -> BoxedMetaReducer {
        meta_reducer_fn(move |inner: BoxedReducer| {
            let log = log.clone();
            reducer_fn(move |state: Option<&State>, action: &Action| -> ReduceResult {
                log.push(state.map_or_else(|| "absent".to_string(), |s| s.to_value().to_string()));
                inner.reduce(state, action)
            })
        })
    }

    /// Counts invocations of producers built with [`counting_producer`].
    #[derive(Debug, Clone, Default)]
    pub struct CallCounter(Arc<AtomicUsize>);

    impl CallCounter {
        /// A counter at zero.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Invocations so far.
        #[must_use]
        pub fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Initial-state producer returning `state` and counting its calls.
    #[must_use]
    pub fn counting_producer(counter: &CallCounter, state: State) -> InitialState {
        let calls = Arc::clone(&counter.0);
        InitialState::producer(move || {
            calls.fetch_add(1, Ordering::SeqCst);
            state.clone()
        })
    }
}

/// Stream helpers and tracing setup.
pub mod helpers {
    use futures::{Stream, StreamExt};
    use std::time::Duration;

    /// How long helpers wait for a stream item.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

    /// Collect the next `n` items of `stream`.
    ///
    /// # Panics
    ///
    /// Panics if the items do not arrive within [`DEFAULT_TIMEOUT`] or the
    /// stream ends early.
    #[allow(clippy::panic)] // Test helper
    pub async fn collect_n<S>(stream: S, n: usize) -> Vec<S::Item>
    where
        S: Stream + Unpin,
    {
        let items: Vec<S::Item> = tokio::time::timeout(DEFAULT_TIMEOUT, stream.take(n).collect())
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {n} stream items"));
        assert_eq!(items.len(), n, "stream ended after {} of {n} items", items.len());
        items
    }

    /// The next item of `stream`.
    ///
    /// # Panics
    ///
    /// Panics on timeout or if the stream has ended.
    #[allow(clippy::panic)] // Test helper
    pub async fn next_item<S>(stream: &mut S) -> S::Item
    where
        S: Stream + Unpin,
    {
        match tokio::time::timeout(DEFAULT_TIMEOUT, stream.next()).await {
            Ok(Some(item)) => item,
            Ok(None) => panic!("stream ended unexpectedly"),
            Err(_) => panic!("timed out waiting for a stream item"),
        }
    }

    /// Assert that `stream` yields nothing within `window`.
    ///
    /// # Panics
    ///
    /// Panics if an item arrives.
    #[allow(clippy::panic)] // Test helper
    pub async fn assert_quiet<S>(stream: &mut S, window: Duration)
    where
        S: Stream + Unpin,
        S::Item: std::fmt::Debug,
    {
        if let Ok(Some(item)) = tokio::time::timeout(window, stream.next()).await {
            panic!("expected no stream item, got {item:?}");
        }
    }

    /// Install a test tracing subscriber (respects `RUST_LOG`).
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_test_tracing() {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "composable_store_runtime=debug".into()),
            )
            .with(tracing_subscriber::fmt::layer().with_test_writer())
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use crate::fixtures::{add, DECREMENT, INCREMENT};
    use composable_store_core::Action;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    /// Actions the counter fixture understands, mixed with unknown ones.
    pub fn counter_action() -> impl Strategy<Value = Action> {
        prop_oneof![
            3 => Just(Action::new(INCREMENT)),
            2 => Just(Action::new(DECREMENT)),
            2 => (-10_i64..10).prop_map(add),
            1 => "[a-z]{1,8}".prop_map(Action::new),
        ]
    }

    /// A sequence of counter actions.
    pub fn counter_actions(max_len: usize) -> impl Strategy<Value = Vec<Action>> {
        prop::collection::vec(counter_action(), 0..max_len)
    }

    /// Non-empty lowercase feature keys.
    pub fn feature_key() -> impl Strategy<Value = String> {
        "[a-z]{1,6}"
    }

    /// Values that are not plain typed records.
    pub fn malformed_action() -> impl Strategy<Value = Action> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z]{0,8}".prop_map(Value::String),
            Just(json!([1, 2, 3])),
            Just(json!({ "payload": 1 })),
            Just(json!({ "type": 7 })),
        ]
        .prop_map(Action::from)
    }
}
