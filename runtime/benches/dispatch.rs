//! Store dispatch and recombination benchmarks
//!
//! Measures:
//! - Dispatch throughput with and without observers
//! - Cost of dispatching into a store with many feature slices
//! - Cost of registering and unregistering a feature
//!
//! Run with: `cargo bench --bench dispatch`

#![allow(missing_docs)] // Benchmarks don't need extensive docs
#![allow(clippy::expect_used)] // Benchmarks can use expect for setup

use composable_store_core::{reducer_fn, reducer_map, Action, BoxedReducer, ReducerMap, State};
use composable_store_runtime::{FeatureConfig, Store, StoreConfig};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::time::Duration;

// ============================================================================
// Fixtures
// ============================================================================

fn counter() -> BoxedReducer {
    reducer_fn(|state: Option<&State>, action: &Action| {
        let count = state.and_then(State::as_i64).unwrap_or(0);
        Ok(match (state, action.action_type()) {
            (_, Some("INC")) => State::leaf(count + 1),
            (Some(current), _) => current.clone(),
            (None, _) => State::leaf(0),
        })
    })
}

fn store_with_features(features: usize) -> Store {
    let store = Store::configure(reducer_map([("root", counter())]), StoreConfig::default())
        .expect("Failed to configure store");
    for index in 0..features {
        store
            .register_feature(format!("feature_{index}"), counter(), FeatureConfig::default())
            .expect("Failed to register feature");
    }
    store
}

// ============================================================================
// Benchmarks
// ============================================================================

/// Dispatch throughput with no observers attached
fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(100));

    let store = store_with_features(0);
    let increment = Action::new("INC");
    let unrelated = Action::new("NOOP");

    group.bench_function("100_state_changes", |b| {
        b.iter(|| {
            for _ in 0..100 {
                store.dispatch(black_box(increment.clone())).ok();
            }
        });
    });

    group.bench_function("100_noops", |b| {
        b.iter(|| {
            for _ in 0..100 {
                store.dispatch(black_box(unrelated.clone())).ok();
            }
        });
    });

    group.finish();
}

/// Dispatch throughput while observers hold subscriptions
fn bench_dispatch_with_observers(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_with_observers");
    group.measurement_time(Duration::from_secs(5));
    group.throughput(Throughput::Elements(100));

    let store = store_with_features(0);
    let increment = Action::new("INC");

    // Streams are never polled; lagging receivers drop the oldest values
    let _states: Vec<_> = (0..10).map(|_| store.observe_state()).collect();
    let _actions = store.observe_actions();
    let _reduced = store.observe_reduced_actions();

    group.bench_function("10_state_observers_100_actions", |b| {
        b.iter(|| {
            for _ in 0..100 {
                store.dispatch(black_box(increment.clone())).ok();
            }
        });
    });

    group.finish();
}

/// Dispatch cost as the number of feature slices grows
fn bench_dispatch_feature_count(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_feature_count");
    let increment = Action::new("INC");

    for features in [1, 10, 100] {
        let store = store_with_features(features);
        group.bench_with_input(BenchmarkId::from_parameter(features), &features, |b, _| {
            b.iter(|| store.dispatch(black_box(increment.clone())).ok());
        });
    }

    group.finish();
}

/// Register and unregister a feature: two recombinations and two synthetic
/// update actions
fn bench_recombination(c: &mut Criterion) {
    let mut group = c.benchmark_group("recombination");

    for features in [0, 10, 100] {
        let store = store_with_features(features);
        group.bench_with_input(BenchmarkId::from_parameter(features), &features, |b, _| {
            b.iter(|| {
                store
                    .register_feature("transient", counter(), FeatureConfig::default())
                    .expect("Failed to register feature");
                store
                    .unregister_feature("transient")
                    .expect("Failed to unregister feature");
            });
        });
    }

    group.finish();
}

/// Replacing the whole root reducer map
fn bench_replace_reducers(c: &mut Criterion) {
    let store = store_with_features(10);

    c.bench_function("replace_reducers", |b| {
        b.iter(|| {
            let root: ReducerMap = reducer_map([("root", counter()), ("extra", counter())]);
            store.replace_reducers(black_box(root)).expect("Failed to replace reducers");
        });
    });
}

criterion_group!(
    benches,
    bench_dispatch,
    bench_dispatch_with_observers,
    bench_dispatch_feature_count,
    bench_recombination,
    bench_replace_reducers,
);
criterion_main!(benches);
