//! Reducer composition utilities
//!
//! This module provides the pieces the store assembles its root reducer from:
//! - **`combine_reducers`**: Run one reducer per key over a composite state
//! - **`ReducerFactory`**: Turn a reducer map into a single reducer
//! - **`create_reducer_factory`**: Wrap a factory's output in meta-reducers
//! - **`create_feature_reducer_factory`**: Same, for features backed by one reducer
//!
//! # Examples
//!
//! ## Combining Reducers
//!
//! ```
//! use composable_store_core::{reducer_fn, reducer_map, Action, Reducer, State};
//! use composable_store_core::composition::combine_reducers;
//! use serde_json::json;
//!
//! let counter = reducer_fn(|state: Option<&State>, action: &Action| {
//!     let count = state.and_then(State::as_i64).unwrap_or(0);
//!     Ok(if action.is("INC") {
//!         State::leaf(count + 1)
//!     } else {
//!         state.cloned().unwrap_or_else(|| State::leaf(0))
//!     })
//! });
//! let flag = reducer_fn(|state: Option<&State>, _action: &Action| {
//!     Ok(state.cloned().unwrap_or_else(|| State::leaf(false)))
//! });
//!
//! let combined = combine_reducers(reducer_map([("counter", counter), ("flag", flag)]), None);
//! let state = combined.reduce(None, &Action::new("INC")).unwrap();
//! assert_eq!(state.to_value(), json!({ "counter": 1, "flag": false }));
//! ```
//!
//! ## Meta-reducer order
//!
//! Meta-reducers are applied left to right, so the last one in the list is
//! the outermost wrapper and sees every action first: `[m1, m2]` produces
//! `m2(m1(base))`.

use crate::action::Action;
use crate::reducer::{BoxedMetaReducer, BoxedReducer, ReduceResult, Reducer, ReducerMap};
use crate::state::State;
use smallvec::SmallVec;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Combines named reducers into one reducer over a composite state.
///
/// Each reducer receives the slice stored under its own key (or `None` when
/// the slice does not exist yet). The composite is rebuilt only when at least
/// one slice changed identity; otherwise the incoming state is returned as-is,
/// so consumers can detect no-op reductions with [`State::is_same`].
///
/// When the incoming state is `None`, `initial_state` (or an empty composite)
/// is used in its place.
///
/// A rebuilt composite holds exactly the keys of `reducers`.
#[must_use]
pub fn combine_reducers(reducers: ReducerMap, initial_state: Option<State>) -> CombinedReducer {
    CombinedReducer {
        reducers,
        initial_state,
    }
}

/// A combined reducer, one sub-reducer per key.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer {
    reducers: ReducerMap,
    initial_state: Option<State>,
}

impl CombinedReducer {
    /// Keys of the combined sub-reducers.
    #[must_use]
    pub fn keys(&self) -> Vec<&str> {
        self.reducers.keys().map(String::as_str).collect()
    }
}

impl Reducer for CombinedReducer {
    fn reduce(&self, state: Option<&State>, action: &Action) -> ReduceResult {
        let state = match state {
            Some(state) => state.clone(),
            None => self.initial_state.clone().unwrap_or_default(),
        };

        let previous = state.children();
        let mut next = BTreeMap::new();
        let mut has_changed = false;

        for (key, reducer) in &self.reducers {
            let previous_slice = previous.get(key);
            let next_slice = reducer
                .reduce(previous_slice, action)
                .map_err(|err| err.in_slice(key.clone()))?;

            has_changed = has_changed || previous_slice.is_none_or(|p| !p.is_same(&next_slice));
            next.insert(key.clone(), next_slice);
        }

        if has_changed {
            Ok(State::Tree(Arc::new(next)))
        } else {
            Ok(state)
        }
    }
}

/// Substitutes a default when the incoming state is absent.
struct WithInitialState {
    reducer: BoxedReducer,
    initial_state: State,
}

impl Reducer for WithInitialState {
    fn reduce(&self, state: Option<&State>, action: &Action) -> ReduceResult {
        self.reducer
            .reduce(Some(state.unwrap_or(&self.initial_state)), action)
    }
}

/// Wrap `reducer` so that an absent state is replaced by `initial_state`.
///
/// Returns `reducer` unchanged when there is no initial state.
#[must_use]
pub fn with_initial_state(reducer: BoxedReducer, initial_state: Option<State>) -> BoxedReducer {
    match initial_state {
        Some(initial_state) => Arc::new(WithInitialState {
            reducer,
            initial_state,
        }),
        None => reducer,
    }
}

/// Apply meta-reducers left to right: the last one ends up outermost.
#[must_use]
pub fn apply_meta_reducers(reducer: BoxedReducer, meta_reducers: &[BoxedMetaReducer]) -> BoxedReducer {
    meta_reducers
        .iter()
        .fold(reducer, |inner, meta| meta.wrap(inner))
}

/// Builds one reducer out of a reducer map.
pub trait ReducerFactory: Send + Sync {
    /// Create the reducer for `reducers`, defaulting to `initial_state`.
    fn create(&self, reducers: &ReducerMap, initial_state: Option<&State>) -> BoxedReducer;
}

impl<F> ReducerFactory for F
where
    F: Fn(&ReducerMap, Option<&State>) -> BoxedReducer + Send + Sync,
{
    fn create(&self, reducers: &ReducerMap, initial_state: Option<&State>) -> BoxedReducer {
        self(reducers, initial_state)
    }
}

/// Shared, type-erased reducer factory.
pub type BoxedReducerFactory = Arc<dyn ReducerFactory>;

/// The default factory: [`combine_reducers`].
#[derive(Debug, Clone, Copy, Default)]
pub struct CombineReducers;

impl ReducerFactory for CombineReducers {
    fn create(&self, reducers: &ReducerMap, initial_state: Option<&State>) -> BoxedReducer {
        Arc::new(combine_reducers(reducers.clone(), initial_state.cloned()))
    }
}

/// A factory whose reducers are wrapped in meta-reducers.
///
/// Created by [`create_reducer_factory`].
pub struct MetaReducerFactory {
    base: BoxedReducerFactory,
    meta_reducers: SmallVec<[BoxedMetaReducer; 4]>,
}

impl MetaReducerFactory {
    /// Number of meta-reducers applied by this factory.
    #[must_use]
    pub fn meta_reducer_count(&self) -> usize {
        self.meta_reducers.len()
    }
}

impl ReducerFactory for MetaReducerFactory {
    fn create(&self, reducers: &ReducerMap, initial_state: Option<&State>) -> BoxedReducer {
        let base = self.base.create(reducers, None);
        let wrapped = apply_meta_reducers(base, &self.meta_reducers);
        with_initial_state(wrapped, initial_state.cloned())
    }
}

/// Wrap `base` so every reducer it builds passes through `meta_reducers`.
///
/// The base reducer is built first, the meta-reducers are applied in order
/// (last = outermost) and finally the initial state is substituted for an
/// absent state before the outermost meta-reducer runs.
#[must_use]
pub fn create_reducer_factory(
    base: BoxedReducerFactory,
    meta_reducers: &[BoxedMetaReducer],
) -> MetaReducerFactory {
    MetaReducerFactory {
        base,
        meta_reducers: meta_reducers.iter().cloned().collect(),
    }
}

/// Factory for features backed by a single reducer.
///
/// Created by [`create_feature_reducer_factory`].
pub struct FeatureReducerFactory {
    meta_reducers: SmallVec<[BoxedMetaReducer; 4]>,
}

impl FeatureReducerFactory {
    /// Wrap `reducer` in the feature's meta-reducers and initial state.
    #[must_use]
    pub fn create(&self, reducer: BoxedReducer, initial_state: Option<&State>) -> BoxedReducer {
        let wrapped = apply_meta_reducers(reducer, &self.meta_reducers);
        with_initial_state(wrapped, initial_state.cloned())
    }
}

/// Factory for a single feature reducer wrapped in `meta_reducers`.
#[must_use]
pub fn create_feature_reducer_factory(meta_reducers: &[BoxedMetaReducer]) -> FeatureReducerFactory {
    FeatureReducerFactory {
        meta_reducers: meta_reducers.iter().cloned().collect(),
    }
}
