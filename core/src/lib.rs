//! # Composable Store Core
//!
//! Core traits and types for the Composable Store state container.
//!
//! This crate provides the pure, runtime-free half of the architecture: the
//! values that flow through a store and the functions that compose reducers.
//! The `composable-store-runtime` crate builds the `Store` on top of it.
//!
//! ## Core Concepts
//!
//! - **Action**: A structured record with a `type` discriminator
//! - **State**: A persistent tree, one slice per feature key
//! - **Reducer**: Pure function `(State?, Action) → State`
//! - **Meta-reducer**: Higher-order function `Reducer → Reducer`
//! - **Reducer factory**: Turns a map of named reducers into one reducer
//!
//! ## Architecture Principles
//!
//! - Unidirectional Data Flow
//! - Structural sharing: unchanged slices keep their identity
//! - Explicit composition: no lookup by reflection, no global registries
//!
//! ## Example
//!
//! ```
//! use composable_store_core::{reducer_fn, reducer_map, Action, Reducer, State};
//! use composable_store_core::composition::combine_reducers;
//! use serde_json::json;
//!
//! let todos = reducer_fn(|state: Option<&State>, action: &Action| {
//!     let mut items = state
//!         .and_then(State::as_value)
//!         .and_then(|v| v.as_array().cloned())
//!         .unwrap_or_default();
//!     if action.is("todos/add") {
//!         items.push(action.get("title").cloned().unwrap_or_default());
//!         return Ok(State::leaf(items));
//!     }
//!     Ok(state.cloned().unwrap_or_else(|| State::leaf(json!([]))))
//! });
//!
//! let root = combine_reducers(reducer_map([("todos", todos)]), None);
//! let state = root
//!     .reduce(None, &Action::new("todos/add").with("title", "ship it"))
//!     .unwrap();
//! assert_eq!(state.to_value(), json!({ "todos": ["ship it"] }));
//! ```

/// Actions and the store's synthetic action types
pub mod action;

/// Reducer composition: combination, factories, meta-reducer application
pub mod composition;

/// Initial-state values and producers
pub mod initial_state;

/// Reducer and meta-reducer traits
pub mod reducer;

/// Direct and deferred reducer sources
pub mod source;

/// The persistent state tree
pub mod state;

// Re-export commonly used types
pub use action::Action;
pub use composition::{
    combine_reducers, create_feature_reducer_factory, create_reducer_factory, BoxedReducerFactory,
    CombineReducers, ReducerFactory,
};
pub use initial_state::InitialState;
pub use reducer::{
    meta_reducer_fn, reducer_fn, reducer_map, BoxedMetaReducer, BoxedReducer, FeatureReducers,
    MetaReducer, ReduceResult, Reducer, ReducerError, ReducerMap,
};
pub use source::{ReducerProvider, ReducerProviders, ReducerSource, ReducerToken};
pub use state::State;

// Re-export for reducer authors
pub use serde_json::{json, Value};
