//! Reducers and meta-reducers.
//!
//! A [`Reducer`] is a pure function `(state | absent, action) -> state`. The
//! state is `None` on the first invocation for a slice and the reducer must
//! supply its own default. Returning an error is the equivalent of throwing:
//! the store leaves its current state untouched and hands the error to the
//! caller of `dispatch`.
//!
//! A [`MetaReducer`] wraps a reducer to produce another reducer with the same
//! signature (logging, validation, instrumentation, ...).
//!
//! Both traits are implemented for plain closures:
//!
//! ```
//! use composable_store_core::{reducer_fn, Action, Reducer, State};
//!
//! let counter = reducer_fn(|state: Option<&State>, action: &Action| {
//!     let current = state.and_then(State::as_i64).unwrap_or(0);
//!     Ok(match action.action_type() {
//!         Some("INC") => State::leaf(current + 1),
//!         _ => state.cloned().unwrap_or_else(|| State::leaf(0)),
//!     })
//! });
//!
//! let next = counter.reduce(None, &Action::new("INC")).unwrap();
//! assert_eq!(next.as_i64(), Some(1));
//! ```

use crate::action::Action;
use crate::state::State;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors a reducer can raise.
#[derive(Error, Debug)]
pub enum ReducerError {
    /// The reducer refused to handle the action
    #[error("Reducer rejected action: {0}")]
    Rejected(String),

    /// A sub-reducer of a combined reducer failed
    #[error("Reducer for slice '{key}' failed: {source}")]
    Slice {
        /// Key of the failing slice
        key: String,
        /// The underlying failure
        #[source]
        source: Box<ReducerError>,
    },

    /// Any other failure, for reducers that use `?` on foreign errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ReducerError {
    /// Convenience constructor for [`ReducerError::Rejected`].
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }

    /// Wrap this error with the key of the slice it came from.
    #[must_use]
    pub fn in_slice(self, key: impl Into<String>) -> Self {
        Self::Slice {
            key: key.into(),
            source: Box::new(self),
        }
    }

    /// Slice keys from the outermost composite down to the failing reducer.
    #[must_use]
    pub fn slice_path(&self) -> Vec<&str> {
        let mut path = Vec::new();
        let mut current = self;
        while let Self::Slice { key, source } = current {
            path.push(key.as_str());
            current = source;
        }
        path
    }
}

/// Result of a single reduction.
pub type ReduceResult = Result<State, ReducerError>;

/// The reducer trait - pure state transition.
///
/// Implementations must be deterministic and must not block. They must not
/// call back into the store that runs them.
pub trait Reducer: Send + Sync {
    /// Compute the next state for `action`.
    ///
    /// # Errors
    ///
    /// Returns a [`ReducerError`] when the transition cannot be computed.
    fn reduce(&self, state: Option<&State>, action: &Action) -> ReduceResult;
}

impl<F> Reducer for F
where
    F: Fn(Option<&State>, &Action) -> ReduceResult + Send + Sync,
{
    fn reduce(&self, state: Option<&State>, action: &Action) -> ReduceResult {
        self(state, action)
    }
}

/// Shared, type-erased reducer.
pub type BoxedReducer = Arc<dyn Reducer>;

/// Named reducers; each owns the slice stored under its key.
pub type ReducerMap = BTreeMap<String, BoxedReducer>;

/// Erase a reducer into a [`BoxedReducer`].
#[must_use]
pub fn reducer_fn<R>(reducer: R) -> BoxedReducer
where
    R: Reducer + 'static,
{
    Arc::new(reducer)
}

/// Build a [`ReducerMap`] from `(key, reducer)` pairs.
#[must_use]
pub fn reducer_map<I, K>(entries: I) -> ReducerMap
where
    I: IntoIterator<Item = (K, BoxedReducer)>,
    K: Into<String>,
{
    entries.into_iter().map(|(k, r)| (k.into(), r)).collect()
}

/// A higher-order reducer: wraps a reducer, returning one with the same
/// signature.
pub trait MetaReducer: Send + Sync {
    /// Wrap `reducer`.
    fn wrap(&self, reducer: BoxedReducer) -> BoxedReducer;
}

impl<F> MetaReducer for F
where
    F: Fn(BoxedReducer) -> BoxedReducer + Send + Sync,
{
    fn wrap(&self, reducer: BoxedReducer) -> BoxedReducer {
        self(reducer)
    }
}

/// Shared, type-erased meta-reducer.
pub type BoxedMetaReducer = Arc<dyn MetaReducer>;

/// Erase a meta-reducer into a [`BoxedMetaReducer`].
#[must_use]
pub fn meta_reducer_fn<M>(meta_reducer: M) -> BoxedMetaReducer
where
    M: MetaReducer + 'static,
{
    Arc::new(meta_reducer)
}

/// The reducers a feature contributes: one reducer for the whole slice, or
/// a map combined into the slice.
#[derive(Clone)]
pub enum FeatureReducers {
    /// A single reducer owning the feature's slice
    Single(BoxedReducer),

    /// Named sub-reducers, combined into the feature's slice
    Map(ReducerMap),
}

impl FeatureReducers {
    /// Keys of the sub-reducers; empty for a single reducer.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        match self {
            Self::Single(_) => Vec::new(),
            Self::Map(map) => map.keys().cloned().collect(),
        }
    }
}

impl From<BoxedReducer> for FeatureReducers {
    fn from(reducer: BoxedReducer) -> Self {
        Self::Single(reducer)
    }
}

impl From<ReducerMap> for FeatureReducers {
    fn from(map: ReducerMap) -> Self {
        Self::Map(map)
    }
}

impl std::fmt::Debug for FeatureReducers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single(_) => write!(f, "FeatureReducers::Single(<reducer>)"),
            Self::Map(map) => f
                .debug_tuple("FeatureReducers::Map")
                .field(&map.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_is_reducer() {
        let reducer = reducer_fn(|_state: Option<&State>, _action: &Action| Ok(State::leaf(1)));
        let next = reducer.reduce(None, &Action::new("any"));
        assert!(matches!(next, Ok(ref s) if s.as_i64() == Some(1)));
    }

    #[test]
    fn test_slice_path_nests() {
        let err = ReducerError::rejected("boom").in_slice("inner").in_slice("outer");
        assert_eq!(err.slice_path(), vec!["outer", "inner"]);
        assert!(err.to_string().contains("outer"));
    }

    #[test]
    fn test_closure_is_meta_reducer() {
        let identity = meta_reducer_fn(|inner: BoxedReducer| inner);
        let base = reducer_fn(|_state: Option<&State>, _action: &Action| Ok(State::leaf("base")));
        let wrapped = identity.wrap(Arc::clone(&base));
        assert!(Arc::ptr_eq(&wrapped, &base));
    }

    #[test]
    fn test_feature_reducer_keys() {
        let single = FeatureReducers::from(reducer_fn(|s: Option<&State>, _a: &Action| {
            Ok(s.cloned().unwrap_or_default())
        }));
        assert!(single.keys().is_empty());

        let map = FeatureReducers::from(reducer_map([(
            "x",
            reducer_fn(|s: Option<&State>, _a: &Action| Ok(s.cloned().unwrap_or_default())),
        )]));
        assert_eq!(map.keys(), vec!["x".to_string()]);
    }
}
