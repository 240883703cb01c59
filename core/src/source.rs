//! Reducer sources and deferred lookup.
//!
//! Reducers can be handed to the store directly, or as a [`ReducerToken`]
//! naming reducers that a [`ReducerProvider`] supplies later. Deferred
//! sources are resolved by an explicit lookup step before they reach a
//! reducer factory; nothing is discovered by inspecting values at runtime.

use crate::reducer::{FeatureReducers, ReducerMap};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Name under which a provider supplies reducers.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReducerToken(String);

impl ReducerToken {
    /// Create a token.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The token name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReducerToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReducerToken {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Where reducers come from.
#[derive(Clone, Debug)]
pub enum ReducerSource<T> {
    /// Reducers supplied directly
    Direct(T),

    /// Reducers looked up through a [`ReducerProvider`]
    Deferred(ReducerToken),
}

impl From<ReducerMap> for ReducerSource<ReducerMap> {
    fn from(map: ReducerMap) -> Self {
        Self::Direct(map)
    }
}

impl<T> From<ReducerToken> for ReducerSource<T> {
    fn from(token: ReducerToken) -> Self {
        Self::Deferred(token)
    }
}

impl From<FeatureReducers> for ReducerSource<FeatureReducers> {
    fn from(reducers: FeatureReducers) -> Self {
        Self::Direct(reducers)
    }
}

impl From<ReducerMap> for ReducerSource<FeatureReducers> {
    fn from(map: ReducerMap) -> Self {
        Self::Direct(FeatureReducers::Map(map))
    }
}

impl From<crate::reducer::BoxedReducer> for ReducerSource<FeatureReducers> {
    fn from(reducer: crate::reducer::BoxedReducer) -> Self {
        Self::Direct(FeatureReducers::Single(reducer))
    }
}

/// Supplies reducers for deferred sources.
pub trait ReducerProvider: Send + Sync {
    /// Look up the reducers registered under `token`.
    fn provide(&self, token: &ReducerToken) -> Option<FeatureReducers>;
}

/// A table-backed [`ReducerProvider`].
///
/// ```
/// use composable_store_core::{reducer_fn, Action, ReducerProvider, ReducerProviders, ReducerToken, State};
///
/// let providers = ReducerProviders::new().with(
///     "settings",
///     reducer_fn(|state: Option<&State>, _action: &Action| Ok(state.cloned().unwrap_or_default())),
/// );
/// assert!(providers.provide(&ReducerToken::new("settings")).is_some());
/// assert!(providers.provide(&ReducerToken::new("missing")).is_none());
/// ```
#[derive(Clone, Default)]
pub struct ReducerProviders {
    entries: HashMap<ReducerToken, FeatureReducers>,
}

impl ReducerProviders {
    /// An empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register reducers under `token`, replacing any previous entry.
    #[must_use]
    pub fn with(mut self, token: impl Into<ReducerToken>, reducers: impl Into<FeatureReducers>) -> Self {
        self.entries.insert(token.into(), reducers.into());
        self
    }

    /// Number of registered tokens.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no tokens are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ReducerProvider for ReducerProviders {
    fn provide(&self, token: &ReducerToken) -> Option<FeatureReducers> {
        self.entries.get(token).cloned()
    }
}

impl fmt::Debug for ReducerProviders {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReducerProviders")
            .field("tokens", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}
