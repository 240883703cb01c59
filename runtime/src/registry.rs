//! Feature registry.
//!
//! The registry is the single source of truth for which features exist. It
//! stores features already resolved into slice reducers, so recombination
//! never has to touch providers or initial-state producers again.

use crate::error::StoreError;
use crate::FeatureConfig;
use composable_store_core::composition::{
    create_feature_reducer_factory, create_reducer_factory, CombineReducers, ReducerFactory,
};
use composable_store_core::{
    BoxedReducer, BoxedReducerFactory, FeatureReducers, ReducerMap, ReducerProvider,
    ReducerSource, State,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Everything needed to register one feature.
#[derive(Clone)]
pub struct FeatureDescriptor {
    /// Unique key; the feature's slice lives under it
    pub key: String,
    /// The feature's reducers, supplied directly or through a token
    pub reducers: ReducerSource<FeatureReducers>,
    /// Initial state, meta-reducers and factory override
    pub config: FeatureConfig,
}

impl FeatureDescriptor {
    /// Describe a feature with default configuration.
    #[must_use]
    pub fn new(key: impl Into<String>, reducers: impl Into<ReducerSource<FeatureReducers>>) -> Self {
        Self {
            key: key.into(),
            reducers: reducers.into(),
            config: FeatureConfig::default(),
        }
    }

    /// Replace the feature configuration.
    #[must_use]
    pub fn with_config(mut self, config: FeatureConfig) -> Self {
        self.config = config;
        self
    }

    /// Look up deferred reducers through `provider`.
    ///
    /// Only the reducer source is resolved; the initial state is left for
    /// [`FeatureRegistry::resolve`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnresolvedReducers`] for an unknown token.
    pub fn resolve_reducers(self, provider: &dyn ReducerProvider) -> Result<Self, StoreError> {
        let Self {
            key,
            reducers,
            config,
        } = self;
        Ok(Self {
            key,
            reducers: ReducerSource::Direct(provide(reducers, provider)?),
            config,
        })
    }
}

fn provide(
    source: ReducerSource<FeatureReducers>,
    provider: &dyn ReducerProvider,
) -> Result<FeatureReducers, StoreError> {
    match source {
        ReducerSource::Direct(reducers) => Ok(reducers),
        ReducerSource::Deferred(token) => provider
            .provide(&token)
            .ok_or(StoreError::UnresolvedReducers(token)),
    }
}

impl std::fmt::Debug for FeatureDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureDescriptor")
            .field("key", &self.key)
            .field("reducers", &self.reducers)
            .field("config", &self.config)
            .finish()
    }
}

/// A feature resolved into the slice reducer the root combines.
#[derive(Clone)]
pub struct RegisteredFeature {
    /// The feature key
    pub key: String,
    /// Slice reducer with meta-reducers and initial state applied
    pub reducer: BoxedReducer,
    /// Initial state as resolved at registration
    pub initial_state: Option<State>,
}

impl std::fmt::Debug for RegisteredFeature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredFeature")
            .field("key", &self.key)
            .field("initial_state", &self.initial_state)
            .finish_non_exhaustive()
    }
}

/// Table of active features, unique by key.
#[derive(Clone, Debug, Default)]
pub struct FeatureRegistry {
    features: BTreeMap<String, RegisteredFeature>,
}

impl FeatureRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is registered.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.features.contains_key(key)
    }

    /// Number of registered features.
    #[must_use]
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Whether no feature is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Registered keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.features.keys().cloned().collect()
    }

    /// Look up a registered feature.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&RegisteredFeature> {
        self.features.get(key)
    }

    /// Resolve a descriptor into a [`RegisteredFeature`].
    ///
    /// Deferred reducers are looked up through `provider`; the initial state
    /// is resolved here, exactly once. Does not touch the registry.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidFeatureKey`] for an empty key
    /// - [`StoreError::UnresolvedReducers`] for an unknown token
    pub fn resolve(
        descriptor: FeatureDescriptor,
        provider: &dyn ReducerProvider,
    ) -> Result<RegisteredFeature, StoreError> {
        let FeatureDescriptor {
            key,
            reducers,
            config,
        } = descriptor;

        if key.is_empty() {
            return Err(StoreError::InvalidFeatureKey);
        }

        let reducers = provide(reducers, provider)?;

        let initial_state = config.initial_state.resolve();

        let reducer = match reducers {
            FeatureReducers::Single(reducer) => create_feature_reducer_factory(&config.meta_reducers)
                .create(reducer, initial_state.as_ref()),
            FeatureReducers::Map(map) => {
                let base: BoxedReducerFactory = config
                    .reducer_factory
                    .unwrap_or_else(|| Arc::new(CombineReducers));
                create_reducer_factory(base, &config.meta_reducers).create(&map, initial_state.as_ref())
            },
        };

        Ok(RegisteredFeature {
            key,
            reducer,
            initial_state,
        })
    }

    /// Add a resolved feature.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateFeature`] if the key is taken; the
    /// registry is unchanged.
    pub fn insert(&mut self, feature: RegisteredFeature) -> Result<(), StoreError> {
        if self.features.contains_key(&feature.key) {
            return Err(StoreError::DuplicateFeature(feature.key));
        }
        self.features.insert(feature.key.clone(), feature);
        Ok(())
    }

    /// Remove a feature.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownFeature`] if the key is not registered.
    pub fn remove(&mut self, key: &str) -> Result<RegisteredFeature, StoreError> {
        self.features
            .remove(key)
            .ok_or_else(|| StoreError::UnknownFeature(key.to_string()))
    }

    /// The slice reducers, keyed by feature.
    #[must_use]
    pub fn reducers(&self) -> ReducerMap {
        self.features
            .iter()
            .map(|(key, feature)| (key.clone(), Arc::clone(&feature.reducer)))
            .collect()
    }
}

/// Resolve a root reducer source into a reducer map.
///
/// # Errors
///
/// - [`StoreError::UnresolvedReducers`] for an unknown token
/// - [`StoreError::ExpectedReducerMap`] when the token names a single reducer
pub fn resolve_reducer_map(
    source: ReducerSource<ReducerMap>,
    provider: &dyn ReducerProvider,
) -> Result<ReducerMap, StoreError> {
    match source {
        ReducerSource::Direct(map) => Ok(map),
        ReducerSource::Deferred(token) => match provider.provide(&token) {
            Some(FeatureReducers::Map(map)) => Ok(map),
            Some(FeatureReducers::Single(_)) => Err(StoreError::ExpectedReducerMap(token)),
            None => Err(StoreError::UnresolvedReducers(token)),
        },
    }
}
