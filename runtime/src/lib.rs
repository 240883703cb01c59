//! # Composable Store Runtime
//!
//! Runtime implementation of the Composable Store state container.
//!
//! This crate provides the [`Store`]: a single state tree whose root reducer
//! is assembled from feature slices that can be registered and unregistered
//! while the store is running.
//!
//! ## Core Components
//!
//! - **Action Channel**: Ingress point, fans actions out to observers in order
//! - **Action Validator**: Flags actions that are not plain typed records
//! - **Feature Registry**: Table of active features, unique by key
//! - **Reducer Manager**: Owns the active root reducer and swaps it on change
//! - **State Container**: Holds the current state and publishes new states
//!
//! ## Example
//!
//! ```
//! use composable_store_core::{reducer_fn, Action, ReducerMap, State};
//! use composable_store_runtime::{FeatureConfig, Store, StoreConfig};
//! use serde_json::json;
//!
//! # fn main() -> Result<(), composable_store_runtime::StoreError> {
//! let store = Store::configure(ReducerMap::new(), StoreConfig::default())?;
//!
//! let counter = reducer_fn(|state: Option<&State>, action: &Action| {
//!     let count = state.and_then(State::as_i64).unwrap_or(0);
//!     Ok(if action.is("INC") {
//!         State::leaf(count + 1)
//!     } else {
//!         state.cloned().unwrap_or_else(|| State::leaf(0))
//!     })
//! });
//! store.register_feature("counter", counter, FeatureConfig::default())?;
//! store.dispatch(Action::new("INC"))?;
//!
//! assert_eq!(store.state().to_value(), json!({ "counter": 1 }));
//! # Ok(())
//! # }
//! ```

use composable_store_core::{
    BoxedMetaReducer, BoxedReducerFactory, InitialState, ReducerProvider, ReducerProviders,
};
use std::sync::Arc;

/// Action ingress and observer streams
pub mod channel;

/// Reducer manager - owns and swaps the active root reducer
pub mod manager;

/// Metrics for observability and monitoring
pub mod metrics;

/// Feature registry and feature descriptors
pub mod registry;

/// State container - current state and publication
pub mod state;

/// The store facade
pub mod store;

/// Action validation and diagnostics
pub mod validator;

/// Error types for the Store runtime
pub mod error {
    use composable_store_core::{ReducerError, ReducerToken};
    use thiserror::Error;

    /// Errors that can occur during Store operations
    ///
    /// Contract violations (duplicate or unknown keys, unresolved tokens)
    /// leave the store exactly as it was. Reducer failures leave the state at
    /// its pre-reduction value.
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// A feature (or root reducer) with this key already exists
        #[error("Feature '{0}' is already registered")]
        DuplicateFeature(String),

        /// No feature with this key is registered
        #[error("Feature '{0}' is not registered")]
        UnknownFeature(String),

        /// Feature keys must be non-empty
        #[error("Feature keys must not be empty")]
        InvalidFeatureKey,

        /// A deferred reducer source named a token the provider does not know
        #[error("No reducers provided for token '{0}'")]
        UnresolvedReducers(ReducerToken),

        /// A token resolved to a single reducer where a reducer map is required
        #[error("Token '{0}' provides a single reducer where a reducer map is required")]
        ExpectedReducerMap(ReducerToken),

        /// A reducer failed; the state was not changed
        #[error("Reducer failed while handling '{action_type}': {source}")]
        Reducer {
            /// Display form of the action being reduced
            action_type: String,
            /// The reducer's error
            #[source]
            source: ReducerError,
        },
    }

    impl StoreError {
        /// Whether this error is a caller contract violation (as opposed to a
        /// reducer failure).
        #[must_use]
        pub const fn is_contract_violation(&self) -> bool {
            !matches!(self, Self::Reducer { .. })
        }
    }
}

pub use channel::ActionChannel;
pub use error::StoreError;
pub use manager::{ManagerPhase, ReducerChange, ReducerChangeKind, ReducerManager};
pub use registry::{FeatureDescriptor, FeatureRegistry, RegisteredFeature};
pub use state::{PublishMode, StateContainer};
pub use store::Store;
pub use validator::{ActionValidator, Diagnostic, ValidationIssue};

/// Default capacity of every observer channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

/// Configuration for Store instances
///
/// # Example
///
/// ```
/// use composable_store_core::{json, meta_reducer_fn, BoxedReducer, InitialState, State};
/// use composable_store_runtime::{ActionValidator, PublishMode, StoreConfig};
///
/// let config = StoreConfig::default()
///     .with_initial_state(InitialState::producer(|| State::from(json!({}))))
///     .with_meta_reducer(meta_reducer_fn(|inner: BoxedReducer| inner))
///     .with_action_validator(ActionValidator::Disabled)
///     .with_publish_mode(PublishMode::Always)
///     .with_channel_capacity(1024);
/// assert_eq!(config.meta_reducers.len(), 1);
/// ```
#[derive(Clone)]
pub struct StoreConfig {
    /// Root initial state, resolved once when the store is configured
    pub initial_state: InitialState,
    /// Root meta-reducers; the last one is the outermost wrapper
    pub meta_reducers: Vec<BoxedMetaReducer>,
    /// Base factory for the root reducer (`None` = combine reducers)
    pub reducer_factory: Option<BoxedReducerFactory>,
    /// Validation applied to every dispatched action
    pub action_validator: ActionValidator,
    /// When new states are published
    pub publish_mode: PublishMode,
    /// Capacity of the observer channels
    pub channel_capacity: usize,
    /// Lookup table for deferred reducer sources
    pub reducer_provider: Arc<dyn ReducerProvider>,
}

impl StoreConfig {
    /// Set the root initial state
    #[must_use]
    pub fn with_initial_state(mut self, initial_state: impl Into<InitialState>) -> Self {
        self.initial_state = initial_state.into();
        self
    }

    /// Append a root meta-reducer
    #[must_use]
    pub fn with_meta_reducer(mut self, meta_reducer: BoxedMetaReducer) -> Self {
        self.meta_reducers.push(meta_reducer);
        self
    }

    /// Replace the root meta-reducer chain
    #[must_use]
    pub fn with_meta_reducers(mut self, meta_reducers: Vec<BoxedMetaReducer>) -> Self {
        self.meta_reducers = meta_reducers;
        self
    }

    /// Use a custom base reducer factory instead of combining reducers
    #[must_use]
    pub fn with_reducer_factory(mut self, factory: BoxedReducerFactory) -> Self {
        self.reducer_factory = Some(factory);
        self
    }

    /// Set the action validator
    #[must_use]
    pub fn with_action_validator(mut self, validator: ActionValidator) -> Self {
        self.action_validator = validator;
        self
    }

    /// Set the publish mode
    #[must_use]
    pub fn with_publish_mode(mut self, mode: PublishMode) -> Self {
        self.publish_mode = mode;
        self
    }

    /// Set the observer channel capacity (minimum 1)
    #[must_use]
    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    /// Set the provider used to resolve deferred reducer sources
    #[must_use]
    pub fn with_reducer_provider(mut self, provider: Arc<dyn ReducerProvider>) -> Self {
        self.reducer_provider = provider;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_state: InitialState::Unset,
            meta_reducers: Vec::new(),
            reducer_factory: None,
            action_validator: ActionValidator::default(),
            publish_mode: PublishMode::default(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            reducer_provider: Arc::new(ReducerProviders::new()),
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("initial_state", &self.initial_state)
            .field("meta_reducers", &self.meta_reducers.len())
            .field("custom_reducer_factory", &self.reducer_factory.is_some())
            .field("action_validator", &self.action_validator)
            .field("publish_mode", &self.publish_mode)
            .field("channel_capacity", &self.channel_capacity)
            .finish_non_exhaustive()
    }
}

/// Configuration scoped to one feature
#[derive(Clone, Default)]
pub struct FeatureConfig {
    /// Initial slice state, resolved once per registration
    pub initial_state: InitialState,
    /// Meta-reducers wrapping only this feature's slice reducer
    pub meta_reducers: Vec<BoxedMetaReducer>,
    /// Base factory for reducer-map features (`None` = combine reducers)
    pub reducer_factory: Option<BoxedReducerFactory>,
}

impl FeatureConfig {
    /// Set the feature's initial state
    #[must_use]
    pub fn with_initial_state(mut self, initial_state: impl Into<InitialState>) -> Self {
        self.initial_state = initial_state.into();
        self
    }

    /// Append a feature-local meta-reducer
    #[must_use]
    pub fn with_meta_reducer(mut self, meta_reducer: BoxedMetaReducer) -> Self {
        self.meta_reducers.push(meta_reducer);
        self
    }

    /// Use a custom base reducer factory for a reducer-map feature
    #[must_use]
    pub fn with_reducer_factory(mut self, factory: BoxedReducerFactory) -> Self {
        self.reducer_factory = Some(factory);
        self
    }
}

impl std::fmt::Debug for FeatureConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureConfig")
            .field("initial_state", &self.initial_state)
            .field("meta_reducers", &self.meta_reducers.len())
            .field("custom_reducer_factory", &self.reducer_factory.is_some())
            .finish()
    }
}
