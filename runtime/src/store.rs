//! The store facade.
//!
//! A [`Store`] wires the components together:
//!
//! ```text
//! dispatch ─▶ ActionChannel ─▶ ActionValidator ─▶ active reducer ─▶ StateContainer ─▶ observers
//!                                                     ▲
//! add/remove features ─▶ FeatureRegistry ─▶ ReducerManager (recombine + synthetic action)
//! ```
//!
//! Registry, manager and state sit behind one mutex that is held for a whole
//! step: a single dispatch, or a complete topology change including its
//! synthetic action. Steps are therefore totally ordered, and observers see
//! values in processing order because publication happens inside the step.

use crate::channel::{broadcast_stream, ActionChannel};
use crate::error::StoreError;
use crate::manager::{ManagerSnapshot, ReducerChange, ReducerChangeKind, ReducerManager};
use crate::metrics::{DispatchMetrics, TopologyMetrics};
use crate::registry::{resolve_reducer_map, FeatureDescriptor, FeatureRegistry};
use crate::state::{StateContainer, StateSnapshot};
use crate::validator::{ActionValidator, Diagnostic};
use crate::{FeatureConfig, StoreConfig};
use composable_store_core::composition::{create_reducer_factory, CombineReducers};
use composable_store_core::{
    Action, BoxedReducerFactory, FeatureReducers, ReducerMap, ReducerProvider, ReducerSource,
    State,
};
use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::BTreeSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// The dynamic state container.
///
/// Cheap to clone; all clones share one state tree. Observer streams end
/// once every handle has been dropped.
///
/// Reducers, meta-reducers, validators and initial-state producers run while
/// the store is locked and must not call back into the same store.
#[derive(Clone)]
pub struct Store {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    core: Mutex<StoreCore>,
    validator: ActionValidator,
    provider: Arc<dyn ReducerProvider>,
    actions: ActionChannel,
    reduced_actions: broadcast::Sender<Action>,
    reducer_changes: broadcast::Sender<ReducerChange>,
    diagnostics: broadcast::Sender<Diagnostic>,
}

struct StoreCore {
    registry: FeatureRegistry,
    manager: ReducerManager,
    state: StateContainer,
}

/// Everything a topology change may touch, captured before it starts.
struct Rollback {
    registry: FeatureRegistry,
    manager: ManagerSnapshot,
    state: StateSnapshot,
}

impl Rollback {
    fn capture(core: &StoreCore) -> Self {
        Self {
            registry: core.registry.clone(),
            manager: core.manager.snapshot(),
            state: core.state.snapshot(),
        }
    }

    fn restore(self, core: &mut StoreCore) {
        core.registry = self.registry;
        core.manager.restore(self.manager);
        core.state.restore(self.state);
    }
}

impl Store {
    /// Create a store from root reducers and configuration.
    ///
    /// The root initial state is resolved once, then the synthetic init
    /// action is reduced so every root reducer produces its default before
    /// anyone can observe the store.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UnresolvedReducers`] / [`StoreError::ExpectedReducerMap`]
    ///   if `root_reducers` is a token the provider cannot satisfy
    /// - [`StoreError::Reducer`] if the init action fails
    #[tracing::instrument(skip_all, name = "store_configure")]
    pub fn configure(
        root_reducers: impl Into<ReducerSource<ReducerMap>>,
        config: StoreConfig,
    ) -> Result<Self, StoreError> {
        let StoreConfig {
            initial_state,
            meta_reducers,
            reducer_factory,
            action_validator,
            publish_mode,
            channel_capacity,
            reducer_provider,
        } = config;

        let root = resolve_reducer_map(root_reducers.into(), reducer_provider.as_ref())?;
        let initial_state = initial_state.resolve();

        let base: BoxedReducerFactory =
            reducer_factory.unwrap_or_else(|| Arc::new(CombineReducers));
        let factory: BoxedReducerFactory = Arc::new(create_reducer_factory(base, &meta_reducers));

        tracing::debug!(
            root_reducers = root.len(),
            meta_reducers = meta_reducers.len(),
            ?publish_mode,
            "Configuring store"
        );

        let manager = ReducerManager::new(root, factory, initial_state.clone());
        let state = StateContainer::new(
            initial_state.unwrap_or_else(State::empty),
            publish_mode,
            channel_capacity,
        );

        let capacity = channel_capacity.max(1);
        let store = Self {
            inner: Arc::new(StoreInner {
                core: Mutex::new(StoreCore {
                    registry: FeatureRegistry::new(),
                    manager,
                    state,
                }),
                validator: action_validator,
                provider: reducer_provider,
                actions: ActionChannel::new(capacity),
                reduced_actions: broadcast::channel(capacity).0,
                reducer_changes: broadcast::channel(capacity).0,
                diagnostics: broadcast::channel(capacity).0,
            }),
        };

        {
            let mut guard = store.lock();
            store.process(&mut guard, &Action::init())?;
        }

        Ok(store)
    }

    /// Dispatch an action.
    ///
    /// The action reaches every action observer, is validated (a failure is
    /// reported as a diagnostic, not an error) and is reduced by the active
    /// reducer before this call returns.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Reducer`] if the reducer fails; the state keeps
    /// its pre-reduction value and nothing is published.
    pub fn dispatch(&self, action: impl Into<Action>) -> Result<(), StoreError> {
        let action = action.into();
        let mut guard = self.lock();
        self.process(&mut guard, &action).map(|_| ())
    }

    /// Register a feature.
    ///
    /// # Errors
    ///
    /// See [`add_features`](Self::add_features).
    pub fn add_feature(&self, descriptor: FeatureDescriptor) -> Result<ReducerChange, StoreError> {
        self.add_features([descriptor])
    }

    /// Register a feature from its parts.
    ///
    /// # Errors
    ///
    /// See [`add_features`](Self::add_features).
    pub fn register_feature(
        &self,
        key: impl Into<String>,
        reducers: impl Into<ReducerSource<FeatureReducers>>,
        config: FeatureConfig,
    ) -> Result<ReducerChange, StoreError> {
        self.add_feature(FeatureDescriptor::new(key, reducers).with_config(config))
    }

    /// Register several features with a single recombination.
    ///
    /// Every key is checked before anything changes. The synthetic update
    /// action carries all added keys.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidFeatureKey`] for an empty key
    /// - [`StoreError::DuplicateFeature`] if a key is registered, owned by a
    ///   root reducer, or repeated in the batch
    /// - [`StoreError::UnresolvedReducers`] for an unknown token
    /// - [`StoreError::Reducer`] if the synthetic action fails
    ///
    /// On error the store is unchanged.
    #[tracing::instrument(skip_all, name = "store_add_features")]
    pub fn add_features(
        &self,
        descriptors: impl IntoIterator<Item = FeatureDescriptor>,
    ) -> Result<ReducerChange, StoreError> {
        let descriptors: Vec<FeatureDescriptor> = descriptors.into_iter().collect();
        let keys: Vec<String> = descriptors.iter().map(|d| d.key.clone()).collect();

        self.commit_topology(ReducerChangeKind::FeaturesAdded, keys, |core, provider| {
            let mut seen = BTreeSet::new();
            for descriptor in &descriptors {
                let key = descriptor.key.as_str();
                if key.is_empty() {
                    return Err(StoreError::InvalidFeatureKey);
                }
                if core.registry.contains(key) || core.manager.has_root_key(key) || !seen.insert(key) {
                    return Err(StoreError::DuplicateFeature(key.to_string()));
                }
            }

            // Every token must resolve before any initial-state producer runs
            let descriptors = descriptors
                .into_iter()
                .map(|descriptor| descriptor.resolve_reducers(provider))
                .collect::<Result<Vec<_>, _>>()?;

            for descriptor in descriptors {
                let feature = FeatureRegistry::resolve(descriptor, provider)?;
                tracing::debug!(feature = %feature.key, "Adding feature");
                core.registry.insert(feature)?;
            }
            Ok(())
        })
    }

    /// Unregister a feature and drop its slice.
    ///
    /// # Errors
    ///
    /// See [`remove_features`](Self::remove_features).
    pub fn unregister_feature(&self, key: &str) -> Result<ReducerChange, StoreError> {
        self.remove_features([key])
    }

    /// Unregister several features with a single recombination.
    ///
    /// Each key's slice is removed from the live state. Repeated keys are
    /// removed once.
    ///
    /// # Errors
    ///
    /// - [`StoreError::InvalidFeatureKey`] for an empty key
    /// - [`StoreError::UnknownFeature`] if a key is not registered
    /// - [`StoreError::Reducer`] if the synthetic action fails
    ///
    /// On error the store is unchanged.
    #[tracing::instrument(skip_all, name = "store_remove_features")]
    pub fn remove_features<I, K>(&self, keys: I) -> Result<ReducerChange, StoreError>
    where
        I: IntoIterator<Item = K>,
        K: AsRef<str>,
    {
        let mut seen = BTreeSet::new();
        let keys: Vec<String> = keys
            .into_iter()
            .map(|key| key.as_ref().to_string())
            .filter(|key| seen.insert(key.clone()))
            .collect();

        self.commit_topology(ReducerChangeKind::FeaturesRemoved, keys.clone(), |core, _| {
            for key in &keys {
                if key.is_empty() {
                    return Err(StoreError::InvalidFeatureKey);
                }
                if !core.registry.contains(key) {
                    return Err(StoreError::UnknownFeature(key.clone()));
                }
            }

            for key in &keys {
                tracing::debug!(feature = %key, "Removing feature");
                core.registry.remove(key)?;
                core.state.remove_key(key);
            }
            Ok(())
        })
    }

    /// Replace the root reducer map.
    ///
    /// Slices owned by dropped root reducers are removed from the state.
    ///
    /// # Errors
    ///
    /// - [`StoreError::UnresolvedReducers`] / [`StoreError::ExpectedReducerMap`]
    ///   for a token the provider cannot satisfy
    /// - [`StoreError::DuplicateFeature`] if a new root key is a feature key
    /// - [`StoreError::Reducer`] if the synthetic action fails
    ///
    /// On error the store is unchanged.
    #[tracing::instrument(skip_all, name = "store_replace_reducers")]
    pub fn replace_reducers(
        &self,
        root_reducers: impl Into<ReducerSource<ReducerMap>>,
    ) -> Result<ReducerChange, StoreError> {
        let root = resolve_reducer_map(root_reducers.into(), self.inner.provider.as_ref())?;
        let keys: Vec<String> = root.keys().cloned().collect();

        self.commit_topology(ReducerChangeKind::RootReplaced, keys, |core, _| {
            if let Some(key) = root.keys().find(|key| core.registry.contains(key)) {
                return Err(StoreError::DuplicateFeature(key.clone()));
            }

            let previous = core.manager.replace_root(root);
            for key in previous.keys() {
                if !core.manager.has_root_key(key) {
                    core.state.remove_key(key);
                }
            }
            Ok(())
        })
    }

    /// The current state.
    #[must_use]
    pub fn state(&self) -> State {
        self.lock().state.current().clone()
    }

    /// Stream of states: the current one first, then every published state.
    #[must_use]
    pub fn observe_state(&self) -> BoxStream<'static, State> {
        let (current, receiver) = self.lock().state.subscribe();
        broadcast_stream(Some(current), receiver, "state")
    }

    /// Stream of projected values with consecutive duplicates suppressed.
    #[must_use]
    pub fn select<T, F>(&self, projector: F) -> BoxStream<'static, T>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn(&State) -> T + Send + 'static,
    {
        let mut states = self.observe_state();
        Box::pin(async_stream::stream! {
            let mut last: Option<T> = None;
            while let Some(state) = states.next().await {
                let value = projector(&state);
                if last.as_ref() != Some(&value) {
                    last = Some(value.clone());
                    yield value;
                }
            }
        })
    }

    /// Stream of every action entering the store, synthetic ones included.
    ///
    /// A reducers-updated action is emitted only once its topology change
    /// has committed; a rolled-back change emits nothing.
    #[must_use]
    pub fn observe_actions(&self) -> BoxStream<'static, Action> {
        broadcast_stream(None, self.inner.actions.subscribe(), "actions")
    }

    /// Stream of actions whose reduction succeeded, emitted after the
    /// resulting state was published.
    #[must_use]
    pub fn observe_reduced_actions(&self) -> BoxStream<'static, Action> {
        broadcast_stream(None, self.inner.reduced_actions.subscribe(), "reduced_actions")
    }

    /// Stream of committed reducer swaps.
    #[must_use]
    pub fn observe_reducer_changes(&self) -> BoxStream<'static, ReducerChange> {
        broadcast_stream(None, self.inner.reducer_changes.subscribe(), "reducer_changes")
    }

    /// Stream of non-fatal diagnostics.
    #[must_use]
    pub fn observe_diagnostics(&self) -> BoxStream<'static, Diagnostic> {
        broadcast_stream(None, self.inner.diagnostics.subscribe(), "diagnostics")
    }

    /// Registered feature keys, sorted.
    #[must_use]
    pub fn feature_keys(&self) -> Vec<String> {
        self.lock().registry.keys()
    }

    /// Whether a feature is registered under `key`.
    #[must_use]
    pub fn has_feature(&self, key: &str) -> bool {
        self.lock().registry.contains(key)
    }

    /// Number of committed reducer swaps.
    #[must_use]
    pub fn reducer_version(&self) -> u64 {
        self.lock().manager.version()
    }

    /// Number of actions that entered the store, synthetic ones included.
    #[must_use]
    pub fn actions_processed(&self) -> u64 {
        self.inner.actions.dispatched()
    }

    fn lock(&self) -> MutexGuard<'_, StoreCore> {
        self.inner
            .core
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one action through the pipeline. Caller holds the lock.
    ///
    /// Returns whether a new state was published.
    fn process(&self, core: &mut StoreCore, action: &Action) -> Result<bool, StoreError> {
        self.announce(action);
        let published = self.reduce(core, action)?;
        let _ = self.inner.reduced_actions.send(action.clone());
        Ok(published)
    }

    /// Count `action` and hand it to action observers.
    fn announce(&self, action: &Action) {
        let sequence = self.inner.actions.next(action);
        DispatchMetrics::record_dispatch();
        tracing::debug!(sequence, action = %action, "Action entered store");
    }

    /// Validate and reduce `action`, publishing the resulting state.
    fn reduce(&self, core: &mut StoreCore, action: &Action) -> Result<bool, StoreError> {
        if !action.is_synthetic() {
            if let Err(issue) = self.inner.validator.validate(action) {
                DispatchMetrics::record_invalid();
                tracing::warn!(action = %action, %issue, "Dispatched action failed validation");
                let _ = self.inner.diagnostics.send(Diagnostic::MalformedAction {
                    action: action.clone(),
                    issue,
                });
            }
        }

        let reducer = core.manager.active();
        let start = std::time::Instant::now();
        let result = core.state.apply(reducer.as_ref(), action);
        DispatchMetrics::record_reduction(start.elapsed());

        match result {
            Ok(published) => {
                tracing::trace!(action = %action, published, "Reduction completed");
                Ok(published)
            },
            Err(source) => {
                DispatchMetrics::record_error();
                let action_type = action.to_string();
                tracing::error!(
                    action = %action_type,
                    error = %source,
                    "Reducer failed, state unchanged"
                );
                let _ = self.inner.diagnostics.send(Diagnostic::ReductionFailed {
                    action_type: action_type.clone(),
                    slice_path: source.slice_path().into_iter().map(str::to_string).collect(),
                    message: source.to_string(),
                });
                Err(StoreError::Reducer {
                    action_type,
                    source,
                })
            },
        }
    }

    /// Apply `mutate`, recombine and reduce the synthetic update action, all
    /// in one step. Any failure, including a panic in user code, restores the
    /// store to its prior contents.
    ///
    /// The update action reaches action observers only once the change has
    /// committed.
    fn commit_topology<F>(
        &self,
        kind: ReducerChangeKind,
        keys: Vec<String>,
        mutate: F,
    ) -> Result<ReducerChange, StoreError>
    where
        F: FnOnce(&mut StoreCore, &dyn ReducerProvider) -> Result<(), StoreError>,
    {
        let mut guard = self.lock();
        let rollback = Rollback::capture(&guard);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.apply_topology(&mut guard, kind, keys, mutate)
        }));

        match outcome {
            Ok(Ok((change, update))) => {
                guard.manager.settle();
                TopologyMetrics::record_recombination(guard.registry.len());
                self.announce(&update);
                let _ = self.inner.reduced_actions.send(update);
                tracing::debug!(
                    version = change.version,
                    ?kind,
                    keys = ?change.keys,
                    "Reducer change committed"
                );
                let _ = self.inner.reducer_changes.send(change.clone());
                Ok(change)
            },
            Ok(Err(err)) => {
                TopologyMetrics::record_rollback();
                tracing::warn!(error = %err, ?kind, "Topology change rejected, rolling back");
                rollback.restore(&mut guard);
                Err(err)
            },
            Err(payload) => {
                TopologyMetrics::record_rollback();
                tracing::error!(?kind, "Topology change panicked, rolling back");
                rollback.restore(&mut guard);
                drop(guard);
                panic::resume_unwind(payload)
            },
        }
    }

    /// The fallible part of a topology change. Leaves `core` half-updated on
    /// error; the caller rolls back.
    fn apply_topology<F>(
        &self,
        core: &mut StoreCore,
        kind: ReducerChangeKind,
        keys: Vec<String>,
        mutate: F,
    ) -> Result<(ReducerChange, Action), StoreError>
    where
        F: FnOnce(&mut StoreCore, &dyn ReducerProvider) -> Result<(), StoreError>,
    {
        mutate(core, self.inner.provider.as_ref())?;

        let change = core.manager.recombine(&core.registry, kind, keys);
        let update = Action::update_reducers(change.keys.iter().cloned());
        self.reduce(core, &update)?;
        Ok((change, update))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.lock();
        f.debug_struct("Store")
            .field("features", &core.registry.keys())
            .field("reducer_version", &core.manager.version())
            .field("state", core.state.current())
            .finish_non_exhaustive()
    }
}
