//! Reducer manager - owns and swaps the active root reducer.
//!
//! The active reducer is always derived from the root reducers plus the
//! registry's current contents. Each recombination builds a fresh reducer
//! through the root factory (which already carries the root meta-reducers)
//! and bumps the reducer version.

use crate::registry::FeatureRegistry;
use composable_store_core::{BoxedReducer, BoxedReducerFactory, ReducerMap, State};
use serde::Serialize;
use std::sync::Arc;

/// Lifecycle of the manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ManagerPhase {
    /// The active reducer is settled
    #[default]
    Idle,

    /// A new reducer was swapped in; its synthetic action is in flight
    Recombining,
}

/// What triggered a reducer swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReducerChangeKind {
    /// One or more features were registered
    FeaturesAdded,
    /// One or more features were unregistered
    FeaturesRemoved,
    /// The root reducer map was replaced
    RootReplaced,
}

/// A committed reducer swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReducerChange {
    /// Reducer version after the swap (the initial reducer is version 0)
    pub version: u64,
    /// What triggered it
    pub kind: ReducerChangeKind,
    /// Affected feature (or root) keys
    pub keys: Vec<String>,
}

/// Saved manager contents, used to undo a failed topology change.
#[derive(Clone)]
pub struct ManagerSnapshot {
    root: ReducerMap,
    active: BoxedReducer,
    version: u64,
}

/// Owns the active root reducer.
pub struct ReducerManager {
    root: ReducerMap,
    factory: BoxedReducerFactory,
    initial_state: Option<State>,
    active: BoxedReducer,
    version: u64,
    phase: ManagerPhase,
}

impl ReducerManager {
    /// Build the initial reducer from `root`.
    ///
    /// `factory` should already apply the root meta-reducers.
    #[must_use]
    pub fn new(root: ReducerMap, factory: BoxedReducerFactory, initial_state: Option<State>) -> Self {
        let active = factory.create(&root, initial_state.as_ref());
        Self {
            root,
            factory,
            initial_state,
            active,
            version: 0,
            phase: ManagerPhase::Idle,
        }
    }

    /// The reducer every action currently goes through.
    #[must_use]
    pub fn active(&self) -> BoxedReducer {
        Arc::clone(&self.active)
    }

    /// Number of committed swaps.
    #[must_use]
    pub const fn version(&self) -> u64 {
        self.version
    }

    /// Current phase.
    #[must_use]
    pub const fn phase(&self) -> ManagerPhase {
        self.phase
    }

    /// Keys of the root reducers.
    #[must_use]
    pub fn root_keys(&self) -> Vec<String> {
        self.root.keys().cloned().collect()
    }

    /// Whether a root reducer owns `key`.
    #[must_use]
    pub fn has_root_key(&self, key: &str) -> bool {
        self.root.contains_key(key)
    }

    /// Rebuild the active reducer from the root reducers and `registry`.
    ///
    /// Leaves the manager in [`ManagerPhase::Recombining`] until
    /// [`settle`](Self::settle) or [`restore`](Self::restore).
    pub fn recombine(
        &mut self,
        registry: &FeatureRegistry,
        kind: ReducerChangeKind,
        keys: Vec<String>,
    ) -> ReducerChange {
        self.phase = ManagerPhase::Recombining;

        let mut reducers = self.root.clone();
        reducers.extend(registry.reducers());

        self.active = self.factory.create(&reducers, self.initial_state.as_ref());
        self.version += 1;

        tracing::debug!(
            version = self.version,
            ?kind,
            reducers = reducers.len(),
            "Recombined root reducer"
        );

        ReducerChange {
            version: self.version,
            kind,
            keys,
        }
    }

    /// Mark the last recombination as committed.
    pub fn settle(&mut self) {
        self.phase = ManagerPhase::Idle;
    }

    /// Swap the root reducer map. Takes effect on the next
    /// [`recombine`](Self::recombine).
    ///
    /// Returns the previous map.
    pub fn replace_root(&mut self, root: ReducerMap) -> ReducerMap {
        std::mem::replace(&mut self.root, root)
    }

    /// Capture the manager contents.
    #[must_use]
    pub fn snapshot(&self) -> ManagerSnapshot {
        ManagerSnapshot {
            root: self.root.clone(),
            active: Arc::clone(&self.active),
            version: self.version,
        }
    }

    /// Restore contents captured by [`snapshot`](Self::snapshot) and return
    /// to [`ManagerPhase::Idle`].
    pub fn restore(&mut self, snapshot: ManagerSnapshot) {
        self.root = snapshot.root;
        self.active = snapshot.active;
        self.version = snapshot.version;
        self.phase = ManagerPhase::Idle;
    }
}

impl std::fmt::Debug for ReducerManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReducerManager")
            .field("root_keys", &self.root_keys())
            .field("version", &self.version)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}
