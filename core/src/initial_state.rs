//! Initial-state resolution.
//!
//! An initial state is either a literal value or a zero-argument producer.
//! Producers let a default be computed lazily, when the store (or feature)
//! actually starts, instead of at configuration time. Resolution applies one
//! rule everywhere: call the producer if there is one, otherwise use the
//! value as-is.

use crate::state::State;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Zero-argument state producer.
pub type StateProducer = Arc<dyn Fn() -> State + Send + Sync>;

/// Initial state of a store or feature.
#[derive(Clone, Default)]
pub enum InitialState {
    /// No initial state; reducers supply their own defaults
    #[default]
    Unset,

    /// A literal state
    Value(State),

    /// A producer invoked at resolution time
    Producer(StateProducer),
}

impl InitialState {
    /// Wrap a producer closure.
    #[must_use]
    pub fn producer<F>(produce: F) -> Self
    where
        F: Fn() -> State + Send + Sync + 'static,
    {
        Self::Producer(Arc::new(produce))
    }

    /// Resolve to a concrete state.
    ///
    /// Producers are invoked on every call; callers resolve once per
    /// registration and keep the result.
    #[must_use]
    pub fn resolve(&self) -> Option<State> {
        match self {
            Self::Unset => None,
            Self::Value(state) => Some(state.clone()),
            Self::Producer(produce) => Some(produce()),
        }
    }

    /// Whether no initial state was supplied.
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }
}

impl From<State> for InitialState {
    fn from(state: State) -> Self {
        Self::Value(state)
    }
}

impl From<Value> for InitialState {
    fn from(value: Value) -> Self {
        Self::Value(State::from(value))
    }
}

impl fmt::Debug for InitialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unset => write!(f, "InitialState::Unset"),
            Self::Value(state) => f.debug_tuple("InitialState::Value").field(state).finish(),
            Self::Producer(_) => write!(f, "InitialState::Producer(<fn>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_unset_resolves_to_none() {
        assert!(InitialState::Unset.resolve().is_none());
        assert!(InitialState::default().is_unset());
    }

    #[test]
    fn test_value_resolves_to_same_state() {
        let state = State::leaf(json!({ "a": 1 }));
        let initial = InitialState::from(state.clone());
        assert!(initial.resolve().is_some_and(|s| s.is_same(&state)));
    }

    #[test]
    fn test_producer_runs_on_resolve() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let initial = InitialState::producer(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            State::leaf(7)
        });

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let resolved = initial.resolve();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(resolved.and_then(|s| s.as_i64()), Some(7));
    }
}
