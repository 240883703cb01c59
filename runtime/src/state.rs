//! State container - the current state and its publication.

use composable_store_core::{Action, Reducer, ReducerError, State};
use tokio::sync::broadcast;

/// When the container publishes a reduced state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishMode {
    /// Publish only when the reduced state is not identical to the current one
    #[default]
    Distinct,

    /// Publish after every successful reduction
    Always,
}

/// Saved container contents, used to undo a failed topology change.
#[derive(Debug, Clone)]
pub struct StateSnapshot {
    current: State,
    pending_removal: bool,
}

/// Holds the current state and publishes new states to subscribers.
#[derive(Debug)]
pub struct StateContainer {
    current: State,
    pending_removal: bool,
    mode: PublishMode,
    sender: broadcast::Sender<State>,
}

impl StateContainer {
    /// Create a container seeded with `initial`.
    #[must_use]
    pub fn new(initial: State, mode: PublishMode, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            current: initial,
            pending_removal: false,
            mode,
            sender,
        }
    }

    /// The current state.
    #[must_use]
    pub fn current(&self) -> &State {
        &self.current
    }

    /// The publish mode.
    #[must_use]
    pub const fn mode(&self) -> PublishMode {
        self.mode
    }

    /// Reduce `action` against the current state.
    ///
    /// Returns whether a new state was published.
    ///
    /// # Errors
    ///
    /// Returns the reducer's error; the current state is left untouched and
    /// nothing is published.
    pub fn apply(&mut self, reducer: &dyn Reducer, action: &Action) -> Result<bool, ReducerError> {
        let next = reducer.reduce(Some(&self.current), action)?;

        let should_publish = match self.mode {
            PublishMode::Always => true,
            PublishMode::Distinct => self.pending_removal || !next.is_same(&self.current),
        };

        self.current = next;
        if should_publish {
            self.pending_removal = false;
            let _ = self.sender.send(self.current.clone());
        }
        Ok(should_publish)
    }

    /// Drop `key` from the live composite.
    ///
    /// The removal is not published by itself; the next reduction publishes
    /// regardless of identity.
    pub fn remove_key(&mut self, key: &str) {
        if self.current.contains_key(key) {
            self.current = self.current.without(key);
            self.pending_removal = true;
        }
    }

    /// Current state plus a receiver for every state published after it.
    #[must_use]
    pub fn subscribe(&self) -> (State, broadcast::Receiver<State>) {
        (self.current.clone(), self.sender.subscribe())
    }

    /// Capture the container contents.
    #[must_use]
    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            current: self.current.clone(),
            pending_removal: self.pending_removal,
        }
    }

    /// Restore contents captured by [`snapshot`](Self::snapshot).
    pub fn restore(&mut self, snapshot: StateSnapshot) {
        self.current = snapshot.current;
        self.pending_removal = snapshot.pending_removal;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use composable_store_core::{reducer_fn, ReduceResult};
    use serde_json::json;

    fn identity(state: Option<&State>, _action: &Action) -> ReduceResult {
        Ok(state.cloned().unwrap_or_default())
    }

    fn replace(_state: Option<&State>, _action: &Action) -> ReduceResult {
        Ok(State::leaf(1))
    }

    #[test]
    fn test_distinct_mode_skips_identical_state() {
        let mut container = StateContainer::new(State::empty(), PublishMode::Distinct, 4);
        let (_, mut rx) = container.subscribe();

        assert!(!container.apply(&identity, &Action::new("noop")).unwrap());
        assert!(container.apply(&replace, &Action::new("set")).unwrap());

        assert_eq!(rx.try_recv().unwrap(), json!(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_always_mode_publishes_every_reduction() {
        let mut container = StateContainer::new(State::empty(), PublishMode::Always, 4);
        let (_, mut rx) = container.subscribe();

        assert!(container.apply(&identity, &Action::new("noop")).unwrap());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_failed_reduction_keeps_state() {
        let initial = State::leaf(7);
        let mut container = StateContainer::new(initial.clone(), PublishMode::Distinct, 4);
        let (_, mut rx) = container.subscribe();
        let failing = reducer_fn(|_: Option<&State>, _: &Action| Err(ReducerError::rejected("no")));

        assert!(container.apply(failing.as_ref(), &Action::new("x")).is_err());
        assert!(container.current().is_same(&initial));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_removal_forces_next_publication() {
        let initial = State::tree([("a", State::leaf(1)), ("b", State::leaf(2))]);
        let mut container = StateContainer::new(initial, PublishMode::Distinct, 4);
        let (_, mut rx) = container.subscribe();

        container.remove_key("a");
        assert!(rx.try_recv().is_err());

        assert!(container.apply(&identity, &Action::new("update")).unwrap());
        assert_eq!(rx.try_recv().unwrap(), json!({ "b": 2 }));

        assert!(!container.apply(&identity, &Action::new("update")).unwrap());
    }

    #[test]
    fn test_remove_absent_key_is_noop() {
        let initial = State::tree([("b", State::leaf(2))]);
        let mut container = StateContainer::new(initial.clone(), PublishMode::Distinct, 4);
        container.remove_key("a");
        assert!(container.current().is_same(&initial));
        assert!(!container.apply(&identity, &Action::new("update")).unwrap());
    }

    #[test]
    fn test_snapshot_restore() {
        let initial = State::tree([("a", State::leaf(1))]);
        let mut container = StateContainer::new(initial.clone(), PublishMode::Distinct, 4);
        let snapshot = container.snapshot();

        container.remove_key("a");
        container.restore(snapshot);

        assert!(container.current().is_same(&initial));
        assert!(!container.apply(&identity, &Action::new("update")).unwrap());
    }
}
