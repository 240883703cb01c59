//! The state tree.
//!
//! [`State`] is a persistent, reference-counted tree. Interior nodes map
//! feature keys to child states; leaves hold arbitrary JSON values. Cloning
//! a state is cheap (one reference-count increment) and two states are
//! *identical* when they share the same allocation, which is what the
//! combined reducer uses to decide whether anything changed.
//!
//! ```
//! use composable_store_core::state::State;
//! use serde_json::json;
//!
//! let counter = State::leaf(0);
//! let tree = State::empty().with("counter", counter.clone());
//!
//! assert!(tree.get("counter").is_some_and(|slice| slice.is_same(&counter)));
//! assert_eq!(tree.to_value(), json!({ "counter": 0 }));
//! ```

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A node of the application state tree.
#[derive(Clone)]
pub enum State {
    /// An opaque JSON value owned by a single reducer.
    Leaf(Arc<Value>),

    /// A composite keyed by feature (or sub-reducer) name.
    Tree(Arc<BTreeMap<String, State>>),
}

impl State {
    /// An empty composite.
    #[must_use]
    pub fn empty() -> Self {
        Self::Tree(Arc::new(BTreeMap::new()))
    }

    /// A leaf holding `value`.
    #[must_use]
    pub fn leaf(value: impl Into<Value>) -> Self {
        Self::Leaf(Arc::new(value.into()))
    }

    /// A composite built from `(key, state)` pairs.
    #[must_use]
    pub fn tree<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, State)>,
        K: Into<String>,
    {
        Self::Tree(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// Pointer identity: `true` only when both handles share one allocation.
    ///
    /// This is the "did it change" test used by the combined reducer and by
    /// the state container's distinct publishing.
    #[must_use]
    pub fn is_same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Leaf(a), Self::Leaf(b)) => Arc::ptr_eq(a, b),
            (Self::Tree(a), Self::Tree(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// The JSON value of a leaf.
    #[must_use]
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Leaf(value) => Some(value),
            Self::Tree(_) => None,
        }
    }

    /// Leaf value as an `i64`, if it is one.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        self.as_value().and_then(Value::as_i64)
    }

    /// Child state stored under `key`.
    ///
    /// Object leaves are looked into as well, so a state seeded from a JSON
    /// object behaves like a tree.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<State> {
        match self {
            Self::Tree(children) => children.get(key).cloned(),
            Self::Leaf(value) => value.get(key).cloned().map(Self::from),
        }
    }

    /// Whether a child exists under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        match self {
            Self::Tree(children) => children.contains_key(key),
            Self::Leaf(value) => value.as_object().is_some_and(|obj| obj.contains_key(key)),
        }
    }

    /// Keys of this composite, in sorted order. Empty for scalar leaves.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        match self {
            Self::Tree(children) => children.keys().cloned().collect(),
            Self::Leaf(value) => value
                .as_object()
                .map(|obj| {
                    let mut keys: Vec<String> = obj.keys().cloned().collect();
                    keys.sort();
                    keys
                })
                .unwrap_or_default(),
        }
    }

    /// Children of this composite as states.
    ///
    /// Object leaves are split into one leaf per field; anything else has no
    /// children.
    #[must_use]
    pub fn children(&self) -> BTreeMap<String, State> {
        match self {
            Self::Tree(children) => (**children).clone(),
            Self::Leaf(value) => value
                .as_object()
                .map(|obj| {
                    obj.iter()
                        .map(|(k, v)| (k.clone(), Self::from(v.clone())))
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// A copy of this composite with `key` set to `child`.
    #[must_use]
    pub fn with(&self, key: impl Into<String>, child: State) -> Self {
        let mut children = self.children();
        children.insert(key.into(), child);
        Self::Tree(Arc::new(children))
    }

    /// A copy of this composite without `key`.
    ///
    /// Returns `self` (same identity) when the key is absent.
    #[must_use]
    pub fn without(&self, key: &str) -> Self {
        if !self.contains_key(key) {
            return self.clone();
        }
        let mut children = self.children();
        children.remove(key);
        Self::Tree(Arc::new(children))
    }

    /// Render the whole tree as a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Leaf(value) => (**value).clone(),
            Self::Tree(children) => Value::Object(
                children
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_value()))
                    .collect::<Map<String, Value>>(),
            ),
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Value> for State {
    fn from(value: Value) -> Self {
        Self::Leaf(Arc::new(value))
    }
}

/// Structural equality; identical states are trivially equal.
impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        self.is_same(other) || self.to_value() == other.to_value()
    }
}

impl PartialEq<Value> for State {
    fn eq(&self, other: &Value) -> bool {
        self.to_value() == *other
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State({})", self.to_value())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_clone_is_same() {
        let state = State::leaf(json!({ "a": 1 }));
        let copy = state.clone();
        assert!(state.is_same(&copy));
    }

    #[test]
    fn test_equal_values_are_not_same() {
        let a = State::leaf(1);
        let b = State::leaf(1);
        assert_eq!(a, b);
        assert!(!a.is_same(&b));
    }

    #[test]
    fn test_object_leaf_behaves_like_tree() {
        let state = State::from(json!({ "b": 2, "a": 1 }));
        assert_eq!(state.keys(), vec!["a".to_string(), "b".to_string()]);
        assert!(state.contains_key("a"));
        assert_eq!(state.get("b").and_then(|s| s.as_i64()), Some(2));
        assert_eq!(state.children().len(), 2);
    }

    #[test]
    fn test_without_drops_key() {
        let state = State::empty()
            .with("a", State::leaf(1))
            .with("b", State::leaf(2));
        let trimmed = state.without("a");
        assert_eq!(trimmed.keys(), vec!["b".to_string()]);
        assert_eq!(trimmed, json!({ "b": 2 }));
    }

    #[test]
    fn test_without_absent_key_keeps_identity() {
        let state = State::empty().with("a", State::leaf(1));
        assert!(state.without("missing").is_same(&state));
    }

    #[test]
    fn test_with_shares_untouched_children() {
        let slice = State::leaf(json!([1, 2, 3]));
        let state = State::empty().with("list", slice.clone());
        let next = state.with("other", State::leaf(true));
        assert!(next.get("list").is_some_and(|s| s.is_same(&slice)));
    }

    #[test]
    fn test_scalar_leaf_has_no_children() {
        let state = State::leaf("text");
        assert!(state.keys().is_empty());
        assert!(state.get("anything").is_none());
    }
}
