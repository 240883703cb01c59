//! Actions - the inputs every reducer receives.
//!
//! An [`Action`] is a structured record with a string `type` discriminator
//! plus arbitrary additional fields. It wraps a [`serde_json::Value`] so that
//! values which are *not* records can still be dispatched and flagged by the
//! store's validator at the boundary instead of being rejected by the type
//! system.
//!
//! # Example
//!
//! ```
//! use composable_store_core::action::Action;
//! use serde_json::json;
//!
//! let action = Action::new("todos/add").with("title", "write docs");
//! assert_eq!(action.action_type(), Some("todos/add"));
//! assert_eq!(action.get("title"), Some(&json!("write docs")));
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Name of the discriminator field every well-formed action carries.
pub const TYPE_FIELD: &str = "type";

/// Action dispatched once when a store is configured.
pub const INIT_ACTION: &str = "@composable-store/init";

/// Action dispatched after every reducer swap.
///
/// Carries a `features` array naming the keys whose reducers changed.
pub const UPDATE_ACTION: &str = "@composable-store/update-reducers";

/// A dispatched action.
///
/// Well-formed actions are JSON objects with a string `type` field. The
/// wrapper does not enforce this; see the store's action validator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(Value);

impl Action {
    /// Create a well-formed action with the given type and no other fields.
    #[must_use]
    pub fn new(action_type: impl Into<String>) -> Self {
        let mut record = Map::new();
        record.insert(TYPE_FIELD.to_string(), Value::String(action_type.into()));
        Self(Value::Object(record))
    }

    /// Add (or overwrite) a field on a record action.
    ///
    /// Has no effect when the action is not a record.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        if let Value::Object(record) = &mut self.0 {
            record.insert(field.into(), value.into());
        }
        self
    }

    /// The synthetic action dispatched when a store starts.
    #[must_use]
    pub fn init() -> Self {
        Self::new(INIT_ACTION)
    }

    /// The synthetic action dispatched after the active reducer was swapped.
    #[must_use]
    pub fn update_reducers<I, K>(features: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let features: Vec<Value> = features
            .into_iter()
            .map(|key| Value::String(key.into()))
            .collect();
        Self::new(UPDATE_ACTION).with("features", Value::Array(features))
    }

    /// The `type` discriminator, if this is a record with a string `type`.
    #[must_use]
    pub fn action_type(&self) -> Option<&str> {
        self.0.get(TYPE_FIELD).and_then(Value::as_str)
    }

    /// Whether this action's type equals `action_type`.
    #[must_use]
    pub fn is(&self, action_type: &str) -> bool {
        self.action_type() == Some(action_type)
    }

    /// Look up a field on a record action.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Whether the action is a structured record (a JSON object).
    #[must_use]
    pub fn is_record(&self) -> bool {
        self.0.is_object()
    }

    /// Whether this is one of the store's own synthetic actions.
    #[must_use]
    pub fn is_synthetic(&self) -> bool {
        matches!(self.action_type(), Some(INIT_ACTION | UPDATE_ACTION))
    }

    /// Borrow the underlying JSON value.
    #[must_use]
    pub const fn as_value(&self) -> &Value {
        &self.0
    }

    /// Consume the action, returning the underlying JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.0
    }
}

impl From<Value> for Action {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action_type() {
            Some(action_type) => f.write_str(action_type),
            None => write!(f, "<untyped {}>", kind_of(&self.0)),
        }
    }
}

/// Short name of a JSON value's kind, used in diagnostics.
#[must_use]
pub const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
