//! Action validation and diagnostics.
//!
//! Validation is advisory: an action that fails it is still reduced, but a
//! [`Diagnostic::MalformedAction`] is emitted and a warning is logged.

use composable_store_core::action::kind_of;
use composable_store_core::Action;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;

/// Custom validation predicate; `true` accepts the action.
pub type ValidationPredicate = Arc<dyn Fn(&Action) -> bool + Send + Sync>;

/// How dispatched actions are validated.
#[derive(Clone, Default)]
pub enum ActionValidator {
    /// Actions must be records with a string `type` field
    #[default]
    PlainRecord,

    /// A caller-supplied predicate
    Custom(ValidationPredicate),

    /// Accept everything
    Disabled,
}

/// Why an action failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ValidationIssue {
    /// The action is not a structured record
    NotARecord {
        /// Kind of value that was dispatched
        kind: &'static str,
    },

    /// The record has no string `type` field
    MissingType,

    /// A custom predicate rejected the action
    RejectedByPredicate,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotARecord { kind } => write!(f, "actions must be plain records, got {kind}"),
            Self::MissingType => f.write_str("actions must carry a string `type` field"),
            Self::RejectedByPredicate => f.write_str("rejected by the configured action validator"),
        }
    }
}

impl ActionValidator {
    /// Wrap a predicate.
    #[must_use]
    pub fn custom<F>(predicate: F) -> Self
    where
        F: Fn(&Action) -> bool + Send + Sync + 'static,
    {
        Self::Custom(Arc::new(predicate))
    }

    /// Check `action`.
    ///
    /// # Errors
    ///
    /// Returns the [`ValidationIssue`] when the action does not pass.
    pub fn validate(&self, action: &Action) -> Result<(), ValidationIssue> {
        match self {
            Self::PlainRecord => {
                if !action.is_record() {
                    return Err(ValidationIssue::NotARecord {
                        kind: kind_of(action.as_value()),
                    });
                }
                if action.action_type().is_none() {
                    return Err(ValidationIssue::MissingType);
                }
                Ok(())
            },
            Self::Custom(predicate) => {
                if predicate(action) {
                    Ok(())
                } else {
                    Err(ValidationIssue::RejectedByPredicate)
                }
            },
            Self::Disabled => Ok(()),
        }
    }
}

impl fmt::Debug for ActionValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlainRecord => write!(f, "ActionValidator::PlainRecord"),
            Self::Custom(_) => write!(f, "ActionValidator::Custom(<fn>)"),
            Self::Disabled => write!(f, "ActionValidator::Disabled"),
        }
    }
}

/// Non-fatal events reported on the store's diagnostics stream.
#[derive(Debug, Clone, Serialize)]
pub enum Diagnostic {
    /// A dispatched action failed validation; it was reduced anyway
    MalformedAction {
        /// The offending action
        action: Action,
        /// What was wrong with it
        issue: ValidationIssue,
    },

    /// A reducer failed; the error was also returned to the dispatcher
    ReductionFailed {
        /// Display form of the action being reduced
        action_type: String,
        /// Slice keys leading to the failing reducer
        slice_path: Vec<String>,
        /// Error message
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_plain_record_accepts_typed_record() {
        let validator = ActionValidator::default();
        assert_eq!(validator.validate(&Action::new("INC")), Ok(()));
    }

    #[test]
    fn test_plain_record_rejects_non_records() {
        let validator = ActionValidator::PlainRecord;
        assert_eq!(
            validator.validate(&Action::from(json!("INC"))),
            Err(ValidationIssue::NotARecord { kind: "string" })
        );
        assert_eq!(
            validator.validate(&Action::from(json!([1, 2]))),
            Err(ValidationIssue::NotARecord { kind: "array" })
        );
    }

    #[test]
    fn test_plain_record_requires_type() {
        let validator = ActionValidator::PlainRecord;
        assert_eq!(
            validator.validate(&Action::from(json!({ "payload": 1 }))),
            Err(ValidationIssue::MissingType)
        );
    }

    #[test]
    fn test_custom_predicate() {
        let validator = ActionValidator::custom(|action| {
            action.action_type().is_some_and(|t| t.starts_with("app/"))
        });
        assert_eq!(validator.validate(&Action::new("app/start")), Ok(()));
        assert_eq!(
            validator.validate(&Action::new("other")),
            Err(ValidationIssue::RejectedByPredicate)
        );
    }

    #[test]
    fn test_disabled_accepts_anything() {
        let validator = ActionValidator::Disabled;
        assert_eq!(validator.validate(&Action::from(json!(null))), Ok(()));
    }
}
