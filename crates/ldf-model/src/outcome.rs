//! The result of a reconciliation.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::state::{State, Status};

/// Result returned to the caller for every request.
///
/// Exactly one variant is produced per reconciliation; errors inside the
/// engine are folded into [`Outcome::Rejected`], [`Outcome::Failed`] or
/// [`Outcome::Question`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The account exists and is usable.
    Deployed {
        /// Login information for the user.
        credentials: BTreeMap<String, String>,
        /// What was done.
        message: String,
    },
    /// The account is gone (or never existed).
    NotDeployed {
        /// What was done.
        message: String,
    },
    /// A state report, also used for lifecycle transitions.
    Status(Status),
    /// The caller has to supply a value before the request can proceed.
    Question {
        /// Name of the field to supply.
        field: String,
        /// Prompt for the user.
        prompt: String,
    },
    /// The request was refused by policy.
    Rejected {
        /// Why.
        message: String,
    },
    /// The request could not be completed.
    Failed {
        /// Why.
        message: String,
    },
}

impl Outcome {
    /// Creates a status outcome.
    #[must_use]
    pub fn status(state: State, message: impl Into<String>) -> Self {
        Self::Status(Status::new(state, message))
    }

    /// Creates a rejection.
    #[must_use]
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    /// Creates a failure.
    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    /// Returns the state name reported to the caller.
    #[must_use]
    pub const fn state_name(&self) -> &'static str {
        match self {
            Self::Deployed { .. } => "deployed",
            Self::NotDeployed { .. } => "not_deployed",
            Self::Status(status) => status.state.as_str(),
            Self::Question { .. } => "questionnaire",
            Self::Rejected { .. } => "rejected",
            Self::Failed { .. } => "failed",
        }
    }

    /// Returns the message, or the prompt for questions.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Deployed { message, .. }
            | Self::NotDeployed { message }
            | Self::Rejected { message }
            | Self::Failed { message } => message,
            Self::Status(status) => &status.message,
            Self::Question { prompt, .. } => prompt,
        }
    }

    /// Checks if this outcome reports a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    /// Renders the outcome as the JSON document returned to the caller.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Deployed {
                credentials,
                message,
            } => json!({
                "state": self.state_name(),
                "message": message,
                "credentials": credentials,
            }),
            Self::Question { field, prompt } => {
                let mut questionnaire = serde_json::Map::new();
                questionnaire.insert(field.clone(), Value::String(prompt.clone()));
                json!({
                    "state": self.state_name(),
                    "questionnaire": questionnaire,
                })
            }
            _ => json!({
                "state": self.state_name(),
                "message": self.message(),
            }),
        }
    }
}
