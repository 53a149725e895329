//! Engine error types.
//!
//! Internally every step returns [`AdapterResult`]; the public entry point
//! folds the error into an [`Outcome`].

use ldf_backend::BackendError;
use ldf_model::Outcome;
use ldf_naming::NameError;
use thiserror::Error;

/// Errors raised during reconciliation.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The request is refused by policy.
    #[error("{0}")]
    Rejection(String),

    /// The request could not be completed.
    #[error("{0}")]
    Failure(String),

    /// The caller has to supply a value.
    #[error("{prompt}")]
    Question {
        /// Field to supply.
        field: String,
        /// Prompt for the user.
        prompt: String,
    },

    /// The configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl AdapterError {
    /// Creates a rejection.
    #[must_use]
    pub fn rejection(msg: impl Into<String>) -> Self {
        Self::Rejection(msg.into())
    }

    /// Creates a failure.
    #[must_use]
    pub fn failure(msg: impl Into<String>) -> Self {
        Self::Failure(msg.into())
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Checks if this is a policy refusal.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejection(_))
    }

    /// Converts the error into the outcome reported to the caller.
    #[must_use]
    pub fn into_outcome(self) -> Outcome {
        match self {
            Self::Rejection(message) => Outcome::Rejected { message },
            Self::Question { field, prompt } => Outcome::Question { field, prompt },
            Self::Failure(message) => Outcome::Failed { message },
            config @ Self::Config(_) => Outcome::Failed {
                message: config.to_string(),
            },
        }
    }
}

impl From<BackendError> for AdapterError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::Rejection(message) => Self::Rejection(message),
            other => Self::Failure(other.to_string()),
        }
    }
}

impl From<NameError> for AdapterError {
    fn from(err: NameError) -> Self {
        match err {
            NameError::Configuration(message) => Self::Config(message),
            other => Self::Failure(other.to_string()),
        }
    }
}

impl From<ldf_core::Error> for AdapterError {
    fn from(err: ldf_core::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for engine operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
