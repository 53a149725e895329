//! Naming error types.

use thiserror::Error;

/// Errors raised while deriving account names.
#[derive(Debug, Error)]
pub enum NameError {
    /// The name cannot be shortened to the maximum length.
    #[error("name '{name}' is too long and cannot be shortened by {excess} characters")]
    TooLong {
        /// The sanitized name that could not be shortened.
        name: String,
        /// Number of characters above the limit.
        excess: usize,
    },

    /// Generator configuration is incomplete.
    #[error("username generator configuration error: {0}")]
    Configuration(String),
}

impl NameError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

/// Result type for naming operations.
pub type NameResult<T> = Result<T, NameError>;
