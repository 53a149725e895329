//! Model error types.

use thiserror::Error;

/// Errors raised while building model values from external input.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A required claim is absent or not a string.
    #[error("missing claim: {0}")]
    MissingClaim(String),

    /// A claim has an unexpected shape.
    #[error("invalid claim '{claim}': {reason}")]
    InvalidClaim {
        /// Claim name.
        claim: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The requested target state is unknown.
    #[error("unknown target state: {0}")]
    UnknownTarget(String),

    /// The account state is unknown.
    #[error("unknown account state: {0}")]
    UnknownState(String),
}

impl ModelError {
    /// Creates an invalid claim error.
    #[must_use]
    pub fn invalid_claim(claim: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidClaim {
            claim: claim.into(),
            reason: reason.into(),
        }
    }
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;
