//! Backend error types.

use ldf_naming::NameError;
use thiserror::Error;

/// Errors raised by identity backends.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The backend refuses the operation by policy.
    #[error("{0}")]
    Rejection(String),

    /// The operation failed in the environment.
    #[error("{0}")]
    Failure(String),

    /// The backend does not implement an optional operation.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A name could not be mapped for this backend.
    #[error(transparent)]
    Name(#[from] NameError),
}

impl BackendError {
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

    /// Creates a not supported error.
    #[must_use]
    pub fn not_supported(operation: impl Into<String>) -> Self {
        Self::NotSupported(operation.into())
    }

    /// Checks if this is a policy refusal.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejection(_))
    }

    /// Checks if the operation is simply not available.
    #[must_use]
    pub const fn is_not_supported(&self) -> bool {
        matches!(self, Self::NotSupported(_))
    }
}

/// Result type for backend operations.
pub type BackendResult<T> = Result<T, BackendError>;
