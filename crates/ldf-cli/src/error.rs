//! CLI error types.

use ldf_adapter::AdapterError;
use ldf_model::ModelError;
use thiserror::Error;

/// CLI error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error(transparent)]
    Config(#[from] ldf_core::Error),

    /// The request is malformed.
    #[error("invalid request: {0}")]
    Request(#[from] ModelError),

    /// The backend could not be opened.
    #[error("backend error: {0}")]
    Backend(String),

    /// The engine could not be set up.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Creates a backend error.
    #[must_use]
    pub fn backend(msg: impl std::fmt::Display) -> Self {
        Self::Backend(msg.to_string())
    }
}

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;
