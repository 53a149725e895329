//! Local UNIX backend errors.

use ldf_backend::BackendError;
use thiserror::Error;

/// Errors raised by the local UNIX backend.
#[derive(Debug, Error)]
pub enum UnixError {
    /// A shadow-utils command exited unsuccessfully.
    #[error("{command}: {output}")]
    Command {
        /// The command line.
        command: String,
        /// Captured stderr, or stdout if stderr was empty.
        output: String,
    },

    /// The account or group database could not be read.
    #[error("Could not get information about existing users on system: {0}")]
    Database(String),

    /// Command output could not be understood.
    #[error("Could not parse command output: {0}")]
    Parse(String),

    /// Invalid backend configuration.
    #[error("local_unix configuration error: {0}")]
    Configuration(String),

    /// Filesystem error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl UnixError {
    /// Creates a database error.
    #[must_use]
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Creates a parse error.
    #[must_use]
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Checks if a command failed.
    #[must_use]
    pub const fn is_command_error(&self) -> bool {
        matches!(self, Self::Command { .. })
    }
}

/// Result type for local UNIX operations.
pub type UnixResult<T> = Result<T, UnixError>;

impl From<UnixError> for BackendError {
    fn from(err: UnixError) -> Self {
        match err {
            UnixError::Io(e) => BackendError::Io(e),
            other => BackendError::Failure(other.to_string()),
        }
    }
}
