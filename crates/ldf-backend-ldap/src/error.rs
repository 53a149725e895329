//! LDAP-specific error types.
//!
//! Error messages must not leak bind credentials.

use ldf_backend::BackendError;
use thiserror::Error;

/// LDAP-specific errors.
#[derive(Debug, Error)]
pub enum LdapError {
    /// Invalid configuration.
    #[error("LDAP configuration error: {0}")]
    Configuration(String),

    /// Connection failed.
    #[error("LDAP connection failed: {0}")]
    Connection(String),

    /// Bind (authentication) failed.
    #[error("LDAP bind failed: {0}")]
    Bind(String),

    /// Search operation failed.
    #[error("LDAP search failed: {0}")]
    Search(String),

    /// Add, modify or delete failed.
    #[error("LDAP update failed: {0}")]
    Update(String),

    /// Uid or gid range used up.
    #[error("No available {0} left in configured range.")]
    RangeExhausted(&'static str),

    /// Counter entry missing or malformed.
    #[error("LDAP counter error: {0}")]
    Counter(String),

    /// Underlying ldap3 error.
    #[error("LDAP error: {0}")]
    Ldap3(#[from] ldap3::LdapError),
}

impl LdapError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Creates a connection error.
    #[must_use]
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a search error.
    #[must_use]
    pub fn search(msg: impl Into<String>) -> Self {
        Self::Search(msg.into())
    }

    /// Creates an update error.
    #[must_use]
    pub fn update(msg: impl Into<String>) -> Self {
        Self::Update(msg.into())
    }

    /// Checks if this is a connection-related error.
    #[must_use]
    pub const fn is_connection_error(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Bind(_))
    }
}

/// Result type for LDAP operations.
pub type LdapResult<T> = Result<T, LdapError>;

impl From<LdapError> for BackendError {
    fn from(err: LdapError) -> Self {
        BackendError::Failure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_categories() {
        assert!(LdapError::connection("refused").is_connection_error());
        assert!(LdapError::Bind("invalid credentials".to_string()).is_connection_error());
        assert!(!LdapError::search("no such object").is_connection_error());
    }

    #[test]
    fn ldap_errors_are_backend_failures() {
        let err: BackendError = LdapError::RangeExhausted("UIDs").into();
        assert!(!err.is_rejection());
        assert_eq!(err.to_string(), "No available UIDs left in configured range.");
    }
}
