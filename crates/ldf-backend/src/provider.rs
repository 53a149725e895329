//! Backend traits.
//!
//! ## Handles
//!
//! - [`Backend`]: one connection to an identity store, passed by reference
//! - [`ServiceUser`]: the local account of one federated user
//! - [`ServiceGroup`]: one local group
//!
//! Handles never cache the account name across reconciliations; the engine
//! re-derives it from the backend through [`ServiceUser::get_username`].

use std::collections::BTreeMap;

use ldf_model::UserInfo;
use serde::{Deserialize, Serialize};

use crate::error::{BackendError, BackendResult};

// ============================================================================
// Capabilities
// ============================================================================

/// Optional operations a backend supports.
///
/// Checked once per reconciliation; unsupported predicates are treated as
/// `false` and unsupported transitions are not attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// `is_rejected` is meaningful.
    pub rejection: bool,
    /// `is_pending` is meaningful.
    pub pending: bool,
    /// `is_suspended`, `suspend` and `resume` are implemented.
    pub suspension: bool,
    /// `is_limited`, `limit` and `unlimit` are implemented.
    pub limitation: bool,
    /// Groups can be renamed, which enables legacy group migration.
    pub group_rename: bool,
}

impl Capabilities {
    /// Only the mandatory operations.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            rejection: false,
            pending: false,
            suspension: false,
            limitation: false,
            group_rename: false,
        }
    }

    /// Every optional operation.
    #[must_use]
    pub const fn all() -> Self {
        Self {
            rejection: true,
            pending: true,
            suspension: true,
            limitation: true,
            group_rename: true,
        }
    }
}

/// Order in which an account and its credentials are removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletionOrder {
    /// Uninstall credentials, then delete the account.
    #[default]
    CredentialsFirst,
    /// Delete the account, then uninstall credentials.
    AccountFirst,
}

// ============================================================================
// Backend
// ============================================================================

/// A connection to an identity store.
pub trait Backend {
    /// Returns the backend type identifier.
    fn backend_type(&self) -> &'static str;

    /// Returns the optional operations this backend supports.
    fn capabilities(&self) -> Capabilities {
        Capabilities::none()
    }

    /// Returns the order used when removing an account.
    fn deletion_order(&self) -> DeletionOrder {
        DeletionOrder::CredentialsFirst
    }

    /// Tests the connection to the store.
    fn test_connection(&self) -> BackendResult<()> {
        Ok(())
    }

    /// Returns the account handle for a federated user.
    ///
    /// If an account for the user exists, the handle carries its name.
    fn user<'a>(&'a self, info: &UserInfo) -> BackendResult<Box<dyn ServiceUser + 'a>>;

    /// Returns the handle of the group with the given label.
    ///
    /// The label is mapped to the backend's naming rules.
    fn group<'a>(&'a self, label: &str) -> BackendResult<Box<dyn ServiceGroup + 'a>>;

    /// Checks whether a group with exactly this backend name exists.
    fn group_exists(&self, name: &str) -> BackendResult<bool>;

    /// Renames a group, keeping its members and id.
    fn rename_group(&self, _from: &str, _to: &str) -> BackendResult<()> {
        Err(BackendError::not_supported("rename group"))
    }
}

// ============================================================================
// Service user
// ============================================================================

/// The local account of one federated user.
pub trait ServiceUser {
    /// The user's globally unique identifier.
    fn unique_id(&self) -> &str;

    /// The account name, once known.
    fn name(&self) -> Option<&str>;

    /// Checks whether an account for this user exists.
    fn exists(&self) -> BackendResult<bool>;

    /// Checks whether `name` belongs to an account of somebody else.
    fn name_taken(&self, name: &str) -> BackendResult<bool>;

    /// Reads the account name of this user from the backend.
    fn get_username(&self) -> BackendResult<Option<String>>;

    /// Sets the name used by subsequent operations.
    fn set_username(&mut self, name: &str) -> BackendResult<()>;

    /// Creates the account.
    fn create(&mut self) -> BackendResult<()>;

    /// Refreshes account attributes and login credentials.
    fn update(&mut self) -> BackendResult<()>;

    /// Deletes the account.
    fn delete(&mut self) -> BackendResult<()>;

    /// Adds the account to the given groups.
    fn modify_groups(&mut self, groups: &[String]) -> BackendResult<()>;

    /// Installs the user's SSH keys.
    fn install_ssh_keys(&mut self) -> BackendResult<()>;

    /// Removes the user's SSH keys.
    fn uninstall_ssh_keys(&mut self) -> BackendResult<()>;

    /// Login information gathered by [`ServiceUser::update`].
    fn credentials(&self) -> BTreeMap<String, String>;

    // === Optional lifecycle operations ===

    /// Checks whether the backend refuses this account.
    fn is_rejected(&self) -> BackendResult<bool> {
        Ok(false)
    }

    /// Checks whether the account is locked.
    fn is_suspended(&self) -> BackendResult<bool> {
        Ok(false)
    }

    /// Checks whether account creation awaits an out-of-band step.
    fn is_pending(&self) -> BackendResult<bool> {
        Ok(false)
    }

    /// Checks whether the account is restricted.
    fn is_limited(&self) -> BackendResult<bool> {
        Ok(false)
    }

    /// Locks the account.
    fn suspend(&mut self) -> BackendResult<()> {
        Err(BackendError::not_supported("suspend"))
    }

    /// Unlocks the account.
    fn resume(&mut self) -> BackendResult<()> {
        Err(BackendError::not_supported("resume"))
    }

    /// Restricts the account.
    fn limit(&mut self) -> BackendResult<()> {
        Err(BackendError::not_supported("limit"))
    }

    /// Lifts a restriction.
    fn unlimit(&mut self) -> BackendResult<()> {
        Err(BackendError::not_supported("unlimit"))
    }
}

// ============================================================================
// Service group
// ============================================================================

/// A local group.
pub trait ServiceGroup {
    /// The group name in the backend.
    fn name(&self) -> &str;

    /// Checks whether the group exists.
    fn exists(&self) -> BackendResult<bool>;

    /// Creates the group.
    fn create(&mut self) -> BackendResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Minimal;

    impl Backend for Minimal {
        fn backend_type(&self) -> &'static str {
            "minimal"
        }

        fn user<'a>(&'a self, _info: &UserInfo) -> BackendResult<Box<dyn ServiceUser + 'a>> {
            Err(BackendError::not_supported("users"))
        }

        fn group<'a>(&'a self, _label: &str) -> BackendResult<Box<dyn ServiceGroup + 'a>> {
            Err(BackendError::not_supported("groups"))
        }

        fn group_exists(&self, _name: &str) -> BackendResult<bool> {
            Ok(false)
        }
    }

    #[test]
    fn defaults_advertise_nothing_optional() {
        let backend = Minimal;
        assert_eq!(backend.capabilities(), Capabilities::none());
        assert_eq!(backend.deletion_order(), DeletionOrder::CredentialsFirst);
        assert!(backend.test_connection().is_ok());
        assert!(backend
            .rename_group("a", "b")
            .unwrap_err()
            .is_not_supported());
    }
}
