//! Directory access.
//!
//! The backend talks to the directory through the [`Directory`] trait;
//! [`LdapConnection`] implements it with `ldap3`'s synchronous client.

use std::collections::HashSet;

use ldap3::{LdapConn, LdapConnSettings, Mod, Scope, SearchEntry, SearchResult};
use parking_lot::Mutex;

use crate::config::LdapConfig;
use crate::error::{LdapError, LdapResult};
use crate::search::LdapEntry;

/// `noSuchObject`: the search base does not exist.
const RC_NO_SUCH_OBJECT: u32 = 32;

/// Operations the backend needs from a directory.
pub trait Directory {
    /// Searches the subtree below `base`.
    fn search(&self, base: &str, filter: &str, attrs: &[&str]) -> LdapResult<Vec<LdapEntry>>;

    /// Adds an entry.
    fn add(&self, dn: &str, attrs: Vec<(String, HashSet<String>)>) -> LdapResult<()>;

    /// Modifies an entry. Fails as a whole if any modification fails.
    fn modify(&self, dn: &str, mods: Vec<Mod<String>>) -> LdapResult<()>;

    /// Deletes an entry.
    fn delete(&self, dn: &str) -> LdapResult<()>;
}

/// A bound connection to an LDAP server.
pub struct LdapConnection {
    ldap: Mutex<LdapConn>,
}

impl LdapConnection {
    /// Connects and binds.
    ///
    /// Binds anonymously unless admin credentials are configured.
    pub fn open(config: &LdapConfig) -> LdapResult<Self> {
        let url = config.url();
        if !config.tls {
            tracing::warn!(%url, "connecting without TLS");
        }

        let settings = LdapConnSettings::new().set_conn_timeout(config.connection_timeout());
        let mut ldap = LdapConn::with_settings(settings, &url).map_err(|e| {
            tracing::error!(%url, error = %e, "could not connect");
            LdapError::connection(format!("Could not connect to server {url}/"))
        })?;

        if let (Some(user), Some(password)) = (&config.admin_user, &config.admin_password) {
            ldap.simple_bind(user, password)
                .map_err(|e| LdapError::Bind(e.to_string()))?
                .success()
                .map_err(|e| LdapError::Bind(format!("Bind failed: {e}")))?;
        }

        tracing::debug!(%url, "connected");
        Ok(Self {
            ldap: Mutex::new(ldap),
        })
    }
}

impl Directory for LdapConnection {
    fn search(&self, base: &str, filter: &str, attrs: &[&str]) -> LdapResult<Vec<LdapEntry>> {
        let SearchResult(entries, result) = self
            .ldap
            .lock()
            .search(base, Scope::Subtree, filter, attrs.to_vec())
            .map_err(|e| LdapError::search(e.to_string()))?;

        if result.rc == RC_NO_SUCH_OBJECT {
            return Ok(Vec::new());
        }
        result
            .success()
            .map_err(|e| LdapError::search(format!("Error searching in LDAP: {e}")))?;

        Ok(entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(LdapEntry::from_search_entry)
            .collect())
    }

    fn add(&self, dn: &str, attrs: Vec<(String, HashSet<String>)>) -> LdapResult<()> {
        self.ldap
            .lock()
            .add(dn, attrs)?
            .success()
            .map_err(|e| LdapError::update(format!("add {dn}: {e}")))?;
        Ok(())
    }

    fn modify(&self, dn: &str, mods: Vec<Mod<String>>) -> LdapResult<()> {
        self.ldap
            .lock()
            .modify(dn, mods)?
            .success()
            .map_err(|e| LdapError::update(format!("modify {dn}: {e}")))?;
        Ok(())
    }

    fn delete(&self, dn: &str) -> LdapResult<()> {
        self.ldap
            .lock()
            .delete(dn)?
            .success()
            .map_err(|e| LdapError::update(format!("delete {dn}: {e}")))?;
        Ok(())
    }
}

impl std::fmt::Debug for LdapConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapConnection").finish_non_exhaustive()
    }
}
