//! LDAP backend configuration.
//!
//! Read from the `[backend.ldap]` table:
//!
//! ```toml
//! [backend.ldap]
//! mode = "full_access"
//! host = "ldap.example.org"
//! tls = true
//! admin_user = "cn=admin,dc=example"
//! admin_password = "secret"
//! user_base = "ou=users,dc=example"
//! group_base = "ou=groups,dc=example"
//! ```
//!
//! Plain `ldap://` connections are permitted for directories reachable only
//! on a trusted network; a warning is logged when one is opened.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LdapError, LdapResult};

const DEFAULT_PORT: u16 = 1389;
const DEFAULT_TLS_PORT: u16 = 636;

// ============================================================================
// Mode
// ============================================================================

/// What the backend may change in the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Nothing is written.
    #[default]
    #[serde(rename = "read_only", alias = "read-only", alias = "readonly")]
    ReadOnly,

    /// Existing entries are mapped to federated users.
    #[serde(rename = "pre_created", alias = "pre-created", alias = "precreated")]
    PreCreated,

    /// Entries and groups are created and deleted.
    #[serde(rename = "full_access", alias = "full-access", alias = "fullaccess")]
    FullAccess,
}

impl Mode {
    /// Returns the configuration name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReadOnly => "read_only",
            Self::PreCreated => "pre_created",
            Self::FullAccess => "full_access",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = LdapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "read_only" | "read-only" | "readonly" => Ok(Self::ReadOnly),
            "pre_created" | "pre-created" | "precreated" => Ok(Self::PreCreated),
            "full_access" | "full-access" | "fullaccess" => Ok(Self::FullAccess),
            other => Err(LdapError::config(format!(
                "Unknown mode '{other}'. Supported modes: read_only, pre_created, full_access."
            ))),
        }
    }
}

// ============================================================================
// LDAP Configuration
// ============================================================================

/// LDAP backend configuration.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LdapConfig {
    // === Connection ===
    /// What the backend may change.
    pub mode: Mode,

    /// Server host name.
    pub host: String,

    /// Server port; defaults to 636 with TLS and 1389 without.
    pub port: Option<u16>,

    /// Whether to connect with `ldaps://`.
    pub tls: bool,

    /// Bind DN; anonymous bind when unset.
    pub admin_user: Option<String>,

    /// Bind password.
    #[serde(skip_serializing)]
    pub admin_password: Option<String>,

    /// Connection timeout in seconds.
    pub connection_timeout_secs: u64,

    // === Directory Structure ===
    /// Base DN of user entries.
    pub user_base: String,

    /// Base DN of group entries.
    pub group_base: String,

    // === Attributes ===
    /// Attribute holding the federated unique id.
    #[serde(rename = "attribute_oidc_uid")]
    pub attr_oidc_uid: String,

    /// Attribute holding the local username.
    #[serde(rename = "attribute_local_uid")]
    pub attr_local_uid: String,

    // === New accounts (full access) ===
    /// Login shell of new accounts.
    pub shell: String,

    /// Directory below which home directories are placed.
    pub home_base: String,

    /// Smallest allocated uid.
    pub uid_min: u32,

    /// Largest allocated uid.
    pub uid_max: u32,

    /// Smallest allocated gid.
    pub gid_min: u32,

    /// Largest allocated gid.
    pub gid_max: u32,

    /// Login information returned with the credentials.
    pub login_info: BTreeMap<String, String>,
}

impl Default for LdapConfig {
    fn default() -> Self {
        Self {
            mode: Mode::ReadOnly,
            host: "localhost".to_string(),
            port: None,
            tls: false,
            admin_user: None,
            admin_password: None,
            connection_timeout_secs: 5,
            user_base: "ou=users,dc=example".to_string(),
            group_base: "ou=groups,dc=example".to_string(),
            attr_oidc_uid: "gecos".to_string(),
            attr_local_uid: "uid".to_string(),
            shell: "/bin/sh".to_string(),
            home_base: "/home".to_string(),
            uid_min: 1000,
            uid_max: 60000,
            gid_min: 1000,
            gid_max: 60000,
            login_info: BTreeMap::new(),
        }
    }
}

impl fmt::Debug for LdapConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LdapConfig")
            .field("mode", &self.mode)
            .field("url", &self.url())
            .field("admin_user", &self.admin_user)
            .field("admin_password", &self.admin_password.as_ref().map(|_| "***"))
            .field("user_base", &self.user_base)
            .field("group_base", &self.group_base)
            .field("attr_oidc_uid", &self.attr_oidc_uid)
            .field("attr_local_uid", &self.attr_local_uid)
            .finish_non_exhaustive()
    }
}

impl LdapConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> LdapConfigBuilder {
        LdapConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> LdapResult<()> {
        if self.host.is_empty() {
            return Err(LdapError::config("host cannot be empty"));
        }
        if self.user_base.is_empty() {
            return Err(LdapError::config("user_base cannot be empty"));
        }
        if self.group_base.is_empty() {
            return Err(LdapError::config("group_base cannot be empty"));
        }
        if self.attr_oidc_uid.is_empty() || self.attr_local_uid.is_empty() {
            return Err(LdapError::config("mapping attributes cannot be empty"));
        }
        if self.uid_min > self.uid_max {
            return Err(LdapError::config("uid_min must not exceed uid_max"));
        }
        if self.gid_min > self.gid_max {
            return Err(LdapError::config("gid_min must not exceed gid_max"));
        }
        if self.admin_user.is_some() != self.admin_password.is_some() {
            return Err(LdapError::config(
                "admin_user and admin_password must be set together",
            ));
        }
        Ok(())
    }

    /// The server URL.
    #[must_use]
    pub fn url(&self) -> String {
        let (scheme, default_port) = if self.tls {
            ("ldaps", DEFAULT_TLS_PORT)
        } else {
            ("ldap", DEFAULT_PORT)
        };
        format!("{scheme}://{}:{}", self.host, self.port.unwrap_or(default_port))
    }

    /// Connection timeout.
    #[must_use]
    pub const fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_timeout_secs)
    }

    /// Home directory base without trailing slashes.
    #[must_use]
    pub fn home_base(&self) -> &str {
        self.home_base.trim_end_matches('/')
    }

    /// The SSH host reported in the credentials.
    #[must_use]
    pub fn ssh_host(&self) -> &str {
        self.login_info
            .get("ssh_host")
            .map_or("undefined", String::as_str)
    }

    // === Filters and DNs ===

    /// Filter for the account mapped to a federated user.
    #[must_use]
    pub fn user_by_oidc_uid_filter(&self, unique_id: &str) -> String {
        format!(
            "(&({}={})(objectClass=inetOrgPerson)(objectClass=posixAccount))",
            self.attr_oidc_uid,
            ldap_escape(unique_id)
        )
    }

    /// Filter for the account with a local username.
    #[must_use]
    pub fn user_by_local_username_filter(&self, username: &str) -> String {
        format!(
            "(&({}={})(objectClass=inetOrgPerson)(objectClass=posixAccount))",
            self.attr_local_uid,
            ldap_escape(username)
        )
    }

    /// Filter for a group.
    #[must_use]
    pub fn group_by_name_filter(&self, name: &str) -> String {
        format!("(&(cn={})(objectClass=posixGroup))", ldap_escape(name))
    }

    /// DN of a new account.
    #[must_use]
    pub fn user_dn(&self, username: &str) -> String {
        format!("uid={},{}", dn_escape(username), self.user_base)
    }

    /// DN of a group.
    #[must_use]
    pub fn group_dn(&self, name: &str) -> String {
        format!("cn={},{}", dn_escape(name), self.group_base)
    }
}

/// Escapes special characters in LDAP filter values.
#[must_use]
pub fn ldap_escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => result.push_str("\\5c"),
            '*' => result.push_str("\\2a"),
            '(' => result.push_str("\\28"),
            ')' => result.push_str("\\29"),
            '\0' => result.push_str("\\00"),
            _ => result.push(c),
        }
    }
    result
}

/// Escapes special characters in DN attribute values.
#[must_use]
pub fn dn_escape(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    for (i, c) in value.chars().enumerate() {
        match c {
            ',' | '+' | '"' | '\\' | '<' | '>' | ';' | '=' => {
                result.push('\\');
                result.push(c);
            }
            '#' | ' ' if i == 0 => {
                result.push('\\');
                result.push(c);
            }
            _ => result.push(c),
        }
    }
    if result.ends_with(' ') && !result.ends_with("\\ ") {
        result.pop();
        result.push_str("\\ ");
    }
    result
}

// ============================================================================
// Configuration Builder
// ============================================================================

/// Builder for LDAP configuration.
#[derive(Debug, Default)]
pub struct LdapConfigBuilder {
    config: LdapConfig,
}

impl LdapConfigBuilder {
    /// Sets the mode.
    #[must_use]
    pub const fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Sets the server host.
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Sets the server port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.config.port = Some(port);
        self
    }

    /// Enables `ldaps://`.
    #[must_use]
    pub const fn tls(mut self, tls: bool) -> Self {
        self.config.tls = tls;
        self
    }

    /// Sets the bind credentials.
    #[must_use]
    pub fn admin(mut self, dn: impl Into<String>, password: impl Into<String>) -> Self {
        self.config.admin_user = Some(dn.into());
        self.config.admin_password = Some(password.into());
        self
    }

    /// Sets the user and group base DNs.
    #[must_use]
    pub fn bases(mut self, user_base: impl Into<String>, group_base: impl Into<String>) -> Self {
        self.config.user_base = user_base.into();
        self.config.group_base = group_base.into();
        self
    }

    /// Sets the uid range.
    #[must_use]
    pub const fn uid_range(mut self, min: u32, max: u32) -> Self {
        self.config.uid_min = min;
        self.config.uid_max = max;
        self
    }

    /// Sets the gid range.
    #[must_use]
    pub const fn gid_range(mut self, min: u32, max: u32) -> Self {
        self.config.gid_min = min;
        self.config.gid_max = max;
        self
    }

    /// Adds a login information entry.
    #[must_use]
    pub fn login_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.login_info.insert(key.into(), value.into());
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> LdapResult<LdapConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
