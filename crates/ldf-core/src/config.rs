//! Configuration management for the adapter.
//!
//! The configuration is a single TOML document. Every section and every field
//! has a default, so an empty file (or no file at all) yields a usable
//! configuration for the local UNIX backend.
//!
//! ```toml
//! [adapter]
//! backend = "local_unix"
//! primary_group = "users"
//!
//! [assurance]
//! require = "profile/cappuccino | profile/espresso"
//!
//! [backend.local_unix]
//! shell = "/bin/bash"
//!
//! [backend.local_unix.login_info]
//! ssh_host = "login.example.org"
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable naming the configuration file.
pub const CONFIG_ENV_VAR: &str = "LDF_ADAPTER_CONFIG";

/// Locations searched when neither the command line nor the environment
/// name a configuration file.
const DEFAULT_LOCATIONS: &[&str] = &["/etc/ldf-adapter/ldf-adapter.toml", "ldf-adapter.toml"];

// ============================================================================
// Top-level configuration
// ============================================================================

/// Main configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General adapter behaviour.
    pub adapter: AdapterConfig,
    /// Assurance requirements.
    pub assurance: AssuranceConfig,
    /// Username generation.
    pub username_generator: UsernameGeneratorConfig,
    /// Backend specific tables, keyed by backend name.
    pub backend: BTreeMap<String, toml::Table>,
}

impl Config {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads the configuration.
    ///
    /// An explicitly given path must exist. Without one, the file named by
    /// [`CONFIG_ENV_VAR`] is used, then the default locations. If nothing is
    /// found the built-in defaults apply.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match Self::resolve_path(path)? {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading configuration");
                let content = std::fs::read_to_string(&path)?;
                Self::from_toml_str(&content)
            }
            None => {
                tracing::info!("no configuration file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    fn resolve_path(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.exists() {
                return Err(Error::config(format!(
                    "configuration file {} does not exist",
                    path.display()
                )));
            }
            return Ok(Some(path.to_path_buf()));
        }

        if let Ok(value) = std::env::var(CONFIG_ENV_VAR) {
            let path = PathBuf::from(value);
            if !path.exists() {
                return Err(Error::config(format!(
                    "{CONFIG_ENV_VAR} points to {}, which does not exist",
                    path.display()
                )));
            }
            return Ok(Some(path));
        }

        Ok(DEFAULT_LOCATIONS
            .iter()
            .map(PathBuf::from)
            .find(|candidate| candidate.exists()))
    }

    /// Validates cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        let digits = self.username_generator.pool_digits;
        if digits == 0 || digits > 9 {
            return Err(Error::config(format!(
                "username_generator.pool_digits must be between 1 and 9, got {digits}"
            )));
        }
        if self.assurance.require.trim().is_empty() {
            return Err(Error::config("assurance.require cannot be empty"));
        }
        Ok(())
    }

    /// Deserializes the table of the named backend.
    ///
    /// A missing table yields the backend's defaults.
    pub fn backend_section<T>(&self, name: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        match self.backend.get(name) {
            Some(table) => Ok(toml::Value::Table(table.clone()).try_into()?),
            None => Ok(T::default()),
        }
    }

    /// Returns the `login_info` table of the named backend as plain strings.
    #[must_use]
    pub fn login_info(&self, name: &str) -> BTreeMap<String, String> {
        let Some(toml::Value::Table(info)) = self
            .backend
            .get(name)
            .and_then(|table| table.get("login_info"))
        else {
            return BTreeMap::new();
        };

        info.iter()
            .map(|(key, value)| {
                let value = match value {
                    toml::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }

    /// Returns the `login_info` table of the configured backend.
    #[must_use]
    pub fn active_login_info(&self) -> BTreeMap<String, String> {
        self.login_info(self.adapter.backend.as_str())
    }
}

// ============================================================================
// [adapter]
// ============================================================================

/// Identity backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Local operating system accounts managed with shadow-utils.
    #[default]
    LocalUnix,
    /// A directory service reached over LDAP.
    Ldap,
}

impl BackendKind {
    /// Returns the configuration name of the backend.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::LocalUnix => "local_unix",
            Self::Ldap => "ldap",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "local_unix" | "unix" => Ok(Self::LocalUnix),
            "ldap" => Ok(Self::Ldap),
            other => Err(Error::config(format!("unknown backend '{other}'"))),
        }
    }
}

/// General adapter behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterConfig {
    /// Backend that holds the accounts.
    pub backend: BackendKind,
    /// Ask the caller for a username instead of generating one.
    pub interactive: bool,
    /// Group every account gets as its primary group.
    pub primary_group: Option<String>,
    /// Primary group used when neither the configuration nor the claims
    /// provide one.
    pub fallback_group: Option<String>,
    /// Groups every account is additionally added to.
    pub additional_groups: Vec<String>,
}

// ============================================================================
// [assurance]
// ============================================================================

/// Assurance requirements.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssuranceConfig {
    /// Prefix prepended to relative assurance atoms.
    pub prefix: String,
    /// Boolean expression the user's assurance claims must satisfy.
    pub require: String,
    /// Skip the assurance check entirely.
    pub skip: bool,
    /// Refuse undeployment when the assurance check fails.
    pub verified_undeploy: bool,
}

impl Default for AssuranceConfig {
    fn default() -> Self {
        Self {
            prefix: "https://refeds.org/assurance/".to_string(),
            require: "profile/cappuccino".to_string(),
            skip: false,
            verified_undeploy: false,
        }
    }
}

// ============================================================================
// [username_generator]
// ============================================================================

/// Strategy used to pick usernames for new accounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeneratorMode {
    /// Human friendly names derived from the claims.
    #[default]
    Friendly,
    /// Numbered names from a pool (`prefix001`, `prefix002`, ...).
    Pooled,
}

/// Username generation settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsernameGeneratorConfig {
    /// Generation strategy.
    pub mode: GeneratorMode,
    /// Prefix of pooled names. Defaults to the user's primary group.
    pub pool_prefix: Option<String>,
    /// Number of zero padded digits in pooled names.
    pub pool_digits: usize,
}

impl Default for UsernameGeneratorConfig {
    fn default() -> Self {
        Self {
            mode: GeneratorMode::Friendly,
            pool_prefix: None,
            pool_digits: 3,
        }
    }
}
