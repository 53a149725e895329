//! Local UNIX backend configuration.
//!
//! Read from the `[backend.local_unix]` table:
//!
//! ```toml
//! [backend.local_unix]
//! shell = "/bin/bash"
//! home_base = "/home"
//! deploy_user_ssh_keys = true
//! deletion_order = "credentials_first"
//!
//! [backend.local_unix.login_info]
//! ssh_host = "login.example.org"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ldf_backend::DeletionOrder;
use serde::{Deserialize, Serialize};

use crate::error::{UnixError, UnixResult};

/// Shells that deny interactive logins.
pub const NOLOGIN_SHELLS: &[&str] = &["/sbin/nologin", "/usr/bin/nologin", "/bin/nologin"];

/// Shell set when an account is limited.
pub const LIMITED_SHELL: &str = "/sbin/nologin";

/// Local UNIX backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnixConfig {
    /// Login shell of new accounts.
    pub shell: String,
    /// Directory below which home directories are created.
    pub home_base: String,
    /// Whether SSH keys are written to `~/.ssh/authorized_keys`.
    pub deploy_user_ssh_keys: bool,
    /// Root of the system whose `etc/passwd` and `etc/group` are read.
    pub root: PathBuf,
    /// Order in which accounts and their keys are removed.
    pub deletion_order: DeletionOrder,
    /// Login information returned with the credentials.
    pub login_info: BTreeMap<String, String>,
}

impl Default for UnixConfig {
    fn default() -> Self {
        Self {
            shell: "/bin/sh".to_string(),
            home_base: "/home".to_string(),
            deploy_user_ssh_keys: true,
            root: PathBuf::from("/"),
            deletion_order: DeletionOrder::CredentialsFirst,
            login_info: BTreeMap::new(),
        }
    }
}

impl UnixConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> UnixConfigBuilder {
        UnixConfigBuilder::default()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> UnixResult<()> {
        if !self.shell.starts_with('/') {
            return Err(UnixError::Configuration(format!(
                "shell must be an absolute path, got '{}'",
                self.shell
            )));
        }
        if !self.home_base.starts_with('/') {
            return Err(UnixError::Configuration(format!(
                "home_base must be an absolute path, got '{}'",
                self.home_base
            )));
        }
        Ok(())
    }

    /// Home directory base without trailing slashes.
    #[must_use]
    pub fn home_base(&self) -> &str {
        match self.home_base.trim_end_matches('/') {
            "" => "/",
            trimmed => trimmed,
        }
    }

    /// Path of `etc/passwd` below the root.
    #[must_use]
    pub fn passwd_path(&self) -> PathBuf {
        self.root.join("etc").join("passwd")
    }

    /// Path of `etc/group` below the root.
    #[must_use]
    pub fn group_path(&self) -> PathBuf {
        self.root.join("etc").join("group")
    }

    /// Maps an absolute path from the account database below the root.
    #[must_use]
    pub fn rooted(&self, path: &str) -> PathBuf {
        self.root.join(Path::new(path.trim_start_matches('/')))
    }

    /// The SSH host reported in the credentials.
    #[must_use]
    pub fn ssh_host(&self) -> &str {
        self.login_info
            .get("ssh_host")
            .map_or("undefined", String::as_str)
    }
}

/// Builder for [`UnixConfig`].
#[derive(Debug, Default)]
pub struct UnixConfigBuilder {
    config: UnixConfig,
}

impl UnixConfigBuilder {
    /// Sets the login shell.
    #[must_use]
    pub fn shell(mut self, shell: impl Into<String>) -> Self {
        self.config.shell = shell.into();
        self
    }

    /// Sets the home directory base.
    #[must_use]
    pub fn home_base(mut self, home_base: impl Into<String>) -> Self {
        self.config.home_base = home_base.into();
        self
    }

    /// Enables or disables SSH key deployment.
    #[must_use]
    pub const fn deploy_user_ssh_keys(mut self, deploy: bool) -> Self {
        self.config.deploy_user_ssh_keys = deploy;
        self
    }

    /// Sets the system root.
    #[must_use]
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = root.into();
        self
    }

    /// Sets the deletion order.
    #[must_use]
    pub const fn deletion_order(mut self, order: DeletionOrder) -> Self {
        self.config.deletion_order = order;
        self
    }

    /// Adds a login information entry.
    #[must_use]
    pub fn login_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.login_info.insert(key.into(), value.into());
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> UnixResult<UnixConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use ldf_core::Config;

    use super::*;

    #[test]
    fn defaults() {
        let config = UnixConfig::default();
        assert_eq!(config.shell, "/bin/sh");
        assert_eq!(config.home_base(), "/home");
        assert!(config.deploy_user_ssh_keys);
        assert_eq!(config.passwd_path(), PathBuf::from("/etc/passwd"));
        assert_eq!(config.ssh_host(), "undefined");
    }

    #[test]
    fn reads_backend_table() {
        let config = Config::from_toml_str(
            r#"
            [backend.local_unix]
            shell = "/bin/bash"
            home_base = "/srv/home/"
            deletion_order = "account_first"

            [backend.local_unix.login_info]
            ssh_host = "login.example.org"
            "#,
        )
        .unwrap();

        let unix: UnixConfig = config.backend_section("local_unix").unwrap();
        assert_eq!(unix.shell, "/bin/bash");
        assert_eq!(unix.home_base(), "/srv/home");
        assert_eq!(unix.deletion_order, DeletionOrder::AccountFirst);
        assert_eq!(unix.ssh_host(), "login.example.org");
    }

    #[test]
    fn rooted_paths_stay_below_root() {
        let config = UnixConfig::builder().root("/tmp/fake").build().unwrap();
        assert_eq!(
            config.rooted("/home/jdoe/.ssh"),
            PathBuf::from("/tmp/fake/home/jdoe/.ssh")
        );
    }

    #[test]
    fn relative_shell_is_rejected() {
        assert!(matches!(
            UnixConfig::builder().shell("bash").build(),
            Err(UnixError::Configuration(_))
        ));
    }
}
