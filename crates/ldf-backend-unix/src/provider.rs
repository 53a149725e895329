//! Local UNIX backend.
//!
//! Account and group names are mapped through [`ldf_naming::sanitize`]; the
//! GECOS field of an account holds the encoded unique id of its owner.

use std::collections::BTreeMap;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use ldf_backend::{
    Backend, BackendError, BackendResult, Capabilities, DeletionOrder, ServiceGroup, ServiceUser,
};
use ldf_model::UserInfo;
use regex::Regex;

use crate::command::{CommandRunner, SystemRunner};
use crate::config::{UnixConfig, LIMITED_SHELL, NOLOGIN_SHELLS};
use crate::database::{encode_gecos, read_group, read_passwd, GroupEntry, PasswdEntry};
use crate::error::{UnixError, UnixResult};

/// Backend for local accounts.
#[derive(Debug)]
pub struct UnixBackend<R = SystemRunner> {
    config: UnixConfig,
    runner: R,
}

impl UnixBackend<SystemRunner> {
    /// Creates a backend running the system's shadow-utils.
    pub fn new(config: UnixConfig) -> UnixResult<Self> {
        Self::with_runner(config, SystemRunner)
    }
}

impl<R: CommandRunner> UnixBackend<R> {
    /// Creates a backend running commands through `runner`.
    pub fn with_runner(config: UnixConfig, runner: R) -> UnixResult<Self> {
        config.validate()?;
        Ok(Self { config, runner })
    }

    /// The backend configuration.
    #[must_use]
    pub const fn config(&self) -> &UnixConfig {
        &self.config
    }

    /// The command runner.
    #[must_use]
    pub const fn runner(&self) -> &R {
        &self.runner
    }

    fn passwd(&self) -> BackendResult<Vec<PasswdEntry>> {
        Ok(read_passwd(&self.config.passwd_path())?)
    }

    fn groups(&self) -> BackendResult<Vec<GroupEntry>> {
        Ok(read_group(&self.config.group_path())?)
    }

    fn entry_by_unique_id(&self, unique_id: &str) -> BackendResult<Option<PasswdEntry>> {
        let gecos = encode_gecos(unique_id);
        Ok(self.passwd()?.into_iter().find(|entry| entry.gecos == gecos))
    }

    /// Runs a command; failures become [`BackendError::Failure`] prefixed
    /// with `context`.
    fn run(&self, context: &str, program: &str, args: &[&str]) -> BackendResult<String> {
        let args: Vec<String> = args.iter().map(|arg| (*arg).to_string()).collect();
        self.runner.run(program, &args).map_err(|err| {
            tracing::error!(error = %err, "error executing command");
            BackendError::failure(format!("{context}: {err}"))
        })
    }
}

impl<R: CommandRunner> Backend for UnixBackend<R> {
    fn backend_type(&self) -> &'static str {
        "local_unix"
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            rejection: false,
            pending: false,
            suspension: true,
            limitation: true,
            group_rename: true,
        }
    }

    fn deletion_order(&self) -> DeletionOrder {
        self.config.deletion_order
    }

    fn test_connection(&self) -> BackendResult<()> {
        self.passwd()?;
        self.groups()?;
        Ok(())
    }

    fn user<'a>(&'a self, info: &UserInfo) -> BackendResult<Box<dyn ServiceUser + 'a>> {
        tracing::debug!(unique_id = %info.unique_id, "backend processing");
        let name = self.entry_by_unique_id(&info.unique_id)?.map(|entry| entry.login);
        let primary_group = info
            .primary_group
            .as_deref()
            .map(ldf_naming::sanitize)
            .transpose()?;

        Ok(Box::new(UnixUser {
            backend: self,
            unique_id: info.unique_id.clone(),
            ssh_keys: info.ssh_keys.iter().map(|key| key.value.clone()).collect(),
            primary_group,
            name,
            credentials: BTreeMap::new(),
            removed_keys: None,
        }))
    }

    fn group<'a>(&'a self, label: &str) -> BackendResult<Box<dyn ServiceGroup + 'a>> {
        Ok(Box::new(UnixGroup {
            backend: self,
            name: ldf_naming::sanitize(label)?,
        }))
    }

    fn group_exists(&self, name: &str) -> BackendResult<bool> {
        Ok(self.groups()?.iter().any(|group| group.name == name))
    }

    fn rename_group(&self, from: &str, to: &str) -> BackendResult<()> {
        tracing::warn!(%from, %to, "renaming group");
        self.run("Cannot rename group", "groupmod", &["--new-name", to, from])?;
        Ok(())
    }
}

// ============================================================================
// User
// ============================================================================

struct UnixUser<'a, R> {
    backend: &'a UnixBackend<R>,
    unique_id: String,
    ssh_keys: Vec<String>,
    primary_group: Option<String>,
    name: Option<String>,
    credentials: BTreeMap<String, String>,
    /// Key file of an account deleted by this handle; userdel keeps the home.
    removed_keys: Option<PathBuf>,
}

impl<R: CommandRunner> UnixUser<'_, R> {
    fn require_name(&self) -> BackendResult<&str> {
        self.name
            .as_deref()
            .ok_or_else(|| BackendError::failure("No username set for account"))
    }

    fn entry(&self) -> BackendResult<Option<PasswdEntry>> {
        self.backend.entry_by_unique_id(&self.unique_id)
    }

    fn expire(&self, date: &str) -> BackendResult<()> {
        let name = self.require_name()?;
        self.backend.run(
            "Cannot set expiration date for user",
            "chage",
            &["-E", date, name],
        )?;
        Ok(())
    }

    fn set_shell(&self, shell: &str) -> BackendResult<()> {
        let name = self.require_name()?;
        self.backend
            .run("Cannot modify user", "usermod", &["-s", shell, name])?;
        Ok(())
    }

    fn write_authorized_keys(&self, entry: &PasswdEntry) -> std::io::Result<()> {
        let ssh_dir = self.backend.config.rooted(&entry.home).join(".ssh");
        fs::create_dir_all(&ssh_dir)?;
        fs::set_permissions(&ssh_dir, fs::Permissions::from_mode(0o700))?;
        std::os::unix::fs::chown(&ssh_dir, Some(entry.uid), Some(entry.gid))?;

        let file = ssh_dir.join("authorized_keys");
        fs::write(&file, self.ssh_keys.join("\n"))?;
        fs::set_permissions(&file, fs::Permissions::from_mode(0o600))?;
        std::os::unix::fs::chown(&file, Some(entry.uid), Some(entry.gid))?;
        Ok(())
    }

    fn authorized_keys_path(&self, entry: &PasswdEntry) -> PathBuf {
        self.backend
            .config
            .rooted(&entry.home)
            .join(".ssh")
            .join("authorized_keys")
    }
}

impl<R: CommandRunner> ServiceUser for UnixUser<'_, R> {
    fn unique_id(&self) -> &str {
        &self.unique_id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn exists(&self) -> BackendResult<bool> {
        Ok(self.entry()?.is_some())
    }

    fn name_taken(&self, name: &str) -> BackendResult<bool> {
        let name = ldf_naming::sanitize(name)?;
        let gecos = encode_gecos(&self.unique_id);
        let taken = self
            .backend
            .passwd()?
            .iter()
            .any(|entry| entry.login == name && entry.gecos != gecos);
        tracing::debug!(%name, taken, "name_taken");
        Ok(taken)
    }

    fn get_username(&self) -> BackendResult<Option<String>> {
        Ok(self.entry()?.map(|entry| entry.login))
    }

    fn set_username(&mut self, name: &str) -> BackendResult<()> {
        self.name = Some(ldf_naming::sanitize(name)?);
        Ok(())
    }

    fn create(&mut self) -> BackendResult<()> {
        let name = self.require_name()?;
        let Some(primary_group) = self.primary_group.as_deref() else {
            return Err(BackendError::failure(
                "Cannot create user (no primary group)",
            ));
        };
        tracing::debug!(username = %name, unique_id = %self.unique_id, "creating user");

        let config = &self.backend.config;
        let gecos = encode_gecos(&self.unique_id);
        self.backend.run(
            "Cannot create user",
            "useradd",
            &[
                "--comment",
                gecos.as_str(),
                "-g",
                primary_group,
                "--shell",
                config.shell.as_str(),
                "-b",
                config.home_base(),
                "-m",
                name,
            ],
        )?;
        Ok(())
    }

    fn update(&mut self) -> BackendResult<()> {
        let name = self.require_name()?.to_string();
        let host = self.backend.config.ssh_host().to_string();
        self.credentials
            .insert("commandline".to_string(), format!("ssh {name}@{host}"));
        self.credentials.insert("ssh_user".to_string(), name);
        self.credentials.insert("ssh_host".to_string(), host);
        Ok(())
    }

    fn delete(&mut self) -> BackendResult<()> {
        let Some(entry) = self.entry()? else {
            return Err(BackendError::failure(format!(
                "Cannot delete user: no user found for {}.",
                self.unique_id
            )));
        };

        // pkill fails when the user has no processes
        if let Err(err) = self
            .backend
            .run("Cannot stop processes", "/usr/bin/pkill", &["-u", entry.login.as_str()])
        {
            tracing::debug!(error = %err, "pkill");
        }
        self.backend
            .run("Cannot delete user", "userdel", &[entry.login.as_str()])?;
        self.removed_keys = Some(self.authorized_keys_path(&entry));
        Ok(())
    }

    fn modify_groups(&mut self, groups: &[String]) -> BackendResult<()> {
        if groups.is_empty() {
            return Ok(());
        }
        let name = self.require_name()?;
        tracing::debug!(username = %name, ?groups, "ensuring group memberships");
        let joined = groups.join(",");
        self.backend.run(
            "Cannot modify user",
            "usermod",
            &["--append", "--groups", joined.as_str(), name],
        )?;
        Ok(())
    }

    fn install_ssh_keys(&mut self) -> BackendResult<()> {
        if !self.backend.config.deploy_user_ssh_keys {
            return Ok(());
        }
        let Some(entry) = self.entry()? else {
            return Err(BackendError::failure(format!(
                "Could not write new ssh keys: no user found for {}",
                self.unique_id
            )));
        };
        if self.ssh_keys.is_empty() {
            tracing::debug!(username = %entry.login, "no ssh keys left, removing authorized_keys");
            return remove_if_present(&self.authorized_keys_path(&entry));
        }
        tracing::debug!(username = %entry.login, count = self.ssh_keys.len(), "deploying ssh keys");
        self.write_authorized_keys(&entry).map_err(|e| {
            tracing::error!(error = %e, "cannot write authorized_keys");
            BackendError::failure(format!("Could not write new ssh keys: {e}"))
        })
    }

    fn uninstall_ssh_keys(&mut self) -> BackendResult<()> {
        let path = match self.entry()? {
            Some(entry) => self.authorized_keys_path(&entry),
            None => match self.removed_keys.take() {
                Some(path) => path,
                None => return Ok(()),
            },
        };
        remove_if_present(&path)
    }

    fn credentials(&self) -> BTreeMap<String, String> {
        self.credentials.clone()
    }

    fn is_suspended(&self) -> BackendResult<bool> {
        let Some(entry) = self.entry()? else {
            return Ok(false);
        };
        let output = self
            .backend
            .run("Cannot get info for user", "chage", &["-l", entry.login.as_str()])?;
        Ok(account_expired(&output, Local::now().date_naive())?)
    }

    fn is_limited(&self) -> BackendResult<bool> {
        Ok(self
            .entry()?
            .is_some_and(|entry| NOLOGIN_SHELLS.contains(&entry.shell.as_str())))
    }

    fn suspend(&mut self) -> BackendResult<()> {
        let today = Local::now().date_naive().format("%Y-%m-%d").to_string();
        self.expire(&today)
    }

    fn resume(&mut self) -> BackendResult<()> {
        self.expire("-1")
    }

    fn limit(&mut self) -> BackendResult<()> {
        self.set_shell(LIMITED_SHELL)
    }

    fn unlimit(&mut self) -> BackendResult<()> {
        let shell = self.backend.config.shell.clone();
        self.set_shell(&shell)
    }
}

/// Checks `chage -l` output for an expiry on or before `today`.
fn remove_if_present(path: &Path) -> BackendResult<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn account_expired(chage_output: &str, today: NaiveDate) -> UnixResult<bool> {
    let pattern =
        Regex::new(r"Account expires\s+: (.*)").map_err(|e| UnixError::parse(e.to_string()))?;

    let Some(captures) = pattern.captures(chage_output) else {
        return Ok(false);
    };
    let value = captures[1].trim();
    if value == "never" {
        return Ok(false);
    }
    let expires = NaiveDate::parse_from_str(value, "%b %d, %Y")
        .map_err(|e| UnixError::parse(format!("account expiry '{value}': {e}")))?;
    Ok(expires <= today)
}

// ============================================================================
// Group
// ============================================================================

struct UnixGroup<'a, R> {
    backend: &'a UnixBackend<R>,
    name: String,
}

impl<R: CommandRunner> ServiceGroup for UnixGroup<'_, R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self) -> BackendResult<bool> {
        self.backend.group_exists(&self.name)
    }

    fn create(&mut self) -> BackendResult<()> {
        self.backend
            .run("Cannot create group", "groupadd", &[self.name.as_str()])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn expiry_parsing() {
        let today = date(2026, 10, 19);
        let never = "Last password change\t\t\t\t\t: Oct 01, 2026\n\
                     Account expires\t\t\t\t\t\t: never\n";
        assert!(!account_expired(never, today).unwrap());

        let past = "Account expires\t\t\t\t\t\t: Jan 01, 2026\n";
        assert!(account_expired(past, today).unwrap());

        let same_day = "Account expires : Oct 19, 2026\n";
        assert!(account_expired(same_day, today).unwrap());

        let future = "Account expires : Dec 31, 2099\n";
        assert!(!account_expired(future, today).unwrap());

        assert!(!account_expired("no expiry line", today).unwrap());
        assert!(account_expired("Account expires : someday", today).is_err());
    }

    #[test]
    fn capabilities_enable_lifecycle_and_rename() {
        let config = UnixConfig::builder().root("/nonexistent").build().unwrap();
        let backend =
            UnixBackend::with_runner(config, crate::command::RecordingRunner::new()).unwrap();
        let caps = backend.capabilities();
        assert!(caps.suspension && caps.limitation && caps.group_rename);
        assert!(!caps.rejection && !caps.pending);
        assert!(backend.test_connection().is_err());
    }
}
