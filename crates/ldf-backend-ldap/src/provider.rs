//! LDAP backend implementation.
//!
//! What the backend may change depends on the configured [`Mode`]; requests
//! the mode forbids are rejected, failed or logged and skipped, per
//! operation.

use std::collections::{BTreeMap, HashSet};

use ldap3::Mod;
use ldf_backend::{Backend, BackendError, BackendResult, ServiceGroup, ServiceUser};
use ldf_model::UserInfo;

use crate::config::{LdapConfig, Mode};
use crate::connection::{Directory, LdapConnection};
use crate::error::{LdapError, LdapResult};
use crate::search::LdapEntry;

/// Kind of a counter entry.
#[derive(Debug, Clone, Copy)]
enum Counter {
    Uid,
    Gid,
}

impl Counter {
    const fn cn(self) -> &'static str {
        match self {
            Self::Uid => "uidNext",
            Self::Gid => "gidNext",
        }
    }

    const fn attribute(self) -> &'static str {
        match self {
            Self::Uid => "uidNumber",
            Self::Gid => "gidNumber",
        }
    }

    const fn holder_class(self) -> &'static str {
        match self {
            Self::Uid => "posixAccount",
            Self::Gid => "posixGroup",
        }
    }

    const fn plural(self) -> &'static str {
        match self {
            Self::Uid => "UIDs",
            Self::Gid => "GIDs",
        }
    }
}

fn values<S: AsRef<str>, const N: usize>(values: [S; N]) -> HashSet<String> {
    values.iter().map(|v| v.as_ref().to_string()).collect()
}

/// Backend for accounts in a directory service.
#[derive(Debug)]
pub struct LdapBackend<D = LdapConnection> {
    config: LdapConfig,
    directory: D,
}

impl LdapBackend<LdapConnection> {
    /// Connects to the configured server.
    ///
    /// ## Errors
    ///
    /// Returns an error if the configuration is invalid, the server cannot
    /// be reached or the counter entries cannot be created.
    pub fn connect(config: LdapConfig) -> LdapResult<Self> {
        config.validate()?;
        let directory = LdapConnection::open(&config)?;
        Self::with_directory(config, directory)
    }
}

impl<D: Directory> LdapBackend<D> {
    /// Creates a backend on an open directory.
    ///
    /// In full access mode the `uidNext` and `gidNext` counters are created
    /// if missing.
    pub fn with_directory(config: LdapConfig, directory: D) -> LdapResult<Self> {
        let backend = Self { config, directory };
        if backend.config.mode == Mode::FullAccess {
            backend.init_counter(Counter::Uid)?;
            backend.init_counter(Counter::Gid)?;
        }
        Ok(backend)
    }

    /// The backend configuration.
    #[must_use]
    pub const fn config(&self) -> &LdapConfig {
        &self.config
    }

    /// The directory.
    #[must_use]
    pub const fn directory(&self) -> &D {
        &self.directory
    }

    const fn mode(&self) -> Mode {
        self.config.mode
    }

    fn counter_base(&self, counter: Counter) -> &str {
        match counter {
            Counter::Uid => &self.config.user_base,
            Counter::Gid => &self.config.group_base,
        }
    }

    fn counter_entry(&self, counter: Counter) -> LdapResult<Option<LdapEntry>> {
        let filter = format!("(&(cn={0})(objectClass={0}))", counter.cn());
        let entries =
            self.directory
                .search(self.counter_base(counter), &filter, &[counter.attribute()])?;
        Ok(entries.into_iter().next())
    }

    fn init_counter(&self, counter: Counter) -> LdapResult<()> {
        if self.counter_entry(counter)?.is_some() {
            tracing::info!("Using existing {} value.", counter.cn());
            return Ok(());
        }
        let start = match counter {
            Counter::Uid => self.config.uid_min,
            Counter::Gid => self.config.gid_min,
        };
        let dn = format!("cn={},{}", counter.cn(), self.counter_base(counter));
        self.directory
            .add(
                &dn,
                vec![
                    ("objectClass".to_string(), values([counter.cn()])),
                    ("cn".to_string(), values([counter.cn()])),
                    (counter.attribute().to_string(), values([&start.to_string()])),
                ],
            )
            .map_err(|e| {
                tracing::error!(error = %e, "cannot create counter entry");
                LdapError::Counter(
                    "Error adding entries in LDAP for tracking available UID and GID values"
                        .to_string(),
                )
            })
    }

    fn number_taken(&self, counter: Counter, number: u32) -> LdapResult<bool> {
        let filter = format!(
            "(&({}={number})(objectClass={}))",
            counter.attribute(),
            counter.holder_class()
        );
        let found = self
            .directory
            .search(self.counter_base(counter), &filter, &["dn"])?;
        Ok(!found.is_empty())
    }

    /// Allocates the next free uid or gid.
    ///
    /// The counter is advanced by deleting the value read and adding the
    /// new one in a single modify, which fails if another process changed
    /// the counter in the meantime.
    fn allocate(&self, counter: Counter) -> LdapResult<u32> {
        let Some(entry) = self.counter_entry(counter)? else {
            return Err(LdapError::Counter(format!("cn={} not found", counter.cn())));
        };
        let Some(current) = entry.get_number(counter.attribute()) else {
            return Err(LdapError::Counter(format!(
                "cn={} has no numeric {}",
                counter.cn(),
                counter.attribute()
            )));
        };
        let max = match counter {
            Counter::Uid => self.config.uid_max,
            Counter::Gid => self.config.gid_max,
        };

        let mut next = current;
        loop {
            if next > max {
                return Err(LdapError::RangeExhausted(counter.plural()));
            }
            if !self.number_taken(counter, next)? {
                break;
            }
            next = next
                .checked_add(1)
                .ok_or(LdapError::RangeExhausted(counter.plural()))?;
        }

        self.directory.modify(
            &entry.dn,
            vec![
                Mod::Delete(
                    counter.attribute().to_string(),
                    values([&current.to_string()]),
                ),
                Mod::Add(
                    counter.attribute().to_string(),
                    values([&next.saturating_add(1).to_string()]),
                ),
            ],
        )?;
        tracing::debug!(number = next, counter = counter.cn(), "allocated");
        Ok(next)
    }

    fn user_by_oidc_uid(&self, unique_id: &str) -> LdapResult<Option<LdapEntry>> {
        let filter = self.config.user_by_oidc_uid_filter(unique_id);
        let attrs = [self.config.attr_local_uid.as_str()];
        Ok(self
            .directory
            .search(&self.config.user_base, &filter, &attrs)?
            .into_iter()
            .next())
    }

    fn user_by_local_username(&self, name: &str) -> LdapResult<Option<LdapEntry>> {
        let filter = self.config.user_by_local_username_filter(name);
        let attrs = [self.config.attr_oidc_uid.as_str()];
        Ok(self
            .directory
            .search(&self.config.user_base, &filter, &attrs)?
            .into_iter()
            .next())
    }

    fn group_by_name(&self, name: &str) -> LdapResult<Option<LdapEntry>> {
        let filter = self.config.group_by_name_filter(name);
        Ok(self
            .directory
            .search(&self.config.group_base, &filter, &["memberUid", "gidNumber"])?
            .into_iter()
            .next())
    }
}

impl<D: Directory> Backend for LdapBackend<D> {
    fn backend_type(&self) -> &'static str {
        "ldap"
    }

    fn test_connection(&self) -> BackendResult<()> {
        self.directory
            .search(&self.config.user_base, "(objectClass=*)", &["dn"])?;
        Ok(())
    }

    fn user<'a>(&'a self, info: &UserInfo) -> BackendResult<Box<dyn ServiceUser + 'a>> {
        tracing::debug!(unique_id = %info.unique_id, "backend processing");
        let name = self
            .user_by_oidc_uid(&info.unique_id)?
            .and_then(|entry| entry.get_attr(&self.config.attr_local_uid).map(str::to_string));
        if let Some(name) = &name {
            tracing::debug!(username = %name, "user exists");
        }

        Ok(Box::new(LdapUser {
            backend: self,
            info: info.clone(),
            name,
            credentials: BTreeMap::new(),
        }))
    }

    fn group<'a>(&'a self, label: &str) -> BackendResult<Box<dyn ServiceGroup + 'a>> {
        Ok(Box::new(LdapGroup {
            backend: self,
            name: label.to_string(),
        }))
    }

    fn group_exists(&self, name: &str) -> BackendResult<bool> {
        Ok(self.group_by_name(name)?.is_some())
    }
}

// ============================================================================
// User
// ============================================================================

struct LdapUser<'a, D> {
    backend: &'a LdapBackend<D>,
    info: UserInfo,
    name: Option<String>,
    credentials: BTreeMap<String, String>,
}

impl<D: Directory> LdapUser<'_, D> {
    fn require_name(&self) -> BackendResult<&str> {
        self.name
            .as_deref()
            .ok_or_else(|| BackendError::failure("No username set for account"))
    }

    /// Profile attributes written on creation and update.
    fn profile(&self, name: &str) -> Vec<(String, String)> {
        let config = &self.backend.config;
        let info = &self.info;
        let full_name = info.full_name.clone().unwrap_or_else(|| {
            match (&info.given_name, &info.family_name) {
                (Some(given), Some(family)) => format!("{given} {family}"),
                _ => name.to_string(),
            }
        });

        let mut attrs = vec![
            ("sn".to_string(), info.family_name.clone().unwrap_or_else(|| name.to_string())),
            ("cn".to_string(), full_name),
            ("uid".to_string(), name.to_string()),
            ("homeDirectory".to_string(), format!("{}/{name}", config.home_base())),
            ("loginShell".to_string(), config.shell.clone()),
            (config.attr_local_uid.clone(), name.to_string()),
            (config.attr_oidc_uid.clone(), info.unique_id.clone()),
        ];
        if let Some(given) = &info.given_name {
            attrs.push(("givenName".to_string(), given.clone()));
        }
        if let Some(email) = &info.email {
            attrs.push(("mail".to_string(), email.clone()));
        }
        attrs
    }

    fn add_entry(&self, name: &str) -> LdapResult<()> {
        let backend = self.backend;
        let Some(primary_group) = self.info.primary_group.as_deref() else {
            return Err(LdapError::update("no primary group"));
        };
        let gid = backend
            .group_by_name(primary_group)?
            .and_then(|group| group.get_number("gidNumber"))
            .ok_or_else(|| LdapError::update(format!("group {primary_group} has no gidNumber")))?;
        let uid = backend.allocate(Counter::Uid)?;

        let mut attrs: BTreeMap<String, HashSet<String>> = BTreeMap::new();
        attrs.insert(
            "objectClass".to_string(),
            values(["top", "inetOrgPerson", "posixAccount"]),
        );
        attrs.insert("uidNumber".to_string(), values([&uid.to_string()]));
        attrs.insert("gidNumber".to_string(), values([&gid.to_string()]));
        for (key, value) in self.profile(name) {
            attrs.entry(key).or_default().insert(value);
        }

        backend
            .directory
            .add(&backend.config.user_dn(name), attrs.into_iter().collect())
    }

    fn failed(&self, msg: String, err: &LdapError) -> BackendError {
        tracing::error!(error = %err, "{msg}");
        BackendError::failure(msg)
    }
}

impl<D: Directory> ServiceUser for LdapUser<'_, D> {
    fn unique_id(&self) -> &str {
        &self.info.unique_id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn exists(&self) -> BackendResult<bool> {
        tracing::info!(unique_id = %self.info.unique_id, "Check if user exists");
        Ok(self.backend.user_by_oidc_uid(&self.info.unique_id)?.is_some())
    }

    fn name_taken(&self, name: &str) -> BackendResult<bool> {
        let Some(entry) = self.backend.user_by_local_username(name)? else {
            return Ok(false);
        };
        let mapped_to = entry.get_attr(&self.backend.config.attr_oidc_uid);
        if self.backend.mode() == Mode::PreCreated && mapped_to.is_none() {
            return Ok(false);
        }
        Ok(mapped_to != Some(self.info.unique_id.as_str()))
    }

    fn get_username(&self) -> BackendResult<Option<String>> {
        Ok(self
            .backend
            .user_by_oidc_uid(&self.info.unique_id)?
            .and_then(|entry| {
                entry
                    .get_attr(&self.backend.config.attr_local_uid)
                    .map(str::to_string)
            }))
    }

    fn set_username(&mut self, name: &str) -> BackendResult<()> {
        self.name = Some(name.to_string());
        Ok(())
    }

    fn create(&mut self) -> BackendResult<()> {
        let name = self.require_name()?.to_string();
        let unique_id = &self.info.unique_id;

        match self.backend.mode() {
            Mode::ReadOnly => {
                let msg = format!(
                    "LDAP backend in read_only mode, new entry cannot be added for user \
                     {unique_id}. (local username {name})"
                );
                tracing::error!("{msg}");
                Err(BackendError::rejection(format!(
                    "{msg} Please contact an administrator to create an account for you."
                )))
            }
            Mode::PreCreated => {
                let Some(entry) = self.backend.user_by_local_username(&name)? else {
                    let msg =
                        format!("Local username {name} not found in LDAP for user {unique_id}.");
                    tracing::error!("{msg}");
                    return Err(BackendError::failure(format!(
                        "{msg} Please contact an administrator to pre-create this account for you."
                    )));
                };
                let attr = self.backend.config.attr_oidc_uid.clone();
                self.backend
                    .directory
                    .modify(&entry.dn, vec![Mod::Replace(attr, values([unique_id]))])
                    .map_err(|e| {
                        self.failed(
                            format!(
                                "Failed to modify the LDAP entry for uid {unique_id} with local \
                                 username {name}."
                            ),
                            &e,
                        )
                    })
            }
            Mode::FullAccess => self.add_entry(&name).map_err(|e| {
                self.failed(
                    format!(
                        "Failed to add an LDAP entry for uid {unique_id} with local username \
                         {name}."
                    ),
                    &e,
                )
            }),
        }
    }

    fn update(&mut self) -> BackendResult<()> {
        let name = self.require_name()?.to_string();
        let host = self.backend.config.ssh_host().to_string();
        self.credentials
            .insert("commandline".to_string(), format!("ssh {name}@{host}"));
        self.credentials.insert("ssh_user".to_string(), name.clone());
        self.credentials.insert("ssh_host".to_string(), host);

        let unique_id = &self.info.unique_id;
        match self.backend.mode() {
            Mode::ReadOnly | Mode::PreCreated => {
                tracing::warn!(
                    "LDAP backend in {} mode, entry for user {unique_id} cannot be modified.",
                    self.backend.mode()
                );
                Ok(())
            }
            Mode::FullAccess => {
                let Some(entry) = self.backend.user_by_oidc_uid(unique_id)? else {
                    return Err(BackendError::failure(format!(
                        "No LDAP entry for uid {unique_id}."
                    )));
                };
                let mods = self
                    .profile(&name)
                    .into_iter()
                    .map(|(key, value)| Mod::Replace(key, values([&value])))
                    .collect();
                self.backend.directory.modify(&entry.dn, mods).map_err(|e| {
                    self.failed(
                        format!(
                            "Failed to modify the LDAP entry for uid {unique_id} with local \
                             username {name}."
                        ),
                        &e,
                    )
                })
            }
        }
    }

    fn delete(&mut self) -> BackendResult<()> {
        let name = self.require_name()?.to_string();
        match self.backend.mode() {
            Mode::ReadOnly => {
                let msg = format!(
                    "LDAP backend in read_only mode, entry for local username {name} cannot be \
                     deleted."
                );
                tracing::error!("{msg}");
                Err(BackendError::rejection(msg))
            }
            Mode::PreCreated => {
                let msg = format!(
                    "LDAP backend in pre_created mode, entry for local username {name} cannot \
                     be deleted."
                );
                tracing::error!("{msg}");
                Err(BackendError::failure(msg))
            }
            Mode::FullAccess => {
                let dn = match self.backend.user_by_oidc_uid(&self.info.unique_id)? {
                    Some(entry) => entry.dn,
                    None => self.backend.config.user_dn(&name),
                };
                self.backend.directory.delete(&dn).map_err(|e| {
                    self.failed(
                        format!("Failed to delete the LDAP entry for local username {name}."),
                        &e,
                    )
                })
            }
        }
    }

    fn modify_groups(&mut self, groups: &[String]) -> BackendResult<()> {
        let name = self.require_name()?.to_string();
        if groups.is_empty() {
            tracing::debug!(username = %name, "empty group list, nothing to do");
            return Ok(());
        }
        if self.backend.mode() == Mode::ReadOnly {
            tracing::warn!(
                "LDAP backend in read_only mode, local username {name} cannot be added to given \
                 groups."
            );
            return Ok(());
        }

        tracing::debug!(username = %name, ?groups, "ensuring group memberships");
        for group in groups {
            let members = self
                .backend
                .group_by_name(group)?
                .and_then(|entry| entry.get_attrs("memberUid").cloned())
                .unwrap_or_default();
            if members.contains(&name) {
                continue;
            }
            self.backend
                .directory
                .modify(
                    &self.backend.config.group_dn(group),
                    vec![Mod::Add("memberUid".to_string(), values([&name]))],
                )
                .map_err(|e| {
                    self.failed(
                        format!(
                            "Failed to modify the LDAP entry for group {group} with local \
                             username {name}."
                        ),
                        &e,
                    )
                })?;
        }
        Ok(())
    }

    fn install_ssh_keys(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn uninstall_ssh_keys(&mut self) -> BackendResult<()> {
        Ok(())
    }

    fn credentials(&self) -> BTreeMap<String, String> {
        self.credentials.clone()
    }
}

// ============================================================================
// Group
// ============================================================================

struct LdapGroup<'a, D> {
    backend: &'a LdapBackend<D>,
    name: String,
}

impl<D: Directory> ServiceGroup for LdapGroup<'_, D> {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self) -> BackendResult<bool> {
        self.backend.group_exists(&self.name)
    }

    fn create(&mut self) -> BackendResult<()> {
        let name = &self.name;
        if self.exists()? {
            tracing::info!("Group {name} exists.");
            return Ok(());
        }
        match self.backend.mode() {
            Mode::ReadOnly | Mode::PreCreated => {
                tracing::warn!(
                    "LDAP backend in {} mode, new entry cannot be added for group {name}.",
                    self.backend.mode()
                );
                Ok(())
            }
            Mode::FullAccess => {
                let result = self.backend.allocate(Counter::Gid).and_then(|gid| {
                    self.backend.directory.add(
                        &self.backend.config.group_dn(name),
                        vec![
                            ("objectClass".to_string(), values(["top", "posixGroup"])),
                            ("cn".to_string(), values([name.as_str()])),
                            ("gidNumber".to_string(), values([&gid.to_string()])),
                        ],
                    )
                });
                result.map_err(|e| {
                    tracing::error!(error = %e, "cannot add group");
                    BackendError::failure(format!("Failed to add an LDAP entry for group {name}."))
                })
            }
        }
    }
}
