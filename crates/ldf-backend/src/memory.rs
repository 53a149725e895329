//! In-memory backend for tests.
//!
//! Keeps accounts and groups in a map and records every mutating call, so
//! tests can assert both the resulting state and that nothing was changed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use ldf_model::UserInfo;
use parking_lot::Mutex;

use crate::error::{BackendError, BackendResult};
use crate::provider::{Backend, Capabilities, DeletionOrder, ServiceGroup, ServiceUser};

/// An account held by the [`MemoryBackend`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryAccount {
    /// Unique id of the owner.
    pub unique_id: String,
    /// Primary group name.
    pub primary_group: Option<String>,
    /// Supplementary group names.
    pub groups: Vec<String>,
    /// Locked.
    pub suspended: bool,
    /// Restricted.
    pub limited: bool,
    /// Awaiting an out-of-band step.
    pub pending: bool,
    /// Refused by the backend.
    pub rejected: bool,
}

#[derive(Debug, Default)]
struct MemoryState {
    accounts: BTreeMap<String, MemoryAccount>,
    groups: BTreeSet<String>,
    /// Key values per account name; outlives the account like a home directory.
    authorized_keys: BTreeMap<String, Vec<String>>,
    mutations: Vec<String>,
    unavailable: bool,
}

/// Backend keeping everything in memory.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    state: Arc<Mutex<MemoryState>>,
    capabilities: Capabilities,
    deletion_order: DeletionOrder,
    shadow_names: bool,
    ssh_host: String,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Creates an empty backend supporting every optional operation.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            capabilities: Capabilities::all(),
            deletion_order: DeletionOrder::CredentialsFirst,
            shadow_names: false,
            ssh_host: "localhost".to_string(),
        }
    }

    /// Restricts the advertised capabilities.
    #[must_use]
    pub const fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sets the deletion order.
    #[must_use]
    pub const fn with_deletion_order(mut self, order: DeletionOrder) -> Self {
        self.deletion_order = order;
        self
    }

    /// Maps user and group names through the shadow-utils sanitizer.
    #[must_use]
    pub const fn with_shadow_names(mut self) -> Self {
        self.shadow_names = true;
        self
    }

    /// Adds an existing group.
    #[must_use]
    pub fn with_group(self, name: &str) -> Self {
        self.state.lock().groups.insert(name.to_string());
        self
    }

    /// Adds an existing account.
    #[must_use]
    pub fn with_account(self, name: &str, account: MemoryAccount) -> Self {
        self.state.lock().accounts.insert(name.to_string(), account);
        self
    }

    /// Makes every query fail, as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unavailable = unavailable;
    }

    /// Returns the account with the given name.
    #[must_use]
    pub fn account(&self, name: &str) -> Option<MemoryAccount> {
        self.state.lock().accounts.get(name).cloned()
    }

    /// Returns the key values installed for `name`.
    #[must_use]
    pub fn ssh_keys(&self, name: &str) -> Vec<String> {
        self.state
            .lock()
            .authorized_keys
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the name of the account owned by `unique_id`.
    #[must_use]
    pub fn account_name(&self, unique_id: &str) -> Option<String> {
        self.state
            .lock()
            .accounts
            .iter()
            .find(|(_, account)| account.unique_id == unique_id)
            .map(|(name, _)| name.clone())
    }

    /// Returns all group names.
    #[must_use]
    pub fn groups(&self) -> Vec<String> {
        self.state.lock().groups.iter().cloned().collect()
    }

    /// Returns every mutating call in order.
    #[must_use]
    pub fn mutations(&self) -> Vec<String> {
        self.state.lock().mutations.clone()
    }

    fn map_name(&self, name: &str) -> BackendResult<String> {
        if self.shadow_names {
            Ok(ldf_naming::sanitize(name)?)
        } else {
            Ok(name.to_string())
        }
    }

    fn check_available(&self) -> BackendResult<()> {
        if self.state.lock().unavailable {
            return Err(BackendError::failure("memory backend is unavailable"));
        }
        Ok(())
    }

    fn record(&self, call: String) {
        self.state.lock().mutations.push(call);
    }
}

impl Backend for MemoryBackend {
    fn backend_type(&self) -> &'static str {
        "memory"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn deletion_order(&self) -> DeletionOrder {
        self.deletion_order
    }

    fn user<'a>(&'a self, info: &UserInfo) -> BackendResult<Box<dyn ServiceUser + 'a>> {
        self.check_available()?;
        let primary_group = info
            .primary_group
            .as_deref()
            .map(|label| self.map_name(label))
            .transpose()?;
        Ok(Box::new(MemoryUser {
            backend: self,
            info: info.clone(),
            primary_group,
            name: self.account_name(&info.unique_id),
            credentials: BTreeMap::new(),
        }))
    }

    fn group<'a>(&'a self, label: &str) -> BackendResult<Box<dyn ServiceGroup + 'a>> {
        Ok(Box::new(MemoryGroup {
            backend: self,
            name: self.map_name(label)?,
        }))
    }

    fn group_exists(&self, name: &str) -> BackendResult<bool> {
        self.check_available()?;
        Ok(self.state.lock().groups.contains(name))
    }

    fn rename_group(&self, from: &str, to: &str) -> BackendResult<()> {
        if !self.capabilities.group_rename {
            return Err(BackendError::not_supported("rename group"));
        }
        {
            let mut state = self.state.lock();
            if !state.groups.remove(from) {
                return Err(BackendError::failure(format!("group {from} does not exist")));
            }
            state.groups.insert(to.to_string());
            for account in state.accounts.values_mut() {
                for group in account.groups.iter_mut().chain(account.primary_group.iter_mut()) {
                    if group.as_str() == from {
                        *group = to.to_string();
                    }
                }
            }
        }
        self.record(format!("rename_group:{from}->{to}"));
        Ok(())
    }
}

struct MemoryUser<'a> {
    backend: &'a MemoryBackend,
    info: UserInfo,
    primary_group: Option<String>,
    name: Option<String>,
    credentials: BTreeMap<String, String>,
}

impl MemoryUser<'_> {
    fn require_name(&self) -> BackendResult<String> {
        self.name
            .clone()
            .ok_or_else(|| BackendError::failure("no username set for account"))
    }

    fn with_account<T>(&self, f: impl FnOnce(&mut MemoryAccount) -> T) -> BackendResult<T> {
        let name = self.require_name()?;
        let mut state = self.backend.state.lock();
        let account = state
            .accounts
            .get_mut(&name)
            .ok_or_else(|| BackendError::failure(format!("account {name} does not exist")))?;
        Ok(f(account))
    }

    fn mutate(&self, call: &str, f: impl FnOnce(&mut MemoryAccount)) -> BackendResult<()> {
        self.with_account(f)?;
        self.backend.record(format!("{call}:{}", self.require_name()?));
        Ok(())
    }
}

impl ServiceUser for MemoryUser<'_> {
    fn unique_id(&self) -> &str {
        &self.info.unique_id
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    fn exists(&self) -> BackendResult<bool> {
        self.backend.check_available()?;
        Ok(self.backend.account_name(&self.info.unique_id).is_some())
    }

    fn name_taken(&self, name: &str) -> BackendResult<bool> {
        self.backend.check_available()?;
        let name = self.backend.map_name(name)?;
        Ok(self
            .backend
            .account(&name)
            .is_some_and(|account| account.unique_id != self.info.unique_id))
    }

    fn get_username(&self) -> BackendResult<Option<String>> {
        self.backend.check_available()?;
        Ok(self.backend.account_name(&self.info.unique_id))
    }

    fn set_username(&mut self, name: &str) -> BackendResult<()> {
        self.name = Some(self.backend.map_name(name)?);
        Ok(())
    }

    fn create(&mut self) -> BackendResult<()> {
        let name = self.require_name()?;
        let account = MemoryAccount {
            unique_id: self.info.unique_id.clone(),
            primary_group: self.primary_group.clone(),
            ..MemoryAccount::default()
        };
        self.backend.state.lock().accounts.insert(name.clone(), account);
        self.backend.record(format!("create:{name}"));
        Ok(())
    }

    fn update(&mut self) -> BackendResult<()> {
        let name = self.require_name()?;
        self.credentials.insert("ssh_user".to_string(), name.clone());
        self.credentials
            .insert("ssh_host".to_string(), self.backend.ssh_host.clone());
        self.credentials.insert(
            "commandline".to_string(),
            format!("ssh {name}@{}", self.backend.ssh_host),
        );
        self.backend.record(format!("update:{name}"));
        Ok(())
    }

    fn delete(&mut self) -> BackendResult<()> {
        let name = self.require_name()?;
        self.backend.state.lock().accounts.remove(&name);
        self.backend.record(format!("delete:{name}"));
        Ok(())
    }

    fn modify_groups(&mut self, groups: &[String]) -> BackendResult<()> {
        let joined = groups.join(",");
        self.with_account(|account| {
            for group in groups {
                if !account.groups.contains(group) {
                    account.groups.push(group.clone());
                }
            }
        })?;
        self.backend
            .record(format!("modify_groups:{}:{joined}", self.require_name()?));
        Ok(())
    }

    fn install_ssh_keys(&mut self) -> BackendResult<()> {
        let name = self.require_name()?;
        self.with_account(|_| ())?;
        let keys: Vec<String> = self.info.ssh_keys.iter().map(|k| k.value.clone()).collect();
        self.backend.state.lock().authorized_keys.insert(name.clone(), keys);
        self.backend.record(format!("install_ssh_keys:{name}"));
        Ok(())
    }

    fn uninstall_ssh_keys(&mut self) -> BackendResult<()> {
        let name = self.require_name()?;
        self.backend.state.lock().authorized_keys.remove(&name);
        self.backend.record(format!("uninstall_ssh_keys:{name}"));
        Ok(())
    }

    fn credentials(&self) -> BTreeMap<String, String> {
        self.credentials.clone()
    }

    fn is_rejected(&self) -> BackendResult<bool> {
        self.with_account(|account| account.rejected)
    }

    fn is_suspended(&self) -> BackendResult<bool> {
        self.with_account(|account| account.suspended)
    }

    fn is_pending(&self) -> BackendResult<bool> {
        self.with_account(|account| account.pending)
    }

    fn is_limited(&self) -> BackendResult<bool> {
        self.with_account(|account| account.limited)
    }

    fn suspend(&mut self) -> BackendResult<()> {
        self.mutate("suspend", |account| account.suspended = true)
    }

    fn resume(&mut self) -> BackendResult<()> {
        self.mutate("resume", |account| account.suspended = false)
    }

    fn limit(&mut self) -> BackendResult<()> {
        self.mutate("limit", |account| account.limited = true)
    }

    fn unlimit(&mut self) -> BackendResult<()> {
        self.mutate("unlimit", |account| account.limited = false)
    }
}

struct MemoryGroup<'a> {
    backend: &'a MemoryBackend,
    name: String,
}

impl ServiceGroup for MemoryGroup<'_> {
    fn name(&self) -> &str {
        &self.name
    }

    fn exists(&self) -> BackendResult<bool> {
        self.backend.group_exists(&self.name)
    }

    fn create(&mut self) -> BackendResult<()> {
        self.backend.state.lock().groups.insert(self.name.clone());
        self.backend.record(format!("create_group:{}", self.name));
        Ok(())
    }
}
