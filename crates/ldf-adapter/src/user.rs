//! Reconciliation of one federated user.
//!
//! A [`User`] wraps the backend handle of the user's account for the
//! duration of one request and implements the state machine:
//!
//! ```text
//!   not_deployed --deploy--> deployed --suspend--> suspended
//!        ^                    |   ^  \               |
//!        |                    |   |   limit        resume
//!        +-----undeploy-------+   |     v            |
//!                                 +-- limited <------+ (suspend)
//! ```

use std::collections::BTreeMap;

use ldf_backend::{Capabilities, DeletionOrder, ServiceGroup, ServiceUser};
use ldf_model::{Outcome, State, Status, UserInfo};
use ldf_naming::NameGenerator;

use crate::adapter::Adapter;
use crate::error::{AdapterError, AdapterResult};
use crate::migration::migrate_group_names;

const NO_PRIMARY_GROUP: &str = "User is not member of any group, and neither a \"primary_group\", \
                                nor a \"fallback_group\" have been defined in the configuration";

/// Optional lifecycle transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Suspend,
    Resume,
    Limit,
    Unlimit,
}

impl Transition {
    const fn allowed_from(self) -> &'static [State] {
        match self {
            Self::Suspend => &[State::Deployed, State::Limited],
            Self::Resume => &[State::Suspended],
            Self::Limit => &[State::Deployed],
            Self::Unlimit => &[State::Limited],
        }
    }

    const fn supported(self, capabilities: Capabilities) -> bool {
        match self {
            Self::Suspend | Self::Resume => capabilities.suspension,
            Self::Limit | Self::Unlimit => capabilities.limitation,
        }
    }

    /// State after a successful transition; `None` re-reads it.
    const fn reached(self) -> Option<State> {
        match self {
            Self::Suspend => Some(State::Suspended),
            Self::Resume => None,
            Self::Limit => Some(State::Limited),
            Self::Unlimit => Some(State::Deployed),
        }
    }

    const fn gerund(self) -> &'static str {
        match self {
            Self::Suspend => "Suspending",
            Self::Resume => "Resuming",
            Self::Limit => "Limiting",
            Self::Unlimit => "Unlimiting",
        }
    }

    const fn participle(self) -> &'static str {
        match self {
            Self::Suspend => "suspended",
            Self::Resume => "resumed",
            Self::Limit => "limited",
            Self::Unlimit => "unlimited",
        }
    }
}

/// The account of one federated user during one request.
pub struct User<'a> {
    adapter: &'a Adapter<'a>,
    info: UserInfo,
    service_user: Box<dyn ServiceUser + 'a>,
    capabilities: Capabilities,
}

impl<'a> User<'a> {
    pub(crate) fn new(
        adapter: &'a Adapter<'a>,
        info: UserInfo,
        service_user: Box<dyn ServiceUser + 'a>,
    ) -> Self {
        let capabilities = adapter.backend().capabilities();
        Self {
            adapter,
            info,
            service_user,
            capabilities,
        }
    }

    /// The claims this user was built from.
    #[must_use]
    pub const fn info(&self) -> &UserInfo {
        &self.info
    }

    /// The current account name, if known.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.service_user.name()
    }

    // ========================================================================
    // Deploy
    // ========================================================================

    /// Creates or updates the account, its groups and credentials.
    pub fn deploy(&mut self) -> AdapterResult<Outcome> {
        if self.capabilities.group_rename {
            migrate_group_names(self.adapter.backend(), &self.group_labels())?;
        }

        self.ensure_groups_exist()?;
        let was_created = self.ensure_exists()?;
        let groups = self.ensure_group_memberships()?;
        let activated = self.ensure_credentials_active()?;

        let mut message = if was_created {
            "User was created".to_string()
        } else {
            "User already existed".to_string()
        };
        if !groups.is_empty() {
            message.push_str(&format!(" and was added to groups {}", groups.join(",")));
        }
        message.push('.');
        if !activated.is_empty() {
            message.push_str(&format!(
                " Credentials {} were activated.",
                activated.join(",")
            ));
        }

        Ok(Outcome::Deployed {
            credentials: self.credentials(),
            message,
        })
    }

    /// Group labels in membership order: claimed groups, the primary group,
    /// then the configured additional groups.
    fn group_labels(&self) -> Vec<String> {
        let mut labels: Vec<String> = Vec::new();
        let claimed = self.info.groups.iter();
        let primary = self.info.primary_group.iter();
        let additional = self.adapter.config().adapter.additional_groups.iter();

        for label in claimed.chain(primary).chain(additional) {
            if !labels.contains(label) {
                labels.push(label.clone());
            }
        }
        labels
    }

    fn groups(&self) -> AdapterResult<Vec<Box<dyn ServiceGroup + 'a>>> {
        self.group_labels()
            .iter()
            .map(|label| Ok(self.adapter.backend().group(label)?))
            .collect()
    }

    fn ensure_groups_exist(&self) -> AdapterResult<()> {
        for mut group in self.groups()? {
            if !group.exists()? {
                tracing::info!(group = %group.name(), "creating group");
                group.create()?;
            }
        }
        Ok(())
    }

    /// Returns whether the account was created.
    fn ensure_exists(&mut self) -> AdapterResult<bool> {
        tracing::debug!(unique_id = %self.info.unique_id, "ensuring a local account exists");
        let is_new = !self.service_user.exists()?;

        if is_new {
            if self.adapter.config().adapter.interactive {
                self.choose_requested_name()?;
            } else {
                self.choose_generated_name()?;
            }

            if self.info.primary_group.is_none() {
                return Err(AdapterError::failure(NO_PRIMARY_GROUP));
            }
            self.service_user.create()?;
        } else {
            let username = self.service_user.get_username()?;
            tracing::info!(
                username = username.as_deref().unwrap_or("None"),
                unique_id = %self.info.unique_id,
                "account already exists"
            );
        }

        self.service_user.update()?;
        Ok(is_new)
    }

    fn choose_requested_name(&mut self) -> AdapterResult<()> {
        let Some(username) = self.info.preferred_username.clone() else {
            return Err(AdapterError::Question {
                field: "username".to_string(),
                prompt: "Please choose a username for this service.".to_string(),
            });
        };
        if self.service_user.name_taken(&username)? {
            tracing::info!(%username, "username already taken, asking for another one");
            return Err(AdapterError::Question {
                field: "username".to_string(),
                prompt: format!(
                    "Username \"{username}\" already taken on this service. Please enter another one."
                ),
            });
        }
        self.service_user.set_username(&username)?;
        Ok(())
    }

    fn choose_generated_name(&mut self) -> AdapterResult<()> {
        let config = &self.adapter.config().username_generator;
        let mut generator = NameGenerator::from_config(config, &self.info)?;

        let username = loop {
            let Some(candidate) = generator.suggest_name(&[]) else {
                return Err(AdapterError::rejection(format!(
                    "I cannot create usernames. The list of tried ones is: {}.",
                    generator.tried_names().join(", ")
                )));
            };
            if !self.service_user.name_taken(&candidate)? {
                break candidate;
            }
            tracing::debug!(%candidate, "username taken");
        };

        self.service_user.set_username(&username)?;
        tracing::info!(%username, unique_id = %self.info.unique_id, "chose username");
        Ok(())
    }

    /// Adds the account to every group; returns the group names.
    fn ensure_group_memberships(&mut self) -> AdapterResult<Vec<String>> {
        if self.info.primary_group.is_none() {
            return Err(AdapterError::failure(NO_PRIMARY_GROUP));
        }
        let names: Vec<String> = self
            .groups()?
            .iter()
            .map(|group| group.name().to_string())
            .collect();

        tracing::info!(
            username = self.name().unwrap_or("None"),
            groups = ?names,
            "ensuring group memberships"
        );
        self.service_user.modify_groups(&names)?;
        Ok(names)
    }

    /// Installs the SSH keys; returns their labels.
    fn ensure_credentials_active(&mut self) -> AdapterResult<Vec<String>> {
        self.service_user.install_ssh_keys()?;
        Ok(self.info.ssh_keys.iter().map(|key| key.label()).collect())
    }

    /// Backend credentials merged with the configured login information.
    #[must_use]
    pub fn credentials(&self) -> BTreeMap<String, String> {
        let mut credentials = self.service_user.credentials();
        credentials.extend(
            self.adapter
                .login_info()
                .iter()
                .map(|(key, value)| (key.clone(), value.clone())),
        );
        credentials
    }

    // ========================================================================
    // Undeploy
    // ========================================================================

    /// Removes the account and its credentials.
    pub fn undeploy(&mut self) -> AdapterResult<Outcome> {
        let username = self
            .service_user
            .get_username()?
            .unwrap_or_else(|| "None".to_string());
        let unique_id = self.info.unique_id.clone();

        let message = if self.ensure_doesnt_exist()? {
            format!("User '{username} ({unique_id})' was removed.")
        } else {
            format!("No user for '{unique_id}' existed. User '{username}' was not changed")
        };
        Ok(Outcome::NotDeployed { message })
    }

    /// Returns whether an account existed.
    fn ensure_doesnt_exist(&mut self) -> AdapterResult<bool> {
        if !self.service_user.exists()? {
            tracing::info!(unique_id = %self.info.unique_id, "no account exists, nothing to do");
            return Ok(false);
        }

        tracing::info!(
            username = self.name().unwrap_or("None"),
            unique_id = %self.info.unique_id,
            "deleting account"
        );
        match self.adapter.backend().deletion_order() {
            DeletionOrder::CredentialsFirst => {
                self.service_user.uninstall_ssh_keys()?;
                self.service_user.delete()?;
            }
            DeletionOrder::AccountFirst => {
                self.service_user.delete()?;
                self.service_user.uninstall_ssh_keys()?;
            }
        }
        Ok(true)
    }

    // ========================================================================
    // Status and lifecycle
    // ========================================================================

    /// Reports the current state. Query errors yield [`State::Unknown`].
    #[must_use]
    pub fn get_status(&self) -> Status {
        let mut message = "No message".to_string();
        match self.read_state(&mut message) {
            Ok(state) => Status::new(state, message),
            Err(err) => {
                tracing::error!(
                    unique_id = %self.info.unique_id,
                    error = %err,
                    "account is in an undefined state"
                );
                Status::new(State::Unknown, message)
            }
        }
    }

    fn read_state(&self, message: &mut String) -> AdapterResult<State> {
        let user = &self.service_user;
        if !user.exists()? {
            return Ok(State::NotDeployed);
        }
        let username = user.get_username()?;
        *message = format!("username {}", username.as_deref().unwrap_or("None"));

        let capabilities = self.capabilities;
        if capabilities.rejection && user.is_rejected()? {
            return Ok(State::Rejected);
        }
        if capabilities.suspension && user.is_suspended()? {
            return Ok(State::Suspended);
        }
        if capabilities.pending && user.is_pending()? {
            return Ok(State::Pending);
        }
        if capabilities.limitation && user.is_limited()? {
            return Ok(State::Limited);
        }
        Ok(State::Deployed)
    }

    /// Locks a deployed or limited account.
    pub fn suspend(&mut self) -> AdapterResult<Outcome> {
        self.transition(Transition::Suspend)
    }

    /// Unlocks a suspended account.
    pub fn resume(&mut self) -> AdapterResult<Outcome> {
        self.transition(Transition::Resume)
    }

    /// Restricts a deployed account.
    pub fn limit(&mut self) -> AdapterResult<Outcome> {
        self.transition(Transition::Limit)
    }

    /// Lifts the restriction of a limited account.
    pub fn unlimit(&mut self) -> AdapterResult<Outcome> {
        self.transition(Transition::Unlimit)
    }

    fn transition(&mut self, transition: Transition) -> AdapterResult<Outcome> {
        let state = self.get_status().state;
        let unique_id = self.info.unique_id.clone();

        if !transition.supported(self.capabilities)
            || !transition.allowed_from().contains(&state)
        {
            tracing::debug!(
                %unique_id,
                %state,
                "{} not allowed",
                transition.gerund()
            );
            return Ok(Outcome::status(
                state,
                format!(
                    "{} user '{unique_id}' was not possible from the '{state}' state. \
                     User was not changed.",
                    transition.gerund()
                ),
            ));
        }

        match transition {
            Transition::Suspend => self.service_user.suspend()?,
            Transition::Resume => self.service_user.resume()?,
            Transition::Limit => self.service_user.limit()?,
            Transition::Unlimit => self.service_user.unlimit()?,
        }

        let reached = transition
            .reached()
            .unwrap_or_else(|| self.get_status().state);
        Ok(Outcome::status(
            reached,
            format!("User '{unique_id}' was {}.", transition.participle()),
        ))
    }
}
