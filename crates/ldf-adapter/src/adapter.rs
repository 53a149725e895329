//! Entry point of a reconciliation.

use std::collections::BTreeMap;

use ldf_backend::Backend;
use ldf_core::Config;
use ldf_model::{Outcome, State, Status, Target, UserInfo};

use crate::assurance::AssurancePolicy;
use crate::error::{AdapterError, AdapterResult};
use crate::user::User;

const INSUFFICIENT_ASSURANCE: &str = "Your assurance level is insufficient to access this resource";

/// Reconciles federated users with one backend.
///
/// Built once per process from the configuration and an open backend
/// connection; [`Adapter::reach_state`] may then be called per request.
pub struct Adapter<'a> {
    config: &'a Config,
    backend: &'a dyn Backend,
    policy: Option<AssurancePolicy>,
    login_info: BTreeMap<String, String>,
}

impl<'a> Adapter<'a> {
    /// Creates an adapter.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Config`] if the assurance requirement does not
    /// parse.
    pub fn new(config: &'a Config, backend: &'a dyn Backend) -> AdapterResult<Self> {
        let policy = if config.assurance.skip {
            tracing::warn!(
                "Assurance checking is disabled: Users with ANY assurance will be authorised"
            );
            None
        } else {
            Some(AssurancePolicy::compile(
                &config.assurance.require,
                &config.assurance.prefix,
            )?)
        };

        Ok(Self {
            config,
            backend,
            policy,
            login_info: config.active_login_info(),
        })
    }

    /// The configuration this adapter was built from.
    #[must_use]
    pub const fn config(&self) -> &'a Config {
        self.config
    }

    /// The backend connection.
    #[must_use]
    pub fn backend(&self) -> &'a dyn Backend {
        self.backend
    }

    /// Login information merged into returned credentials.
    #[must_use]
    pub const fn login_info(&self) -> &BTreeMap<String, String> {
        &self.login_info
    }

    /// Drives the user's account towards `target`.
    ///
    /// Never fails: every error is reported as an [`Outcome`].
    pub fn reach_state(&self, info: &UserInfo, target: Target) -> Outcome {
        match self.try_reach_state(info, target) {
            Ok(outcome) => outcome,
            Err(err) => {
                match &err {
                    AdapterError::Question { .. } => {}
                    AdapterError::Rejection(message) => {
                        tracing::info!(unique_id = %info.unique_id, %message, "request rejected");
                    }
                    other => {
                        tracing::error!(unique_id = %info.unique_id, error = %other, "request failed");
                    }
                }
                err.into_outcome()
            }
        }
    }

    fn try_reach_state(&self, info: &UserInfo, target: Target) -> AdapterResult<Outcome> {
        let info = self.resolve_primary_group(info);

        match target {
            Target::Deployed => {
                if !self.assurance_satisfied(&info) {
                    return Err(AdapterError::rejection(INSUFFICIENT_ASSURANCE));
                }
            }
            Target::NotDeployed => {
                if !self.assurance_satisfied(&info) {
                    if self.config.assurance.verified_undeploy {
                        return Err(AdapterError::rejection(INSUFFICIENT_ASSURANCE));
                    }
                    tracing::warn!("Assurance level is insufficient. Undeploying anyway.");
                }
            }
            _ => {}
        }

        let unique_id = info.unique_id.clone();
        let mut user = match self.user(info) {
            Ok(user) => user,
            Err(err) if target == Target::GetStatus => {
                tracing::error!(
                    unique_id = %unique_id,
                    error = %err,
                    "account is in an undefined state"
                );
                return Ok(Outcome::Status(Status::new(State::Unknown, "No message")));
            }
            Err(err) => return Err(err),
        };
        tracing::info!(
            state_target = %target,
            unique_id = %user.info().unique_id,
            username = user.name().unwrap_or("None"),
            "incoming request"
        );

        match target {
            Target::Deployed => user.deploy(),
            Target::NotDeployed => user.undeploy(),
            Target::GetStatus => Ok(Outcome::Status(user.get_status())),
            Target::Suspended => user.suspend(),
            Target::Resumed => user.resume(),
            Target::Limited => user.limit(),
            Target::Unlimited => user.unlimit(),
        }
    }

    /// Returns the reconciliation handle for one user.
    ///
    /// `info` is used as given; the primary group is not resolved.
    pub fn user(&self, info: UserInfo) -> AdapterResult<User<'_>> {
        let service_user = self.backend.user(&info)?;
        Ok(User::new(self, info, service_user))
    }

    fn assurance_satisfied(&self, info: &UserInfo) -> bool {
        self.policy
            .as_ref()
            .map_or(true, |policy| policy.is_satisfied(&info.assurance))
    }

    /// Picks the primary group: configured group, then the one from the
    /// claims, then the only group of the user, then the fallback group.
    #[must_use]
    pub fn resolve_primary_group(&self, info: &UserInfo) -> UserInfo {
        let adapter = &self.config.adapter;
        let primary_group = adapter
            .primary_group
            .clone()
            .or_else(|| info.primary_group.clone())
            .or_else(|| match info.groups.as_slice() {
                [only] => Some(only.clone()),
                _ => None,
            })
            .or_else(|| adapter.fallback_group.clone());

        UserInfo {
            primary_group,
            ..info.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use ldf_backend::MemoryBackend;

    use super::*;

    fn config(toml: &str) -> Config {
        Config::from_toml_str(toml).unwrap()
    }

    #[test]
    fn malformed_requirement_is_rejected_at_construction() {
        let config = config("[assurance]\nrequire = \"(profile/cappuccino\"");
        let backend = MemoryBackend::new();
        assert!(matches!(
            Adapter::new(&config, &backend),
            Err(AdapterError::Config(_))
        ));
    }

    #[test]
    fn skipped_assurance_is_not_compiled() {
        let config = config("[assurance]\nskip = true\nrequire = \"(\"");
        let backend = MemoryBackend::new();
        assert!(Adapter::new(&config, &backend).is_ok());
    }

    #[test]
    fn primary_group_resolution_order() {
        let backend = MemoryBackend::new();

        let configured = config("[adapter]\nprimary_group = \"users\"\nfallback_group = \"nogroup\"");
        let adapter = Adapter::new(&configured, &backend).unwrap();
        let info = UserInfo::new("x@y").with_groups(["hpc"]);
        assert_eq!(
            adapter.resolve_primary_group(&info).primary_group.as_deref(),
            Some("users")
        );

        let fallback = config("[adapter]\nfallback_group = \"nogroup\"");
        let adapter = Adapter::new(&fallback, &backend).unwrap();
        assert_eq!(
            adapter.resolve_primary_group(&info).primary_group.as_deref(),
            Some("hpc")
        );
        let many = UserInfo::new("x@y").with_groups(["hpc", "staff"]);
        assert_eq!(
            adapter.resolve_primary_group(&many).primary_group.as_deref(),
            Some("nogroup")
        );
        let claimed = many.clone().with_primary_group("staff");
        assert_eq!(
            adapter.resolve_primary_group(&claimed).primary_group.as_deref(),
            Some("staff")
        );

        let bare = config("");
        let adapter = Adapter::new(&bare, &backend).unwrap();
        assert_eq!(adapter.resolve_primary_group(&many).primary_group, None);
    }
}
