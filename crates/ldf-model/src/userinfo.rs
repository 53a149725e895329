//! Claims of a federated user.
//!
//! A [`UserInfo`] is built from an OIDC userinfo document and the credentials
//! the caller submitted with the request. It is immutable input for one
//! reconciliation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ModelError, ModelResult};

/// A public SSH key submitted by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKey {
    /// Display name of the key.
    pub name: String,
    /// Identifier of the key at the caller.
    pub id: String,
    /// The key itself, in `authorized_keys` format.
    pub value: String,
}

impl SshKey {
    /// Creates a new key.
    #[must_use]
    pub fn new(name: impl Into<String>, id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            id: id.into(),
            value: value.into(),
        }
    }

    /// Returns the credential label reported after activation.
    #[must_use]
    pub fn label(&self) -> String {
        format!("ssh:{}/{}", self.name, self.id)
    }
}

/// Verified claims about a federated user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Globally unique, stable identifier (`sub@iss`).
    pub unique_id: String,
    /// Username the user would like to have.
    pub preferred_username: Option<String>,
    /// Given name.
    pub given_name: Option<String>,
    /// Family name.
    pub family_name: Option<String>,
    /// Full display name.
    pub full_name: Option<String>,
    /// Email address.
    pub email: Option<String>,
    /// Group labels the user is a member of.
    pub groups: Vec<String>,
    /// Assurance claims, usually absolute URIs.
    pub assurance: Vec<String>,
    /// Public SSH keys.
    pub ssh_keys: Vec<SshKey>,
    /// Primary group label, once resolved.
    pub primary_group: Option<String>,
}

impl UserInfo {
    /// Creates claims carrying only the unique identifier.
    #[must_use]
    pub fn new(unique_id: impl Into<String>) -> Self {
        Self {
            unique_id: unique_id.into(),
            ..Self::default()
        }
    }

    /// Sets the preferred username.
    #[must_use]
    pub fn with_preferred_username(mut self, name: impl Into<String>) -> Self {
        self.preferred_username = Some(name.into());
        self
    }

    /// Sets given and family name.
    #[must_use]
    pub fn with_name(mut self, given: impl Into<String>, family: impl Into<String>) -> Self {
        self.given_name = Some(given.into());
        self.family_name = Some(family.into());
        self
    }

    /// Sets the email address.
    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    /// Sets the group labels.
    #[must_use]
    pub fn with_groups<I, S>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.groups = groups.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the assurance claims.
    #[must_use]
    pub fn with_assurance<I, S>(mut self, assurance: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assurance = assurance.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an SSH key.
    #[must_use]
    pub fn with_ssh_key(mut self, key: SshKey) -> Self {
        self.ssh_keys.push(key);
        self
    }

    /// Sets the primary group label.
    #[must_use]
    pub fn with_primary_group(mut self, group: impl Into<String>) -> Self {
        self.primary_group = Some(group.into());
        self
    }

    /// Builds claims from an OIDC userinfo document.
    ///
    /// `credentials` is the optional credentials object of the request; its
    /// `ssh_key` list provides the user's public keys.
    pub fn from_claims(claims: &Value, credentials: Option<&Value>) -> ModelResult<Self> {
        let sub = string_claim(claims, "sub")
            .ok_or_else(|| ModelError::MissingClaim("sub".to_string()))?;
        let iss = string_claim(claims, "iss")
            .ok_or_else(|| ModelError::MissingClaim("iss".to_string()))?;

        let groups = match claims.get("groups") {
            Some(value) => string_list(value, "groups")?,
            None => match claims.get("eduperson_entitlement") {
                Some(value) => entitlement_groups(&string_list(value, "eduperson_entitlement")?),
                None => Vec::new(),
            },
        };

        let assurance = match claims.get("eduperson_assurance") {
            Some(value) => string_list(value, "eduperson_assurance")?,
            None => Vec::new(),
        };

        let ssh_keys = match credentials.and_then(|c| c.get("ssh_key")) {
            Some(Value::Array(keys)) => keys
                .iter()
                .map(|key| serde_json::from_value(key.clone()))
                .collect::<Result<Vec<SshKey>, _>>()
                .map_err(|e| ModelError::invalid_claim("ssh_key", e.to_string()))?,
            Some(Value::Null) | None => Vec::new(),
            Some(_) => return Err(ModelError::invalid_claim("ssh_key", "expected a list")),
        };

        Ok(Self {
            unique_id: format!("{sub}@{iss}"),
            preferred_username: string_claim(claims, "preferred_username"),
            given_name: string_claim(claims, "given_name"),
            family_name: string_claim(claims, "family_name"),
            full_name: string_claim(claims, "name"),
            email: string_claim(claims, "email"),
            groups,
            assurance,
            ssh_keys,
            primary_group: None,
        })
    }
}

fn string_claim(claims: &Value, name: &str) -> Option<String> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Accepts either a single string or a list of strings.
fn string_list(value: &Value, claim: &str) -> ModelResult<Vec<String>> {
    match value {
        Value::String(s) => Ok(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| ModelError::invalid_claim(claim, "expected a list of strings"))
            })
            .collect(),
        Value::Null => Ok(Vec::new()),
        _ => Err(ModelError::invalid_claim(claim, "expected a string or a list")),
    }
}

/// Extracts group names from entitlement URNs.
///
/// `urn:mace:egi.eu:group:vo.example.org:admins:role=member#aai.egi.eu`
/// yields `vo.example.org:admins`. Entitlements without a `group` segment
/// are ignored.
fn entitlement_groups(entitlements: &[String]) -> Vec<String> {
    let mut groups: Vec<String> = Vec::new();
    for entitlement in entitlements {
        let without_authority = entitlement.split('#').next().unwrap_or_default();
        let Some((_, rest)) = without_authority.split_once(":group:") else {
            continue;
        };
        let name = rest
            .split(':')
            .take_while(|segment| !segment.starts_with("role="))
            .collect::<Vec<_>>()
            .join(":");
        if !name.is_empty() && !groups.contains(&name) {
            groups.push(name);
        }
    }
    groups
}
