//! Reconciliation requests.
//!
//! A request names the target state and carries the user's claims:
//!
//! ```json
//! {
//!   "state_target": "deployed",
//!   "user": {
//!     "userinfo": { "sub": "abc123", "iss": "https://issuer.example.org" },
//!     "credentials": { "ssh_key": [] }
//!   }
//! }
//! ```

use std::str::FromStr;

use ldf_model::{Target, UserInfo};
use serde::Deserialize;
use serde_json::Value;

use crate::error::CliResult;

/// One reconciliation request.
#[derive(Debug, Clone, Deserialize)]
pub struct Request {
    /// Requested target state, e.g. `deployed`.
    pub state_target: String,
    /// The user the request is about.
    pub user: RequestUser,
}

/// User part of a request.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestUser {
    /// OIDC userinfo claims.
    pub userinfo: Value,
    /// Credentials to deploy.
    #[serde(default)]
    pub credentials: Option<Value>,
}

impl Request {
    /// Parses a request from JSON text.
    pub fn from_json(text: &str) -> CliResult<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// The requested target state.
    pub fn target(&self) -> CliResult<Target> {
        Ok(Target::from_str(&self.state_target)?)
    }

    /// Builds the claims of the user.
    pub fn user_info(&self) -> CliResult<UserInfo> {
        Ok(UserInfo::from_claims(
            &self.user.userinfo,
            self.user.credentials.as_ref(),
        )?)
    }
}
