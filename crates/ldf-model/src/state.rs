//! Account lifecycle states.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Lifecycle state of a local account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    /// Account exists and is usable.
    Deployed,
    /// No account exists.
    NotDeployed,
    /// Account exists but is locked.
    Suspended,
    /// Account exists with restricted access.
    Limited,
    /// Account creation awaits an out-of-band step.
    Pending,
    /// The backend refuses the account.
    Rejected,
    /// The state could not be determined.
    Unknown,
}

impl State {
    /// Returns the wire name of the state.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deployed => "deployed",
            Self::NotDeployed => "not_deployed",
            Self::Suspended => "suspended",
            Self::Limited => "limited",
            Self::Pending => "pending",
            Self::Rejected => "rejected",
            Self::Unknown => "unknown",
        }
    }

    /// Returns whether an account exists in this state.
    #[must_use]
    pub const fn has_account(&self) -> bool {
        matches!(
            self,
            Self::Deployed | Self::Suspended | Self::Limited | Self::Pending
        )
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for State {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deployed" => Ok(Self::Deployed),
            "not_deployed" => Ok(Self::NotDeployed),
            "suspended" => Ok(Self::Suspended),
            "limited" => Ok(Self::Limited),
            "pending" => Ok(Self::Pending),
            "rejected" => Ok(Self::Rejected),
            "unknown" => Ok(Self::Unknown),
            other => Err(ModelError::UnknownState(other.to_string())),
        }
    }
}

/// A state together with a human readable explanation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Current state.
    pub state: State,
    /// Explanation, usually naming the local account.
    pub message: String,
}

impl Status {
    /// Creates a new status.
    #[must_use]
    pub fn new(state: State, message: impl Into<String>) -> Self {
        Self {
            state,
            message: message.into(),
        }
    }
}

/// State a caller asks the adapter to reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// Create or update the account.
    Deployed,
    /// Remove the account.
    NotDeployed,
    /// Only report the current state.
    GetStatus,
    /// Lock the account.
    Suspended,
    /// Unlock a suspended account.
    Resumed,
    /// Restrict the account.
    Limited,
    /// Lift a restriction.
    Unlimited,
}

impl Target {
    /// Returns the wire name of the target.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Deployed => "deployed",
            Self::NotDeployed => "not_deployed",
            Self::GetStatus => "get_status",
            Self::Suspended => "suspended",
            Self::Resumed => "resumed",
            Self::Limited => "limited",
            Self::Unlimited => "unlimited",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deployed" => Ok(Self::Deployed),
            "not_deployed" => Ok(Self::NotDeployed),
            "get_status" => Ok(Self::GetStatus),
            "suspended" => Ok(Self::Suspended),
            "resumed" => Ok(Self::Resumed),
            "limited" => Ok(Self::Limited),
            "unlimited" => Ok(Self::Unlimited),
            other => Err(ModelError::UnknownTarget(other.to_string())),
        }
    }
}
