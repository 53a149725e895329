//! # ldf-backend-ldap
//!
//! Accounts kept in a directory service as `inetOrgPerson`/`posixAccount`
//! entries, mapped to federated users through a configurable attribute.
//!
//! Three modes are supported:
//!
//! - `read_only`: existing mappings are reported, nothing is written
//! - `pre_created`: accounts are created by an administrator and mapped to
//!   the federated user on first deployment
//! - `full_access`: accounts and groups are created, with uid and gid
//!   numbers allocated from counter entries

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod connection;
pub mod error;
pub mod provider;
pub mod search;

pub use config::{LdapConfig, Mode};
pub use connection::{Directory, LdapConnection};
pub use error::{LdapError, LdapResult};
pub use provider::LdapBackend;
pub use search::LdapEntry;
