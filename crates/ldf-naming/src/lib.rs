//! # ldf-naming
//!
//! Account names for local systems.
//!
//! Federated identities carry arbitrary Unicode names; shadow-utils and most
//! directories accept only short ASCII names. This crate provides:
//!
//! - [`sanitize`]: the current mapping of labels to shadow compatible names
//! - [`sanitize_legacy`]: the mapping used by adapter release 0.4.4, kept so
//!   that groups created by that release can be found and renamed
//! - [`NameGenerator`]: username suggestion strategies for new accounts

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod generator;
pub mod legacy;
pub mod sanitize;

pub use error::{NameError, NameResult};
pub use generator::{FriendlyNameGenerator, NameGenerator, PooledNameGenerator};
pub use legacy::sanitize_legacy;
pub use sanitize::{sanitize, sanitize_opt, MAX_NAME_LEN};
