//! # ldf-model
//!
//! Domain models for the ldf identity adapter.
//!
//! This crate defines the claims of a federated user ([`UserInfo`]), the
//! lifecycle states of a local account ([`State`], [`Status`]), the states a
//! caller can request ([`Target`]) and the single discriminated result every
//! reconciliation produces ([`Outcome`]).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod outcome;
pub mod state;
pub mod userinfo;

pub use error::{ModelError, ModelResult};
pub use outcome::Outcome;
pub use state::{State, Status, Target};
pub use userinfo::{SshKey, UserInfo};
