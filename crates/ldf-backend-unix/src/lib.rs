//! # ldf-backend-unix
//!
//! Local operating system accounts managed with shadow-utils.
//!
//! Accounts are looked up in `etc/passwd` below a configurable root; the
//! federated unique id is kept in the GECOS field. Changes go through
//! `useradd`, `usermod`, `userdel`, `chage`, `groupadd` and `groupmod`,
//! invoked by a [`CommandRunner`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod command;
pub mod config;
pub mod database;
pub mod error;
pub mod provider;

pub use command::{CommandRunner, RecordingRunner, SystemRunner};
pub use config::UnixConfig;
pub use error::{UnixError, UnixResult};
pub use provider::UnixBackend;
