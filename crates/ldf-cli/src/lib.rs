//! # ldf-cli
//!
//! Command-line front end of the adapter.
//!
//! The `ldf-adapter` binary reads one reconciliation request as JSON, drives
//! the configured backend towards the requested state and prints the outcome
//! as JSON on stdout. Logs go to stderr.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
pub mod request;

pub use cli::Cli;
pub use error::{CliError, CliResult};
pub use request::Request;
