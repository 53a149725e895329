//! # ldf-core
//!
//! Core configuration and error handling for the ldf identity adapter.
//!
//! This crate provides the configuration model shared by the reconciliation
//! engine, the backends and the command-line entry point. Configuration is
//! read once from a TOML file at startup and passed around by reference.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;

pub use config::{
    AdapterConfig, AssuranceConfig, BackendKind, Config, GeneratorMode, UsernameGeneratorConfig,
    CONFIG_ENV_VAR,
};
pub use error::{Error, Result};
