//! The `check-config` command.

use ldf_adapter::AssurancePolicy;
use ldf_core::Config;

use crate::commands::open_backend;
use crate::error::{CliError, CliResult};
use crate::output::{field, success, warning};

/// Validates the configuration and prints a summary.
///
/// With `connect`, the backend is opened and its connection tested.
pub fn run_check_config(config: &Config, connect: bool) -> CliResult<()> {
    let adapter = &config.adapter;
    field("backend", adapter.backend.as_str());
    field("interactive", &adapter.interactive.to_string());
    field("primary_group", adapter.primary_group.as_deref().unwrap_or("-"));
    field("fallback_group", adapter.fallback_group.as_deref().unwrap_or("-"));
    field("additional_groups", &adapter.additional_groups.join(", "));

    let generator = &config.username_generator;
    field("username_generator", &format!("{:?}", generator.mode).to_lowercase());

    if config.assurance.skip {
        warning("assurance checking is disabled");
    } else {
        let policy = AssurancePolicy::compile(&config.assurance.require, &config.assurance.prefix)?;
        field("assurance", policy.source());
    }

    if connect {
        let backend = open_backend(config)?;
        backend.test_connection().map_err(CliError::backend)?;
        success(&format!("connected to {} backend", backend.backend_type()));
    }

    success("configuration is valid");
    Ok(())
}
