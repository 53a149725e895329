//! # ldf-adapter
//!
//! Reconciles one federated identity with a local account.

#![forbid(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use ldf_cli::{
    cli::{Cli, Command},
    commands::{run_check_config, run_reconcile, run_sanitize},
    output,
};
use ldf_core::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            output::error(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.command {
        Command::Reconcile { input } => {
            let outcome = run_reconcile(cli.config.as_deref(), input.as_deref());
            output::outcome(&outcome).context("cannot print outcome")?;
            Ok(if outcome.is_failure() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Sanitize { names } => {
            run_sanitize(&names);
            Ok(ExitCode::SUCCESS)
        }
        Command::CheckConfig { connect } => {
            let config =
                Config::load(cli.config.as_deref()).context("failed to load configuration")?;
            run_check_config(&config, connect)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}
