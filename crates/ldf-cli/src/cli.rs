//! CLI argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Reconciles federated identities with local accounts.
#[derive(Debug, Parser)]
#[command(name = "ldf-adapter")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file. Falls back to `$LDF_ADAPTER_CONFIG`.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Process one request and print the outcome as JSON.
    Reconcile {
        /// File holding the JSON request. Read from stdin if absent.
        #[arg(short, long)]
        input: Option<PathBuf>,
    },

    /// Show how names are mapped to local names.
    Sanitize {
        /// Names to map.
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Validate the configuration.
    CheckConfig {
        /// Also open the backend and test the connection.
        #[arg(long)]
        connect: bool,
    },
}
