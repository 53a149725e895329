//! Output formatting utilities.
//!
//! Machine-readable results go to stdout; everything meant for a human
//! operator goes to stderr.

use colored::Colorize;
use ldf_model::Outcome;

/// Prints a success message.
pub fn success(message: &str) {
    eprintln!("{} {}", "✓".green().bold(), message);
}

/// Prints an error message.
pub fn error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Prints a warning message.
pub fn warning(message: &str) {
    eprintln!("{} {}", "⚠".yellow().bold(), message);
}

/// Prints a labelled value.
pub fn field(label: &str, value: &str) {
    println!("{:>20}: {}", label.bold(), value);
}

/// Prints an outcome as pretty JSON.
pub fn outcome(outcome: &Outcome) -> crate::CliResult<()> {
    let json = serde_json::to_string_pretty(&outcome.to_json())?;
    println!("{json}");
    Ok(())
}
