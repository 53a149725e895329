//! The `sanitize` command.

use ldf_naming::{sanitize, sanitize_legacy};

use crate::output::field;

/// Prints the current and the legacy local name of each name.
pub fn run_sanitize(names: &[String]) {
    for name in names {
        let current = sanitize(name).unwrap_or_else(|e| format!("<{e}>"));
        let legacy = sanitize_legacy(name).unwrap_or_else(|| "<none>".to_string());

        println!("{name}");
        field("current", &current);
        field("legacy", &legacy);
    }
}
