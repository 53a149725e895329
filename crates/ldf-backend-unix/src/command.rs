//! Execution of shadow-utils commands.

use std::collections::BTreeMap;
use std::process::Command;

use parking_lot::Mutex;

use crate::error::{UnixError, UnixResult};

/// Runs external commands.
pub trait CommandRunner {
    /// Runs `program` with `args` and returns its stdout.
    ///
    /// # Errors
    ///
    /// Returns [`UnixError::Command`] if the command cannot be started or
    /// exits unsuccessfully.
    fn run(&self, program: &str, args: &[String]) -> UnixResult<String>;
}

fn command_line(program: &str, args: &[String]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// System runner
// ============================================================================

/// Runs commands on the local system.
///
/// Commands run with `LC_ALL=C` so their output can be parsed.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[String]) -> UnixResult<String> {
        tracing::debug!(command = %command_line(program, args), "running");
        let output = Command::new(program)
            .args(args)
            .env("LC_ALL", "C")
            .output()
            .map_err(|e| UnixError::Command {
                command: command_line(program, args),
                output: e.to_string(),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if output.status.success() {
            return Ok(stdout);
        }

        let stderr = String::from_utf8_lossy(&output.stderr);
        let message = [stderr.trim(), stdout.trim()]
            .into_iter()
            .find(|text| !text.is_empty())
            .unwrap_or("<no output>")
            .to_string();
        Err(UnixError::Command {
            command: command_line(program, args),
            output: message,
        })
    }
}

// ============================================================================
// Recording runner
// ============================================================================

type Handler = Box<dyn Fn(&[String]) -> UnixResult<String>>;

/// Records commands instead of running them.
///
/// Each program can be given a handler that produces its output or simulates
/// its effect; programs without a handler succeed with empty output.
#[derive(Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<String>>,
    handlers: BTreeMap<String, Handler>,
}

impl RecordingRunner {
    /// Creates a runner without handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the handler for a program.
    #[must_use]
    pub fn on(
        mut self,
        program: &str,
        handler: impl Fn(&[String]) -> UnixResult<String> + 'static,
    ) -> Self {
        self.handlers.insert(program.to_string(), Box::new(handler));
        self
    }

    /// Makes a program fail with the given output.
    #[must_use]
    pub fn failing(self, program: &str, output: &str) -> Self {
        let command = program.to_string();
        let output = output.to_string();
        self.on(program, move |_| {
            Err(UnixError::Command {
                command: command.clone(),
                output: output.clone(),
            })
        })
    }

    /// Command lines run so far.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[String]) -> UnixResult<String> {
        self.calls.lock().push(command_line(program, args));
        match self.handlers.get(program) {
            Some(handler) => handler(args),
            None => Ok(String::new()),
        }
    }
}

impl std::fmt::Debug for RecordingRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingRunner")
            .field("calls", &self.calls.lock().len())
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}
