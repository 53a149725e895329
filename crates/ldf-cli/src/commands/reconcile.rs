//! The `reconcile` command.

use std::io::Read;
use std::path::Path;

use ldf_adapter::Adapter;
use ldf_core::Config;
use ldf_model::Outcome;

use crate::commands::open_backend;
use crate::error::CliResult;
use crate::request::Request;

/// Loads the configuration, reads the request and reconciles.
///
/// Never fails: setup errors are reported as a failed outcome so that the
/// caller always receives JSON.
pub fn run_reconcile(config_path: Option<&Path>, input: Option<&Path>) -> Outcome {
    match try_reconcile(config_path, input) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(error = %err, "cannot process request");
            Outcome::failed(err.to_string())
        }
    }
}

fn try_reconcile(config_path: Option<&Path>, input: Option<&Path>) -> CliResult<Outcome> {
    let text = read_input(input)?;
    let request = Request::from_json(&text)?;

    let config = Config::load(config_path)?;
    let backend = open_backend(&config)?;
    let adapter = Adapter::new(&config, backend.as_ref())?;
    Ok(process(&adapter, &request))
}

fn read_input(input: Option<&Path>) -> CliResult<String> {
    match input {
        Some(path) => Ok(std::fs::read_to_string(path)?),
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(text)
        }
    }
}

/// Drives the user of `request` towards the requested state.
pub fn process(adapter: &Adapter<'_>, request: &Request) -> Outcome {
    let prepared = request
        .target()
        .and_then(|target| Ok((target, request.user_info()?)));
    match prepared {
        Ok((target, info)) => adapter.reach_state(&info, target),
        Err(err) => {
            tracing::error!(error = %err, "malformed request");
            Outcome::failed(err.to_string())
        }
    }
}
