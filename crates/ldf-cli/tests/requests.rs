//! Requests from JSON to outcome.

use std::fs;
use std::path::Path;

use ldf_adapter::Adapter;
use ldf_backend::MemoryBackend;
use ldf_cli::commands::{process, run_reconcile};
use ldf_cli::Request;
use ldf_core::Config;
use serde_json::json;

fn request(target: &str) -> Request {
    let value = json!({
        "state_target": target,
        "user": {
            "userinfo": {
                "sub": "abc123",
                "iss": "https://issuer.example.org",
                "preferred_username": "jdoe",
                "given_name": "Jane",
                "family_name": "Doe",
                "groups": ["hpc"],
                "eduperson_assurance": ["https://refeds.org/assurance/profile/cappuccino"]
            },
            "credentials": {
                "ssh_key": [{"name": "laptop", "id": "1", "value": "ssh-ed25519 AAAA jdoe@laptop"}]
            }
        }
    });
    Request::from_json(&value.to_string()).unwrap()
}

#[test]
fn deploy_request_yields_credentials() {
    let config = Config::default();
    let backend = MemoryBackend::new();
    let adapter = Adapter::new(&config, &backend).unwrap();

    let json = process(&adapter, &request("deployed")).to_json();
    assert_eq!(json["state"], "deployed");
    assert_eq!(json["credentials"]["ssh_user"], "jdoe");
    assert!(backend.account("jdoe").is_some());

    let json = process(&adapter, &request("get_status")).to_json();
    assert_eq!(json["state"], "deployed");
    assert_eq!(json["message"], "username jdoe");
}

#[test]
fn unknown_target_fails_without_touching_the_backend() {
    let config = Config::default();
    let backend = MemoryBackend::new();
    let adapter = Adapter::new(&config, &backend).unwrap();

    let outcome = process(&adapter, &request("vanished"));
    assert!(outcome.is_failure());
    assert!(outcome.message().contains("vanished"));
    assert!(backend.mutations().is_empty());
}

fn status_request() -> String {
    json!({
        "state_target": "get_status",
        "user": {"userinfo": {"sub": "abc123", "iss": "https://issuer.example.org"}}
    })
    .to_string()
}

fn write_system(root: &Path) {
    fs::create_dir_all(root.join("etc")).unwrap();
    fs::write(
        root.join("etc/passwd"),
        "root:x:0:0:root:/root:/bin/bash\n\
         jdoe:x:1000:1000:other@https%3A//issuer.example.org:/home/jdoe:/bin/sh\n",
    )
    .unwrap();
    fs::write(root.join("etc/group"), "root:x:0:\nhpc:x:1000:jdoe\n").unwrap();
}

#[test]
fn status_request_runs_against_the_configured_backend() {
    let dir = tempfile::tempdir().unwrap();
    write_system(dir.path());

    let config_path = dir.path().join("ldf-adapter.toml");
    fs::write(
        &config_path,
        format!(
            "[adapter]\nbackend = \"local_unix\"\n\n[backend.local_unix]\nroot = \"{}\"\n",
            dir.path().display()
        ),
    )
    .unwrap();
    let input = dir.path().join("request.json");
    fs::write(&input, status_request()).unwrap();

    let outcome = run_reconcile(Some(&config_path), Some(&input));
    assert_eq!(outcome.state_name(), "not_deployed", "{outcome:?}");
    assert_eq!(outcome.message(), "No message");
}

#[test]
fn setup_errors_become_failed_outcomes() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("request.json");
    fs::write(&input, "not json").unwrap();

    let outcome = run_reconcile(None, Some(&input));
    assert!(outcome.is_failure());
    assert!(outcome.message().starts_with("JSON error"));

    let missing_config = dir.path().join("missing.toml");
    fs::write(&input, status_request()).unwrap();
    let outcome = run_reconcile(Some(&missing_config), Some(&input));
    assert!(outcome.is_failure());
    assert!(outcome.message().contains("does not exist"));
}
