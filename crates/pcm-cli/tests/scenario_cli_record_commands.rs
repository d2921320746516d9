//! Scenario: `pcm` record commands against a mock marketplace API.
//!
//! GREEN when:
//! - `act` on a confirmation-gated action asks on the terminal; anything but
//!   "y" leaves the backend untouched.
//! - `--yes` skips the prompt and the backend sees exactly one action call.
//! - An illegal action fails before any mutate call and lists what is legal.
//! - `list` prints localized labels while keeping the raw status keys.

use std::path::PathBuf;

use assert_cmd::Command;
use httpmock::prelude::*;
use predicates::prelude::*;
use serde_json::json;

fn write_config(dir: &tempfile::TempDir, server: &MockServer, locale: &str) -> PathBuf {
    let path = dir.path().join("desk.yaml");
    let yaml = format!(
        "backend:\n  base_url: \"{}\"\n  token_env: \"PCM_CLI_TEST_TOKEN\"\n  page_size: 20\nui:\n  locale: \"{}\"\n",
        server.base_url(),
        locale
    );
    std::fs::write(&path, yaml).unwrap();
    path
}

fn pcm(dir: &tempfile::TempDir, config: &PathBuf) -> Command {
    let mut cmd = Command::cargo_bin("pcm").unwrap();
    cmd.current_dir(dir.path())
        .env_remove("PCM_CONFIG")
        .env_remove("PCM_CLI_TEST_TOKEN")
        .arg("--config")
        .arg(config);
    cmd
}

fn mock_stores(server: &MockServer) {
    server.mock(|when, then| {
        when.method(GET).path("/stores");
        then.status(200).json_body(json!({
            "items": [
                {"id": "s-1", "status": "active", "name": "Pet Spa"},
                {"id": "s-2", "status": "pending_approval", "name": "Happy Paws"}
            ],
            "totalItems": 2, "page": 1, "pageSize": 20
        }));
    });
}

#[test]
fn declined_prompt_sends_nothing() {
    let server = MockServer::start();
    mock_stores(&server);
    let action = server.mock(|when, then| {
        when.method(POST).path("/stores/s-1/actions");
        then.status(200).json_body(json!({"id": "s-1", "status": "suspended"}));
    });

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, &server, "en");
    pcm(&dir, &config)
        .args(["act", "store", "s-1", "lock"])
        .write_stdin("n\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("cancelled action=lock id=s-1"))
        .stderr(predicate::str::contains("[y/N]"));

    action.assert_hits(0);
}

#[test]
fn yes_flag_applies_action_once() {
    let server = MockServer::start();
    mock_stores(&server);
    let action = server.mock(|when, then| {
        when.method(POST)
            .path("/stores/s-1/actions")
            .json_body(json!({"action": "lock", "status": "suspended"}));
        then.status(200).json_body(json!({"id": "s-1", "status": "suspended", "name": "Pet Spa"}));
    });

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, &server, "en");
    pcm(&dir, &config)
        .args(["act", "stores", "s-1", "lock", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("applied action=lock"))
        .stdout(predicate::str::contains("id=s-1 status=suspended"));

    action.assert_hits(1);
}

#[test]
fn illegal_action_fails_before_backend_call() {
    let server = MockServer::start();
    mock_stores(&server);
    let action = server.mock(|when, then| {
        when.method(POST).path("/stores/s-2/actions");
        then.status(200);
    });

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, &server, "en");
    pcm(&dir, &config)
        .args(["act", "store", "s-2", "unlock", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("legal actions from pending_approval: approve"))
        .stderr(predicate::str::contains("s-2"));

    action.assert_hits(0);
}

#[test]
fn backend_rejection_is_reported_with_record_name() {
    let server = MockServer::start();
    mock_stores(&server);
    server.mock(|when, then| {
        when.method(POST).path("/stores/s-2/actions");
        then.status(422)
            .json_body(json!({"success": false, "message": "business license missing"}));
    });

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, &server, "en");
    pcm(&dir, &config)
        .args(["act", "store", "s-2", "approve", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("store s-2"))
        .stderr(predicate::str::contains("business license missing"));
}

#[test]
fn list_prints_localized_labels() {
    let server = MockServer::start();
    mock_stores(&server);

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, &server, "vi");
    pcm(&dir, &config)
        .args(["list", "store", "--status", "active"])
        .assert()
        .success()
        .stdout(predicate::str::contains("id=s-1 status=active"))
        .stdout(predicate::str::contains("s-2").not())
        .stdout(predicate::str::contains("shown=1 backend_total=2"));
}

#[test]
fn counts_are_zero_filled() {
    let server = MockServer::start();
    mock_stores(&server);

    let dir = tempfile::tempdir().unwrap();
    let config = write_config(&dir, &server, "en");
    pcm(&dir, &config)
        .args(["counts", "store"])
        .assert()
        .success()
        .stdout(predicate::str::contains("all=2"))
        .stdout(predicate::str::contains("active=1"))
        .stdout(predicate::str::contains("suspended=0"));
}

#[test]
fn unknown_kind_is_rejected_by_the_parser() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("pcm")
        .unwrap()
        .current_dir(dir.path())
        .args(["list", "pets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown kind 'pets'"));
}
