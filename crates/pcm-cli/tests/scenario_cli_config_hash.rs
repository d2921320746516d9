//! Scenario: `pcm config-hash`.
//!
//! GREEN when:
//! - The printed hash is stable across key order.
//! - A secret literal in any layer fails the command without echoing it.

use assert_cmd::Command;
use predicates::prelude::*;

fn hash_line(stdout: &[u8]) -> String {
    String::from_utf8_lossy(stdout)
        .lines()
        .find(|l| l.starts_with("config_hash="))
        .map(str::to_string)
        .expect("config_hash line missing")
}

#[test]
fn hash_ignores_key_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.yaml");
    let b = dir.path().join("b.yaml");
    std::fs::write(
        &a,
        "backend:\n  base_url: \"http://127.0.0.1:8080/api\"\n  page_size: 10\nui:\n  locale: vi\n",
    )
    .unwrap();
    std::fs::write(
        &b,
        "ui:\n  locale: vi\nbackend:\n  page_size: 10\n  base_url: \"http://127.0.0.1:8080/api\"\n",
    )
    .unwrap();

    let out_a = Command::cargo_bin("pcm")
        .unwrap()
        .args(["config-hash"])
        .arg(&a)
        .output()
        .unwrap();
    let out_b = Command::cargo_bin("pcm")
        .unwrap()
        .args(["config-hash"])
        .arg(&b)
        .output()
        .unwrap();
    assert!(out_a.status.success());
    assert!(out_b.status.success());

    let line = hash_line(&out_a.stdout);
    assert_eq!(line, hash_line(&out_b.stdout));
    assert_eq!(line.len(), "config_hash=".len() + 64);
}

#[test]
fn secret_literal_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let base = dir.path().join("base.yaml");
    let local = dir.path().join("local.yaml");
    std::fs::write(&base, "backend:\n  token_env: PCM_API_TOKEN\n").unwrap();
    std::fs::write(&local, "backend:\n  token: \"eyJhbGciOiJIUzI1NiJ9.payload.sig\"\n").unwrap();

    Command::cargo_bin("pcm")
        .unwrap()
        .args(["config-hash"])
        .arg(&base)
        .arg(&local)
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_SECRET_DETECTED"))
        .stderr(predicate::str::contains("eyJhbGciOiJIUzI1NiJ9").not());
}
