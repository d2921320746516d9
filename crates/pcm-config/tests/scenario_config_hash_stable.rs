//! Scenario: config hash stability.
//!
//! GREEN when:
//! - The same layers hash identically on every load.
//! - Reordering keys within a YAML document does not change the hash.
//! - A changed value changes the hash.
//! - An overlay layer overrides the base and the typed view sees it.

use pcm_config::{load_layered_yaml_from_strings, DeskConfig};
use pcm_lifecycle::CommitPolicy;
use pcm_schemas::Locale;

const BASE_YAML: &str = r#"
backend:
  base_url: "https://api.petcare.example/v1"
  timeout_ms: 8000
  token_env: "PCM_API_TOKEN"
  page_size: 20
daemon:
  addr: "127.0.0.1:8899"
ui:
  locale: "vi"
"#;

const BASE_YAML_REORDERED: &str = r#"
ui:
  locale: "vi"
daemon:
  addr: "127.0.0.1:8899"
backend:
  page_size: 20
  token_env: "PCM_API_TOKEN"
  timeout_ms: 8000
  base_url: "https://api.petcare.example/v1"
"#;

const OVERLAY_YAML: &str = r#"
backend:
  base_url: "http://127.0.0.1:8080/api"
lifecycle:
  commit: "optimistic"
"#;

#[test]
fn same_input_produces_identical_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(a.config_hash, b.config_hash);
    assert_eq!(a.canonical_json, b.canonical_json);
}

#[test]
fn reordered_keys_produce_same_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML_REORDERED]).unwrap();
    assert_eq!(
        a.config_hash, b.config_hash,
        "key order in the source must not change the hash"
    );
}

#[test]
fn different_values_produce_different_hash() {
    let a = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    let b = load_layered_yaml_from_strings(&[BASE_YAML, "ui:\n  locale: en\n"]).unwrap();
    assert_ne!(a.config_hash, b.config_hash);
}

#[test]
fn overlay_takes_effect_in_typed_view() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML, OVERLAY_YAML]).unwrap();
    let cfg = DeskConfig::from_json(&loaded.config_json).unwrap();

    assert_eq!(cfg.base_url, "http://127.0.0.1:8080/api");
    assert_eq!(cfg.timeout.as_millis(), 8000, "base value survives the overlay");
    assert_eq!(cfg.locale, Locale::Vi);
    assert_eq!(cfg.commit, CommitPolicy::Optimistic);
}

#[test]
fn hash_is_64_hex_chars() {
    let loaded = load_layered_yaml_from_strings(&[BASE_YAML]).unwrap();
    assert_eq!(loaded.config_hash.len(), 64);
    assert!(loaded.config_hash.chars().all(|c| c.is_ascii_hexdigit()));
}
