//! pcm-config
//!
//! Layered YAML configuration for the dashboard daemon and CLI.
//!
//! - Layers merge in order; later layers override earlier ones key by key.
//! - The merged document is canonicalized to JSON and hashed (SHA-256) so a
//!   running process can report exactly which config it loaded.
//! - Secret literals are refused. YAML carries env var NAMES only; values are
//!   resolved in [`secrets`].
//! - [`DeskConfig`] is the typed view every binary reads.

pub mod secrets;

use std::collections::BTreeSet;
use std::fs;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use pcm_lifecycle::CommitPolicy;
use pcm_schemas::Locale;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

pub use secrets::{resolve_token, ResolvedToken};

/// If any leaf string in the effective config starts with one of these, the
/// load aborts with CONFIG_SECRET_DETECTED.
const SECRET_PREFIXES: &[&str] = &[
    "eyJ",        // JWT (base64 of '{"')
    "Bearer ",    // pasted Authorization header
    "sk-",        // OpenAI style
    "sk_live",    // Stripe live
    "sk_test",    // Stripe test
    "AKIA",       // AWS access key ID
    "-----BEGIN", // PEM private keys
    "ghp_",       // GitHub PAT
    "glpat-",     // GitLab PAT
    "xoxb-",      // Slack bot token
];

/// Every JSON pointer prefix some binary actually reads.
pub const CONSUMED_POINTERS: &[&str] = &[
    "/backend/base_url",
    "/backend/timeout_ms",
    "/backend/token_env",
    "/backend/page_size",
    "/daemon/addr",
    "/ui/locale",
    "/lifecycle/commit",
];

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8080/api";
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_TOKEN_ENV: &str = "PCM_API_TOKEN";
pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const DEFAULT_DAEMON_ADDR: &str = "127.0.0.1:8899";

// ---------------------------------------------------------------------------
// Layered load + hash
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_hash: String,
    pub canonical_json: String,
    pub config_json: Value,
}

pub fn load_layered_yaml(paths: &[&str]) -> Result<LoadedConfig> {
    let mut docs: Vec<String> = Vec::new();
    for p in paths {
        let raw =
            fs::read_to_string(p).with_context(|| format!("failed to read yaml path: {p}"))?;
        docs.push(raw);
    }
    let doc_refs: Vec<&str> = docs.iter().map(|s| s.as_str()).collect();
    load_layered_yaml_from_strings(&doc_refs)
}

pub fn load_layered_yaml_from_strings(yaml_docs: &[&str]) -> Result<LoadedConfig> {
    let mut merged = serde_json::json!({});
    for raw in yaml_docs {
        let v_yaml: serde_yaml::Value = serde_yaml::from_str(raw).context("invalid yaml")?;
        let v_json = serde_json::to_value(v_yaml).context("yaml->json conversion failed")?;
        // An empty layer parses as null; it overrides nothing.
        if v_json.is_null() {
            continue;
        }
        merged = deep_merge(merged, v_json);
    }

    enforce_no_secret_literals(&merged)?;

    // serde_json's default Map is ordered by key, so this is canonical.
    let canonical_json = serde_json::to_string(&merged).context("canonical json serialize failed")?;
    let config_hash = sha256_hex(canonical_json.as_bytes());
    Ok(LoadedConfig {
        config_hash,
        canonical_json,
        config_json: merged,
    })
}

/// Split a comma-separated layer list (the `PCM_CONFIG` format).
pub fn split_layer_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn deep_merge(a: Value, b: Value) -> Value {
    match (a, b) {
        (Value::Object(mut a_map), Value::Object(b_map)) => {
            for (k, b_val) in b_map {
                let a_val = a_map.remove(&k).unwrap_or(Value::Null);
                a_map.insert(k, deep_merge(a_val, b_val));
            }
            Value::Object(a_map)
        }
        (_, b_other) => b_other,
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

fn enforce_no_secret_literals(v: &Value) -> Result<()> {
    let mut leaves = Vec::new();
    collect_leaf_pointers(v, "", &mut leaves);

    for ptr in leaves {
        if let Some(s) = v.pointer(&ptr).and_then(Value::as_str) {
            if looks_like_secret(s) {
                bail!("CONFIG_SECRET_DETECTED leaf={} value=REDACTED", ptr);
            }
        }
    }
    Ok(())
}

fn looks_like_secret(s: &str) -> bool {
    let t = s.trim_start();
    if t.trim_end().len() < 8 {
        return false;
    }
    SECRET_PREFIXES.iter().any(|p| t.starts_with(p))
}

// ---------------------------------------------------------------------------
// Unused-key guard
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnusedKeyPolicy {
    Warn,
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnusedKeyReport {
    pub unused_leaf_pointers: Vec<String>,
}

impl UnusedKeyReport {
    pub fn is_clean(&self) -> bool {
        self.unused_leaf_pointers.is_empty()
    }
}

/// Leaves not covered by [`CONSUMED_POINTERS`]. A typo such as
/// `/backend/base_ulr` shows up here instead of silently falling back to the
/// default.
pub fn report_unused_keys(config_json: &Value, policy: UnusedKeyPolicy) -> Result<UnusedKeyReport> {
    let consumed: BTreeSet<&str> = CONSUMED_POINTERS.iter().copied().collect();

    let mut leaves: Vec<String> = Vec::new();
    collect_leaf_pointers(config_json, "", &mut leaves);

    let mut unused: Vec<String> = leaves
        .into_iter()
        .filter(|leaf| !consumed.iter().any(|p| is_prefix_pointer(p, leaf)))
        // An empty document has a single "/" leaf; nothing to report.
        .filter(|leaf| leaf != "/")
        .collect();
    unused.sort();
    unused.dedup();

    let report = UnusedKeyReport {
        unused_leaf_pointers: unused,
    };
    if policy == UnusedKeyPolicy::Fail && !report.is_clean() {
        bail!(
            "CONFIG_UNUSED_KEYS: {} unused config leaf key(s): {:?}",
            report.unused_leaf_pointers.len(),
            report.unused_leaf_pointers
        );
    }
    Ok(report)
}

/// "/a/b" covers "/a/b" and "/a/b/c" but not "/a/bc".
fn is_prefix_pointer(prefix: &str, leaf: &str) -> bool {
    leaf == prefix
        || leaf
            .strip_prefix(prefix)
            .map_or(false, |rest| rest.starts_with('/'))
}

fn collect_leaf_pointers(v: &Value, prefix: &str, out: &mut Vec<String>) {
    match v {
        Value::Object(map) if !map.is_empty() => {
            for (k, vv) in map {
                let next = format!("{}/{}", prefix, k.replace('~', "~0").replace('/', "~1"));
                collect_leaf_pointers(vv, &next, out);
            }
        }
        Value::Array(arr) if !arr.is_empty() => {
            for (i, vv) in arr.iter().enumerate() {
                collect_leaf_pointers(vv, &format!("{prefix}/{i}"), out);
            }
        }
        _ => out.push(if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        }),
    }
}

// ---------------------------------------------------------------------------
// Typed view
// ---------------------------------------------------------------------------

/// What the daemon and CLI need, with defaults filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeskConfig {
    pub base_url: String,
    pub timeout: Duration,
    /// NAME of the env var holding the bearer token.
    pub token_env: String,
    pub page_size: u32,
    pub daemon_addr: String,
    pub locale: Locale,
    pub commit: CommitPolicy,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            token_env: DEFAULT_TOKEN_ENV.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            daemon_addr: DEFAULT_DAEMON_ADDR.to_string(),
            locale: Locale::En,
            commit: CommitPolicy::AfterAck,
        }
    }
}

impl DeskConfig {
    pub fn from_json(config: &Value) -> Result<Self> {
        let d = DeskConfig::default();

        let timeout_ms = read_u64(config, "/backend/timeout_ms")?.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms == 0 {
            bail!("CONFIG_INVALID /backend/timeout_ms must be > 0");
        }
        let page_size = match read_u64(config, "/backend/page_size")? {
            Some(0) => bail!("CONFIG_INVALID /backend/page_size must be > 0"),
            Some(n) => u32::try_from(n).context("CONFIG_INVALID /backend/page_size too large")?,
            None => d.page_size,
        };
        let locale = match read_str(config, "/ui/locale")? {
            Some(raw) => raw
                .parse::<Locale>()
                .map_err(|e| anyhow::anyhow!("CONFIG_INVALID /ui/locale: {e}"))?,
            None => d.locale,
        };
        let commit = match read_str(config, "/lifecycle/commit")?.as_deref() {
            None | Some("after_ack") => CommitPolicy::AfterAck,
            Some("optimistic") => CommitPolicy::Optimistic,
            Some(other) => bail!(
                "CONFIG_INVALID /lifecycle/commit: '{other}' (expected after_ack | optimistic)"
            ),
        };

        Ok(Self {
            base_url: read_str(config, "/backend/base_url")?.unwrap_or(d.base_url),
            timeout: Duration::from_millis(timeout_ms),
            token_env: read_str(config, "/backend/token_env")?.unwrap_or(d.token_env),
            page_size,
            daemon_addr: read_str(config, "/daemon/addr")?.unwrap_or(d.daemon_addr),
            locale,
            commit,
        })
    }
}

fn read_str(config: &Value, pointer: &str) -> Result<Option<String>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(other) => bail!("CONFIG_INVALID {pointer}: expected string, got {other}"),
    }
}

fn read_u64(config: &Value, pointer: &str) -> Result<Option<u64>> {
    match config.pointer(pointer) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(Some)
            .with_context(|| format!("CONFIG_INVALID {pointer}: expected non-negative integer")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_yields_defaults() {
        let loaded = load_layered_yaml_from_strings(&[""]).unwrap();
        assert_eq!(DeskConfig::from_json(&loaded.config_json).unwrap(), DeskConfig::default());
    }

    #[test]
    fn overlay_overrides_base() {
        let loaded = load_layered_yaml_from_strings(&[
            "backend:\n  base_url: http://api.local\n  page_size: 50\nui:\n  locale: en\n",
            "ui:\n  locale: vi\nlifecycle:\n  commit: optimistic\n",
        ])
        .unwrap();
        let cfg = DeskConfig::from_json(&loaded.config_json).unwrap();
        assert_eq!(cfg.base_url, "http://api.local");
        assert_eq!(cfg.page_size, 50);
        assert_eq!(cfg.locale, Locale::Vi);
        assert_eq!(cfg.commit, CommitPolicy::Optimistic);
    }

    #[test]
    fn bad_commit_policy_is_rejected() {
        let loaded = load_layered_yaml_from_strings(&["lifecycle:\n  commit: yolo\n"]).unwrap();
        let err = DeskConfig::from_json(&loaded.config_json).unwrap_err();
        assert!(err.to_string().contains("/lifecycle/commit"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let loaded = load_layered_yaml_from_strings(&["backend:\n  timeout_ms: 0\n"]).unwrap();
        assert!(DeskConfig::from_json(&loaded.config_json).is_err());
    }

    #[test]
    fn prefix_pointer_respects_segment_boundary() {
        assert!(is_prefix_pointer("/backend/base_url", "/backend/base_url"));
        assert!(!is_prefix_pointer("/ui/locale", "/ui/locales"));
        assert!(is_prefix_pointer("/daemon", "/daemon/addr"));
    }

    #[test]
    fn unused_keys_are_reported() {
        let loaded =
            load_layered_yaml_from_strings(&["backend:\n  base_ulr: http://typo\n"]).unwrap();
        let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn).unwrap();
        assert_eq!(report.unused_leaf_pointers, ["/backend/base_ulr"]);
        assert!(report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Fail).is_err());
    }

    #[test]
    fn layer_list_splits_and_trims() {
        assert_eq!(
            split_layer_list(" base.yaml, ,local.yaml "),
            vec!["base.yaml".to_string(), "local.yaml".to_string()]
        );
    }
}
