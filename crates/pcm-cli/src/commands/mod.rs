//! Command handler modules for pcm-cli.
//!
//! Shared plumbing lives here: config loading, the REST-backed tracker and
//! the terminal confirmation prompt. Record commands live in [`records`].

pub mod records;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use pcm_backend::RestBackend;
use pcm_config::{
    load_layered_yaml, report_unused_keys, resolve_token, split_layer_list, DeskConfig,
    UnusedKeyPolicy,
};
use pcm_lifecycle::{Confirmation, Confirmer, LifecycleTracker};
use pcm_schemas::{Entity, Locale, Operation};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

// ---------------------------------------------------------------------------
// config-hash
// ---------------------------------------------------------------------------

pub fn config_hash(paths: &[String]) -> Result<()> {
    let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
    let loaded = load_layered_yaml(&path_refs)?;
    println!("config_hash={}", loaded.config_hash);
    println!("{}", loaded.canonical_json);
    Ok(())
}

// ---------------------------------------------------------------------------
// Desk: config + tracker
// ---------------------------------------------------------------------------

/// Everything a record command needs.
pub struct Desk {
    pub cfg: DeskConfig,
    pub locale: Locale,
    pub tracker: LifecycleTracker,
}

impl Desk {
    /// Load config from `--config` paths (or `PCM_CONFIG`) and build the
    /// REST-backed tracker. `locale` overrides `/ui/locale`.
    pub fn connect(config_paths: &[String], locale: Option<Locale>) -> Result<Self> {
        let paths: Vec<String> = if config_paths.is_empty() {
            std::env::var("PCM_CONFIG")
                .map(|raw| split_layer_list(&raw))
                .unwrap_or_default()
        } else {
            config_paths.to_vec()
        };
        let path_refs: Vec<&str> = paths.iter().map(|s| s.as_str()).collect();
        let loaded = load_layered_yaml(&path_refs)?;

        let report = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
        if !report.is_clean() {
            eprintln!(
                "WARN: CONFIG_UNUSED_KEYS unused_leaf_keys={}",
                report.unused_leaf_pointers.len()
            );
            for p in report.unused_leaf_pointers.iter().take(50) {
                eprintln!("  unused={}", p);
            }
        }

        let cfg = DeskConfig::from_json(&loaded.config_json)?;
        let token = resolve_token(&loaded.config_json);
        if !token.is_present() {
            warn!(env_var = %token.env_var, "no bearer token set");
        }
        let backend = RestBackend::with_timeout(cfg.base_url.clone(), token.token, cfg.timeout)
            .context("backend client init failed")?;

        Ok(Self {
            locale: locale.unwrap_or(cfg.locale),
            tracker: LifecycleTracker::new(Arc::new(backend), cfg.commit),
            cfg,
        })
    }
}

// ---------------------------------------------------------------------------
// TerminalConfirmer
// ---------------------------------------------------------------------------

/// Asks `<Operation> <kind> <id>? [y/N]` on stderr and reads one line from
/// stdin. Anything but `y`/`yes` (including EOF) cancels.
pub struct TerminalConfirmer {
    assume_yes: bool,
}

impl TerminalConfirmer {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[async_trait]
impl Confirmer for TerminalConfirmer {
    async fn request_confirmation(&self, op: Operation, entity: &Entity) -> Confirmation {
        if self.assume_yes {
            return Confirmation::Confirmed;
        }
        eprint!(
            "{} {} {} ({})? [y/N] ",
            op.label(Locale::En),
            entity.kind,
            entity.id,
            entity.status
        );

        let mut line = String::new();
        match BufReader::new(tokio::io::stdin()).read_line(&mut line).await {
            Ok(_) if is_affirmative(&line) => Confirmation::Confirmed,
            _ => Confirmation::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_yes_confirms() {
        assert!(is_affirmative("y\n"));
        assert!(is_affirmative(" YES "));
        assert!(!is_affirmative(""));
        assert!(!is_affirmative("n"));
        assert!(!is_affirmative("yep"));
    }

    #[tokio::test]
    async fn assume_yes_never_prompts() {
        let c = TerminalConfirmer::new(true);
        let e = Entity::new("s-1", pcm_schemas::EntityKind::Store, pcm_schemas::Status::Active);
        assert_eq!(
            c.request_confirmation(Operation::Delete, &e).await,
            Confirmation::Confirmed
        );
    }
}
