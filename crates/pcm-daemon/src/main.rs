//! pcm-daemon entry point.
//!
//! Thin: sets up tracing, loads config, builds the REST-backed tracker and
//! the shared state, wires middleware, and starts the HTTP server. All route
//! handlers live in `routes.rs`; all shared state types live in `state.rs`.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use pcm_backend::RestBackend;
use pcm_config::{
    load_layered_yaml, report_unused_keys, resolve_token, split_layer_list, DeskConfig,
    LoadedConfig, UnusedKeyPolicy,
};
use pcm_daemon::{routes, state};
use pcm_lifecycle::LifecycleTracker;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Production injects env
    // vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let loaded = load_config_from_env()?;
    let unused = report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    if !unused.is_clean() {
        warn!(keys = ?unused.unused_leaf_pointers, "config has keys nothing reads");
    }
    let cfg = DeskConfig::from_json(&loaded.config_json)?;
    info!(config_hash = %loaded.config_hash, base_url = %cfg.base_url, commit = ?cfg.commit, "config loaded");

    let token = resolve_token(&loaded.config_json);
    if !token.is_present() {
        warn!(env_var = %token.env_var, "no bearer token set; backend requests go out unauthenticated");
    }
    let backend = RestBackend::with_timeout(cfg.base_url.clone(), token.token, cfg.timeout)
        .context("backend client init failed")?;
    let tracker = Arc::new(LifecycleTracker::new(Arc::new(backend), cfg.commit));

    let shared = Arc::new(state::AppState::new(tracker, cfg.locale, cfg.page_size));
    state::spawn_heartbeat(shared.bus.clone(), Duration::from_secs(1));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env()
        .or_else(|| cfg.daemon_addr.parse().ok())
        .unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!("pcm-daemon listening on http://{}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// `PCM_CONFIG` lists YAML layers, comma-separated. Unset means defaults.
fn load_config_from_env() -> anyhow::Result<LoadedConfig> {
    let layers = std::env::var("PCM_CONFIG")
        .map(|raw| split_layer_list(&raw))
        .unwrap_or_default();
    let paths: Vec<&str> = layers.iter().map(String::as_str).collect();
    load_layered_yaml(&paths).context("config load failed")
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var("PCM_DAEMON_ADDR").ok()?.parse().ok()
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
}
