//! Shared runtime state for pcm-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The tracker owns every
//! record view; this module only adds the SSE bus and static metadata.

use std::sync::Arc;
use std::time::Duration;

use pcm_lifecycle::LifecycleTracker;
use pcm_schemas::{Entity, EntityKind, Locale, RecordId};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// BusMsg: SSE event bus payload
// ---------------------------------------------------------------------------

/// Messages broadcast over the internal event bus and surfaced as SSE events.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusMsg {
    Heartbeat {
        ts_millis: i64,
    },
    /// A record was created, edited or moved to a new status.
    RecordChanged {
        kind: EntityKind,
        record: Entity,
    },
    RecordRemoved {
        kind: EntityKind,
        id: RecordId,
    },
    ViewRefreshed {
        kind: EntityKind,
        loaded: usize,
        total_items: u64,
    },
    /// Operator-facing notification text (already localized).
    Notice {
        level: String,
        msg: String,
    },
}

impl BusMsg {
    pub fn event_name(&self) -> &'static str {
        match self {
            BusMsg::Heartbeat { .. } => "heartbeat",
            BusMsg::RecordChanged { .. } => "record_changed",
            BusMsg::RecordRemoved { .. } => "record_removed",
            BusMsg::ViewRefreshed { .. } => "view_refreshed",
            BusMsg::Notice { .. } => "notice",
        }
    }
}

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct AppState {
    /// Broadcast bus for SSE.
    pub bus: broadcast::Sender<BusMsg>,
    pub build: BuildInfo,
    pub tracker: Arc<LifecycleTracker>,
    /// Language of `message` fields in error bodies and notices.
    pub locale: Locale,
    /// Page size used when a request does not name one.
    pub page_size: u32,
}

impl AppState {
    pub fn new(tracker: Arc<LifecycleTracker>, locale: Locale, page_size: u32) -> Self {
        let (bus, _rx) = broadcast::channel::<BusMsg>(1024);
        Self {
            bus,
            build: BuildInfo {
                service: "pcm-daemon",
                version: env!("CARGO_PKG_VERSION"),
            },
            tracker,
            locale,
            page_size: page_size.max(1),
        }
    }

    /// Fire-and-forget publish; no subscribers is not an error.
    pub fn publish(&self, msg: BusMsg) {
        let _ = self.bus.send(msg);
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Seconds since first call (process lifetime).
pub fn uptime_secs() -> u64 {
    static START: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();
    START
        .get_or_init(std::time::Instant::now)
        .elapsed()
        .as_secs()
}

/// Spawn a background task that emits a heartbeat SSE every `interval`.
pub fn spawn_heartbeat(bus: broadcast::Sender<BusMsg>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let ts = chrono::Utc::now().timestamp_millis();
            let _ = bus.send(BusMsg::Heartbeat { ts_millis: ts });
        }
    });
}
