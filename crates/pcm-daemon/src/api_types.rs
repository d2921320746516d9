//! Request and response types for all pcm-daemon HTTP endpoints.
//!
//! These types are `Serialize + Deserialize` so they can be JSON-encoded
//! by Axum and decoded by tests. No business logic lives here.

use chrono::NaiveDate;
use pcm_lifecycle::{CommitPolicy, TabCounts};
use pcm_schemas::{Action, ActionMetadata, Entity, EntityKind, ListQuery, Status};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    pub backend: String,
    pub commit_policy: CommitPolicy,
    pub uptime_secs: u64,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Body of every non-2xx answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable machine code, e.g. `ILLEGAL_TRANSITION`.
    pub error: String,
    /// Localized notification naming the record and the attempted operation.
    pub message: String,
}

// ---------------------------------------------------------------------------
// GET /v1/:kind  and  GET /v1/:kind/groups
// ---------------------------------------------------------------------------

/// Query string of the list endpoints. Every field narrows the view.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListParams {
    #[serde(default)]
    pub status: Option<Status>,
    /// Case-insensitive free-text search.
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub shop_id: Option<String>,
    /// Attribute to sort by; store order when absent.
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub desc: bool,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupParams {
    /// Timestamp attribute to bucket by (`createdAt`, `scheduledAt`, ...).
    pub by: String,
    #[serde(default)]
    pub status: Option<Status>,
}

// ---------------------------------------------------------------------------
// GET /v1/:kind/counts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CountsResponse {
    pub kind: EntityKind,
    #[serde(flatten)]
    pub counts: TabCounts,
}

// ---------------------------------------------------------------------------
// GET /v1/:kind/:id
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordResponse {
    pub record: Entity,
    /// Actions the UI may offer from the current status.
    pub legal_actions: Vec<Action>,
    /// Key of the operation still in flight on this record (`delete`,
    /// `edit` or an action key), if any.
    pub pending: Option<String>,
}

// ---------------------------------------------------------------------------
// POST /v1/:kind/:id/actions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: Action,
    #[serde(flatten)]
    pub meta: ActionMetadata,
    /// Set by the UI once the operator accepted its confirmation dialog.
    /// Ignored for actions that need no confirmation.
    #[serde(default)]
    pub confirmed: bool,
}

/// Answer of every gated mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationResponse {
    /// `true` when the operation needed confirmation and did not get it.
    pub cancelled: bool,
    pub record: Option<Entity>,
}

impl MutationResponse {
    pub fn completed(record: Entity) -> Self {
        Self {
            cancelled: false,
            record: Some(record),
        }
    }

    pub fn cancelled() -> Self {
        Self {
            cancelled: true,
            record: None,
        }
    }
}

// ---------------------------------------------------------------------------
// DELETE /v1/:kind/:id
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    pub confirmed: bool,
}

// ---------------------------------------------------------------------------
// POST /v1/:kind/refresh
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub shop_id: Option<String>,
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub from: Option<NaiveDate>,
    #[serde(default)]
    pub to: Option<NaiveDate>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub page_size: Option<u32>,
}

impl RefreshRequest {
    pub fn into_query(self, default_page_size: u32) -> ListQuery {
        ListQuery {
            shop_id: self.shop_id,
            status: self.status,
            from: self.from,
            to: self.to,
            page: self.page.unwrap_or(1).max(1),
            page_size: self.page_size.unwrap_or(default_page_size).max(1),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshResponse {
    pub kind: EntityKind,
    pub loaded: usize,
    pub total_items: u64,
    pub page: u32,
    pub page_size: u32,
}
