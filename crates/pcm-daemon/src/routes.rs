//! Axum router and all HTTP handlers for pcm-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers. Every handler is a thin adapter over
//! [`LifecycleTracker`](pcm_lifecycle::LifecycleTracker): parse the path,
//! call the tracker, map the outcome to a status code and publish the change
//! on the SSE bus.
//!
//! | Error                                   | HTTP |
//! |-----------------------------------------|------|
//! | `NotFound`, unknown kind                | 404  |
//! | `IllegalTransition`, `DuplicateInFlight`| 409  |
//! | field / shape / status / kind problems  | 422  |
//! | backend `Auth`                          | 401  |
//! | backend `Validation`                    | 422  |
//! | backend `Server`/`Transport`/`Decode`   | 502  |
//! | `StaleResponse`                         | 204, empty body |

use std::{convert::Infallible, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{Stream, StreamExt};
use pcm_lifecycle::{
    taxonomy, BackendError, GateOutcome, LifecycleError, PreConfirmed, Predicate, SortKey,
};
use pcm_schemas::{Entity, EntityKind, RecordId, RecordShape};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};

use crate::{
    api_types::{
        ActionRequest, CountsResponse, DeleteParams, ErrorResponse, GroupParams, HealthResponse,
        ListParams, MutationResponse, RecordResponse, RefreshRequest, RefreshResponse,
    },
    state::{uptime_secs, AppState, BusMsg},
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/stream", get(stream))
        .route("/v1/:kind", get(list_records).post(create_record))
        .route("/v1/:kind/counts", get(tab_counts))
        .route("/v1/:kind/groups", get(group_records))
        .route("/v1/:kind/refresh", post(refresh_view))
        .route("/v1/:kind/close", post(close_view))
        .route(
            "/v1/:kind/:id",
            get(get_record).put(edit_record).delete(delete_record),
        )
        .route("/v1/:kind/:id/actions", post(perform_action))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

fn classify(err: &LifecycleError) -> (StatusCode, &'static str) {
    match err {
        LifecycleError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND"),
        LifecycleError::IllegalTransition { .. } => (StatusCode::CONFLICT, "ILLEGAL_TRANSITION"),
        LifecycleError::DuplicateInFlight { .. } => (StatusCode::CONFLICT, "DUPLICATE_IN_FLIGHT"),
        LifecycleError::MissingRequiredField { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "MISSING_REQUIRED_FIELD")
        }
        LifecycleError::InvalidStatus { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_STATUS"),
        LifecycleError::StatusChangeViaEdit { .. } => {
            (StatusCode::UNPROCESSABLE_ENTITY, "STATUS_CHANGE_VIA_EDIT")
        }
        LifecycleError::KindMismatch { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "KIND_MISMATCH"),
        LifecycleError::InvalidShape(_) => (StatusCode::UNPROCESSABLE_ENTITY, "INVALID_SHAPE"),
        LifecycleError::Backend(BackendError::Auth { .. }) => {
            (StatusCode::UNAUTHORIZED, "BACKEND_AUTH")
        }
        LifecycleError::Backend(BackendError::Validation { .. }) => {
            (StatusCode::UNPROCESSABLE_ENTITY, "BACKEND_REJECTED")
        }
        LifecycleError::Backend(_) => (StatusCode::BAD_GATEWAY, "BACKEND_UNAVAILABLE"),
        LifecycleError::StaleResponse { .. } => (StatusCode::NO_CONTENT, "STALE_RESPONSE"),
    }
}

fn error_response(
    st: &AppState,
    err: &LifecycleError,
    kind: EntityKind,
    id: Option<&RecordId>,
    op: &str,
) -> Response {
    // Stale answers are dropped silently.
    let Some(message) = err.user_message(st.locale, kind, id, op) else {
        return StatusCode::NO_CONTENT.into_response();
    };
    let (status, code) = classify(err);
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message,
        }),
    )
        .into_response()
}

/// Like [`error_response`], and also pushes the notice to SSE subscribers.
fn mutation_failed(
    st: &AppState,
    err: &LifecycleError,
    kind: EntityKind,
    id: Option<&RecordId>,
    op: &str,
) -> Response {
    if let Some(msg) = err.user_message(st.locale, kind, id, op) {
        warn!(kind = %kind, op, error = %err, "mutation failed");
        st.publish(BusMsg::Notice {
            level: "WARN".to_string(),
            msg,
        });
    }
    error_response(st, err, kind, id, op)
}

fn refused(status: StatusCode, code: &str, message: String) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: code.to_string(),
            message,
        }),
    )
        .into_response()
}

fn parse_kind(raw: &str) -> Result<EntityKind, Response> {
    EntityKind::from_segment(raw).ok_or_else(|| {
        refused(
            StatusCode::NOT_FOUND,
            "UNKNOWN_KIND",
            format!("unknown record kind '{raw}'"),
        )
    })
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            backend: st.tracker.backend_name().to_string(),
            commit_policy: st.tracker.policy(),
            uptime_secs: uptime_secs(),
        }),
    )
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// GET /v1/:kind: the filtered, optionally sorted, paginated list view.
pub(crate) async fn list_records(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Query(p): Query<ListParams>,
) -> Response {
    let kind = match parse_kind(&raw) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let predicate = Predicate::from_parts(p.status, p.q.as_deref(), p.shop_id.as_deref());
    let sort = p.sort.map(|key| {
        if p.desc {
            SortKey::desc(key)
        } else {
            SortKey::asc(key)
        }
    });
    let page = st
        .tracker
        .list_page(
            kind,
            &predicate,
            sort.as_ref(),
            p.page.unwrap_or(1),
            p.page_size.unwrap_or(st.page_size),
        )
        .await;
    (StatusCode::OK, Json(page)).into_response()
}

/// GET /v1/:kind/counts: badge counts for every status tab.
pub(crate) async fn tab_counts(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Response {
    let kind = match parse_kind(&raw) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let counts = st.tracker.tab_counts(kind).await;
    (StatusCode::OK, Json(CountsResponse { kind, counts })).into_response()
}

/// GET /v1/:kind/groups?by=<attr>: records bucketed by calendar day.
pub(crate) async fn group_records(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Query(p): Query<GroupParams>,
) -> Response {
    let kind = match parse_kind(&raw) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let predicate = Predicate::from_parts(p.status, None, None);
    let groups = st.tracker.group_by_date(kind, &predicate, &p.by).await;
    (StatusCode::OK, Json(groups)).into_response()
}

pub(crate) async fn get_record(
    State(st): State<Arc<AppState>>,
    Path((raw, id)): Path<(String, String)>,
) -> Response {
    let kind = match parse_kind(&raw) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let id = RecordId::new(id);
    match st.tracker.get(kind, &id).await {
        Ok(record) => {
            let legal_actions = taxonomy::legal_actions(kind, record.status);
            let pending = st
                .tracker
                .pending_operation(kind, &id)
                .map(|op| op.as_str().to_string());
            (
                StatusCode::OK,
                Json(RecordResponse {
                    record,
                    legal_actions,
                    pending,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(&st, &e, kind, Some(&id), "view"),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/:kind/:id/actions
// ---------------------------------------------------------------------------

/// Run one status transition. Actions that need confirmation only proceed
/// when the body carries `"confirmed": true`; otherwise the answer is
/// `{"cancelled": true}` and nothing is sent to the backend.
pub(crate) async fn perform_action(
    State(st): State<Arc<AppState>>,
    Path((raw, id)): Path<(String, String)>,
    Json(req): Json<ActionRequest>,
) -> Response {
    let kind = match parse_kind(&raw) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let id = RecordId::new(id);
    let confirmer = PreConfirmed(req.confirmed);

    match st
        .tracker
        .perform_action(kind, &id, req.action, &req.meta, &confirmer)
        .await
    {
        Ok(GateOutcome::Completed(record)) => {
            info!(kind = %kind, id = %id, action = %req.action, status = %record.status, "action applied");
            st.publish(BusMsg::RecordChanged {
                kind,
                record: record.clone(),
            });
            (StatusCode::OK, Json(MutationResponse::completed(record))).into_response()
        }
        Ok(GateOutcome::Cancelled) => {
            (StatusCode::OK, Json(MutationResponse::cancelled())).into_response()
        }
        Err(e) => mutation_failed(&st, &e, kind, Some(&id), req.action.as_str()),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/:kind  (create)
// ---------------------------------------------------------------------------

pub(crate) async fn create_record(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
    Json(shape): Json<RecordShape>,
) -> Response {
    let kind = match parse_kind(&raw) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    if shape.kind() != kind {
        let err = LifecycleError::KindMismatch {
            expected: kind,
            got: shape.kind(),
        };
        return error_response(&st, &err, kind, None, "create");
    }

    match st.tracker.create(&shape).await {
        Ok(record) => {
            st.publish(BusMsg::RecordChanged {
                kind,
                record: record.clone(),
            });
            (StatusCode::CREATED, Json(MutationResponse::completed(record))).into_response()
        }
        Err(e) => mutation_failed(&st, &e, kind, None, "create"),
    }
}

// ---------------------------------------------------------------------------
// PUT /v1/:kind/:id  (edit)
// ---------------------------------------------------------------------------

pub(crate) async fn edit_record(
    State(st): State<Arc<AppState>>,
    Path((raw, id)): Path<(String, String)>,
    Json(entity): Json<Entity>,
) -> Response {
    let kind = match parse_kind(&raw) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let id = RecordId::new(id);
    if entity.kind != kind {
        let err = LifecycleError::KindMismatch {
            expected: kind,
            got: entity.kind,
        };
        return error_response(&st, &err, kind, Some(&id), "edit");
    }
    if entity.id != id {
        return refused(
            StatusCode::UNPROCESSABLE_ENTITY,
            "ID_MISMATCH",
            format!("body id '{}' does not match path id '{id}'", entity.id),
        );
    }

    match st.tracker.edit(entity).await {
        Ok(record) => {
            st.publish(BusMsg::RecordChanged {
                kind,
                record: record.clone(),
            });
            (StatusCode::OK, Json(MutationResponse::completed(record))).into_response()
        }
        Err(e) => mutation_failed(&st, &e, kind, Some(&id), "edit"),
    }
}

// ---------------------------------------------------------------------------
// DELETE /v1/:kind/:id?confirmed=true
// ---------------------------------------------------------------------------

pub(crate) async fn delete_record(
    State(st): State<Arc<AppState>>,
    Path((raw, id)): Path<(String, String)>,
    Query(p): Query<DeleteParams>,
) -> Response {
    let kind = match parse_kind(&raw) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let id = RecordId::new(id);

    match st
        .tracker
        .delete(kind, &id, &PreConfirmed(p.confirmed))
        .await
    {
        Ok(GateOutcome::Completed(removed)) => {
            info!(kind = %kind, id = %id, "record deleted");
            st.publish(BusMsg::RecordRemoved {
                kind,
                id: id.clone(),
            });
            (StatusCode::OK, Json(MutationResponse::completed(removed))).into_response()
        }
        Ok(GateOutcome::Cancelled) => {
            (StatusCode::OK, Json(MutationResponse::cancelled())).into_response()
        }
        Err(e) => mutation_failed(&st, &e, kind, Some(&id), "delete"),
    }
}

// ---------------------------------------------------------------------------
// POST /v1/:kind/refresh  and  POST /v1/:kind/close
// ---------------------------------------------------------------------------

/// Load one backend page into the view. The body is optional; without one
/// the first page is fetched unfiltered.
pub(crate) async fn refresh_view(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
    body: Option<Json<RefreshRequest>>,
) -> Response {
    let kind = match parse_kind(&raw) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let query = body
        .map(|Json(req)| req)
        .unwrap_or_default()
        .into_query(st.page_size);

    match st.tracker.refresh(kind, &query).await {
        Ok(page) => {
            let resp = RefreshResponse {
                kind,
                loaded: page.items.len(),
                total_items: page.total_items,
                page: page.page,
                page_size: page.page_size,
            };
            st.publish(BusMsg::ViewRefreshed {
                kind,
                loaded: resp.loaded,
                total_items: resp.total_items,
            });
            (StatusCode::OK, Json(resp)).into_response()
        }
        Err(e) => mutation_failed(&st, &e, kind, None, "refresh"),
    }
}

/// The UI left the page for `kind`. Outstanding answers for it go stale.
pub(crate) async fn close_view(
    State(st): State<Arc<AppState>>,
    Path(raw): Path<String>,
) -> Response {
    let kind = match parse_kind(&raw) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    st.tracker.close_view(kind).await;
    StatusCode::NO_CONTENT.into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/stream  (SSE)
// ---------------------------------------------------------------------------

pub(crate) async fn stream(State(st): State<Arc<AppState>>) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Connection", HeaderValue::from_static("keep-alive"));

    let rx = st.bus.subscribe();
    let events = broadcast_to_sse(rx);

    (headers, Sse::new(events).keep_alive(KeepAlive::new())).into_response()
}

fn broadcast_to_sse(
    rx: broadcast::Receiver<BusMsg>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    BroadcastStream::new(rx).filter_map(|msg| async move {
        match msg {
            Ok(m) => {
                let data = serde_json::to_string(&m).ok()?;
                Some(Ok(Event::default().event(m.event_name()).data(data)))
            }
            Err(_) => None, // lagged / closed
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pcm_schemas::Action;

    #[test]
    fn classification_covers_gate_and_backend_failures() {
        let dup = LifecycleError::DuplicateInFlight {
            kind: EntityKind::Order,
            id: RecordId::new("o-1"),
            pending: Action::Confirm.into(),
        };
        assert_eq!(classify(&dup).0, StatusCode::CONFLICT);

        let auth = LifecycleError::Backend(BackendError::Auth {
            status: 401,
            message: "expired".into(),
        });
        assert_eq!(classify(&auth), (StatusCode::UNAUTHORIZED, "BACKEND_AUTH"));

        let down = LifecycleError::Backend(BackendError::Transport("refused".into()));
        assert_eq!(classify(&down).0, StatusCode::BAD_GATEWAY);
    }
}
