//! Transition Executor: the only path that changes a record's status.
//!
//! # Validation order
//!
//! 1. the record exists in the store (`NotFound`)
//! 2. `(status, action)` is in the kind's table (`IllegalTransition`)
//! 3. the action's required metadata is present and non-blank
//!    (`MissingRequiredField`)
//!
//! A rejected request never touches the store.
//!
//! # Commit
//!
//! ```text
//!   AfterAck    plan ─► backend ─► settle token ─► upsert canonical
//!   Optimistic  plan ─► upsert proposed ─► backend ─► settle token ─┬─► upsert canonical
//!                                                                   └─► restore previous (on error)
//! ```
//!
//! The store lock is never held across the backend call. A response whose
//! token was superseded, whose view was torn down, or that was overtaken by a
//! list snapshot is dropped with `StaleResponse`.

use pcm_schemas::{Action, ActionMetadata, Entity, EntityKind, RecordId};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::backend::BackendAdapter;
use crate::error::{BackendError, LifecycleError};
use crate::stale::{RequestKey, RequestToken};
use crate::store::RecordStore;
use crate::taxonomy::{self, RequiredField};
use crate::view::View;

/// When the local store sees a mutation relative to the backend call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitPolicy {
    /// Mutate locally only after the backend acknowledged.
    #[default]
    AfterAck,
    /// Mutate locally first; restore the previous record if the backend fails.
    Optimistic,
}

/// A validated, not yet committed transition.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedTransition {
    pub kind: EntityKind,
    pub action: Action,
    pub previous: Entity,
    pub proposed: Entity,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionExecutor {
    policy: CommitPolicy,
}

impl TransitionExecutor {
    pub fn new(policy: CommitPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> CommitPolicy {
        self.policy
    }

    /// Run the three validations and compute the proposed record. Pure.
    pub fn plan(
        &self,
        store: &RecordStore,
        id: &RecordId,
        action: Action,
        meta: &ActionMetadata,
    ) -> Result<PlannedTransition, LifecycleError> {
        let kind = store.kind();
        let previous = store.get(id)?.clone();
        let next = taxonomy::next_status(kind, previous.status, action)?;

        for field in taxonomy::required_fields(kind, action) {
            if meta_value(meta, *field).is_none() {
                return Err(LifecycleError::MissingRequiredField {
                    kind,
                    action,
                    field: field.key(),
                });
            }
        }

        let mut proposed = previous.clone();
        proposed.status = next;
        for field in [RequiredField::AssignedStaffId, RequiredField::Reason] {
            if let Some(value) = meta_value(meta, field) {
                proposed
                    .attributes
                    .insert(field.key().to_string(), value.into());
            }
        }

        Ok(PlannedTransition {
            kind,
            action,
            previous,
            proposed,
        })
    }

    /// Validate, notify the backend, and commit per the configured policy.
    pub async fn execute(
        &self,
        view: &RwLock<View>,
        backend: &dyn BackendAdapter,
        id: &RecordId,
        action: Action,
        meta: &ActionMetadata,
    ) -> Result<Entity, LifecycleError> {
        let (plan, token) = {
            let mut v = view.write().await;
            let plan = match self.plan(&v.store, id, action, meta) {
                Ok(p) => p,
                Err(e) => {
                    info!(kind = %v.store.kind(), id = %id, action = %action, error = %e, "transition rejected");
                    return Err(e);
                }
            };
            let token = v.guard.issue(RequestKey::Record(id.clone()));
            if self.policy == CommitPolicy::Optimistic {
                v.put_record(plan.proposed.clone());
            }
            (plan, token)
        };
        let kind = plan.kind;

        let response = backend.apply_action(&plan.proposed, action, meta).await;

        let mut v = view.write().await;
        settle_or_stale(&mut v, &token, kind, Some(id))?;

        match response.and_then(|canonical| accept_canonical(kind, Some(id), canonical)) {
            Ok(canonical) => {
                if canonical.status != plan.proposed.status {
                    warn!(
                        kind = %kind, id = %id, action = %action,
                        expected = %plan.proposed.status, got = %canonical.status,
                        "backend settled on a different status"
                    );
                }
                v.put_record(canonical.clone());
                info!(kind = %kind, id = %id, action = %action, status = %canonical.status, "transition applied");
                Ok(canonical)
            }
            Err(e) => {
                if self.policy == CommitPolicy::Optimistic
                    && v.store.get(id).ok() == Some(&plan.proposed)
                {
                    v.put_record(plan.previous.clone());
                    warn!(kind = %kind, id = %id, action = %action, error = %e, "backend failed, rolled back");
                } else {
                    warn!(kind = %kind, id = %id, action = %action, error = %e, "backend failed");
                }
                Err(LifecycleError::Backend(e))
            }
        }
    }
}

fn meta_value(meta: &ActionMetadata, field: RequiredField) -> Option<&str> {
    let raw = match field {
        RequiredField::AssignedStaffId => meta.assigned_staff_id.as_deref(),
        RequiredField::Reason => meta.reason.as_deref(),
    };
    raw.map(str::trim).filter(|v| !v.is_empty())
}

/// Retire `token`; `StaleResponse` if the view moved on while it was out.
pub(crate) fn settle_or_stale(
    view: &mut View,
    token: &RequestToken,
    kind: EntityKind,
    id: Option<&RecordId>,
) -> Result<(), LifecycleError> {
    if view.guard.settle(token) {
        return Ok(());
    }
    debug!(kind = %kind, id = ?id.map(RecordId::as_str), "stale response discarded");
    Err(LifecycleError::StaleResponse {
        kind,
        id: id.cloned(),
    })
}

/// Check a record the backend returned before it may enter the store.
pub(crate) fn accept_canonical(
    kind: EntityKind,
    expected_id: Option<&RecordId>,
    canonical: Entity,
) -> Result<Entity, BackendError> {
    if canonical.kind != kind {
        return Err(BackendError::Decode(format!(
            "expected a {kind} record, got {}",
            canonical.kind
        )));
    }
    if let Some(expected) = expected_id {
        if &canonical.id != expected {
            return Err(BackendError::Decode(format!(
                "expected {kind} '{expected}', got '{}'",
                canonical.id
            )));
        }
    }
    if canonical.id.as_str().trim().is_empty() || canonical.id.is_provisional() {
        return Err(BackendError::Decode(format!(
            "{kind} record has no backend-assigned id"
        )));
    }
    if !taxonomy::admits(kind, canonical.status) {
        return Err(BackendError::Decode(format!(
            "status '{}' is not valid for {kind}",
            canonical.status
        )));
    }
    Ok(canonical)
}
