//! Action Confirmation Gate.
//!
//! Destructive or high-impact operations (lock, unlock, approve, reject,
//! cancel, delete) must be confirmed by the operator before the backend is
//! called. Every operation, confirmed or not, holds an in-flight slot for its
//! record from the moment it is triggered until it completes; a second
//! trigger for the same record in that window is refused with
//! `DuplicateInFlight`.
//!
//! ```text
//!   trigger ─► acquire slot ─┬─► [requires confirmation?] ─► ask ─┬─ Cancelled ─► release, no call
//!                            │                                    └─ Confirmed ─┐
//!                            └─ busy ─► DuplicateInFlight                       ▼
//!                                                                 proceed (exactly once) ─► release
//! ```
//!
//! The slot is an RAII guard, so it is released on every exit path including
//! a dropped future.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;

use async_trait::async_trait;
use pcm_schemas::{Entity, EntityKind, Operation, RecordId};
use tracing::{debug, info};

use crate::error::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    Confirmed,
    Cancelled,
}

/// Whoever answers "are you sure?": a modal, a terminal prompt, or an HTTP
/// flag the UI already collected.
#[async_trait]
pub trait Confirmer: Send + Sync {
    async fn request_confirmation(&self, op: Operation, entity: &Entity) -> Confirmation;
}

/// Confirms everything. For trusted automation only.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysConfirm;

#[async_trait]
impl Confirmer for AlwaysConfirm {
    async fn request_confirmation(&self, _op: Operation, _entity: &Entity) -> Confirmation {
        Confirmation::Confirmed
    }
}

/// An answer collected before the call (e.g. a `confirmed` flag in an HTTP
/// request body).
#[derive(Debug, Clone, Copy)]
pub struct PreConfirmed(pub bool);

#[async_trait]
impl Confirmer for PreConfirmed {
    async fn request_confirmation(&self, _op: Operation, _entity: &Entity) -> Confirmation {
        if self.0 {
            Confirmation::Confirmed
        } else {
            Confirmation::Cancelled
        }
    }
}

/// Result of a gated operation that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum GateOutcome<T> {
    Completed(T),
    /// The operator declined. Nothing was called; state is unchanged.
    Cancelled,
}

impl<T> GateOutcome<T> {
    pub fn completed(self) -> Option<T> {
        match self {
            GateOutcome::Completed(v) => Some(v),
            GateOutcome::Cancelled => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GateOutcome::Cancelled)
    }
}

type SlotKey = (EntityKind, RecordId);

#[derive(Debug, Default)]
pub struct ConfirmationGate {
    in_flight: Mutex<HashMap<SlotKey, Operation>>,
}

/// Held while an operation on one record is pending.
#[derive(Debug)]
pub struct InFlightSlot<'a> {
    gate: &'a ConfirmationGate,
    key: SlotKey,
}

impl Drop for InFlightSlot<'_> {
    fn drop(&mut self) {
        let mut map = self
            .gate
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        map.remove(&self.key);
    }
}

impl ConfirmationGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the record for `op`, or report what is already pending on it.
    pub fn acquire(
        &self,
        kind: EntityKind,
        id: &RecordId,
        op: Operation,
    ) -> Result<InFlightSlot<'_>, LifecycleError> {
        let key = (kind, id.clone());
        let mut map = self
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(pending) = map.get(&key) {
            info!(kind = %kind, id = %id, op = %op, pending = %pending, "duplicate in-flight operation rejected");
            return Err(LifecycleError::DuplicateInFlight {
                kind,
                id: id.clone(),
                pending: *pending,
            });
        }
        map.insert(key.clone(), op);
        Ok(InFlightSlot { gate: self, key })
    }

    /// Operation currently pending on the record, if any.
    pub fn pending(&self, kind: EntityKind, id: &RecordId) -> Option<Operation> {
        self.in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(kind, id.clone()))
            .copied()
    }

    pub fn is_pending(&self, kind: EntityKind, id: &RecordId) -> bool {
        self.pending(kind, id).is_some()
    }

    /// Gate `proceed` behind the re-entrancy slot and, when `op` demands it,
    /// an operator confirmation. `proceed` runs at most once.
    pub async fn run<T, F, Fut>(
        &self,
        kind: EntityKind,
        entity: &Entity,
        op: Operation,
        confirmer: &dyn Confirmer,
        proceed: F,
    ) -> Result<GateOutcome<T>, LifecycleError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, LifecycleError>>,
    {
        let _slot = self.acquire(kind, &entity.id, op)?;

        if op.requires_confirmation() {
            debug!(kind = %kind, id = %entity.id, op = %op, "awaiting confirmation");
            if confirmer.request_confirmation(op, entity).await == Confirmation::Cancelled {
                info!(kind = %kind, id = %entity.id, op = %op, "confirmation cancelled");
                return Ok(GateOutcome::Cancelled);
            }
        }

        proceed().await.map(GateOutcome::Completed)
    }
}
