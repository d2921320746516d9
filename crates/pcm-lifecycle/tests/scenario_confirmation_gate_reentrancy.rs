//! Scenario: confirmation gate and re-entrancy guard.
//!
//! # Invariants under test
//!
//! - Cancelling the confirmation means no backend call and no state change.
//! - A confirmed operation reaches the backend exactly once.
//! - While a confirmation is open or a request is in flight, another trigger
//!   for the same record is refused with `DuplicateInFlight`; other records
//!   are unaffected.

use std::sync::Arc;

use pcm_lifecycle::testkit::{BackendCall, ScriptedBackend, ScriptedConfirmer};
use pcm_lifecycle::{AlwaysConfirm, CommitPolicy, GateOutcome, LifecycleError, LifecycleTracker};
use pcm_schemas::{Action, ActionMetadata, Entity, EntityKind, ListQuery, Operation, RecordId, Status};

async fn stores() -> (Arc<ScriptedBackend>, Arc<LifecycleTracker>) {
    let backend = Arc::new(ScriptedBackend::new());
    backend.seed(
        EntityKind::Store,
        vec![
            Entity::new("s-1", EntityKind::Store, Status::PendingApproval),
            Entity::new("s-2", EntityKind::Store, Status::PendingApproval),
        ],
    );
    let tracker = Arc::new(LifecycleTracker::new(backend.clone(), CommitPolicy::AfterAck));
    tracker
        .refresh(EntityKind::Store, &ListQuery::default())
        .await
        .unwrap();
    (backend, tracker)
}

fn action_calls(backend: &ScriptedBackend) -> usize {
    backend
        .calls()
        .iter()
        .filter(|c| matches!(c, BackendCall::Action(..) | BackendCall::Delete(..)))
        .count()
}

#[tokio::test]
async fn cancelled_approval_changes_nothing() {
    let (backend, t) = stores().await;
    let confirmer = ScriptedConfirmer::cancelling();

    let out = t
        .perform_action(
            EntityKind::Store,
            &RecordId::new("s-1"),
            Action::Approve,
            &ActionMetadata::default(),
            &confirmer,
        )
        .await
        .unwrap();

    assert_eq!(out, GateOutcome::Cancelled);
    assert_eq!(
        confirmer.asked(),
        vec![(Operation::Transition(Action::Approve), RecordId::new("s-1"))]
    );
    assert_eq!(action_calls(&backend), 0);
    assert_eq!(
        t.get(EntityKind::Store, &RecordId::new("s-1")).await.unwrap().status,
        Status::PendingApproval
    );
    assert!(t.pending_operation(EntityKind::Store, &RecordId::new("s-1")).is_none());
}

#[tokio::test]
async fn confirmed_approval_calls_backend_once() {
    let (backend, t) = stores().await;
    let confirmer = ScriptedConfirmer::confirming();
    t.perform_action(
        EntityKind::Store,
        &RecordId::new("s-1"),
        Action::Approve,
        &ActionMetadata::default(),
        &confirmer,
    )
    .await
    .unwrap();
    assert_eq!(confirmer.asked().len(), 1);
    assert_eq!(action_calls(&backend), 1);
}

#[tokio::test]
async fn second_trigger_while_confirmation_open_is_refused() {
    let (backend, t) = stores().await;
    let confirmer = Arc::new(ScriptedConfirmer::confirming());
    let prompt = confirmer.hold_next();

    let first = {
        let (t, confirmer) = (t.clone(), confirmer.clone());
        tokio::spawn(async move {
            t.perform_action(
                EntityKind::Store,
                &RecordId::new("s-1"),
                Action::Approve,
                &ActionMetadata::default(),
                confirmer.as_ref(),
            )
            .await
        })
    };
    prompt.entered().await;

    let err = t
        .perform_action(
            EntityKind::Store,
            &RecordId::new("s-1"),
            Action::Approve,
            &ActionMetadata::default(),
            &AlwaysConfirm,
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        LifecycleError::DuplicateInFlight {
            pending: Operation::Transition(Action::Approve),
            ..
        }
    ));

    // A different record is not blocked.
    let other = t
        .perform_action(
            EntityKind::Store,
            &RecordId::new("s-2"),
            Action::Approve,
            &ActionMetadata::default(),
            &AlwaysConfirm,
        )
        .await
        .unwrap();
    assert!(!other.is_cancelled());

    prompt.release();
    let done = first.await.unwrap().unwrap().completed().unwrap();
    assert_eq!(done.status, Status::Active);
    assert_eq!(action_calls(&backend), 2);
}

#[tokio::test]
async fn delete_while_transition_in_flight_is_refused() {
    let (backend, t) = stores().await;
    let call = backend.hold_next();

    let first = {
        let t = t.clone();
        tokio::spawn(async move {
            t.perform_action(
                EntityKind::Store,
                &RecordId::new("s-1"),
                Action::Approve,
                &ActionMetadata::default(),
                &AlwaysConfirm,
            )
            .await
        })
    };
    call.entered().await;

    let err = t
        .delete(EntityKind::Store, &RecordId::new("s-1"), &AlwaysConfirm)
        .await
        .unwrap_err();
    assert!(matches!(err, LifecycleError::DuplicateInFlight { .. }));

    call.release();
    first.await.unwrap().unwrap();
    assert!(t.pending_operation(EntityKind::Store, &RecordId::new("s-1")).is_none());

    // Slot released: the delete can go through now.
    let removed = t
        .delete(EntityKind::Store, &RecordId::new("s-1"), &AlwaysConfirm)
        .await
        .unwrap();
    assert!(matches!(removed, GateOutcome::Completed(_)));
}
