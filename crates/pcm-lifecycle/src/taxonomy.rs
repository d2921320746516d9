//! Status taxonomy: the legal statuses per entity kind and the flat
//! `(from, action) -> to` transition table between them.
//!
//! # Order lifecycle
//!
//! ```text
//!   pending ──confirm──► confirmed ──start──► in_progress ──complete──► completed
//!      │                     │                                          │    ▲
//!      └──cancel──┐  ┌──cancel┘                                  dispute│    │resolve
//!                 ▼  ▼                                                  ▼    │
//!               cancelled (term.)                                     disputed
//! ```
//!
//! # Report lifecycle
//!
//! ```text
//!   processing ──resolve──► resolved (term.)
//!        └─────reject────► rejected (term.)
//! ```
//!
//! # Store / user / staff lifecycle
//!
//! ```text
//!   pending_approval ──approve──► active ◄──unlock── suspended
//!                                   └──────lock──────►
//! ```
//!
//! Severities and categories are orthogonal attributes, not statuses.

use pcm_schemas::{Action, EntityKind, Status};

use crate::error::LifecycleError;

/// One row of a transition table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Status,
    pub action: Action,
    pub to: Status,
}

const fn t(from: Status, action: Action, to: Status) -> Transition {
    Transition { from, action, to }
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

const ORDER_STATUSES: &[Status] = &[
    Status::Pending,
    Status::Confirmed,
    Status::InProgress,
    Status::Completed,
    Status::Cancelled,
    Status::Disputed,
];

const ORDER_TABLE: &[Transition] = &[
    t(Status::Pending, Action::Confirm, Status::Confirmed),
    t(Status::Pending, Action::Cancel, Status::Cancelled),
    t(Status::Confirmed, Action::Start, Status::InProgress),
    t(Status::Confirmed, Action::Cancel, Status::Cancelled),
    t(Status::InProgress, Action::Complete, Status::Completed),
    t(Status::Completed, Action::Dispute, Status::Disputed),
    t(Status::Disputed, Action::Resolve, Status::Completed),
];

const REPORT_STATUSES: &[Status] = &[Status::Processing, Status::Resolved, Status::Rejected];

const REPORT_TABLE: &[Transition] = &[
    t(Status::Processing, Action::Resolve, Status::Resolved),
    t(Status::Processing, Action::Reject, Status::Rejected),
];

// Stores, users and staff share one account-style taxonomy.
const ACCOUNT_STATUSES: &[Status] = &[Status::Active, Status::Suspended, Status::PendingApproval];

const ACCOUNT_TABLE: &[Transition] = &[
    t(Status::PendingApproval, Action::Approve, Status::Active),
    t(Status::Active, Action::Lock, Status::Suspended),
    t(Status::Suspended, Action::Unlock, Status::Active),
];

// ---------------------------------------------------------------------------
// Required metadata
// ---------------------------------------------------------------------------

/// Metadata an action cannot run without.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequiredField {
    AssignedStaffId,
    Reason,
}

impl RequiredField {
    /// Attribute key the value is merged under.
    pub fn key(&self) -> &'static str {
        match self {
            RequiredField::AssignedStaffId => "assignedStaffId",
            RequiredField::Reason => "reason",
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

pub fn statuses(kind: EntityKind) -> &'static [Status] {
    match kind {
        EntityKind::Order => ORDER_STATUSES,
        EntityKind::Report => REPORT_STATUSES,
        EntityKind::Store | EntityKind::User | EntityKind::Staff => ACCOUNT_STATUSES,
    }
}

pub fn transitions(kind: EntityKind) -> &'static [Transition] {
    match kind {
        EntityKind::Order => ORDER_TABLE,
        EntityKind::Report => REPORT_TABLE,
        EntityKind::Store | EntityKind::User | EntityKind::Staff => ACCOUNT_TABLE,
    }
}

/// Status a freshly created record starts in.
///
/// Staff are created by a shop admin and start active; every other account
/// goes through approval.
pub fn initial_status(kind: EntityKind) -> Status {
    match kind {
        EntityKind::Order => Status::Pending,
        EntityKind::Report => Status::Processing,
        EntityKind::Store | EntityKind::User => Status::PendingApproval,
        EntityKind::Staff => Status::Active,
    }
}

/// `true` if `status` belongs to the kind's taxonomy.
pub fn admits(kind: EntityKind, status: Status) -> bool {
    statuses(kind).contains(&status)
}

pub fn ensure_admitted(kind: EntityKind, status: Status) -> Result<(), LifecycleError> {
    if admits(kind, status) {
        Ok(())
    } else {
        Err(LifecycleError::InvalidStatus { kind, status })
    }
}

pub fn is_legal_transition(kind: EntityKind, from: Status, action: Action) -> bool {
    lookup(kind, from, action).is_some()
}

pub fn next_status(kind: EntityKind, from: Status, action: Action) -> Result<Status, LifecycleError> {
    lookup(kind, from, action)
        .map(|row| row.to)
        .ok_or(LifecycleError::IllegalTransition { kind, from, action })
}

/// Actions the UI may offer for a record in `from`, in table order.
pub fn legal_actions(kind: EntityKind, from: Status) -> Vec<Action> {
    transitions(kind)
        .iter()
        .filter(|row| row.from == from)
        .map(|row| row.action)
        .collect()
}

/// `true` if no action leaves `status`.
pub fn is_terminal(kind: EntityKind, status: Status) -> bool {
    !transitions(kind).iter().any(|row| row.from == status)
}

pub fn required_fields(kind: EntityKind, action: Action) -> &'static [RequiredField] {
    match (kind, action) {
        (EntityKind::Order, Action::Confirm) => &[RequiredField::AssignedStaffId],
        (EntityKind::Order, Action::Cancel | Action::Dispute) => &[RequiredField::Reason],
        (_, Action::Reject) => &[RequiredField::Reason],
        _ => &[],
    }
}

fn lookup(kind: EntityKind, from: Status, action: Action) -> Option<&'static Transition> {
    transitions(kind)
        .iter()
        .find(|row| row.from == from && row.action == action)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_table_row_stays_inside_the_taxonomy() {
        for kind in EntityKind::ALL {
            for row in transitions(kind) {
                assert!(admits(kind, row.from), "{kind}: from {} not admitted", row.from);
                assert!(admits(kind, row.to), "{kind}: to {} not admitted", row.to);
            }
        }
    }

    #[test]
    fn next_status_is_closed_over_the_taxonomy() {
        for kind in EntityKind::ALL {
            for &from in statuses(kind) {
                for action in Action::ALL {
                    if let Ok(to) = next_status(kind, from, action) {
                        assert!(admits(kind, to));
                    }
                }
            }
        }
    }

    #[test]
    fn table_has_no_duplicate_from_action_pairs() {
        for kind in EntityKind::ALL {
            let rows = transitions(kind);
            for (i, a) in rows.iter().enumerate() {
                for b in &rows[i + 1..] {
                    assert!(
                        !(a.from == b.from && a.action == b.action),
                        "{kind}: duplicate ({}, {})",
                        a.from,
                        a.action
                    );
                }
            }
        }
    }

    #[test]
    fn initial_status_is_admitted() {
        for kind in EntityKind::ALL {
            assert!(admits(kind, initial_status(kind)));
        }
    }

    #[test]
    fn confirm_on_completed_order_is_illegal() {
        assert!(!is_legal_transition(
            EntityKind::Order,
            Status::Completed,
            Action::Confirm
        ));
        let err = next_status(EntityKind::Order, Status::Completed, Action::Confirm).unwrap_err();
        assert_eq!(
            err,
            LifecycleError::IllegalTransition {
                kind: EntityKind::Order,
                from: Status::Completed,
                action: Action::Confirm,
            }
        );
    }

    #[test]
    fn report_reject_requires_reason() {
        assert_eq!(
            required_fields(EntityKind::Report, Action::Reject),
            &[RequiredField::Reason]
        );
        assert_eq!(
            next_status(EntityKind::Report, Status::Processing, Action::Reject).unwrap(),
            Status::Rejected
        );
    }

    #[test]
    fn order_confirm_requires_staff() {
        assert_eq!(
            required_fields(EntityKind::Order, Action::Confirm),
            &[RequiredField::AssignedStaffId]
        );
        assert!(required_fields(EntityKind::Store, Action::Approve).is_empty());
    }

    #[test]
    fn legal_actions_for_pending_order() {
        assert_eq!(
            legal_actions(EntityKind::Order, Status::Pending),
            vec![Action::Confirm, Action::Cancel]
        );
        assert!(legal_actions(EntityKind::Order, Status::Cancelled).is_empty());
    }

    #[test]
    fn terminal_statuses() {
        assert!(is_terminal(EntityKind::Order, Status::Cancelled));
        assert!(is_terminal(EntityKind::Report, Status::Resolved));
        assert!(!is_terminal(EntityKind::Order, Status::Completed));
        assert!(!is_terminal(EntityKind::Store, Status::Suspended));
    }

    #[test]
    fn order_statuses_are_not_valid_for_stores() {
        assert!(!admits(EntityKind::Store, Status::Pending));
        assert!(ensure_admitted(EntityKind::Store, Status::Pending).is_err());
    }
}
