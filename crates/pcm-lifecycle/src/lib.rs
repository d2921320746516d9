//! pcm-lifecycle
//!
//! Order/report lifecycle tracker for the pet-care marketplace dashboard.
//! - Status taxonomy: per-kind statuses and the `(from, action) -> to` table
//! - Record store: insertion-ordered, full-replace upsert
//! - Filter view: pure projections (tabs, badge counts, sort, page, date groups)
//! - Transition executor: the only path that changes a status
//! - Confirmation gate: operator confirmation + per-record re-entrancy guard
//! - Stale guard: responses for torn-down views or superseded requests are
//!   dropped
//!
//! The backend is reached only through [`BackendAdapter`].

mod backend;
mod error;
mod gate;
mod stale;
mod store;
mod tracker;
mod transition;
mod view;

pub mod filter;
pub mod taxonomy;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;

pub use backend::BackendAdapter;
pub use error::{BackendError, LifecycleError};
pub use filter::{Predicate, SortKey, TabCounts, UNDATED};
pub use gate::{
    AlwaysConfirm, Confirmation, ConfirmationGate, Confirmer, GateOutcome, InFlightSlot,
    PreConfirmed,
};
pub use stale::{RequestKey, RequestToken, StaleGuard};
pub use store::RecordStore;
pub use tracker::LifecycleTracker;
pub use transition::{CommitPolicy, PlannedTransition, TransitionExecutor};
pub use view::View;
