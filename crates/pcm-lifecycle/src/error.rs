//! Error taxonomy for the lifecycle core.
//!
//! `NotFound`, `IllegalTransition` and `MissingRequiredField` should never
//! happen under correct UI gating but are always checked. `Backend` errors are
//! always shown to the user. `StaleResponse` is never shown.

use std::fmt;

use pcm_schemas::{Action, EntityKind, Locale, Operation, RecordId, ShapeError, Status};

// ---------------------------------------------------------------------------
// BackendError
// ---------------------------------------------------------------------------

/// Failure reported by (or while talking to) the REST backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// 4xx other than auth: the backend rejected the payload.
    Validation { status: u16, message: String },
    /// 401 / 403. There is no refresh flow; the user must sign in again.
    Auth { status: u16, message: String },
    /// 5xx.
    Server { status: u16, message: String },
    /// Connection, DNS, TLS or timeout failure.
    Transport(String),
    /// A response body could not be decoded or failed validation.
    Decode(String),
}

impl BackendError {
    /// Classify a non-success HTTP status.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        let message = message.into();
        match status {
            401 | 403 => BackendError::Auth { status, message },
            400..=499 => BackendError::Validation { status, message },
            _ => BackendError::Server { status, message },
        }
    }

    /// `true` for 4xx-class failures (the request itself was at fault).
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            BackendError::Validation { .. } | BackendError::Auth { .. }
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BackendError::Validation { status, .. }
            | BackendError::Auth { status, .. }
            | BackendError::Server { status, .. } => Some(*status),
            BackendError::Transport(_) | BackendError::Decode(_) => None,
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::Validation { status, message } => {
                write!(f, "backend rejected request status={status}: {message}")
            }
            BackendError::Auth { status, message } => {
                write!(f, "not authorized status={status}: {message}")
            }
            BackendError::Server { status, message } => {
                write!(f, "backend error status={status}: {message}")
            }
            BackendError::Transport(msg) => write!(f, "transport error: {msg}"),
            BackendError::Decode(msg) => write!(f, "decode error: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

// ---------------------------------------------------------------------------
// LifecycleError
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// Referenced identifier is absent from the record store.
    NotFound { kind: EntityKind, id: RecordId },
    /// `(from, action)` is not in the kind's transition table.
    IllegalTransition {
        kind: EntityKind,
        from: Status,
        action: Action,
    },
    /// Action-specific metadata is absent or blank.
    MissingRequiredField {
        kind: EntityKind,
        action: Action,
        field: &'static str,
    },
    /// A status outside the kind's taxonomy was supplied.
    InvalidStatus { kind: EntityKind, status: Status },
    /// A full-record edit tried to change the status.
    StatusChangeViaEdit {
        kind: EntityKind,
        id: RecordId,
        from: Status,
        to: Status,
    },
    /// A record of one kind was handed to another kind's view.
    KindMismatch {
        expected: EntityKind,
        got: EntityKind,
    },
    /// A creation/edit payload failed boundary validation.
    InvalidShape(ShapeError),
    /// Another operation on the same record is still pending.
    DuplicateInFlight {
        kind: EntityKind,
        id: RecordId,
        pending: Operation,
    },
    Backend(BackendError),
    /// The originating view or record changed before the response arrived.
    /// Discarded silently.
    StaleResponse {
        kind: EntityKind,
        id: Option<RecordId>,
    },
}

impl LifecycleError {
    /// `false` only for `StaleResponse`.
    pub fn is_user_visible(&self) -> bool {
        !matches!(self, LifecycleError::StaleResponse { .. })
    }

    /// Single notification text naming the entity and the attempted
    /// operation. `None` when nothing should be shown.
    pub fn user_message(
        &self,
        locale: Locale,
        kind: EntityKind,
        id: Option<&RecordId>,
        op: &str,
    ) -> Option<String> {
        if !self.is_user_visible() {
            return None;
        }
        let op_label = op_label(op, locale);
        let target = match id {
            Some(id) => format!("{} {}", kind.label(locale), id),
            None => kind.label(locale).to_string(),
        };
        Some(match locale {
            Locale::En => format!("Could not {op_label} {target}: {self}"),
            Locale::Vi => format!("Không thể {op_label} {target}: {self}"),
        })
    }
}

fn op_label(op: &str, locale: Locale) -> String {
    let parsed = match op {
        "delete" => Some(Operation::Delete),
        "edit" => Some(Operation::Edit),
        _ => op.parse::<Action>().ok().map(Operation::Transition),
    };
    match (parsed, op, locale) {
        (Some(o), _, _) => o.label(locale).to_lowercase(),
        (None, "create", Locale::En) => "create".to_string(),
        (None, "create", Locale::Vi) => "tạo".to_string(),
        (None, "refresh", Locale::En) => "load".to_string(),
        (None, "refresh", Locale::Vi) => "tải".to_string(),
        (None, _, _) => op.to_string(),
    }
}

impl fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleError::NotFound { kind, id } => write!(f, "{kind} '{id}' not found"),
            LifecycleError::IllegalTransition { kind, from, action } => {
                write!(f, "illegal {kind} transition: {from} + {action}")
            }
            LifecycleError::MissingRequiredField {
                kind,
                action,
                field,
            } => write!(f, "{kind} {action} requires '{field}'"),
            LifecycleError::InvalidStatus { kind, status } => {
                write!(f, "status '{status}' is not valid for {kind}")
            }
            LifecycleError::StatusChangeViaEdit { kind, id, from, to } => write!(
                f,
                "{kind} '{id}' status cannot change through an edit ({from} -> {to})"
            ),
            LifecycleError::KindMismatch { expected, got } => {
                write!(f, "expected a {expected} record, got {got}")
            }
            LifecycleError::InvalidShape(e) => write!(f, "{e}"),
            LifecycleError::DuplicateInFlight { kind, id, pending } => {
                write!(f, "{kind} '{id}' already has a pending {pending}")
            }
            LifecycleError::Backend(e) => write!(f, "{e}"),
            LifecycleError::StaleResponse { kind, id } => match id {
                Some(id) => write!(f, "stale response for {kind} '{id}'"),
                None => write!(f, "stale response for {kind} view"),
            },
        }
    }
}

impl std::error::Error for LifecycleError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LifecycleError::Backend(e) => Some(e),
            LifecycleError::InvalidShape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<BackendError> for LifecycleError {
    fn from(e: BackendError) -> Self {
        LifecycleError::Backend(e)
    }
}

impl From<ShapeError> for LifecycleError {
    fn from(e: ShapeError) -> Self {
        LifecycleError::InvalidShape(e)
    }
}
