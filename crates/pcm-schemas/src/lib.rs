//! pcm-schemas
//!
//! Wire and domain types shared by every pet-care marketplace crate.
//!
//! - Internal state keys (`Status`, `Action`, `EntityKind`) are snake_case
//!   enums. Localized display strings live in [`labels`] and are never used
//!   as state keys.
//! - Loosely-typed creation payloads are replaced by the tagged
//!   [`shapes::RecordShape`] variants, validated at the API boundary.
//! - No business logic lives here; the transition table is owned by
//!   `pcm-lifecycle`.

pub mod labels;
pub mod shapes;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use labels::Locale;
pub use shapes::{
    OrderShape, RecordShape, ReportShape, Severity, ShapeError, StaffShape, StoreShape, UserShape,
};

/// Kind-specific attribute bag. Opaque to the transition logic.
pub type Attributes = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// ParseKeyError
// ---------------------------------------------------------------------------

/// Returned when a wire key does not name a known enum member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseKeyError {
    /// Which key family was being parsed ("kind", "status", "action").
    pub what: &'static str,
    pub value: String,
}

impl fmt::Display for ParseKeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown {} '{}'", self.what, self.value)
    }
}

impl std::error::Error for ParseKeyError {}

// ---------------------------------------------------------------------------
// EntityKind
// ---------------------------------------------------------------------------

/// A category of record with its own status taxonomy and attribute shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Grooming / vet / boarding appointment booked against a shop.
    Order,
    /// Community report raised against a post or user.
    Report,
    /// Shop registered on the marketplace.
    Store,
    User,
    Staff,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Order,
        EntityKind::Report,
        EntityKind::Store,
        EntityKind::User,
        EntityKind::Staff,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Order => "order",
            EntityKind::Report => "report",
            EntityKind::Store => "store",
            EntityKind::User => "user",
            EntityKind::Staff => "staff",
        }
    }

    /// REST collection segment (`/orders`, `/reports`, ...).
    pub fn collection(&self) -> &'static str {
        match self {
            EntityKind::Order => "orders",
            EntityKind::Report => "reports",
            EntityKind::Store => "stores",
            EntityKind::User => "users",
            EntityKind::Staff => "staff",
        }
    }

    /// Accepts either the singular key or the collection segment.
    pub fn from_segment(s: &str) -> Option<Self> {
        let t = s.trim().to_ascii_lowercase();
        EntityKind::ALL
            .into_iter()
            .find(|k| k.as_str() == t || k.collection() == t)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::from_segment(s).ok_or_else(|| ParseKeyError {
            what: "kind",
            value: s.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Every status key known to any entity kind.
///
/// Which subset is legal for a given kind is decided by the taxonomy in
/// `pcm-lifecycle`, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    // orders
    Pending,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    Disputed,
    // reports
    Processing,
    Resolved,
    Rejected,
    // stores / users / staff
    Active,
    Suspended,
    PendingApproval,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Pending => "pending",
            Status::Confirmed => "confirmed",
            Status::InProgress => "in_progress",
            Status::Completed => "completed",
            Status::Cancelled => "cancelled",
            Status::Disputed => "disputed",
            Status::Processing => "processing",
            Status::Resolved => "resolved",
            Status::Rejected => "rejected",
            Status::Active => "active",
            Status::Suspended => "suspended",
            Status::PendingApproval => "pending_approval",
        }
    }

    pub const ALL: [Status; 12] = [
        Status::Pending,
        Status::Confirmed,
        Status::InProgress,
        Status::Completed,
        Status::Cancelled,
        Status::Disputed,
        Status::Processing,
        Status::Resolved,
        Status::Rejected,
        Status::Active,
        Status::Suspended,
        Status::PendingApproval,
    ];
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ParseKeyError;

    /// Parses the snake_case key only. Display labels are rejected.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        Status::ALL
            .into_iter()
            .find(|st| st.as_str() == t)
            .ok_or_else(|| ParseKeyError {
                what: "status",
                value: s.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Action / Operation
// ---------------------------------------------------------------------------

/// Named trigger for a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Confirm,
    Start,
    Complete,
    Cancel,
    Dispute,
    Resolve,
    Reject,
    Approve,
    Lock,
    Unlock,
}

impl Action {
    pub const ALL: [Action; 10] = [
        Action::Confirm,
        Action::Start,
        Action::Complete,
        Action::Cancel,
        Action::Dispute,
        Action::Resolve,
        Action::Reject,
        Action::Approve,
        Action::Lock,
        Action::Unlock,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Confirm => "confirm",
            Action::Start => "start",
            Action::Complete => "complete",
            Action::Cancel => "cancel",
            Action::Dispute => "dispute",
            Action::Resolve => "resolve",
            Action::Reject => "reject",
            Action::Approve => "approve",
            Action::Lock => "lock",
            Action::Unlock => "unlock",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim().to_ascii_lowercase();
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == t)
            .ok_or_else(|| ParseKeyError {
                what: "action",
                value: s.to_string(),
            })
    }
}

/// Anything a user can trigger against an existing record: a status
/// transition, a full-record edit, or an outright delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Transition(Action),
    Edit,
    Delete,
}

impl Operation {
    /// Destructive or high-impact operations need an explicit confirmation
    /// before they run.
    pub fn requires_confirmation(&self) -> bool {
        match self {
            Operation::Delete => true,
            Operation::Edit => false,
            Operation::Transition(a) => matches!(
                a,
                Action::Lock | Action::Unlock | Action::Approve | Action::Reject | Action::Cancel
            ),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Transition(a) => a.as_str(),
            Operation::Edit => "edit",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<Action> for Operation {
    fn from(a: Action) -> Self {
        Operation::Transition(a)
    }
}

// ---------------------------------------------------------------------------
// RecordId
// ---------------------------------------------------------------------------

/// Opaque record identifier. Assigned at creation; never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Placeholder for a client-origin record whose real ID has not yet been
    /// assigned by the backend.
    pub fn provisional() -> Self {
        Self(format!("tmp-{}", Uuid::new_v4()))
    }

    pub fn is_provisional(&self) -> bool {
        self.0.starts_with("tmp-")
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// Entity
// ---------------------------------------------------------------------------

/// A generic record: appointment, community report, store, user or staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: RecordId,
    pub kind: EntityKind,
    pub status: Status,
    #[serde(default)]
    pub attributes: Attributes,
}

impl Entity {
    pub fn new(id: impl Into<RecordId>, kind: EntityKind, status: Status) -> Self {
        Self {
            id: id.into(),
            kind,
            status,
            attributes: Attributes::new(),
        }
    }

    /// Builder-style attribute setter, handy for fixtures and form mapping.
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn attr(&self, key: &str) -> Option<&serde_json::Value> {
        self.attributes.get(key)
    }

    pub fn attr_str(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).and_then(|v| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// ActionMetadata
// ---------------------------------------------------------------------------

/// Operator-supplied metadata that accompanies a transition.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_staff_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ActionMetadata {
    pub fn with_staff(mut self, staff_id: impl Into<String>) -> Self {
        self.assigned_staff_id = Some(staff_id.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.assigned_staff_id.is_none() && self.reason.is_none()
    }
}

// ---------------------------------------------------------------------------
// Backend list / envelope shapes
// ---------------------------------------------------------------------------

/// One page of a list endpoint response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage<T> {
    pub items: Vec<T>,
    pub total_items: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> ListPage<T> {
    pub fn empty(page: u32, page_size: u32) -> Self {
        Self {
            items: Vec::new(),
            total_items: 0,
            page,
            page_size,
        }
    }
}

/// Query parameters accepted by the backend list endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    /// Inclusive lower bound of the record date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound of the record date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<NaiveDate>,
    pub page: u32,
    pub page_size: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            shop_id: None,
            status: None,
            from: None,
            to: None,
            page: 1,
            page_size: 20,
        }
    }
}

/// Error envelope returned by the mutate endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    #[serde(default)]
    pub message: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_keys_roundtrip_through_from_str() {
        for st in Status::ALL {
            assert_eq!(st.as_str().parse::<Status>().unwrap(), st);
        }
    }

    #[test]
    fn status_rejects_display_labels() {
        assert!("Chờ xác nhận".parse::<Status>().is_err());
        assert!("Pending".parse::<Status>().is_err());
    }

    #[test]
    fn status_serializes_as_snake_case_key() {
        let v = serde_json::to_value(Status::PendingApproval).unwrap();
        assert_eq!(v, "pending_approval");
    }

    #[test]
    fn kind_parses_singular_and_collection() {
        assert_eq!("orders".parse::<EntityKind>().unwrap(), EntityKind::Order);
        assert_eq!("Report".parse::<EntityKind>().unwrap(), EntityKind::Report);
        assert_eq!("staff".parse::<EntityKind>().unwrap(), EntityKind::Staff);
        let err = "pets".parse::<EntityKind>().unwrap_err();
        assert_eq!(err.to_string(), "unknown kind 'pets'");
    }

    #[test]
    fn delete_and_lock_require_confirmation_but_start_does_not() {
        assert!(Operation::Delete.requires_confirmation());
        assert!(Operation::Transition(Action::Lock).requires_confirmation());
        assert!(Operation::Transition(Action::Reject).requires_confirmation());
        assert!(!Operation::Transition(Action::Start).requires_confirmation());
        assert!(!Operation::Transition(Action::Confirm).requires_confirmation());
        assert!(!Operation::Edit.requires_confirmation());
    }

    #[test]
    fn entity_json_shape() {
        let e = Entity::new("a-1", EntityKind::Order, Status::Pending).with_attr("customerName", "Lan");
        let v = serde_json::to_value(&e).unwrap();
        assert_eq!(v["id"], "a-1");
        assert_eq!(v["kind"], "order");
        assert_eq!(v["status"], "pending");
        assert_eq!(v["attributes"]["customerName"], "Lan");

        let back: Entity = serde_json::from_value(v).unwrap();
        assert_eq!(back, e);
    }

    #[test]
    fn metadata_uses_camel_case_keys() {
        let m = ActionMetadata::default().with_staff("s-9");
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["assignedStaffId"], "s-9");
        assert!(v.get("reason").is_none());
    }

    #[test]
    fn list_page_uses_camel_case_keys() {
        let raw = r#"{"items":[],"totalItems":42,"page":3,"pageSize":10}"#;
        let p: ListPage<Entity> = serde_json::from_str(raw).unwrap();
        assert_eq!(p.total_items, 42);
        assert_eq!(p.page_size, 10);
    }

    #[test]
    fn provisional_ids_are_marked() {
        let id = RecordId::provisional();
        assert!(id.is_provisional());
        assert!(!RecordId::new("srv-1").is_provisional());
    }
}
