//! Tagged record shapes, one per entity kind.
//!
//! Creation and edit forms submit one of these instead of a free-form map.
//! [`RecordShape::validate`] runs at the API boundary before anything is
//! sent to the backend; [`RecordShape::to_attributes`] flattens the shape
//! into the opaque attribute bag carried by [`crate::Entity`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Attributes, EntityKind};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeError {
    pub kind: EntityKind,
    pub field: &'static str,
    pub reason: String,
}

impl fmt::Display for ShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} field '{}': {}", self.kind, self.field, self.reason)
    }
}

impl std::error::Error for ShapeError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Urgent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderShape {
    pub customer_name: String,
    pub customer_phone: String,
    pub pet_name: String,
    pub shop_id: String,
    pub service_id: String,
    pub scheduled_at: DateTime<Utc>,
    /// Price in minor currency units (VND has no subunit, so this is dong).
    pub price: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportShape {
    pub reporter_id: String,
    /// Post or user the report is about.
    pub target_id: String,
    pub category: String,
    pub content: String,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreShape {
    pub name: String,
    pub owner_name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserShape {
    pub full_name: String,
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StaffShape {
    pub full_name: String,
    pub shop_id: String,
    pub position: String,
    pub phone: String,
}

/// Closed set of creatable record shapes, tagged by kind on the wire:
/// `{"kind": "order", "customerName": ..., ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordShape {
    Order(OrderShape),
    Report(ReportShape),
    Store(StoreShape),
    User(UserShape),
    Staff(StaffShape),
}

impl RecordShape {
    pub fn kind(&self) -> EntityKind {
        match self {
            RecordShape::Order(_) => EntityKind::Order,
            RecordShape::Report(_) => EntityKind::Report,
            RecordShape::Store(_) => EntityKind::Store,
            RecordShape::User(_) => EntityKind::User,
            RecordShape::Staff(_) => EntityKind::Staff,
        }
    }

    pub fn validate(&self) -> Result<(), ShapeError> {
        let kind = self.kind();
        let required = |field: &'static str, v: &str| -> Result<(), ShapeError> {
            if v.trim().is_empty() {
                Err(ShapeError {
                    kind,
                    field,
                    reason: "must not be empty".to_string(),
                })
            } else {
                Ok(())
            }
        };

        match self {
            RecordShape::Order(o) => {
                required("customerName", &o.customer_name)?;
                required("customerPhone", &o.customer_phone)?;
                required("petName", &o.pet_name)?;
                required("shopId", &o.shop_id)?;
                required("serviceId", &o.service_id)?;
                if o.price < 0 {
                    return Err(ShapeError {
                        kind,
                        field: "price",
                        reason: format!("must be >= 0, got {}", o.price),
                    });
                }
            }
            RecordShape::Report(r) => {
                required("reporterId", &r.reporter_id)?;
                required("targetId", &r.target_id)?;
                required("category", &r.category)?;
                required("content", &r.content)?;
            }
            RecordShape::Store(s) => {
                required("name", &s.name)?;
                required("ownerName", &s.owner_name)?;
                required("phone", &s.phone)?;
                required("address", &s.address)?;
                check_email(kind, &s.email)?;
            }
            RecordShape::User(u) => {
                required("fullName", &u.full_name)?;
                required("phone", &u.phone)?;
                check_email(kind, &u.email)?;
            }
            RecordShape::Staff(s) => {
                required("fullName", &s.full_name)?;
                required("shopId", &s.shop_id)?;
                required("position", &s.position)?;
                required("phone", &s.phone)?;
            }
        }
        Ok(())
    }

    /// Flatten into the attribute bag (the `kind` tag is dropped).
    pub fn to_attributes(&self) -> Attributes {
        let value = match self {
            RecordShape::Order(o) => serde_json::to_value(o),
            RecordShape::Report(r) => serde_json::to_value(r),
            RecordShape::Store(s) => serde_json::to_value(s),
            RecordShape::User(u) => serde_json::to_value(u),
            RecordShape::Staff(s) => serde_json::to_value(s),
        };
        match value {
            Ok(serde_json::Value::Object(map)) => map.into_iter().collect(),
            _ => Attributes::new(),
        }
    }
}

fn check_email(kind: EntityKind, email: &str) -> Result<(), ShapeError> {
    let t = email.trim();
    let ok = match t.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    };
    if ok {
        Ok(())
    } else {
        Err(ShapeError {
            kind,
            field: "email",
            reason: format!("'{t}' is not an email address"),
        })
    }
}
