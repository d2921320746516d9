//! Localized display labels.
//!
//! Labels are for rendering only. Every state key on the wire and in the
//! record store is the snake_case enum key; nothing parses a label back.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Action, EntityKind, Operation, ParseKeyError, Status};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Vi,
}

impl Locale {
    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::Vi => "vi",
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Locale {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "en" => Ok(Locale::En),
            "vi" => Ok(Locale::Vi),
            _ => Err(ParseKeyError {
                what: "locale",
                value: s.to_string(),
            }),
        }
    }
}

impl Status {
    pub fn label(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => match self {
                Status::Pending => "Pending",
                Status::Confirmed => "Confirmed",
                Status::InProgress => "In progress",
                Status::Completed => "Completed",
                Status::Cancelled => "Cancelled",
                Status::Disputed => "Disputed",
                Status::Processing => "Processing",
                Status::Resolved => "Resolved",
                Status::Rejected => "Rejected",
                Status::Active => "Active",
                Status::Suspended => "Locked",
                Status::PendingApproval => "Awaiting approval",
            },
            Locale::Vi => match self {
                Status::Pending => "Chờ xác nhận",
                Status::Confirmed => "Đã xác nhận",
                Status::InProgress => "Đang thực hiện",
                Status::Completed => "Hoàn thành",
                Status::Cancelled => "Đã hủy",
                Status::Disputed => "Đang khiếu nại",
                Status::Processing => "Đang xử lý",
                Status::Resolved => "Đã giải quyết",
                Status::Rejected => "Đã từ chối",
                Status::Active => "Hoạt động",
                Status::Suspended => "Đã khóa",
                Status::PendingApproval => "Chờ duyệt",
            },
        }
    }
}

impl Action {
    pub fn label(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => match self {
                Action::Confirm => "Confirm",
                Action::Start => "Start",
                Action::Complete => "Complete",
                Action::Cancel => "Cancel",
                Action::Dispute => "Dispute",
                Action::Resolve => "Resolve",
                Action::Reject => "Reject",
                Action::Approve => "Approve",
                Action::Lock => "Lock",
                Action::Unlock => "Unlock",
            },
            Locale::Vi => match self {
                Action::Confirm => "Xác nhận",
                Action::Start => "Bắt đầu",
                Action::Complete => "Hoàn thành",
                Action::Cancel => "Hủy",
                Action::Dispute => "Khiếu nại",
                Action::Resolve => "Giải quyết",
                Action::Reject => "Từ chối",
                Action::Approve => "Duyệt",
                Action::Lock => "Khóa",
                Action::Unlock => "Mở khóa",
            },
        }
    }
}

impl Operation {
    pub fn label(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (Operation::Transition(a), l) => a.label(l),
            (Operation::Edit, Locale::En) => "Edit",
            (Operation::Edit, Locale::Vi) => "Sửa",
            (Operation::Delete, Locale::En) => "Delete",
            (Operation::Delete, Locale::Vi) => "Xóa",
        }
    }
}

impl EntityKind {
    pub fn label(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => match self {
                EntityKind::Order => "appointment",
                EntityKind::Report => "report",
                EntityKind::Store => "store",
                EntityKind::User => "user",
                EntityKind::Staff => "staff member",
            },
            Locale::Vi => match self {
                EntityKind::Order => "lịch hẹn",
                EntityKind::Report => "báo cáo",
                EntityKind::Store => "cửa hàng",
                EntityKind::User => "người dùng",
                EntityKind::Staff => "nhân viên",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_status_has_distinct_labels_per_locale() {
        for locale in [Locale::En, Locale::Vi] {
            let mut seen = std::collections::HashSet::new();
            for st in Status::ALL {
                assert!(seen.insert(st.label(locale)), "duplicate label for {st}");
            }
        }
    }

    #[test]
    fn labels_never_equal_state_keys() {
        for st in Status::ALL {
            assert_ne!(st.label(Locale::Vi), st.as_str());
        }
    }

    #[test]
    fn locale_parse() {
        assert_eq!("VI".parse::<Locale>().unwrap(), Locale::Vi);
        assert!("fr".parse::<Locale>().is_err());
    }
}
