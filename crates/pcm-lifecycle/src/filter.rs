//! Filter view: read-only projections of a [`RecordStore`].
//!
//! Everything here is recomputed on demand and never mutates the store.
//! `count(store, p) == filter(store, p).len()` holds for every predicate.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use pcm_schemas::{Entity, ListPage, Status};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::store::RecordStore;
use crate::taxonomy;

/// Bucket for records whose date attribute is missing or unparseable.
pub const UNDATED: &str = "undated";

// ---------------------------------------------------------------------------
// Predicate
// ---------------------------------------------------------------------------

/// Predicate over `{status, attributes}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Predicate {
    /// The "all" tab: matches every record regardless of status.
    #[default]
    All,
    Status(Status),
    AnyStatus(Vec<Status>),
    /// Exact attribute match (category tabs, shop filter, severity, ...).
    AttrEquals { key: String, value: Value },
    /// Case-insensitive substring over every string attribute.
    Search(String),
    And(Vec<Predicate>),
}

impl Predicate {
    pub fn attr(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Predicate::AttrEquals {
            key: key.into(),
            value: value.into(),
        }
    }

    /// The list-screen filter bar: status tab, search box and shop filter.
    /// A blank search is ignored; a single active filter is not wrapped in
    /// `And`.
    pub fn from_parts(status: Option<Status>, search: Option<&str>, shop_id: Option<&str>) -> Self {
        let mut parts = Vec::new();
        if let Some(status) = status {
            parts.push(Predicate::Status(status));
        }
        if let Some(q) = search.filter(|q| !q.trim().is_empty()) {
            parts.push(Predicate::Search(q.to_string()));
        }
        if let Some(shop) = shop_id {
            parts.push(Predicate::attr("shopId", shop));
        }
        match parts.len() {
            0 => Predicate::All,
            1 => parts.remove(0),
            _ => Predicate::And(parts),
        }
    }

    pub fn matches(&self, e: &Entity) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Status(s) => e.status == *s,
            Predicate::AnyStatus(set) => set.contains(&e.status),
            Predicate::AttrEquals { key, value } => e.attr(key) == Some(value),
            Predicate::Search(needle) => {
                let needle = needle.trim().to_lowercase();
                needle.is_empty()
                    || e.id.as_str().to_lowercase().contains(&needle)
                    || e.attributes
                        .values()
                        .filter_map(Value::as_str)
                        .any(|s| s.to_lowercase().contains(&needle))
            }
            Predicate::And(parts) => parts.iter().all(|p| p.matches(e)),
        }
    }
}

// ---------------------------------------------------------------------------
// Filter / count
// ---------------------------------------------------------------------------

/// Matching records in store (insertion) order.
pub fn filter(store: &RecordStore, predicate: &Predicate) -> Vec<Entity> {
    store.all().filter(|e| predicate.matches(e)).cloned().collect()
}

pub fn count(store: &RecordStore, predicate: &Predicate) -> usize {
    store.all().filter(|e| predicate.matches(e)).count()
}

/// Badge counts for the status tabs of one kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabCounts {
    pub all: usize,
    /// Every status in the kind's taxonomy, zero-filled.
    pub by_status: BTreeMap<Status, usize>,
}

pub fn tab_counts(store: &RecordStore) -> TabCounts {
    let mut by_status: BTreeMap<Status, usize> = taxonomy::statuses(store.kind())
        .iter()
        .map(|s| (*s, 0))
        .collect();
    for e in store.all() {
        *by_status.entry(e.status).or_insert(0) += 1;
    }
    TabCounts {
        all: store.len(),
        by_status,
    }
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// Attribute key, or `"id"` / `"status"`.
    pub key: String,
    #[serde(default)]
    pub descending: bool,
}

impl SortKey {
    pub fn asc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            descending: false,
        }
    }

    pub fn desc(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            descending: true,
        }
    }
}

/// Filter then stable-sort. Records missing the sort key go last in either
/// direction.
pub fn filter_sorted(store: &RecordStore, predicate: &Predicate, sort: &SortKey) -> Vec<Entity> {
    let mut out = filter(store, predicate);
    out.sort_by(|a, b| {
        let va = sort_value(a, &sort.key);
        let vb = sort_value(b, &sort.key);
        match (va, vb) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(x), Some(y)) => {
                let ord = compare_values(&x, &y);
                if sort.descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
        }
    });
    out
}

fn sort_value(e: &Entity, key: &str) -> Option<Value> {
    match key {
        "id" => Some(Value::String(e.id.as_str().to_string())),
        "status" => Some(Value::String(e.status.as_str().to_string())),
        _ => e.attr(key).filter(|v| !v.is_null()).cloned(),
    }
}

/// Total order over JSON values: ranked by type first
/// (null < bool < number < string < array < object), then within the type.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
            x.total_cmp(&y)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => type_rank(a)
            .cmp(&type_rank(b))
            .then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

// ---------------------------------------------------------------------------
// Dashboard helpers
// ---------------------------------------------------------------------------

/// Group records by the `YYYY-MM-DD` date of a timestamp attribute.
///
/// Accepts RFC 3339, `%Y-%m-%d %H:%M:%S` and bare `%Y-%m-%d`. Anything else
/// lands in the [`UNDATED`] bucket. Input order is kept within each bucket.
pub fn group_by_date(records: &[Entity], key: &str) -> BTreeMap<String, Vec<Entity>> {
    let mut out: BTreeMap<String, Vec<Entity>> = BTreeMap::new();
    for e in records {
        let bucket = e
            .attr_str(key)
            .and_then(parse_date)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| UNDATED.to_string());
        out.entry(bucket).or_default().push(e.clone());
    }
    out
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.date_naive())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .or_else(|_| NaiveDate::parse_from_str(raw, "%Y-%m-%d"))
        .ok()
}

/// Slice a derived view into one 1-based page. Page 0 is treated as 1;
/// pages past the end are empty.
pub fn paginate(records: Vec<Entity>, page: u32, page_size: u32) -> ListPage<Entity> {
    let page = page.max(1);
    let page_size = page_size.max(1);
    let total_items = records.len() as u64;
    let start = (page as usize - 1).saturating_mul(page_size as usize);
    let items = records
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .collect();
    ListPage {
        items,
        total_items,
        page,
        page_size,
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pcm_schemas::EntityKind;
    use serde_json::json;

    fn seeded() -> RecordStore {
        let mut s = RecordStore::new(EntityKind::Order);
        s.upsert(
            Entity::new("o-1", EntityKind::Order, Status::Pending)
                .with_attr("customerName", "Lan")
                .with_attr("price", 300_000)
                .with_attr("scheduledAt", "2026-03-02T09:00:00Z"),
        );
        s.upsert(
            Entity::new("o-2", EntityKind::Order, Status::Completed)
                .with_attr("customerName", "Binh")
                .with_attr("price", 150_000)
                .with_attr("scheduledAt", "2026-03-01 15:30:00"),
        );
        s.upsert(
            Entity::new("o-3", EntityKind::Order, Status::Pending)
                .with_attr("customerName", "An")
                .with_attr("scheduledAt", "2026-03-02"),
        );
        s.upsert(Entity::new("o-4", EntityKind::Order, Status::Cancelled).with_attr("scheduledAt", "soon"));
        s
    }

    fn predicates() -> Vec<Predicate> {
        vec![
            Predicate::All,
            Predicate::Status(Status::Pending),
            Predicate::Status(Status::Disputed),
            Predicate::AnyStatus(vec![Status::Pending, Status::Cancelled]),
            Predicate::attr("customerName", "Binh"),
            Predicate::Search("an".to_string()),
            Predicate::And(vec![
                Predicate::Status(Status::Pending),
                Predicate::Search("lan".to_string()),
            ]),
        ]
    }

    #[test]
    fn count_equals_filter_len_for_every_predicate() {
        let s = seeded();
        for p in predicates() {
            assert_eq!(count(&s, &p), filter(&s, &p).len(), "predicate {p:?}");
        }
    }

    #[test]
    fn filter_is_idempotent_and_pure() {
        let s = seeded();
        let before = s.clone();
        for p in predicates() {
            assert_eq!(filter(&s, &p), filter(&s, &p));
        }
        assert_eq!(s, before);
    }

    #[test]
    fn all_matches_every_status() {
        let s = seeded();
        assert_eq!(filter(&s, &Predicate::All).len(), 4);
    }

    #[test]
    fn filter_keeps_insertion_order() {
        let s = seeded();
        let ids: Vec<String> = filter(&s, &Predicate::Status(Status::Pending))
            .into_iter()
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(ids, ["o-1", "o-3"]);
    }

    #[test]
    fn tab_counts_zero_fill_the_taxonomy() {
        let s = seeded();
        let c = tab_counts(&s);
        assert_eq!(c.all, 4);
        assert_eq!(c.by_status[&Status::Pending], 2);
        assert_eq!(c.by_status[&Status::Disputed], 0);
        assert_eq!(c.by_status.len(), taxonomy::statuses(EntityKind::Order).len());
        assert!(!c.by_status.contains_key(&Status::Active));
    }

    #[test]
    fn sort_by_price_desc_puts_missing_last() {
        let s = seeded();
        let ids: Vec<String> = filter_sorted(&s, &Predicate::All, &SortKey::desc("price"))
            .into_iter()
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(ids, ["o-1", "o-2", "o-3", "o-4"]);

        let ids: Vec<String> = filter_sorted(&s, &Predicate::All, &SortKey::asc("price"))
            .into_iter()
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(ids, ["o-2", "o-1", "o-3", "o-4"]);
    }

    #[test]
    fn from_parts_collapses_single_filter() {
        assert_eq!(Predicate::from_parts(None, None, None), Predicate::All);
        assert_eq!(
            Predicate::from_parts(Some(Status::Pending), Some("  "), None),
            Predicate::Status(Status::Pending)
        );
        assert_eq!(
            Predicate::from_parts(None, None, Some("shop-1")),
            Predicate::attr("shopId", "shop-1")
        );
        assert_eq!(
            Predicate::from_parts(Some(Status::Pending), Some("mochi"), Some("shop-1")),
            Predicate::And(vec![
                Predicate::Status(Status::Pending),
                Predicate::Search("mochi".into()),
                Predicate::attr("shopId", "shop-1"),
            ])
        );
    }

    #[test]
    fn mixed_type_values_sort_by_type_then_value() {
        let mut s = RecordStore::new(EntityKind::Order);
        for (id, price) in [
            ("a", json!(10)),
            ("b", json!("5")),
            ("c", json!(9)),
            ("d", json!("abc")),
            ("e", json!(true)),
            ("f", json!(2.5)),
        ] {
            s.upsert(Entity::new(id, EntityKind::Order, Status::Pending).with_attr("price", price));
        }
        let ids: Vec<String> = filter_sorted(&s, &Predicate::All, &SortKey::asc("price"))
            .into_iter()
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(ids, ["e", "f", "c", "a", "b", "d"]);

        let ids: Vec<String> = filter_sorted(&s, &Predicate::All, &SortKey::desc("price"))
            .into_iter()
            .map(|e| e.id.to_string())
            .collect();
        assert_eq!(ids, ["d", "b", "a", "c", "f", "e"]);
    }

    #[test]
    fn value_comparison_is_transitive_across_types() {
        let values = [json!(10), json!("5"), json!(9), json!(null), json!(false), json!([1]), json!({"k": 1})];
        for a in &values {
            for b in &values {
                assert_eq!(compare_values(a, b), compare_values(b, a).reverse());
                for c in &values {
                    if compare_values(a, b) != Ordering::Greater
                        && compare_values(b, c) != Ordering::Greater
                    {
                        assert_ne!(compare_values(a, c), Ordering::Greater, "{a} <= {b} <= {c}");
                    }
                }
            }
        }
    }

    #[test]
    fn group_by_date_buckets_mixed_formats() {
        let s = seeded();
        let records = filter(&s, &Predicate::All);
        let groups = group_by_date(&records, "scheduledAt");
        assert_eq!(groups["2026-03-02"].len(), 2);
        assert_eq!(groups["2026-03-01"].len(), 1);
        assert_eq!(groups[UNDATED].len(), 1);
    }

    #[test]
    fn paginate_slices_and_reports_total() {
        let s = seeded();
        let p = paginate(filter(&s, &Predicate::All), 2, 3);
        assert_eq!(p.total_items, 4);
        assert_eq!(p.items.len(), 1);
        assert_eq!(p.items[0].id.as_str(), "o-4");

        let past = paginate(filter(&s, &Predicate::All), 9, 3);
        assert!(past.items.is_empty());

        let zero = paginate(filter(&s, &Predicate::All), 0, 2);
        assert_eq!(zero.page, 1);
        assert_eq!(zero.items.len(), 2);
    }
}
