//! Stale-response guard.
//!
//! Every network round-trip that will touch a view is issued a
//! [`RequestToken`]. When the response arrives it is applied only if its
//! token is still the current one for its key and the view has not been torn
//! down since. Issuing a new token for a key supersedes the previous one, so
//! an older list response can never overwrite a newer one.
//!
//! List snapshots and record writes also fence each other:
//!
//! - a list answer is stale if any record write hit the store after the list
//!   request went out (the snapshot predates that write);
//! - a record answer is stale if a list snapshot was applied after the record
//!   request went out (the snapshot is now the view's truth for that record).

use std::collections::HashMap;

use pcm_schemas::RecordId;
use uuid::Uuid;

/// What a request is about.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RequestKey {
    /// A whole-view list fetch.
    List,
    /// A mutation of one record (provisional ID for creates).
    Record(RecordId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToken {
    key: RequestKey,
    token: Uuid,
    epoch: u64,
    record_writes: u64,
    list_applies: u64,
}

impl RequestToken {
    pub fn key(&self) -> &RequestKey {
        &self.key
    }
}

#[derive(Debug, Default)]
pub struct StaleGuard {
    epoch: u64,
    current: HashMap<RequestKey, Uuid>,
    record_writes: u64,
    list_applies: u64,
}

impl StaleGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token for `key`, superseding any earlier one.
    pub fn issue(&mut self, key: RequestKey) -> RequestToken {
        let token = Uuid::new_v4();
        self.current.insert(key.clone(), token);
        RequestToken {
            key,
            token,
            epoch: self.epoch,
            record_writes: self.record_writes,
            list_applies: self.list_applies,
        }
    }

    /// `t` is the latest token for its key in this epoch.
    fn holds(&self, t: &RequestToken) -> bool {
        t.epoch == self.epoch && self.current.get(&t.key) == Some(&t.token)
    }

    pub fn is_current(&self, t: &RequestToken) -> bool {
        if !self.holds(t) {
            return false;
        }
        match t.key {
            RequestKey::List => t.record_writes == self.record_writes,
            RequestKey::Record(_) => t.list_applies == self.list_applies,
        }
    }

    /// Retire `t`. Returns `true` if it was still current (the response may
    /// be applied) and `false` if it is stale (the response must be dropped).
    pub fn settle(&mut self, t: &RequestToken) -> bool {
        let current = self.is_current(t);
        if self.holds(t) {
            self.current.remove(&t.key);
        }
        current
    }

    /// A record-level write (local or acknowledged) changed the store.
    pub fn note_record_write(&mut self) {
        self.record_writes += 1;
    }

    /// A list snapshot replaced the store contents.
    pub fn note_list_applied(&mut self) {
        self.list_applies += 1;
    }

    /// The view was closed: every outstanding token becomes stale.
    pub fn tear_down(&mut self) {
        self.epoch += 1;
        self.current.clear();
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Outstanding (issued, not yet settled) requests.
    pub fn pending(&self) -> usize {
        self.current.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_token_settles_once() {
        let mut g = StaleGuard::new();
        let t = g.issue(RequestKey::List);
        assert!(g.is_current(&t));
        assert!(g.settle(&t));
        assert!(!g.settle(&t), "second settle must be stale");
        assert_eq!(g.pending(), 0);
    }

    #[test]
    fn newer_token_supersedes_older_for_same_key() {
        let mut g = StaleGuard::new();
        let old = g.issue(RequestKey::List);
        let new = g.issue(RequestKey::List);
        assert!(!g.settle(&old));
        assert!(g.settle(&new));
    }

    #[test]
    fn tokens_for_distinct_records_are_independent() {
        let mut g = StaleGuard::new();
        let a = g.issue(RequestKey::Record(RecordId::new("a")));
        let b = g.issue(RequestKey::Record(RecordId::new("b")));
        assert!(g.settle(&b));
        assert!(g.settle(&a));
    }

    #[test]
    fn tear_down_invalidates_everything() {
        let mut g = StaleGuard::new();
        let t = g.issue(RequestKey::Record(RecordId::new("a")));
        g.tear_down();
        assert!(!g.is_current(&t));
        assert!(!g.settle(&t));
        assert_eq!(g.epoch(), 1);

        // A token issued after teardown is live again.
        let t2 = g.issue(RequestKey::Record(RecordId::new("a")));
        assert!(g.settle(&t2));
    }

    #[test]
    fn record_write_after_list_issue_makes_list_stale() {
        let mut g = StaleGuard::new();
        let list = g.issue(RequestKey::List);
        let rec = g.issue(RequestKey::Record(RecordId::new("a")));
        assert!(g.settle(&rec));
        g.note_record_write();

        assert!(!g.is_current(&list));
        assert!(!g.settle(&list));
        assert_eq!(g.pending(), 0, "stale list token is still retired");

        // A list issued after the write is unaffected by it.
        let fresh = g.issue(RequestKey::List);
        assert!(g.settle(&fresh));
    }

    #[test]
    fn list_applied_after_record_issue_makes_record_stale() {
        let mut g = StaleGuard::new();
        let rec = g.issue(RequestKey::Record(RecordId::new("a")));
        let list = g.issue(RequestKey::List);
        assert!(g.settle(&list));
        g.note_list_applied();

        assert!(!g.settle(&rec));
        assert_eq!(g.pending(), 0);
    }

    #[test]
    fn failed_list_does_not_fence_records() {
        let mut g = StaleGuard::new();
        let rec = g.issue(RequestKey::Record(RecordId::new("a")));
        let list = g.issue(RequestKey::List);
        // Settled but never applied (backend error).
        assert!(g.settle(&list));
        assert!(g.settle(&rec));
    }
}
