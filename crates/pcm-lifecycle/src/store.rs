//! Record store: the authoritative in-memory copy of one kind's records for
//! the current view.
//!
//! ```text
//! record_id  →  Entity      (lookup)
//! [record_id, ...]          (insertion order, no implicit sort)
//! ```
//!
//! - [`RecordStore::upsert`] inserts unseen IDs at the end and replaces known
//!   IDs in place. Always a full replace; there is no partial merge.
//! - [`RecordStore::remove`] is a silent no-op for unknown IDs.
//!
//! # Thread-safety
//! Single writer. The tracker wraps each store in an async `RwLock`; the
//! store itself does no synchronization.

use std::collections::HashMap;

use pcm_schemas::{Entity, EntityKind, RecordId};

use crate::error::LifecycleError;

#[derive(Clone, Debug, PartialEq)]
pub struct RecordStore {
    kind: EntityKind,
    order: Vec<RecordId>,
    records: HashMap<RecordId, Entity>,
}

impl RecordStore {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            order: Vec::new(),
            records: HashMap::new(),
        }
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Insert or fully replace a record. Returns the replaced record, if any.
    pub fn upsert(&mut self, entity: Entity) -> Option<Entity> {
        let id = entity.id.clone();
        let previous = self.records.insert(id.clone(), entity);
        if previous.is_none() {
            self.order.push(id);
        }
        previous
    }

    /// Delete a record if present. Unknown IDs are ignored.
    pub fn remove(&mut self, id: &RecordId) -> Option<Entity> {
        let removed = self.records.remove(id);
        if removed.is_some() {
            self.order.retain(|known| known != id);
        }
        removed
    }

    /// Put a previously removed record back at `index` (clamped to the end).
    /// Known IDs are replaced in place instead.
    pub fn insert_at(&mut self, index: usize, entity: Entity) {
        let id = entity.id.clone();
        if self.records.insert(id.clone(), entity).is_none() {
            let index = index.min(self.order.len());
            self.order.insert(index, id);
        }
    }

    /// Insertion-order position of `id`.
    pub fn position(&self, id: &RecordId) -> Option<usize> {
        self.order.iter().position(|known| known == id)
    }

    pub fn get(&self, id: &RecordId) -> Result<&Entity, LifecycleError> {
        self.records.get(id).ok_or_else(|| LifecycleError::NotFound {
            kind: self.kind,
            id: id.clone(),
        })
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.records.contains_key(id)
    }

    /// Records in insertion order.
    pub fn all(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    /// Drop everything and load `entities` in the given order.
    ///
    /// Duplicate IDs in the input keep the first position and the last value.
    pub fn replace_all(&mut self, entities: impl IntoIterator<Item = Entity>) {
        self.order.clear();
        self.records.clear();
        for e in entities {
            self.upsert(e);
        }
    }

    pub fn clear(&mut self) {
        self.order.clear();
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
