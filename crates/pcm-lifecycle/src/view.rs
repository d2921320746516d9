//! Per-kind view state: the record store plus the stale-response guard that
//! decides whether a network response may still touch it.

use pcm_schemas::{Entity, EntityKind, RecordId};

use crate::stale::StaleGuard;
use crate::store::RecordStore;

#[derive(Debug)]
pub struct View {
    pub(crate) store: RecordStore,
    pub(crate) guard: StaleGuard,
}

impl View {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            store: RecordStore::new(kind),
            guard: StaleGuard::new(),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn guard(&self) -> &StaleGuard {
        &self.guard
    }

    /// Record-level upsert. Fences list snapshots requested before it.
    pub(crate) fn put_record(&mut self, entity: Entity) {
        self.store.upsert(entity);
        self.guard.note_record_write();
    }

    pub(crate) fn take_record(&mut self, id: &RecordId) -> Option<Entity> {
        let removed = self.store.remove(id);
        if removed.is_some() {
            self.guard.note_record_write();
        }
        removed
    }

    pub(crate) fn restore_record(&mut self, index: usize, entity: Entity) {
        self.store.insert_at(index, entity);
        self.guard.note_record_write();
    }

    /// Replace the contents with a list snapshot. Fences record answers
    /// requested before it.
    pub(crate) fn apply_list(&mut self, items: impl IntoIterator<Item = Entity>) {
        self.store.replace_all(items);
        self.guard.note_list_applied();
    }

    /// Drop every record and invalidate every outstanding request.
    pub fn tear_down(&mut self) {
        self.store.clear();
        self.guard.tear_down();
    }
}
