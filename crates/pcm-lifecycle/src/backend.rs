//! Backend boundary.
//!
//! The REST backend is an opaque collaborator. Concrete adapters (the
//! reqwest client in `pcm-backend`, the scripted double in [`crate::testkit`])
//! implement [`BackendAdapter`]; only the tracker and the transition executor
//! call it.

use async_trait::async_trait;
use pcm_schemas::{
    Action, ActionMetadata, Entity, EntityKind, ListPage, ListQuery, RecordId, RecordShape,
};

use crate::error::BackendError;

/// Contract every backend adapter implements.
///
/// Mutating calls return the canonical record as the backend now holds it.
/// Object-safe so callers can hold an `Arc<dyn BackendAdapter>`.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    /// Human-readable adapter name for logs (e.g. `"rest"`).
    fn name(&self) -> &'static str;

    async fn list(&self, kind: EntityKind, query: &ListQuery)
        -> Result<ListPage<Entity>, BackendError>;

    /// Create a record. The backend assigns the ID.
    async fn create(&self, shape: &RecordShape) -> Result<Entity, BackendError>;

    /// Full-record replace of attributes.
    async fn update(&self, entity: &Entity) -> Result<Entity, BackendError>;

    /// Apply a status transition. `proposed` already carries the next status
    /// and merged metadata.
    async fn apply_action(
        &self,
        proposed: &Entity,
        action: Action,
        meta: &ActionMetadata,
    ) -> Result<Entity, BackendError>;

    async fn delete(&self, kind: EntityKind, id: &RecordId) -> Result<(), BackendError>;
}
