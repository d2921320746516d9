//! In-memory test doubles.
//!
//! Compiled for this crate's own unit tests and, behind the `testkit`
//! feature, for integration tests in this and downstream crates. Never
//! enabled in production `[dependencies]`.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use pcm_schemas::{
    Action, ActionMetadata, Entity, EntityKind, ListPage, ListQuery, Operation, RecordId,
    RecordShape,
};
use tokio::sync::{Notify, Semaphore};

use crate::backend::BackendAdapter;
use crate::error::BackendError;
use crate::filter;
use crate::gate::{Confirmation, Confirmer};
use crate::taxonomy;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// Hold
// ---------------------------------------------------------------------------

/// Parks a call mid-flight until the test releases it.
#[derive(Debug, Clone)]
pub struct Hold {
    entered: Arc<Notify>,
    release: Arc<Semaphore>,
}

impl Hold {
    fn new() -> Self {
        Self {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Semaphore::new(0)),
        }
    }

    /// Resolves once the held call has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the held call finish.
    pub fn release(&self) {
        self.release.add_permits(1);
    }

    async fn park(&self) {
        self.entered.notify_one();
        if let Ok(permit) = self.release.acquire().await {
            permit.forget();
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedBackend
// ---------------------------------------------------------------------------

/// One call observed by [`ScriptedBackend`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    List(EntityKind),
    Create(EntityKind),
    Update(EntityKind, RecordId),
    Action(EntityKind, RecordId, Action),
    Delete(EntityKind, RecordId),
}

#[derive(Debug, Default)]
struct Script {
    records: HashMap<EntityKind, Vec<Entity>>,
    failures: VecDeque<BackendError>,
    calls: Vec<BackendCall>,
    next_id: u64,
}

/// Backend double that keeps its own copy of every record and answers with
/// canonical echoes.
///
/// - `fail_next` queues an error for the next call of any kind.
/// - `hold_next` parks the next call until [`Hold::release`]. A held `list`
///   answers with the records as they were when the call arrived.
/// - Creates are assigned `srv-<n>` and the kind's initial status.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    script: Mutex<Script>,
    hold: Mutex<Option<Hold>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend-side records for `kind`, served by `list`.
    pub fn seed(&self, kind: EntityKind, records: Vec<Entity>) {
        lock(&self.script).records.insert(kind, records);
    }

    pub fn fail_next(&self, err: BackendError) {
        lock(&self.script).failures.push_back(err);
    }

    pub fn hold_next(&self) -> Hold {
        let hold = Hold::new();
        *lock(&self.hold) = Some(hold.clone());
        hold
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        lock(&self.script).calls.clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.script).calls.len()
    }

    /// Backend-side copy of one record.
    pub fn record(&self, kind: EntityKind, id: &RecordId) -> Option<Entity> {
        lock(&self.script)
            .records
            .get(&kind)
            .and_then(|rs| rs.iter().find(|e| &e.id == id).cloned())
    }

    /// Log the call, then wait out a pending hold, then pop a scripted
    /// failure. Guards are dropped before any await.
    async fn enter(&self, call: BackendCall) -> Result<(), BackendError> {
        lock(&self.script).calls.push(call);
        let hold = lock(&self.hold).take();
        if let Some(hold) = hold {
            hold.park().await;
        }
        match lock(&self.script).failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn store_record(&self, entity: &Entity) {
        let mut script = lock(&self.script);
        let records = script.records.entry(entity.kind).or_default();
        match records.iter_mut().find(|e| e.id == entity.id) {
            Some(slot) => *slot = entity.clone(),
            None => records.push(entity.clone()),
        }
    }
}

#[async_trait]
impl BackendAdapter for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn list(
        &self,
        kind: EntityKind,
        query: &ListQuery,
    ) -> Result<ListPage<Entity>, BackendError> {
        // Snapshot taken when the request arrives, not when it is released.
        let matching: Vec<Entity> = lock(&self.script)
            .records
            .get(&kind)
            .map(|rs| {
                rs.iter()
                    .filter(|e| query.status.map_or(true, |s| e.status == s))
                    .filter(|e| {
                        query
                            .shop_id
                            .as_deref()
                            .map_or(true, |shop| e.attr_str("shopId") == Some(shop))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        self.enter(BackendCall::List(kind)).await?;
        Ok(filter::paginate(matching, query.page, query.page_size))
    }

    async fn create(&self, shape: &RecordShape) -> Result<Entity, BackendError> {
        let kind = shape.kind();
        self.enter(BackendCall::Create(kind)).await?;
        let id = {
            let mut script = lock(&self.script);
            script.next_id += 1;
            format!("srv-{}", script.next_id)
        };
        let mut entity = Entity::new(id, kind, taxonomy::initial_status(kind));
        entity.attributes = shape.to_attributes();
        self.store_record(&entity);
        Ok(entity)
    }

    async fn update(&self, entity: &Entity) -> Result<Entity, BackendError> {
        self.enter(BackendCall::Update(entity.kind, entity.id.clone()))
            .await?;
        self.store_record(entity);
        Ok(entity.clone())
    }

    async fn apply_action(
        &self,
        proposed: &Entity,
        action: Action,
        _meta: &ActionMetadata,
    ) -> Result<Entity, BackendError> {
        self.enter(BackendCall::Action(proposed.kind, proposed.id.clone(), action))
            .await?;
        self.store_record(proposed);
        Ok(proposed.clone())
    }

    async fn delete(&self, kind: EntityKind, id: &RecordId) -> Result<(), BackendError> {
        self.enter(BackendCall::Delete(kind, id.clone())).await?;
        if let Some(records) = lock(&self.script).records.get_mut(&kind) {
            records.retain(|e| &e.id != id);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// ScriptedConfirmer
// ---------------------------------------------------------------------------

/// Confirmer with a fixed answer that records every prompt.
#[derive(Debug)]
pub struct ScriptedConfirmer {
    answer: Confirmation,
    asked: Mutex<Vec<(Operation, RecordId)>>,
    hold: Mutex<Option<Hold>>,
}

impl ScriptedConfirmer {
    pub fn confirming() -> Self {
        Self::answering(Confirmation::Confirmed)
    }

    pub fn cancelling() -> Self {
        Self::answering(Confirmation::Cancelled)
    }

    pub fn answering(answer: Confirmation) -> Self {
        Self {
            answer,
            asked: Mutex::new(Vec::new()),
            hold: Mutex::new(None),
        }
    }

    /// Keep the next prompt open until [`Hold::release`].
    pub fn hold_next(&self) -> Hold {
        let hold = Hold::new();
        *lock(&self.hold) = Some(hold.clone());
        hold
    }

    pub fn asked(&self) -> Vec<(Operation, RecordId)> {
        lock(&self.asked).clone()
    }
}

#[async_trait]
impl Confirmer for ScriptedConfirmer {
    async fn request_confirmation(&self, op: Operation, entity: &Entity) -> Confirmation {
        lock(&self.asked).push((op, entity.id.clone()));
        let hold = lock(&self.hold).take();
        if let Some(hold) = hold {
            hold.park().await;
        }
        self.answer
    }
}
