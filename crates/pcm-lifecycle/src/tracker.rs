//! `LifecycleTracker`: the surface the UI layer talks to.
//!
//! One view (record store + stale guard) per entity kind, a shared
//! confirmation gate, and the transition executor. Reads take the view's
//! read lock and are pure projections; every mutation goes through the gate
//! and then the backend before the store changes.

use std::collections::BTreeMap;
use std::sync::Arc;

use pcm_schemas::{
    Action, ActionMetadata, Entity, EntityKind, ListPage, ListQuery, Operation, RecordId,
    RecordShape,
};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::backend::BackendAdapter;
use crate::error::LifecycleError;
use crate::filter::{self, Predicate, SortKey, TabCounts};
use crate::gate::{ConfirmationGate, Confirmer, GateOutcome};
use crate::stale::RequestKey;
use crate::taxonomy;
use crate::transition::{accept_canonical, settle_or_stale, CommitPolicy, TransitionExecutor};
use crate::view::View;

fn slot(kind: EntityKind) -> usize {
    match kind {
        EntityKind::Order => 0,
        EntityKind::Report => 1,
        EntityKind::Store => 2,
        EntityKind::User => 3,
        EntityKind::Staff => 4,
    }
}

pub struct LifecycleTracker {
    backend: Arc<dyn BackendAdapter>,
    executor: TransitionExecutor,
    gate: ConfirmationGate,
    views: [RwLock<View>; 5],
}

impl std::fmt::Debug for LifecycleTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleTracker")
            .field("backend", &self.backend.name())
            .field("policy", &self.executor.policy())
            .finish_non_exhaustive()
    }
}

impl LifecycleTracker {
    pub fn new(backend: Arc<dyn BackendAdapter>, policy: CommitPolicy) -> Self {
        Self {
            backend,
            executor: TransitionExecutor::new(policy),
            gate: ConfirmationGate::new(),
            views: EntityKind::ALL.map(|kind| RwLock::new(View::new(kind))),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn policy(&self) -> CommitPolicy {
        self.executor.policy()
    }

    fn view(&self, kind: EntityKind) -> &RwLock<View> {
        &self.views[slot(kind)]
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Records matching `predicate`, in store order.
    pub async fn list_view(&self, kind: EntityKind, predicate: &Predicate) -> Vec<Entity> {
        filter::filter(&self.view(kind).read().await.store, predicate)
    }

    pub async fn list_sorted(
        &self,
        kind: EntityKind,
        predicate: &Predicate,
        sort: &SortKey,
    ) -> Vec<Entity> {
        filter::filter_sorted(&self.view(kind).read().await.store, predicate, sort)
    }

    pub async fn list_page(
        &self,
        kind: EntityKind,
        predicate: &Predicate,
        sort: Option<&SortKey>,
        page: u32,
        page_size: u32,
    ) -> ListPage<Entity> {
        let records = match sort {
            Some(sort) => self.list_sorted(kind, predicate, sort).await,
            None => self.list_view(kind, predicate).await,
        };
        filter::paginate(records, page, page_size)
    }

    pub async fn count(&self, kind: EntityKind, predicate: &Predicate) -> usize {
        filter::count(&self.view(kind).read().await.store, predicate)
    }

    pub async fn tab_counts(&self, kind: EntityKind) -> TabCounts {
        filter::tab_counts(&self.view(kind).read().await.store)
    }

    pub async fn group_by_date(
        &self,
        kind: EntityKind,
        predicate: &Predicate,
        key: &str,
    ) -> BTreeMap<String, Vec<Entity>> {
        filter::group_by_date(&self.list_view(kind, predicate).await, key)
    }

    pub async fn get(&self, kind: EntityKind, id: &RecordId) -> Result<Entity, LifecycleError> {
        self.view(kind).read().await.store.get(id).cloned()
    }

    /// Actions the UI may offer for one record right now.
    pub async fn legal_actions(
        &self,
        kind: EntityKind,
        id: &RecordId,
    ) -> Result<Vec<Action>, LifecycleError> {
        let status = self.get(kind, id).await?.status;
        Ok(taxonomy::legal_actions(kind, status))
    }

    /// Operation pending on a record, if any.
    pub fn pending_operation(&self, kind: EntityKind, id: &RecordId) -> Option<Operation> {
        self.gate.pending(kind, id)
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Run a status transition: validate, confirm when the action calls for
    /// it, then hand off to the executor.
    ///
    /// Illegal or under-specified requests fail before the operator is asked.
    pub async fn perform_action(
        &self,
        kind: EntityKind,
        id: &RecordId,
        action: Action,
        meta: &ActionMetadata,
        confirmer: &dyn Confirmer,
    ) -> Result<GateOutcome<Entity>, LifecycleError> {
        let view = self.view(kind);
        let snapshot = {
            let v = view.read().await;
            match self.executor.plan(&v.store, id, action, meta) {
                Ok(plan) => plan.previous,
                Err(e) => {
                    info!(kind = %kind, id = %id, action = %action, error = %e, "transition rejected");
                    return Err(e);
                }
            }
        };

        self.gate
            .run(kind, &snapshot, Operation::Transition(action), confirmer, || {
                self.executor
                    .execute(view, self.backend.as_ref(), id, action, meta)
            })
            .await
    }

    /// Delete a record after confirmation. Returns the removed record.
    pub async fn delete(
        &self,
        kind: EntityKind,
        id: &RecordId,
        confirmer: &dyn Confirmer,
    ) -> Result<GateOutcome<Entity>, LifecycleError> {
        let snapshot = self.get(kind, id).await?;
        self.gate
            .run(kind, &snapshot, Operation::Delete, confirmer, || {
                self.delete_confirmed(kind, id)
            })
            .await
    }

    async fn delete_confirmed(
        &self,
        kind: EntityKind,
        id: &RecordId,
    ) -> Result<Entity, LifecycleError> {
        let view = self.view(kind);
        let optimistic = self.executor.policy() == CommitPolicy::Optimistic;

        let (token, stash) = {
            let mut v = view.write().await;
            let position = v.store.position(id);
            let current = v.store.get(id)?.clone();
            let token = v.guard.issue(RequestKey::Record(id.clone()));
            if optimistic {
                v.take_record(id);
            }
            (token, (position, current))
        };

        let response = self.backend.delete(kind, id).await;

        let mut v = view.write().await;
        settle_or_stale(&mut v, &token, kind, Some(id))?;
        let (position, removed) = stash;
        match response {
            Ok(()) => {
                v.take_record(id);
                info!(kind = %kind, id = %id, "record deleted");
                Ok(removed)
            }
            Err(e) => {
                if optimistic && !v.store.contains(id) {
                    v.restore_record(position.unwrap_or(usize::MAX), removed);
                    warn!(kind = %kind, id = %id, error = %e, "delete failed, rolled back");
                } else {
                    warn!(kind = %kind, id = %id, error = %e, "delete failed");
                }
                Err(LifecycleError::Backend(e))
            }
        }
    }

    /// Create a record from a validated shape. The backend assigns the ID
    /// and the record is upserted once it answers.
    pub async fn create(&self, shape: &RecordShape) -> Result<Entity, LifecycleError> {
        let kind = shape.kind();
        shape.validate()?;

        let view = self.view(kind);
        let provisional = RecordId::provisional();
        let token = view
            .write()
            .await
            .guard
            .issue(RequestKey::Record(provisional.clone()));

        let response = self.backend.create(shape).await;

        let mut v = view.write().await;
        settle_or_stale(&mut v, &token, kind, Some(&provisional))?;
        match response.and_then(|canonical| accept_canonical(kind, None, canonical)) {
            Ok(created) => {
                v.put_record(created.clone());
                info!(kind = %kind, id = %created.id, status = %created.status, "record created");
                Ok(created)
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "create failed");
                Err(LifecycleError::Backend(e))
            }
        }
    }

    /// Full-record attribute replace. The status must not change here.
    pub async fn edit(&self, entity: Entity) -> Result<Entity, LifecycleError> {
        let kind = entity.kind;
        let current = self.get(kind, &entity.id).await?;
        taxonomy::ensure_admitted(kind, entity.status)?;
        if entity.status != current.status {
            return Err(LifecycleError::StatusChangeViaEdit {
                kind,
                id: entity.id.clone(),
                from: current.status,
                to: entity.status,
            });
        }

        // Edits never prompt; they only take the record's in-flight slot.
        let _slot = self.gate.acquire(kind, &current.id, Operation::Edit)?;
        self.edit_confirmed(current, entity).await
    }

    async fn edit_confirmed(
        &self,
        previous: Entity,
        edited: Entity,
    ) -> Result<Entity, LifecycleError> {
        let kind = edited.kind;
        let id = edited.id.clone();
        let view = self.view(kind);
        let optimistic = self.executor.policy() == CommitPolicy::Optimistic;

        let token = {
            let mut v = view.write().await;
            // Re-check under the write lock; a refresh may have replaced it.
            v.store.get(&id)?;
            let token = v.guard.issue(RequestKey::Record(id.clone()));
            if optimistic {
                v.put_record(edited.clone());
            }
            token
        };

        let response = self.backend.update(&edited).await;

        let mut v = view.write().await;
        settle_or_stale(&mut v, &token, kind, Some(&id))?;
        match response.and_then(|canonical| accept_canonical(kind, Some(&id), canonical)) {
            Ok(updated) => {
                v.put_record(updated.clone());
                info!(kind = %kind, id = %id, "record edited");
                Ok(updated)
            }
            Err(e) => {
                if optimistic && v.store.get(&id).ok() == Some(&edited) {
                    v.put_record(previous);
                    warn!(kind = %kind, id = %id, error = %e, "edit failed, rolled back");
                } else {
                    warn!(kind = %kind, id = %id, error = %e, "edit failed");
                }
                Err(LifecycleError::Backend(e))
            }
        }
    }

    /// Fetch one page from the backend and make it the view's contents.
    ///
    /// A newer refresh or a `close_view` in the meantime turns this response
    /// into `StaleResponse` and leaves the store alone.
    pub async fn refresh(
        &self,
        kind: EntityKind,
        query: &ListQuery,
    ) -> Result<ListPage<Entity>, LifecycleError> {
        let view = self.view(kind);
        let token = view.write().await.guard.issue(RequestKey::List);

        let response = self.backend.list(kind, query).await;

        let mut v = view.write().await;
        settle_or_stale(&mut v, &token, kind, None)?;
        let page = match response {
            Ok(page) => page,
            Err(e) => {
                warn!(kind = %kind, error = %e, "refresh failed");
                return Err(LifecycleError::Backend(e));
            }
        };
        let mut items = Vec::with_capacity(page.items.len());
        for item in page.items {
            items.push(accept_canonical(kind, None, item)?);
        }
        v.apply_list(items.iter().cloned());
        info!(kind = %kind, loaded = items.len(), total = page.total_items, "view refreshed");
        Ok(ListPage {
            items,
            total_items: page.total_items,
            page: page.page,
            page_size: page.page_size,
        })
    }

    /// The page showing `kind` went away: drop its records and make every
    /// outstanding response for it stale.
    pub async fn close_view(&self, kind: EntityKind) {
        self.view(kind).write().await.tear_down();
        info!(kind = %kind, "view closed");
    }
}
