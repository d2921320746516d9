//! Record commands: list, counts, act, delete.
//!
//! Every command first loads one backend page into the tracker's view, then
//! works on that view exactly as the dashboard does. Output is one
//! `key=value` line per record so it can be grepped.

use anyhow::{bail, Result};
use pcm_lifecycle::{GateOutcome, LifecycleError, Predicate, SortKey};
use pcm_schemas::{Action, ActionMetadata, Entity, EntityKind, ListQuery, Locale, RecordId, Status};

use super::{Desk, TerminalConfirmer};

pub struct ListFilter {
    pub status: Option<Status>,
    pub search: Option<String>,
    pub shop_id: Option<String>,
    pub sort: Option<String>,
    pub desc: bool,
}

impl ListFilter {
    fn predicate(&self) -> Predicate {
        Predicate::from_parts(self.status, self.search.as_deref(), self.shop_id.as_deref())
    }

    fn sort_key(&self) -> Option<SortKey> {
        self.sort.as_ref().map(|key| {
            if self.desc {
                SortKey::desc(key.clone())
            } else {
                SortKey::asc(key.clone())
            }
        })
    }
}

pub struct ActRequest {
    pub kind: EntityKind,
    pub id: String,
    pub action: Action,
    pub staff_id: Option<String>,
    pub reason: Option<String>,
    pub page: u32,
}

/// Render a tracker error the way the dashboard would show it.
fn fail(
    err: LifecycleError,
    locale: Locale,
    kind: EntityKind,
    id: Option<&RecordId>,
    op: &str,
) -> anyhow::Error {
    match err.user_message(locale, kind, id, op) {
        Some(msg) => anyhow::anyhow!(msg),
        None => anyhow::anyhow!("{err}"),
    }
}

async fn load_page(desk: &Desk, kind: EntityKind, page: u32) -> Result<u64> {
    let query = ListQuery {
        page: page.max(1),
        page_size: desk.cfg.page_size,
        ..ListQuery::default()
    };
    let loaded = desk
        .tracker
        .refresh(kind, &query)
        .await
        .map_err(|e| fail(e, desk.locale, kind, None, "refresh"))?;
    Ok(loaded.total_items)
}

fn print_record(e: &Entity, locale: Locale) {
    println!(
        "id={} status={} label=\"{}\" attributes={}",
        e.id,
        e.status,
        e.status.label(locale),
        serde_json::to_string(&e.attributes).unwrap_or_default()
    );
}

// ---------------------------------------------------------------------------
// list / counts
// ---------------------------------------------------------------------------

pub async fn list(desk: &Desk, kind: EntityKind, page: u32, filter: &ListFilter) -> Result<()> {
    let total = load_page(desk, kind, page).await?;
    let predicate = filter.predicate();
    let records = match filter.sort_key() {
        Some(sort) => desk.tracker.list_sorted(kind, &predicate, &sort).await,
        None => desk.tracker.list_view(kind, &predicate).await,
    };
    for e in &records {
        print_record(e, desk.locale);
    }
    println!("shown={} backend_total={}", records.len(), total);
    Ok(())
}

pub async fn counts(desk: &Desk, kind: EntityKind, page: u32) -> Result<()> {
    load_page(desk, kind, page).await?;
    let counts = desk.tracker.tab_counts(kind).await;
    println!("all={}", counts.all);
    for (status, n) in &counts.by_status {
        println!("{}={} label=\"{}\"", status, n, status.label(desk.locale));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// act / delete
// ---------------------------------------------------------------------------

pub async fn act(desk: &Desk, req: ActRequest, confirmer: &TerminalConfirmer) -> Result<()> {
    load_page(desk, req.kind, req.page).await?;
    let id = RecordId::new(req.id);

    let meta = ActionMetadata {
        assigned_staff_id: req.staff_id,
        reason: req.reason,
    };
    let outcome = desk
        .tracker
        .perform_action(req.kind, &id, req.action, &meta, confirmer)
        .await
        .map_err(|e| {
            if let LifecycleError::IllegalTransition { kind, from, .. } = &e {
                let offered: Vec<&str> = pcm_lifecycle::taxonomy::legal_actions(*kind, *from)
                    .iter()
                    .map(|a| a.as_str())
                    .collect();
                eprintln!("legal actions from {from}: {}", offered.join(", "));
            }
            fail(e, desk.locale, req.kind, Some(&id), req.action.as_str())
        })?;

    match outcome {
        GateOutcome::Completed(record) => {
            println!("applied action={}", req.action);
            print_record(&record, desk.locale);
        }
        GateOutcome::Cancelled => println!("cancelled action={} id={}", req.action, id),
    }
    Ok(())
}

pub async fn delete(
    desk: &Desk,
    kind: EntityKind,
    id: String,
    page: u32,
    confirmer: &TerminalConfirmer,
) -> Result<()> {
    load_page(desk, kind, page).await?;
    let id = RecordId::new(id);
    if id.is_provisional() {
        bail!("'{id}' is a provisional id; nothing to delete on the backend");
    }

    match desk
        .tracker
        .delete(kind, &id, confirmer)
        .await
        .map_err(|e| fail(e, desk.locale, kind, Some(&id), "delete"))?
    {
        GateOutcome::Completed(removed) => {
            println!("deleted id={} status={}", removed.id, removed.status)
        }
        GateOutcome::Cancelled => println!("cancelled delete id={id}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_builds_conjunction() {
        let f = ListFilter {
            status: Some(Status::Processing),
            search: Some("spam".into()),
            shop_id: None,
            sort: Some("createdAt".into()),
            desc: true,
        };
        assert_eq!(
            f.predicate(),
            Predicate::And(vec![
                Predicate::Status(Status::Processing),
                Predicate::Search("spam".into())
            ])
        );
        assert_eq!(f.sort_key(), Some(SortKey::desc("createdAt")));
    }

    #[test]
    fn empty_filter_is_all() {
        let f = ListFilter {
            status: None,
            search: Some("   ".into()),
            shop_id: None,
            sort: None,
            desc: false,
        };
        assert_eq!(f.predicate(), Predicate::All);
        assert!(f.sort_key().is_none());
    }
}
