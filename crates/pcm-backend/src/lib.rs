//! pcm-backend
//!
//! `RestBackend`: the live [`BackendAdapter`] over the marketplace REST API.
//!
//! | Operation     | Request                                    |
//! |---------------|--------------------------------------------|
//! | list          | `GET    {base}/{collection}?page=&pageSize=&status=&shopId=&from=&to=` |
//! | create        | `POST   {base}/{collection}`               |
//! | update        | `PUT    {base}/{collection}/{id}`          |
//! | apply_action  | `POST   {base}/{collection}/{id}/actions`  |
//! | delete        | `DELETE {base}/{collection}/{id}`          |
//!
//! A bearer token, when configured, is attached to every request. There is
//! no refresh flow: 401/403 surface as `BackendError::Auth`. The token is
//! never logged. No request is retried.

pub mod wire;

use std::time::Duration;

use async_trait::async_trait;
use pcm_lifecycle::{BackendAdapter, BackendError};
use pcm_schemas::{
    Action, ActionMetadata, Entity, EntityKind, ListPage, ListQuery, RecordId, RecordShape,
};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};
use tracing::debug;

pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

#[derive(Clone)]
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl RestBackend {
    pub fn new(base_url: impl Into<String>, token: Option<String>) -> Result<Self, BackendError> {
        Self::with_timeout(base_url, token, Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(format!("http client build failed: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    fn collection_url(&self, kind: EntityKind) -> String {
        format!("{}/{}", self.base_url, kind.collection())
    }

    fn record_url(&self, kind: EntityKind, id: &RecordId) -> String {
        format!("{}/{}/{}", self.base_url, kind.collection(), id)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let req = self.http.request(method, url);
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// Send and return the unwrapped JSON body of a 2xx answer.
    async fn send(&self, req: RequestBuilder, what: &str) -> Result<Value, BackendError> {
        let resp = req.send().await.map_err(|e| transport(what, e))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| transport(what, e))?;
        debug!(what, status, "backend response");

        if !(200..300).contains(&status) {
            return Err(BackendError::from_status(status, wire::error_message(&body)));
        }
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| BackendError::Decode(format!("{what}: {e}")))?;
        wire::unwrap_envelope(value, status)
    }
}

fn transport(what: &str, e: reqwest::Error) -> BackendError {
    if e.is_decode() {
        BackendError::Decode(format!("{what}: {e}"))
    } else if e.is_timeout() {
        BackendError::Transport(format!("{what}: timed out"))
    } else {
        BackendError::Transport(format!("{what}: {e}"))
    }
}

fn list_params(query: &ListQuery) -> Vec<(&'static str, String)> {
    let mut params = vec![
        ("page", query.page.to_string()),
        ("pageSize", query.page_size.to_string()),
    ];
    if let Some(status) = query.status {
        params.push(("status", status.as_str().to_string()));
    }
    if let Some(shop) = &query.shop_id {
        params.push(("shopId", shop.clone()));
    }
    if let Some(from) = query.from {
        params.push(("from", from.format("%Y-%m-%d").to_string()));
    }
    if let Some(to) = query.to {
        params.push(("to", to.format("%Y-%m-%d").to_string()));
    }
    params
}

#[async_trait]
impl BackendAdapter for RestBackend {
    fn name(&self) -> &'static str {
        "rest"
    }

    async fn list(
        &self,
        kind: EntityKind,
        query: &ListQuery,
    ) -> Result<ListPage<Entity>, BackendError> {
        let req = self
            .request(Method::GET, self.collection_url(kind))
            .query(&list_params(query));
        let body = self.send(req, "list").await?;
        wire::decode_page(kind, body)
    }

    async fn create(&self, shape: &RecordShape) -> Result<Entity, BackendError> {
        let kind = shape.kind();
        let req = self
            .request(Method::POST, self.collection_url(kind))
            .json(&shape.to_attributes());
        let body = self.send(req, "create").await?;
        wire::decode_record(kind, body)
    }

    async fn update(&self, entity: &Entity) -> Result<Entity, BackendError> {
        let req = self
            .request(Method::PUT, self.record_url(entity.kind, &entity.id))
            .json(&wire::encode_record(entity));
        let body = self.send(req, "update").await?;
        wire::decode_record(entity.kind, body)
    }

    async fn apply_action(
        &self,
        proposed: &Entity,
        action: Action,
        meta: &ActionMetadata,
    ) -> Result<Entity, BackendError> {
        let mut payload = json!({
            "action": action.as_str(),
            "status": proposed.status.as_str(),
        });
        if let (Value::Object(map), Ok(Value::Object(extra))) =
            (&mut payload, serde_json::to_value(meta))
        {
            map.extend(extra);
        }
        let url = format!("{}/actions", self.record_url(proposed.kind, &proposed.id));
        let req = self.request(Method::POST, url).json(&payload);
        let body = self.send(req, "apply_action").await?;
        wire::decode_record(proposed.kind, body)
    }

    async fn delete(&self, kind: EntityKind, id: &RecordId) -> Result<(), BackendError> {
        let req = self.request(Method::DELETE, self.record_url(kind, id));
        self.send(req, "delete").await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pcm_schemas::Status;

    #[test]
    fn debug_redacts_token() {
        let b = RestBackend::new("http://localhost:9/api/", Some("eyJsecret".into())).unwrap();
        let dbg = format!("{b:?}");
        assert!(!dbg.contains("eyJsecret"));
        assert!(dbg.contains("<redacted>"));
        assert_eq!(b.base_url(), "http://localhost:9/api");
    }

    #[test]
    fn blank_token_means_no_auth() {
        let b = RestBackend::new("http://localhost:9", Some("  ".into())).unwrap();
        assert!(!b.has_token());
    }

    #[test]
    fn list_params_include_only_set_filters() {
        let q = ListQuery {
            status: Some(Status::PendingApproval),
            from: NaiveDate::from_ymd_opt(2026, 3, 1),
            ..ListQuery::default()
        };
        let params = list_params(&q);
        assert!(params.contains(&("status", "pending_approval".to_string())));
        assert!(params.contains(&("from", "2026-03-01".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "shopId"));
    }
}
