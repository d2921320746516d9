//! JSON wire shapes of the marketplace REST backend.
//!
//! Records travel flat: `{"id": ..., "status": ..., <attributes>}`. The kind
//! is implied by the collection path and never appears in the body. Mutate
//! endpoints may wrap their answer in `{"success": bool, "message": ...,
//! "data": ...}`; a `success: false` body is a rejection even on HTTP 2xx.

use pcm_lifecycle::BackendError;
use pcm_schemas::{Attributes, Entity, EntityKind, ErrorEnvelope, ListPage, RecordId, Status};
use serde::Deserialize;
use serde_json::{Map, Value};

/// Flatten a record for a request body.
pub fn encode_record(entity: &Entity) -> Value {
    let mut map: Map<String, Value> = entity
        .attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    map.insert("id".to_string(), Value::String(entity.id.to_string()));
    map.insert(
        "status".to_string(),
        Value::String(entity.status.as_str().to_string()),
    );
    Value::Object(map)
}

/// Rebuild a record of `kind` from a flat JSON object.
pub fn decode_record(kind: EntityKind, value: Value) -> Result<Entity, BackendError> {
    let Value::Object(mut map) = value else {
        return Err(BackendError::Decode(format!("{kind} record is not an object")));
    };

    let id = match map.remove("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => s,
        Some(Value::Number(n)) => n.to_string(),
        _ => return Err(BackendError::Decode(format!("{kind} record has no id"))),
    };
    let status = match map.remove("status") {
        Some(Value::String(s)) => s
            .parse::<Status>()
            .map_err(|e| BackendError::Decode(format!("{kind} '{id}': {e}")))?,
        _ => {
            return Err(BackendError::Decode(format!(
                "{kind} '{id}' has no status"
            )))
        }
    };
    // A stray "kind" field is ours, not an attribute.
    map.remove("kind");

    let attributes: Attributes = map.into_iter().collect();
    Ok(Entity {
        id: RecordId::new(id),
        kind,
        status,
        attributes,
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPage {
    items: Vec<Value>,
    total_items: u64,
    page: u32,
    page_size: u32,
}

pub fn decode_page(kind: EntityKind, value: Value) -> Result<ListPage<Entity>, BackendError> {
    let raw: RawPage = serde_json::from_value(unwrap_envelope(value, 200)?)
        .map_err(|e| BackendError::Decode(format!("{kind} list page: {e}")))?;
    let items = raw
        .items
        .into_iter()
        .map(|v| decode_record(kind, v))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ListPage {
        items,
        total_items: raw.total_items,
        page: raw.page,
        page_size: raw.page_size,
    })
}

/// Strip the optional `{success, message, data}` wrapper. `success: false`
/// becomes `Validation` carrying the HTTP `status` it arrived with.
pub fn unwrap_envelope(value: Value, status: u16) -> Result<Value, BackendError> {
    let Value::Object(mut map) = value else {
        return Ok(value);
    };
    match map.get("success") {
        Some(Value::Bool(false)) => {
            let message = map
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("rejected")
                .to_string();
            Err(BackendError::Validation { status, message })
        }
        Some(Value::Bool(true)) => Ok(map.remove("data").unwrap_or(Value::Null)),
        _ => Ok(Value::Object(map)),
    }
}

/// Best-effort message from an error body.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) if !env.message.is_empty() => env.message,
        _ if body.trim().is_empty() => "no body".to_string(),
        _ => body.trim().chars().take(200).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decode_pulls_id_and_status_out_of_attributes() {
        let e = decode_record(
            EntityKind::Order,
            json!({"id": "o-1", "status": "in_progress", "petName": "Mochi", "price": 250000}),
        )
        .unwrap();
        assert_eq!(e.id.as_str(), "o-1");
        assert_eq!(e.status, Status::InProgress);
        assert_eq!(e.attr_str("petName"), Some("Mochi"));
        assert!(e.attr("id").is_none());
        assert!(e.attr("status").is_none());
    }

    #[test]
    fn numeric_ids_are_accepted() {
        let e = decode_record(EntityKind::User, json!({"id": 42, "status": "active"})).unwrap();
        assert_eq!(e.id.as_str(), "42");
    }

    #[test]
    fn localized_status_label_is_not_a_status() {
        let err = decode_record(EntityKind::Order, json!({"id": "o-1", "status": "Đã hủy"}))
            .unwrap_err();
        assert!(matches!(err, BackendError::Decode(_)));
    }

    #[test]
    fn encode_then_decode_keeps_attributes() {
        let e = Entity::new("s-1", EntityKind::Store, Status::Suspended)
            .with_attr("name", "Pet Spa")
            .with_attr("rating", 4.5);
        assert_eq!(decode_record(EntityKind::Store, encode_record(&e)).unwrap(), e);
    }

    #[test]
    fn success_false_is_validation_even_on_2xx() {
        let err = unwrap_envelope(json!({"success": false, "message": "slot taken"}), 200)
            .unwrap_err();
        assert_eq!(
            err,
            BackendError::Validation {
                status: 200,
                message: "slot taken".into()
            }
        );
    }

    #[test]
    fn success_true_unwraps_data() {
        let v = unwrap_envelope(json!({"success": true, "data": {"id": "x"}}), 200).unwrap();
        assert_eq!(v, json!({"id": "x"}));
        let bare = unwrap_envelope(json!({"id": "y"}), 200).unwrap();
        assert_eq!(bare, json!({"id": "y"}));
    }

    #[test]
    fn error_message_prefers_envelope() {
        assert_eq!(error_message(r#"{"success":false,"message":"bad phone"}"#), "bad phone");
        assert_eq!(error_message("upstream timeout"), "upstream timeout");
        assert_eq!(error_message(""), "no body");
    }
}
