//! Account and person-card endpoints: names, settings, avatar attachments
//! and gifts.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::account;
use crate::error::CoreError;
use crate::server::error::{refusal, ApiError};
use crate::server::payload::Payload;
use crate::server::{stored_document, ServerState};

/// Shortest screen name `/user/setName` accepts, in characters.
const MIN_SCREEN_NAME_CHARS: usize = 3;
/// Person-card fields `/person/updatesetting` may change.
const PERSON_SETTINGS: [&str; 3] = ["screenName", "statusText", "isFindable"];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetNameRequest {
    #[serde(default)]
    pub new_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersonRequest {
    #[serde(default)]
    pub user_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct SettingRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct AttachmentRequest {
    /// The full attachment set, as an object or its JSON text.
    #[serde(default)]
    pub attachments: Option<Value>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub data: Option<Value>,
}

/// POST /user/setName
pub(crate) async fn set_name(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<SetNameRequest>,
) -> Result<Response, ApiError> {
    let Some(new_name) = payload
        .new_name
        .filter(|name| name.chars().count() >= MIN_SCREEN_NAME_CHARS)
    else {
        return Ok(refusal(StatusCode::BAD_REQUEST, "Invalid name"));
    };
    if !account::set_screen_name(state.storage.as_ref(), &new_name).await? {
        return Ok(refusal(StatusCode::NOT_FOUND, "Account not found"));
    }
    tracing::info!("screen name changed to {new_name:?}");
    Ok(Json(json!({ "ok": true, "screenName": new_name })).into_response())
}

/// POST /gift/getreceived
pub(crate) async fn received_gifts(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<PersonRequest>,
) -> Result<Response, ApiError> {
    stored_document(&state, &["person", "gift", &payload.user_id]).await
}

/// POST /person/info
///
/// The stored person card, or a card with every relationship flag off.
pub(crate) async fn info(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<PersonRequest>,
) -> Result<Json<Value>, ApiError> {
    let card = match state
        .storage
        .read(&["person", "info", &payload.user_id])
        .await
    {
        Ok(card) => card,
        Err(CoreError::InvalidInput(_)) => None,
        Err(error) => return Err(error.into()),
    };
    Ok(Json(card.unwrap_or_else(|| {
        json!({
            "isFriend": false,
            "isEditorHere": false,
            "isListEditorHere": false,
            "isOwnerHere": false,
            "isAreaLocked": false,
            "isOnline": false,
        })
    })))
}

/// POST /person/infobasic
pub(crate) async fn info_basic() -> Json<Value> {
    Json(json!({ "isEditorHere": false }))
}

/// POST /person/updatesetting
///
/// Writes one setting onto the account's person card, creating the card
/// when it is missing.
pub(crate) async fn update_setting(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<SettingRequest>,
) -> Result<Response, ApiError> {
    let storage = state.storage.as_ref();
    let Some(account) = account::load_account(storage).await? else {
        return Ok(refusal(StatusCode::NOT_FOUND, "Account not found"));
    };
    let Some(person_id) = account
        .get("personId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
    else {
        return Ok(refusal(
            StatusCode::INTERNAL_SERVER_ERROR,
            "personId not found in account",
        ));
    };
    if !PERSON_SETTINGS.contains(&payload.name.as_str()) {
        return Ok(refusal(StatusCode::UNPROCESSABLE_ENTITY, "Invalid setting name"));
    }

    let keys = ["person", "info", person_id];
    let mut card = match storage.read(&keys).await {
        Ok(Some(Value::Object(card))) => card,
        Ok(_) => Map::new(),
        Err(error) => {
            tracing::warn!("rewriting unreadable person card {person_id}: {error}");
            Map::new()
        }
    };
    card.insert(payload.name, payload.value);
    storage.write(&keys, &Value::Object(card)).await?;
    Ok(Json(json!({ "ok": true })).into_response())
}

/// POST /person/updateattachment
///
/// Replaces every avatar attachment (`attachments`) or sets one slot
/// (`id` and `data`).
pub(crate) async fn update_attachment(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<AttachmentRequest>,
) -> Result<Response, ApiError> {
    let storage = state.storage.as_ref();
    let Some(mut account) = account::load_account(storage).await? else {
        return Ok(refusal(StatusCode::NOT_FOUND, "Account not found"));
    };
    let attachments = match updated_attachments(account.get("attachments"), payload) {
        Ok(attachments) => attachments,
        Err(message) => return Ok(refusal(StatusCode::UNPROCESSABLE_ENTITY, message)),
    };
    account.insert("attachments".to_string(), attachments);
    account::save_account(storage, account).await?;
    Ok(Json(json!({ "ok": true })).into_response())
}

/// The account's attachments after applying `request`, or the message
/// explaining why the request was rejected.
fn updated_attachments(
    current: Option<&Value>,
    request: AttachmentRequest,
) -> Result<Value, &'static str> {
    if let Some(attachments) = request.attachments {
        return match attachments {
            Value::String(raw) => {
                serde_json::from_str(&raw).map_err(|_| "attachments must be JSON or JSON string")
            }
            attachments => Ok(attachments),
        };
    }

    let (Some(slot), Some(data)) = (request.id, request.data) else {
        return Err("Missing attachments or (id,data)");
    };
    let data = match data {
        Value::String(raw) => {
            serde_json::from_str(&raw).map_err(|_| "data must be JSON string")?
        }
        data => data,
    };
    let mut slots = match current {
        Some(Value::String(raw)) => match serde_json::from_str(raw) {
            Ok(Value::Object(slots)) => slots,
            _ => Map::new(),
        },
        Some(Value::Object(slots)) => slots.clone(),
        _ => Map::new(),
    };
    let slot = match slot {
        Value::String(slot) => slot,
        other => other.to_string(),
    };
    slots.insert(slot, data);
    Ok(Value::Object(slots))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(attachments: Option<Value>, id: Option<Value>, data: Option<Value>) -> AttachmentRequest {
        AttachmentRequest {
            attachments,
            id,
            data,
        }
    }

    #[test]
    fn full_replacement_accepts_objects_and_json_text() {
        let replaced = updated_attachments(
            Some(&json!({ "1": "old" })),
            request(Some(json!("{\"2\":{\"Tid\":\"t\"}}")), None, None),
        );
        assert_eq!(replaced, Ok(json!({ "2": { "Tid": "t" } })));

        let replaced = updated_attachments(None, request(Some(json!({ "3": 1 })), None, None));
        assert_eq!(replaced, Ok(json!({ "3": 1 })));

        let rejected = updated_attachments(None, request(Some(json!("{broken")), None, None));
        assert_eq!(rejected, Err("attachments must be JSON or JSON string"));
    }

    #[test]
    fn slot_update_keeps_other_slots_even_when_stored_as_text() {
        let updated = updated_attachments(
            Some(&json!("{\"1\":\"hat\"}")),
            request(None, Some(json!(4)), Some(json!("{\"Tid\":\"shoe\"}"))),
        );
        assert_eq!(updated, Ok(json!({ "1": "hat", "4": { "Tid": "shoe" } })));

        let rejected = updated_attachments(None, request(None, Some(json!("4")), Some(json!("nope"))));
        assert_eq!(rejected, Err("data must be JSON string"));
    }

    #[test]
    fn slot_update_needs_id_and_data() {
        let rejected = updated_attachments(None, request(None, Some(json!("1")), None));
        assert_eq!(rejected, Err("Missing attachments or (id,data)"));
    }
}
