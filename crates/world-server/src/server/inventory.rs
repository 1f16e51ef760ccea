//! Inventory endpoints. The inventory lives in the account document and is
//! mirrored to `person/inventory/<personId>.json` on save and update.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use crate::account::{self, UNKNOWN_PLACER_ID};
use crate::inventory::{index_value, page_key, Inventory, InventoryUpdate};
use crate::server::error::{refusal, ApiError};
use crate::server::payload::Payload;
use crate::server::ServerState;
use crate::storage::Storage;

const INVENTORY_FIELD: &str = "inventory";

fn account_not_found() -> Response {
    refusal(StatusCode::NOT_FOUND, "Account not found")
}

fn ok() -> Response {
    Json(json!({ "ok": true })).into_response()
}

fn mirror_owner(account: &Map<String, Value>) -> &str {
    account
        .get("personId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .unwrap_or(UNKNOWN_PLACER_ID)
}

/// POST /inventory/save
pub(crate) async fn save(
    State(state): State<Arc<ServerState>>,
    Payload(body): Payload<Map<String, Value>>,
) -> Result<Response, ApiError> {
    store_update(state.storage.as_ref(), &body, false).await
}

/// POST /inventory/update
///
/// Like save, but an item replaces the one already holding the same thing.
pub(crate) async fn update(
    State(state): State<Arc<ServerState>>,
    Payload(body): Payload<Map<String, Value>>,
) -> Result<Response, ApiError> {
    store_update(state.storage.as_ref(), &body, true).await
}

async fn store_update(
    storage: &dyn Storage,
    body: &Map<String, Value>,
    replace_same_thing: bool,
) -> Result<Response, ApiError> {
    let Some(mut account) = account::load_account(storage).await? else {
        return Ok(account_not_found());
    };
    let Some(change) = InventoryUpdate::from_body(body) else {
        return Ok(refusal(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Missing ids, id or (page, inventoryItem)",
        ));
    };

    let mut inventory = Inventory::from_value(account.get(INVENTORY_FIELD));
    inventory.apply(change, replace_same_thing);
    let stored = inventory.to_value();
    let owner = mirror_owner(&account).to_string();
    account.insert(INVENTORY_FIELD.to_string(), stored.clone());
    account::save_account(storage, account).await?;
    storage.write(&["person", "inventory", &owner], &stored).await?;
    Ok(ok())
}

/// POST /inventory/delete
pub(crate) async fn delete(
    State(state): State<Arc<ServerState>>,
    Payload(body): Payload<Map<String, Value>>,
) -> Result<Response, ApiError> {
    let page = body.get("page").and_then(page_key);
    let thing_id = body
        .get("thingId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty());
    let (Some(page), Some(thing_id)) = (page, thing_id) else {
        return Ok(refusal(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Missing page or thingId",
        ));
    };

    let storage = state.storage.as_ref();
    let Some(mut account) = account::load_account(storage).await? else {
        return Ok(account_not_found());
    };
    let mut inventory = Inventory::from_value(account.get(INVENTORY_FIELD));
    let removed = inventory.remove_thing(&page, thing_id);
    tracing::debug!("removed {removed} inventory items of {thing_id} from page {page}");
    account.insert(INVENTORY_FIELD.to_string(), inventory.to_value());
    account::save_account(storage, account).await?;
    Ok(ok())
}

/// POST /inventory/move
pub(crate) async fn move_item(
    State(state): State<Arc<ServerState>>,
    Payload(body): Payload<Map<String, Value>>,
) -> Result<Response, ApiError> {
    let from_page = body.get("fromPage").and_then(page_key);
    let to_page = body.get("toPage").and_then(page_key);
    let from_index = body.get("fromIndex").and_then(index_value);
    let to_index = body.get("toIndex").and_then(index_value);
    let (Some(from_page), Some(from_index), Some(to_page), Some(to_index)) =
        (from_page, from_index, to_page, to_index)
    else {
        return Ok(refusal(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Missing fromPage, fromIndex, toPage, or toIndex",
        ));
    };

    let storage = state.storage.as_ref();
    let Some(mut account) = account::load_account(storage).await? else {
        return Ok(account_not_found());
    };
    let mut inventory = Inventory::from_value(account.get(INVENTORY_FIELD));
    if !inventory.move_item(&from_page, from_index, &to_page, to_index) {
        tracing::warn!(
            "inventory move {from_page}:{from_index} -> {to_page}:{to_index} out of range"
        );
    }
    account.insert(INVENTORY_FIELD.to_string(), inventory.to_value());
    account::save_account(storage, account).await?;
    Ok(ok())
}

/// GET /inventory/:page
///
/// The stored page when the account has one, otherwise a slice of the
/// mirrored flat id list. A missing account reads as an empty inventory.
pub(crate) async fn page(
    State(state): State<Arc<ServerState>>,
    Path(page): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let page = index_value(&Value::String(page))
        .and_then(|page| usize::try_from(page).ok())
        .unwrap_or(0);

    let storage = state.storage.as_ref();
    let account = match account::load_account(storage).await {
        Ok(account) => account.unwrap_or_default(),
        Err(error) => {
            tracing::warn!("serving an empty inventory: {error}");
            Map::new()
        }
    };
    let mirrored = match storage
        .read(&["person", "inventory", mirror_owner(&account)])
        .await
    {
        Ok(mirror) => mirror,
        Err(error) => {
            tracing::warn!("ignoring unreadable inventory mirror: {error}");
            None
        }
    };
    let flat_ids = Inventory::from_value(mirrored.as_ref())
        .ids
        .unwrap_or_default();

    let items = Inventory::from_value(account.get(INVENTORY_FIELD)).page_items(page, &flat_ids);
    tracing::debug!("inventory page {page}: {} items", items.len());
    Ok(Json(json!({ "inventoryItems": items })))
}
