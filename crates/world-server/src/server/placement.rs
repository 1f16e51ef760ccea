//! Placement endpoints. Each placement is stored as
//! `placement/info/<areaId>/<placementId>.json` and mirrored into the
//! `placements` array of the area's load document.

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::account::{self, AccountIdentity};
use crate::error::CoreError;
use crate::server::error::ApiError;
use crate::server::payload::{OneOrMany, Payload};
use crate::server::ServerState;
use crate::storage::Storage;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementRequest {
    #[serde(default)]
    pub area_id: String,
    #[serde(default)]
    pub placement_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaPlacementsRequest {
    #[serde(default)]
    pub area_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementUpsertRequest {
    #[serde(default)]
    pub area_id: String,
    /// URI-encoded placement JSON carrying an `Id`.
    #[serde(default)]
    pub placement: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacementSaveRequest {
    #[serde(default)]
    pub area_id: String,
    #[serde(default)]
    pub placement_id: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePlacementsRequest {
    #[serde(default)]
    pub area_id: String,
    #[serde(default)]
    pub placements: OneOrMany<String>,
}

fn ok() -> Json<Value> {
    Json(json!({ "ok": true }))
}

fn placement_keys<'a>(area_id: &'a str, placement_id: &'a str) -> [&'a str; 4] {
    ["placement", "info", area_id, placement_id]
}

/// Decodes a URI-encoded placement and returns it with its `Id`.
fn decode_placement(encoded: &str) -> Result<(String, Map<String, Value>), ApiError> {
    let decoded = urlencoding::decode(encoded)
        .map_err(|error| ApiError::bad_request(format!("placement is not URI-encoded UTF-8: {error}")))?;
    let placement: Map<String, Value> = serde_json::from_str(&decoded)
        .map_err(|error| ApiError::bad_request(format!("invalid placement JSON: {error}")))?;
    let id = placement
        .get("Id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ApiError::bad_request("placement has no Id"))?;
    Ok((id, placement))
}

fn stamp_placer(placement: &mut Map<String, Value>, placer: &AccountIdentity) {
    placement.insert("placerId".to_string(), Value::String(placer.person_id.clone()));
    placement.insert(
        "placerName".to_string(),
        Value::String(placer.screen_name.clone()),
    );
}

/// An area's load document with its `placements` array split out.
struct AreaPlacements {
    document: Map<String, Value>,
    placements: Vec<Value>,
}

impl AreaPlacements {
    /// Falls back to a bare `{areaId}` document when the load document is
    /// missing or unreadable. A non-array `placements` reads as empty.
    async fn load(storage: &dyn Storage, area_id: &str) -> Self {
        let document = match storage.read(&["area", "load", area_id]).await {
            Ok(Some(Value::Object(document))) => Some(document),
            Ok(_) => None,
            Err(error) => {
                tracing::warn!("unreadable load document for {area_id}: {error}");
                None
            }
        };
        let mut document = document.unwrap_or_else(|| {
            let mut fresh = Map::new();
            fresh.insert("areaId".to_string(), Value::String(area_id.to_string()));
            fresh
        });
        let placements = match document.remove("placements") {
            Some(Value::Array(placements)) => placements,
            _ => Vec::new(),
        };
        Self {
            document,
            placements,
        }
    }

    fn remove(&mut self, placement_id: &str) {
        self.placements
            .retain(|existing| placement_id_of(existing) != Some(placement_id));
    }

    async fn save(mut self, storage: &dyn Storage, area_id: &str) -> Result<(), ApiError> {
        self.document
            .insert("placements".to_string(), Value::Array(self.placements));
        storage
            .write(&["area", "load", area_id], &Value::Object(self.document))
            .await
            .map_err(Into::into)
    }
}

fn placement_id_of(placement: &Value) -> Option<&str> {
    placement.get("Id").and_then(Value::as_str)
}

/// POST /placement/info, /placement/metadata
pub(crate) async fn info(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<PlacementRequest>,
) -> Result<Response, ApiError> {
    placement_metadata(&state, &payload.area_id, &payload.placement_id).await
}

/// POST /placement/list
pub(crate) async fn list(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<AreaPlacementsRequest>,
) -> Result<Response, ApiError> {
    placement_metadata(&state, &payload.area_id, "").await
}

async fn placement_metadata(
    state: &ServerState,
    area_id: &str,
    placement_id: &str,
) -> Result<Response, ApiError> {
    let placement = match state
        .storage
        .read(&placement_keys(area_id, placement_id))
        .await
    {
        Ok(Some(placement)) => placement,
        Ok(None) | Err(CoreError::InvalidInput(_)) => {
            return Ok((StatusCode::NOT_FOUND, Json(json!({ "ok": false }))).into_response())
        }
        Err(error) => return Err(error.into()),
    };

    let text = |field: &str, fallback: &str| {
        placement
            .get(field)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .unwrap_or(fallback)
            .to_string()
    };
    let placed_days_ago = placement
        .get("placedDaysAgo")
        .filter(|value| value.is_number())
        .cloned()
        .unwrap_or(json!(0));

    Ok(Json(json!({
        "placerId": text("placerId", account::UNKNOWN_PLACER_ID),
        "placerName": text("placerName", account::ANONYMOUS_PLACER_NAME),
        "placedDaysAgo": placed_days_ago,
    }))
    .into_response())
}

/// POST /placement/new
pub(crate) async fn create(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<PlacementUpsertRequest>,
) -> Result<Json<Value>, ApiError> {
    upsert_placement(&state, payload, true).await?;
    Ok(ok())
}

/// POST /placement/update
pub(crate) async fn update(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<PlacementUpsertRequest>,
) -> Result<Json<Value>, ApiError> {
    upsert_placement(&state, payload, false).await?;
    Ok(ok())
}

async fn upsert_placement(
    state: &ServerState,
    payload: PlacementUpsertRequest,
    is_new: bool,
) -> Result<(), ApiError> {
    let storage = state.storage.as_ref();
    let (placement_id, mut placement) = decode_placement(&payload.placement)?;
    stamp_placer(&mut placement, &account::placer_identity(storage).await);
    if is_new {
        placement.insert("placedDaysAgo".to_string(), json!(0));
    }
    let placement = Value::Object(placement);

    storage
        .write(&placement_keys(&payload.area_id, &placement_id), &placement)
        .await?;

    let mut area = AreaPlacements::load(storage, &payload.area_id).await;
    area.remove(&placement_id);
    area.placements.push(placement);
    area.save(storage, &payload.area_id).await
}

/// POST /placement/save
///
/// Stores `data` as the placement document. Missing fields answer 200 with
/// `ok: false`, as the client expects.
pub(crate) async fn save(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<PlacementSaveRequest>,
) -> Result<Json<Value>, ApiError> {
    let data = match payload.data {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::Null),
        other => other,
    };
    let mut data = match data {
        Value::Object(data) if !payload.area_id.is_empty() && !payload.placement_id.is_empty() => {
            data
        }
        _ => {
            tracing::warn!("missing required placement fields");
            return Ok(Json(json!({ "ok": false, "error": "Invalid placement data" })));
        }
    };

    let storage = state.storage.as_ref();
    stamp_placer(&mut data, &account::placer_identity(storage).await);
    storage
        .write(
            &placement_keys(&payload.area_id, &payload.placement_id),
            &Value::Object(data),
        )
        .await?;
    Ok(ok())
}

/// POST /placement/delete
pub(crate) async fn delete(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<PlacementRequest>,
) -> Result<Json<Value>, ApiError> {
    let storage = state.storage.as_ref();
    match storage
        .delete(&placement_keys(&payload.area_id, &payload.placement_id))
        .await
    {
        Ok(true) => {}
        Ok(false) => tracing::debug!(
            "placement {}/{} had no document",
            payload.area_id,
            payload.placement_id
        ),
        Err(error) => tracing::warn!("failed to delete placement document: {error}"),
    }

    let mut area = AreaPlacements::load(storage, &payload.area_id).await;
    area.remove(&payload.placement_id);
    area.save(storage, &payload.area_id).await?;
    Ok(ok())
}

/// Keeps the transform fields of a duplicated placement, filling scale,
/// attributes and data with their defaults.
fn duplicate_copy(mut source: Map<String, Value>, placer: &AccountIdentity) -> Value {
    let mut field = |name: &str, fallback: Value| {
        source
            .remove(name)
            .filter(|value| !value.is_null())
            .unwrap_or(fallback)
    };
    json!({
        "Id": field("Id", Value::Null),
        "Tid": field("Tid", Value::Null),
        "P": field("P", Value::Null),
        "R": field("R", Value::Null),
        "S": field("S", json!({ "x": 1, "y": 1, "z": 1 })),
        "A": field("A", json!([])),
        "D": field("D", json!({})),
        "placerId": placer.person_id,
        "placerName": placer.screen_name,
        "placedDaysAgo": 0,
    })
}

/// POST /placement/duplicate
pub(crate) async fn duplicate(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<DuplicatePlacementsRequest>,
) -> Result<Json<Value>, ApiError> {
    let storage = state.storage.as_ref();
    let placer = account::placer_identity(storage).await;

    let mut copies = Vec::new();
    for encoded in payload.placements.into_vec() {
        let (placement_id, source) = decode_placement(&encoded)?;
        copies.push((placement_id, duplicate_copy(source, &placer)));
    }

    for (placement_id, copy) in &copies {
        storage
            .write(&placement_keys(&payload.area_id, placement_id), copy)
            .await?;
    }

    let mut area = AreaPlacements::load(storage, &payload.area_id).await;
    let mut known: HashSet<String> = area
        .placements
        .iter()
        .filter_map(placement_id_of)
        .map(str::to_string)
        .collect();
    let count = copies.len();
    for (placement_id, copy) in copies {
        if known.insert(placement_id) {
            area.placements.push(copy);
        }
    }
    area.save(storage, &payload.area_id).await?;

    Ok(Json(json!({ "ok": true, "count": count })))
}
