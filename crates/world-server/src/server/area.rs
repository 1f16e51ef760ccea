//! Area endpoints. These are the only handlers that touch the area index:
//! `load` and `search` read it, `create` and `save` feed it through
//! `add_entry` once the area's documents are on disk.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use area_index::{AreaIndexEntry, NewAreaEntry};

use crate::account;
use crate::area_list::{self, AreaList};
use crate::area_template::{
    empty_bundle, is_valid_bundle_key, write_new_area, EMPTY_ENVIRONMENT_CHANGERS,
};
use crate::error::CoreError;
use crate::ids::{generate_area_id, generate_bundle_key, generate_object_id};
use crate::server::error::ApiError;
use crate::server::payload::{non_empty, Payload};
use crate::server::ServerState;
use crate::storage::Storage;
use crate::utils::time::now_rfc3339;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadAreaRequest {
    pub area_id: Option<String>,
    pub area_url_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaIdRequest {
    #[serde(default)]
    pub area_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchAreasRequest {
    #[serde(default)]
    pub term: String,
    pub by_creator_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaSearchResponse {
    pub areas: Vec<AreaIndexEntry>,
    pub own_private_areas: Vec<Value>,
}

#[derive(Debug, Deserialize)]
pub struct CreateAreaRequest {
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CreatedArea {
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitAreaRequest {
    pub area_id: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSettingsRequest {
    pub area_id: Option<String>,
    /// JSON-encoded environment changer with a `Name` field.
    pub environment_changer: Option<String>,
}

/// The generic refusal the client expects for unknown or private areas.
/// Always sent with 200.
fn area_denied() -> Json<Value> {
    Json(json!({ "ok": false, "_reasonDenied": "Private", "serveTime": 13 }))
}

fn owner_flags() -> [(&'static str, Value); 9] {
    [
        ("forceEditMode", Value::Bool(true)),
        ("requestorIsEditor", Value::Bool(true)),
        ("requestorIsListEditor", Value::Bool(true)),
        ("requestorIsOwner", Value::Bool(true)),
        ("hasEditTools", Value::Bool(true)),
        ("hasEditToolsPermanently", Value::Bool(true)),
        ("editToolsExpiryDate", Value::Null),
        ("isInEditToolsTrial", Value::Bool(false)),
        ("wasEditToolsTrialEverActivated", Value::Bool(false)),
    ]
}

/// Reads `area/<collection>/<areaId>`. Ids that cannot name a document
/// read as missing.
async fn read_area_document(
    state: &ServerState,
    collection: &str,
    area_id: &str,
) -> Result<Option<Value>, ApiError> {
    match state.storage.read(&["area", collection, area_id]).await {
        Ok(document) => Ok(document),
        Err(CoreError::InvalidInput(message)) => {
            tracing::debug!("unusable area id {area_id:?}: {message}");
            Ok(None)
        }
        Err(error) => Err(error.into()),
    }
}

async fn add_to_index(state: &ServerState, entry: NewAreaEntry) -> Result<(), ApiError> {
    let index = state.index.clone();
    tokio::task::spawn_blocking(move || index.add_entry(entry))
        .await
        .map_err(|error| ApiError::internal(format!("area index task failed: {error}")))?
        .map_err(|error| ApiError::from(CoreError::from(error)))
}

/// POST /area/load
pub(crate) async fn load(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<LoadAreaRequest>,
) -> Result<Json<Value>, ApiError> {
    if let Some(area_id) = non_empty(payload.area_id) {
        return match read_area_document(&state, "load", &area_id).await? {
            Some(Value::Object(mut document)) => {
                document.extend(
                    owner_flags()
                        .into_iter()
                        .map(|(key, value)| (key.to_string(), value)),
                );
                Ok(Json(Value::Object(document)))
            }
            Some(document) => Ok(Json(document)),
            None => {
                tracing::warn!("couldn't find area {area_id} on disk");
                Ok(area_denied())
            }
        };
    }

    if let Some(url_name) = non_empty(payload.area_url_name) {
        let Some(area_id) = state.index.lookup_by_url_name(&url_name) else {
            tracing::info!("client asked to load {url_name}, not in the area index");
            return Ok(area_denied());
        };
        tracing::info!("client asked to load {url_name}, found {area_id}");
        return match read_area_document(&state, "load", &area_id).await? {
            Some(document) => Ok(Json(document)),
            None => {
                tracing::warn!("area {area_id} is indexed as {url_name} but has no load document");
                Ok(area_denied())
            }
        };
    }

    tracing::warn!("client asked for neither an areaId nor an areaUrlName");
    Ok(area_denied())
}

/// POST /area/info
pub(crate) async fn info(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<AreaIdRequest>,
) -> Result<Json<Value>, ApiError> {
    read_area_document(&state, "info", &payload.area_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("area {} not found", payload.area_id)))
}

/// POST /area/getsubareas
pub(crate) async fn subareas(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<AreaIdRequest>,
) -> Result<Json<Value>, ApiError> {
    let document = read_area_document(&state, "subareas", &payload.area_id)
        .await?
        .unwrap_or_else(|| json!({ "subAreas": [] }));
    Ok(Json(document))
}

/// POST /area/search
///
/// With `byCreatorId` this serves the creator's stored search page;
/// otherwise it is a substring search over indexed area names.
pub(crate) async fn search(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<SearchAreasRequest>,
) -> Result<Response, ApiError> {
    if let Some(creator_id) = non_empty(payload.by_creator_id) {
        let document = match state
            .storage
            .read(&["person", "areasearch", &creator_id])
            .await
        {
            Ok(Some(document)) => document,
            Ok(None) | Err(CoreError::InvalidInput(_)) => {
                json!({ "areas": [], "ownPrivateAreas": [] })
            }
            Err(error) => return Err(error.into()),
        };
        return Ok(Json(document).into_response());
    }

    let areas = state.index.search(&payload.term);
    tracing::debug!("area search {:?} matched {}", payload.term, areas.len());
    Ok(Json(AreaSearchResponse {
        areas,
        own_private_areas: Vec::new(),
    })
    .into_response())
}

/// POST /area
///
/// Writes the info, bundle, load and subareas documents for a new area,
/// then indexes it, lists it and records it as owned by the account.
pub(crate) async fn create(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<CreateAreaRequest>,
) -> Result<Json<CreatedArea>, ApiError> {
    let name = non_empty(payload.name).ok_or_else(|| ApiError::bad_request("Missing area name"))?;
    let storage = state.storage.as_ref();

    let identity = match account::load_identity(storage).await {
        Ok(Some(identity)) => identity,
        Ok(None) => return Err(ApiError::internal("Could not load valid account identity")),
        Err(error) => {
            tracing::warn!("failed to read account identity: {error}");
            return Err(ApiError::internal("Could not load valid account identity"));
        }
    };

    let area_id = generate_area_id();
    write_new_area(storage, &area_id, &name, &identity).await?;

    add_to_index(
        &state,
        NewAreaEntry {
            id: area_id.clone(),
            name: name.clone(),
            description: None,
        },
    )
    .await?;

    area_list::record_created_area(storage, &area_id, &name).await?;
    if let Err(error) = account::add_owned_area(storage, &area_id).await {
        tracing::warn!("could not record {area_id} as owned by the account: {error}");
    }

    tracing::info!("created area {area_id} ({name})");
    Ok(Json(CreatedArea { id: area_id }))
}

/// POST /area/save
///
/// Stores the client's load document as sent, except that `creatorId`
/// follows the local account. A named area also gets an info document (if
/// it has none yet) so that directory rebuilds keep finding it.
pub(crate) async fn save(
    State(state): State<Arc<ServerState>>,
    Payload(mut body): Payload<Map<String, Value>>,
) -> Result<Json<Value>, ApiError> {
    let storage = state.storage.as_ref();
    let area_id = body
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .unwrap_or_else(generate_object_id);

    if let Some(person_id) = account::person_id(storage).await {
        body.insert("creatorId".to_string(), Value::String(person_id));
    }
    let text_field = |field: &str| {
        body.get(field)
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    };
    let name = text_field("name");
    let description = text_field("description");

    storage
        .write(&["area", "load", &area_id], &Value::Object(body))
        .await?;

    match name {
        Some(name) => {
            let info_keys = ["area", "info", area_id.as_str()];
            if !storage.exists(&info_keys).await? {
                let mut info = json!({ "name": name, "creationDate": now_rfc3339() });
                if let Some(description) = &description {
                    info["description"] = Value::String(description.clone());
                }
                storage.write(&info_keys, &info).await?;
            }
            add_to_index(
                &state,
                NewAreaEntry {
                    id: area_id.clone(),
                    name,
                    description,
                },
            )
            .await?;
        }
        None => tracing::warn!("saved area {area_id} has no name, not indexing it"),
    }

    Ok(Json(json!({ "ok": true, "id": area_id })))
}

/// POST /area/lists
pub(crate) async fn lists(State(state): State<Arc<ServerState>>) -> Result<Json<AreaList>, ApiError> {
    Ok(Json(area_list::load_area_list(state.storage.as_ref()).await?))
}

/// POST /area/visit
pub(crate) async fn visit(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<VisitAreaRequest>,
) -> Result<Json<Value>, ApiError> {
    let (Some(area_id), Some(name)) = (non_empty(payload.area_id), non_empty(payload.name)) else {
        return Err(ApiError::bad_request("Missing data"));
    };
    area_list::record_visit(state.storage.as_ref(), &area_id, &name).await?;
    Ok(Json(json!({ "ok": true })))
}

/// POST /area/updatesettings
pub(crate) async fn update_settings(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<UpdateSettingsRequest>,
) -> Result<Json<Value>, ApiError> {
    let area_id = non_empty(payload.area_id).ok_or_else(|| ApiError::bad_request("Missing areaId"))?;
    let Some(mut document) = read_area_document(&state, "load", &area_id).await? else {
        return Err(ApiError::not_found("Area not found"));
    };

    if let Some(raw) = non_empty(payload.environment_changer) {
        merge_environment_changer(&mut document, &raw).map_err(|message| {
            tracing::warn!("rejected environment changer for {area_id}: {message}");
            ApiError::bad_request(message)
        })?;
    }

    state
        .storage
        .write(&["area", "load", &area_id], &document)
        .await?;
    Ok(Json(json!({ "ok": true })))
}

/// GET /repair-home-area
///
/// Gives the account's home area a fresh, empty bundle when its bundle file
/// is missing or its key is malformed.
pub(crate) async fn repair_home_area(State(state): State<Arc<ServerState>>) -> Response {
    match repair_home_bundle(state.storage.as_ref()).await {
        Ok(response) => response,
        Err(error) => {
            tracing::error!("home area repair failed: {error}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Server error during repair").into_response()
        }
    }
}

async fn repair_home_bundle(storage: &dyn Storage) -> Result<Response, CoreError> {
    let Some(home_id) = account::home_area_id(storage).await? else {
        return Ok((StatusCode::BAD_REQUEST, "No homeAreaId found").into_response());
    };
    let Some(Value::Object(mut load)) = storage.read(&["area", "load", &home_id]).await? else {
        return Ok((StatusCode::NOT_FOUND, "Home area load file missing").into_response());
    };

    let current_key = load
        .get("areaKey")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let bundle_exists = is_valid_bundle_key(&current_key)
        && storage
            .exists(&["area", "bundle", &home_id, &current_key])
            .await?;
    if bundle_exists {
        return Ok((StatusCode::OK, "Home area is already valid").into_response());
    }

    let new_key = generate_bundle_key();
    storage
        .write(&["area", "bundle", &home_id, &new_key], &empty_bundle())
        .await?;
    load.insert("areaKey".to_string(), Value::String(new_key.clone()));
    storage
        .write(&["area", "load", &home_id], &Value::Object(load))
        .await?;
    tracing::info!("repaired home area {home_id} with bundle key {new_key}");
    Ok((
        StatusCode::OK,
        format!("Repaired home area with new key: {new_key}"),
    )
        .into_response())
}

/// Adds `raw` to the load document's `environmentChangersJSON`, replacing
/// any changer with the same `Name`.
fn merge_environment_changer(document: &mut Value, raw: &str) -> Result<(), String> {
    let changer: Value = serde_json::from_str(raw)
        .map_err(|error| format!("Invalid environmentChanger JSON: {error}"))?;
    let fields = document
        .as_object_mut()
        .ok_or_else(|| "area load document is not an object".to_string())?;

    let current = fields
        .get("environmentChangersJSON")
        .and_then(Value::as_str)
        .unwrap_or(EMPTY_ENVIRONMENT_CHANGERS);
    let mut current: Value = serde_json::from_str(current)
        .map_err(|error| format!("Invalid stored environmentChangersJSON: {error}"))?;
    let container = current
        .as_object_mut()
        .ok_or_else(|| "stored environmentChangersJSON is not an object".to_string())?;
    let changers = container
        .entry("environmentChangers")
        .or_insert_with(|| Value::Array(Vec::new()));
    let Value::Array(changers) = changers else {
        return Err("stored environmentChangers is not an array".to_string());
    };

    let name = changer.get("Name").cloned();
    match changers
        .iter_mut()
        .find(|existing| existing.get("Name").cloned() == name)
    {
        Some(existing) => *existing = changer,
        None => changers.push(changer),
    }

    fields.insert(
        "environmentChangersJSON".to_string(),
        Value::String(current.to_string()),
    );
    Ok(())
}
