//! Thing (placeable object) lookups, creation, renames and search.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::account;
use crate::error::CoreError;
use crate::ids::generate_object_id;
use crate::inventory::index_value;
use crate::server::error::{refusal, ApiError};
use crate::server::payload::{non_empty, Payload};
use crate::server::{stored_document, ServerState};
use crate::storage::Storage;

/// Search results are served in pages of this size.
const SEARCH_PAGE_SIZE: usize = 20;
/// Default number of ids returned by the top-things lookups.
const TOP_THINGS_LIMIT: usize = 4;
/// Fields `/thing/updateInfo` may change.
const UPDATABLE_INFO_FIELDS: [&str; 3] = ["name", "isUnlisted", "allCreatorsThingsClonable"];

#[derive(Debug, Deserialize)]
pub struct ThingIdRequest {
    #[serde(default)]
    pub id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaggedThingRequest {
    #[serde(default)]
    pub thing_id: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateThingRequest {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameThingRequest {
    #[serde(default)]
    pub thing_id: Option<String>,
    #[serde(default)]
    pub new_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateThingInfoRequest {
    #[serde(default)]
    pub thing_id: String,
    /// An object, or its JSON text when posted as a form.
    #[serde(default)]
    pub updates: Value,
}

#[derive(Debug, Default, Deserialize)]
pub struct ThingSearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub page: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TopThingsRequest {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub limit: Option<Value>,
}

async fn read_thing_document(
    state: &ServerState,
    collection: &str,
    thing_id: &str,
) -> Result<Option<Value>, ApiError> {
    match state.storage.read(&["thing", collection, thing_id]).await {
        Ok(document) => Ok(document),
        Err(CoreError::InvalidInput(_)) => Ok(None),
        Err(error) => Err(error.into()),
    }
}

/// Reads a thing document for rewriting. Unreadable or non-object
/// documents count as missing.
async fn read_thing_object(
    storage: &dyn Storage,
    collection: &str,
    thing_id: &str,
) -> Option<Map<String, Value>> {
    match storage.read(&["thing", collection, thing_id]).await {
        Ok(Some(Value::Object(document))) => Some(document),
        Ok(_) => None,
        Err(error) => {
            tracing::warn!("failed to read thing/{collection}/{thing_id}: {error}");
            None
        }
    }
}

fn not_found_ok_false() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "ok": false }))).into_response()
}

/// POST /thing/info
pub(crate) async fn info(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<ThingIdRequest>,
) -> Result<Response, ApiError> {
    let Some(info) = read_thing_document(&state, "info", &payload.id).await? else {
        return Ok(not_found_ok_false());
    };
    let field = |name: &str| info.get(name).cloned().unwrap_or(Value::Null);
    Ok(Json(json!({
        "id": field("id"),
        "vertexCount": field("vertexCount"),
        "createdAt": field("createdAt"),
    }))
    .into_response())
}

/// POST /thing/definition and /thing/definitionAreaBundle
pub(crate) async fn definition(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<ThingIdRequest>,
) -> Result<Response, ApiError> {
    let Some(mut info) = read_thing_document(&state, "info", &payload.id).await? else {
        return Ok(not_found_ok_false());
    };
    let definition = info
        .get_mut("definition")
        .map(Value::take)
        .unwrap_or(Value::Null);
    Ok(Json(definition).into_response())
}

/// GET /thing/info/:id
pub(crate) async fn raw_info(
    State(state): State<Arc<ServerState>>,
    Path(thing_id): Path<String>,
) -> Result<Response, ApiError> {
    raw_document(&state, "info", &thing_id).await
}

/// GET /thing/def/:id and /thing/sl/tdef/:id
pub(crate) async fn raw_definition(
    State(state): State<Arc<ServerState>>,
    Path(thing_id): Path<String>,
) -> Result<Response, ApiError> {
    raw_document(&state, "def", &thing_id).await
}

/// POST /thing/gettags
pub(crate) async fn tags(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<TaggedThingRequest>,
) -> Result<Response, ApiError> {
    raw_document(&state, "tags", &payload.thing_id).await
}

async fn raw_document(
    state: &ServerState,
    collection: &str,
    thing_id: &str,
) -> Result<Response, ApiError> {
    stored_document(state, &["thing", collection, thing_id]).await
}

/// POST /thing
pub(crate) async fn create(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<CreateThingRequest>,
) -> Result<Json<Value>, ApiError> {
    let creator = account::placer_identity(state.storage.as_ref()).await;
    let thing_id = generate_object_id();
    let info = json!({
        "id": thing_id,
        "name": payload.name,
        "creatorId": creator.person_id,
        "creatorName": creator.screen_name,
        "createdDaysAgo": 0,
        "collectedCount": 0,
        "placedCount": 1,
        "allCreatorsThingsClonable": true,
        "isUnlisted": false,
    });
    state.storage.write(&["thing", "info", &thing_id], &info).await?;
    tracing::info!("created thing {thing_id} for {}", creator.screen_name);
    Ok(Json(json!({ "id": thing_id })))
}

/// POST /thing/rename
///
/// Renames the info and definition documents, swaps the old name for the
/// new one in the thing's tags and renames every placement of the thing.
pub(crate) async fn rename(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<RenameThingRequest>,
) -> Result<Response, ApiError> {
    let thing_id = non_empty(payload.thing_id);
    let new_name = non_empty(payload.new_name);
    let (Some(thing_id), Some(new_name)) = (thing_id, new_name) else {
        return Ok(refusal(StatusCode::BAD_REQUEST, "Invalid input"));
    };
    let storage = state.storage.as_ref();
    let Some(mut info) = read_thing_object(storage, "info", &thing_id).await else {
        return Ok(refusal(StatusCode::NOT_FOUND, "Thing not found"));
    };

    let old_name = info.insert("name".to_string(), Value::String(new_name.clone()));
    storage
        .write(&["thing", "info", &thing_id], &Value::Object(info))
        .await?;

    if let Some(mut definition) = read_thing_object(storage, "def", &thing_id).await {
        definition.insert("name".to_string(), Value::String(new_name.clone()));
        storage
            .write(&["thing", "def", &thing_id], &Value::Object(definition))
            .await?;
    }

    if let (Some(mut tags), Some(Value::String(old_name))) =
        (read_thing_object(storage, "tags", &thing_id).await, old_name)
    {
        if rename_tag(&mut tags, &old_name, &new_name) {
            storage
                .write(&["thing", "tags", &thing_id], &Value::Object(tags))
                .await?;
        }
    }

    let renamed = rename_placements(storage, &thing_id, &new_name).await?;
    tracing::info!("renamed thing {thing_id} to {new_name:?} ({renamed} placements)");
    Ok(Json(json!({ "ok": true, "name": new_name })).into_response())
}

/// Replaces `old_name` in the `tags` array. Returns whether anything changed.
fn rename_tag(tags: &mut Map<String, Value>, old_name: &str, new_name: &str) -> bool {
    let Some(Value::Array(tags)) = tags.get_mut("tags") else {
        return false;
    };
    let mut changed = false;
    for tag in tags.iter_mut().filter(|tag| tag.as_str() == Some(old_name)) {
        *tag = Value::String(new_name.to_string());
        changed = true;
    }
    changed
}

/// Sets `name` on every `placement/info/<area>/<placement>` document of the
/// thing. Unreadable placement documents are skipped.
async fn rename_placements(
    storage: &dyn Storage,
    thing_id: &str,
    new_name: &str,
) -> Result<usize, CoreError> {
    let mut renamed = 0;
    for area_id in storage.list_collections(&["placement", "info"]).await? {
        for placement_id in storage
            .list_documents(&["placement", "info", &area_id])
            .await?
        {
            let keys = ["placement", "info", area_id.as_str(), placement_id.as_str()];
            let mut placement = match storage.read(&keys).await {
                Ok(Some(Value::Object(placement))) => placement,
                Ok(_) => continue,
                Err(error) => {
                    tracing::warn!("skipping placement {area_id}/{placement_id}: {error}");
                    continue;
                }
            };
            if placement.get("Tid").and_then(Value::as_str) != Some(thing_id) {
                continue;
            }
            placement.insert("name".to_string(), Value::String(new_name.to_string()));
            storage.write(&keys, &Value::Object(placement)).await?;
            renamed += 1;
        }
    }
    Ok(renamed)
}

/// POST /thing/updateInfo
pub(crate) async fn update_info(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<UpdateThingInfoRequest>,
) -> Result<Response, ApiError> {
    let storage = state.storage.as_ref();
    let Some(mut info) = read_thing_object(storage, "info", &payload.thing_id).await else {
        return Ok(refusal(StatusCode::NOT_FOUND, "Thing not found"));
    };
    let updates = match payload.updates {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::Null),
        updates => updates,
    };
    apply_info_updates(&mut info, &updates);
    let info = Value::Object(info);
    storage
        .write(&["thing", "info", &payload.thing_id], &info)
        .await?;
    Ok(Json(json!({ "ok": true, "updated": info })).into_response())
}

/// Copies the updatable fields present in `updates` onto `info`.
fn apply_info_updates(info: &mut Map<String, Value>, updates: &Value) {
    let Value::Object(updates) = updates else {
        return;
    };
    for field in UPDATABLE_INFO_FIELDS {
        if let Some(value) = updates.get(field) {
            info.insert(field.to_string(), value.clone());
        }
    }
}

/// POST /thing/search
///
/// Placed, listed things whose name (or, failing that, one of whose tags)
/// contains the query, case-insensitively. An empty query matches all.
pub(crate) async fn search(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<ThingSearchRequest>,
) -> Result<Json<Value>, ApiError> {
    let term = payload
        .query
        .as_deref()
        .map(|query| query.trim().to_lowercase())
        .unwrap_or_default();
    let page = payload
        .page
        .as_ref()
        .and_then(index_value)
        .and_then(|page| usize::try_from(page).ok())
        .unwrap_or(0);

    let storage = state.storage.as_ref();
    let mut matched = Vec::new();
    for thing_id in storage.list_documents(&["thing", "info"]).await? {
        let Some(info) = read_thing_object(storage, "info", &thing_id).await else {
            continue;
        };
        if !listed_in_search(&info) {
            continue;
        }
        if name_matches(&info, &term) {
            matched.push(thing_id);
            continue;
        }
        let tags = read_thing_object(storage, "tags", &thing_id).await;
        if tags.is_some_and(|tags| tags_match(&tags, &term)) {
            matched.push(thing_id);
        }
    }

    tracing::debug!("thing search {term:?}: {} matches", matched.len());
    let ids: Vec<String> = matched
        .into_iter()
        .skip(page.saturating_mul(SEARCH_PAGE_SIZE))
        .take(SEARCH_PAGE_SIZE)
        .collect();
    Ok(Json(json!({ "ids": ids })))
}

fn listed_in_search(info: &Map<String, Value>) -> bool {
    let placed = info
        .get("placedCount")
        .and_then(Value::as_f64)
        .is_some_and(|count| count > 0.0);
    let unlisted = info.get("isUnlisted").and_then(Value::as_bool) == Some(true);
    placed && !unlisted
}

fn name_matches(info: &Map<String, Value>, term: &str) -> bool {
    let name = info
        .get("name")
        .and_then(Value::as_str)
        .map(|name| name.trim().to_lowercase())
        .unwrap_or_else(|| "thing".to_string());
    name.contains(term)
}

fn tags_match(tags: &Map<String, Value>, term: &str) -> bool {
    let Some(Value::Array(tags)) = tags.get("tags") else {
        return false;
    };
    tags.iter()
        .filter_map(Value::as_str)
        .any(|tag| tag.to_lowercase().contains(term))
}

/// POST /thing/fixmissinginfo
///
/// Writes a minimal info document for every definition that has none.
pub(crate) async fn fix_missing_info(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Value>, ApiError> {
    let storage = state.storage.as_ref();
    let mut created = 0;
    for thing_id in storage.list_documents(&["thing", "def"]).await? {
        if storage.exists(&["thing", "info", &thing_id]).await? {
            continue;
        }
        let Some(definition) = read_thing_object(storage, "def", &thing_id).await else {
            continue;
        };
        let name = ["name", "n"]
            .iter()
            .find_map(|field| definition.get(*field).and_then(Value::as_str))
            .filter(|name| !name.is_empty())
            .unwrap_or("thing");
        let info = json!({
            "name": name,
            "creatorId": "system",
            "creatorName": "system",
            "isUnlisted": false,
        });
        storage.write(&["thing", "info", &thing_id], &info).await?;
        tracing::info!("created missing info for thing {thing_id} ({name:?})");
        created += 1;
    }
    Ok(Json(json!({ "ok": true, "created": created })))
}

/// POST /thing/flagStatus
pub(crate) async fn flag_status() -> Json<Value> {
    Json(json!({ "flagged": false }))
}

/// POST /thing/getflag
pub(crate) async fn flag() -> Json<Value> {
    Json(json!({ "isFlagged": false }))
}

/// POST /thing/topby
pub(crate) async fn top_by(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<TopThingsRequest>,
) -> Result<Json<Value>, ApiError> {
    let limit = payload
        .limit
        .as_ref()
        .and_then(index_value)
        .and_then(|limit| usize::try_from(limit).ok())
        .filter(|limit| *limit > 0)
        .unwrap_or(TOP_THINGS_LIMIT);
    top_things(&state, &payload.id, limit).await
}

/// POST /thing/topCreatedByPerson
pub(crate) async fn top_created_by_person(
    State(state): State<Arc<ServerState>>,
    Payload(payload): Payload<ThingIdRequest>,
) -> Result<Json<Value>, ApiError> {
    top_things(&state, &payload.id, TOP_THINGS_LIMIT).await
}

async fn top_things(
    state: &ServerState,
    person_id: &str,
    limit: usize,
) -> Result<Json<Value>, ApiError> {
    let document = match state.storage.read(&["person", "topby", person_id]).await {
        Ok(document) => document,
        Err(CoreError::InvalidInput(_)) => None,
        Err(error) => return Err(error.into()),
    };
    let ids: Vec<Value> = match document.as_ref().and_then(|document| document.get("ids")) {
        Some(Value::Array(ids)) => ids.iter().take(limit).cloned().collect(),
        _ => Vec::new(),
    };
    Ok(Json(json!({ "ids": ids })))
}
