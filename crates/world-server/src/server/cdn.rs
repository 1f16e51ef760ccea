//! Static-content routers served on their own ports: area bundles and
//! thing definitions.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::middleware;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;

use crate::error::CoreError;
use crate::server::error::ApiError;
use crate::server::{cors, log_request, ServerState};

pub fn areabundles_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/:area_id/:area_key", get(area_bundle))
        .with_state(state)
        .layer(middleware::from_fn_with_state("AREABUNDLES", log_request))
        .layer(cors())
}

pub fn thingdefs_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/:thing_id", get(thing_definition))
        .with_state(state)
        .layer(middleware::from_fn_with_state("THINGDEFS", log_request))
        .layer(cors())
}

/// GET /:areaId/:areaKey
async fn area_bundle(
    State(state): State<Arc<ServerState>>,
    Path((area_id, area_key)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let key = area_key.strip_suffix(".json").unwrap_or(&area_key);
    match state.storage.read(&["area", "bundle", &area_id, key]).await {
        Ok(Some(bundle)) => Ok(Json(bundle)),
        Ok(None) | Err(CoreError::InvalidInput(_)) => {
            Err(ApiError::not_found("Area bundle not found"))
        }
        Err(error) => Err(error.into()),
    }
}

/// GET /:thingId
///
/// The client treats an empty JSON string as "no definition", so missing
/// and unreadable definitions both answer 200.
async fn thing_definition(
    State(state): State<Arc<ServerState>>,
    Path(thing_id): Path<String>,
) -> Json<Value> {
    match state.storage.read(&["thing", "def", &thing_id]).await {
        Ok(Some(definition)) => Json(definition),
        Ok(None) => {
            tracing::warn!("client asked for a thing definition not on disk: {thing_id}");
            Json(Value::String(String::new()))
        }
        Err(error) => {
            tracing::warn!("unreadable thing definition {thing_id}: {error}");
            Json(Value::String(String::new()))
        }
    }
}
