//! Liveness and diagnostics endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use area_index::IndexStatus;

use crate::server::ServerState;

/// Client protocol version reported by the keepalive poll.
pub(crate) const CLIENT_MAJOR_VERSION: u32 = 188;
pub(crate) const SERVER_MINOR_VERSION: u32 = 1;
/// The edit-tools trial never runs out on a local server.
const EDIT_TOOLS_TRIAL_EXPIRY: &str = "3000-04-19T00:07:37.782Z";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepaliveResponse {
    pub v_maj: u32,
    pub v_min_srv: u32,
}

pub(crate) async fn health() -> &'static str {
    "ok"
}

/// POST /p
pub(crate) async fn keepalive() -> Json<KeepaliveResponse> {
    Json(KeepaliveResponse {
        v_maj: CLIENT_MAJOR_VERSION,
        v_min_srv: SERVER_MINOR_VERSION,
    })
}

/// POST /person/registerusagemode and /ach/reg. The client only needs an
/// acknowledgement; nothing is stored.
pub(crate) async fn acknowledge() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// POST /extras/startedittoolstrial
pub(crate) async fn start_edit_tools_trial() -> Json<Value> {
    Json(json!({ "ok": true, "expiryDate": EDIT_TOOLS_TRIAL_EXPIRY }))
}

/// GET /index/status
pub(crate) async fn index_status(State(state): State<Arc<ServerState>>) -> Json<IndexStatus> {
    Json(state.index.status())
}
