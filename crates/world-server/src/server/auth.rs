//! Session start for the local account.

use std::sync::Arc;

use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Map, Value};

use crate::account;
use crate::ids::generate_object_id;
use crate::server::error::{refusal, ApiError};
use crate::server::system::{CLIENT_MAJOR_VERSION, SERVER_MINOR_VERSION};
use crate::server::ServerState;

/// Name of the session cookie the client sends back.
const SESSION_COOKIE: &str = "ast";

/// POST /auth/start
///
/// Hands out a fresh session cookie and the profile the client boots with.
/// Every edit permission is granted: the server has a single local user.
pub(crate) async fn start(State(state): State<Arc<ServerState>>) -> Result<Response, ApiError> {
    let Some(account) = account::load_account(state.storage.as_ref()).await? else {
        return Ok(refusal(StatusCode::NOT_FOUND, "Account not found"));
    };
    let cookie = format!("{SESSION_COOKIE}=s:{}; Path=/; HttpOnly", generate_object_id());
    Ok(([(SET_COOKIE, cookie)], Json(session_profile(&account))).into_response())
}

fn session_profile(account: &Map<String, Value>) -> Value {
    let field = |name: &str| account.get(name).cloned().unwrap_or(Value::Null);
    let person_id = account
        .get("personId")
        .and_then(Value::as_str)
        .unwrap_or_default();
    json!({
        "vMaj": CLIENT_MAJOR_VERSION,
        "vMinSrv": SERVER_MINOR_VERSION,
        "personId": field("personId"),
        "homeAreaId": field("homeAreaId"),
        "screenName": field("screenName"),
        "statusText": format!("exploring around (my id: {person_id})"),
        "isFindable": true,
        "age": 0,
        "ageSecs": 0,
        "attachments": attachments_text(account.get("attachments")),
        "isSoftBanned": false,
        "showFlagWarning": false,
        "flagTags": [],
        "areaCount": 1,
        "thingTagCount": 1,
        "allThingsClonable": true,
        "achievements": [],
        "isEditorHere": true,
        "isListEditorHere": true,
        "isOwnerHere": true,
        "hasEditTools": true,
        "hasEditToolsPermanently": true,
        "editToolsExpiryDate": null,
        "isInEditToolsTrial": false,
        "wasEditToolsTrialEverActivated": false,
        "customSearchWords": "",
    })
}

/// The client expects avatar attachments as JSON text.
fn attachments_text(attachments: Option<&Value>) -> String {
    match attachments {
        Some(Value::String(text)) => text.clone(),
        Some(Value::Null) | None => "{}".to_string(),
        Some(other) => other.to_string(),
    }
}
