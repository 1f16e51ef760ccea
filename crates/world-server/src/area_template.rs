//! Documents written for a brand-new area: info, bundle, load and subareas.

use serde_json::{json, Value};

use crate::account::AccountIdentity;
use crate::error::CoreResult;
use crate::ids::{generate_area_id, generate_bundle_key};
use crate::storage::Storage;
use crate::utils::time::now_rfc3339;

/// Thing id of the ground plane placed in every new area.
pub const GROUND_THING_ID: &str = "000000000000000000000001";
pub const EMPTY_ENVIRONMENT_CHANGERS: &str = r#"{"environmentChangers":[]}"#;

pub fn empty_bundle() -> Value {
    json!({ "thingDefinitions": [], "serveTime": 0 })
}

pub fn info_document(name: &str, owner: &AccountIdentity, created_at: &str) -> Value {
    json!({
        "editors": [{ "id": owner.person_id, "name": owner.screen_name, "isOwner": true }],
        "listEditors": [],
        "copiedFromAreas": [],
        "name": name,
        "creationDate": created_at,
        "totalVisitors": 0,
        "isZeroGravity": false,
        "hasFloatingDust": false,
        "isCopyable": false,
        "onlyOwnerSetsLocks": false,
        "isExcluded": false,
        "renameCount": 0,
        "copiedCount": 0,
        "isFavorited": false,
    })
}

pub fn load_document(area_id: &str, name: &str, bundle_key: &str, creator_id: &str) -> Value {
    let ground = json!({
        "Id": generate_area_id(),
        "Tid": GROUND_THING_ID,
        "P": { "x": 0, "y": -0.3, "z": 0 },
        "R": { "x": 0, "y": 0, "z": 0 },
    });
    json!({
        "ok": true,
        "areaId": area_id,
        "areaName": name,
        "areaKey": bundle_key,
        "areaCreatorId": creator_id,
        "isPrivate": false,
        "isZeroGravity": false,
        "hasFloatingDust": false,
        "isCopyable": false,
        "onlyOwnerSetsLocks": false,
        "isExcluded": false,
        "environmentChangersJSON": EMPTY_ENVIRONMENT_CHANGERS,
        "requestorIsEditor": true,
        "requestorIsListEditor": true,
        "requestorIsOwner": true,
        "placements": [ground],
        "serveTime": 0,
        "sound": { "enabled": true, "volume": 1.0 },
        "gravity": { "enabled": true, "strength": 9.8 },
        "lighting": { "enabled": true },
        "interactions": { "enabled": true },
        "settings": {
            "allowVisitors": true,
            "allowEdits": true,
            "allowCopying": false,
            "allowLocking": true,
        },
        "environment": {
            "skybox": "default",
            "ambientLight": 1.0,
            "fog": { "enabled": false },
        },
        "locks": { "lockedObjects": [], "lockRules": [] },
    })
}

/// A bundle key the client accepts: `rr` followed by 24 characters.
pub fn is_valid_bundle_key(key: &str) -> bool {
    key.starts_with("rr") && key.len() == 26
}

/// Writes every document of a new area owned by `owner` and returns the
/// bundle key. The info document goes last, so a directory rebuild never
/// indexes an area whose load document is not on disk yet.
pub async fn write_new_area(
    storage: &dyn Storage,
    area_id: &str,
    name: &str,
    owner: &AccountIdentity,
) -> CoreResult<String> {
    let bundle_key = generate_bundle_key();
    storage
        .write(&["area", "bundle", area_id, &bundle_key], &empty_bundle())
        .await?;
    storage
        .write(
            &["area", "load", area_id],
            &load_document(area_id, name, &bundle_key, &owner.person_id),
        )
        .await?;
    storage
        .write(&["area", "subareas", area_id], &json!({ "subAreas": [] }))
        .await?;
    storage
        .write(
            &["area", "info", area_id],
            &info_document(name, owner, &now_rfc3339()),
        )
        .await?;
    Ok(bundle_key)
}
