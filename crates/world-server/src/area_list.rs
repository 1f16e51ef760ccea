//! Dynamic area lists shown in the client's area browser
//! (`area/arealist.json`).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Map, Value};

use crate::error::{CoreError, CoreResult};
use crate::storage::Storage;

const AREA_LIST_KEYS: [&str; 2] = ["area", "arealist"];
const NEWEST_LIMIT: usize = 50;

/// Every known field tolerates `null` or a wrong type: that one field reads
/// as empty (or 0) while the rest of the document is kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AreaList {
    #[serde(deserialize_with = "lenient_list")]
    pub visited: Vec<Value>,
    #[serde(deserialize_with = "lenient_list")]
    pub created: Vec<Value>,
    #[serde(deserialize_with = "lenient_list")]
    pub newest: Vec<Value>,
    #[serde(deserialize_with = "lenient_list")]
    pub popular: Vec<Value>,
    #[serde(rename = "popular_rnd", deserialize_with = "lenient_list")]
    pub popular_rnd: Vec<Value>,
    #[serde(deserialize_with = "lenient_list")]
    pub popular_new: Vec<Value>,
    #[serde(rename = "popularNew_rnd", deserialize_with = "lenient_list")]
    pub popular_new_rnd: Vec<Value>,
    #[serde(deserialize_with = "lenient_list")]
    pub lively: Vec<Value>,
    #[serde(deserialize_with = "lenient_list")]
    pub favorite: Vec<Value>,
    #[serde(deserialize_with = "lenient_list")]
    pub most_favorited: Vec<Value>,
    #[serde(deserialize_with = "lenient_total")]
    pub total_online: u64,
    #[serde(deserialize_with = "lenient_total")]
    pub total_areas: u64,
    #[serde(deserialize_with = "lenient_total")]
    pub total_public_areas: u64,
    #[serde(deserialize_with = "lenient_total")]
    pub total_searchable_public_areas: u64,
    /// Unknown fields written by other tools are kept on rewrite.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn lenient_list<'de, D>(deserializer: D) -> Result<Vec<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(entries) => entries,
        _ => Vec::new(),
    })
}

/// Accepts whole numbers written as floats (`7.0`); anything else is 0.
fn lenient_total<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|total| total.is_finite() && *total >= 0.0)
                .map(|total| total as u64)
        })
        .unwrap_or(0))
}

impl AreaList {
    fn push_unique(list: &mut Vec<Value>, entry: &Value, area_id: &str) -> bool {
        if list
            .iter()
            .any(|existing| existing.get("id").and_then(Value::as_str) == Some(area_id))
        {
            return false;
        }
        list.push(entry.clone());
        true
    }
}

fn list_entry(area_id: &str, name: &str) -> Value {
    json!({ "id": area_id, "name": name, "playerCount": 0 })
}

/// Reads the list, defaulting every list to empty and every total to 0.
/// Only a document that is not a JSON object is discarded (logged).
pub async fn load_area_list(storage: &dyn Storage) -> CoreResult<AreaList> {
    let value = match storage.read(&AREA_LIST_KEYS).await {
        Ok(Some(value)) => value,
        Ok(None) => return Ok(AreaList::default()),
        Err(CoreError::Internal(message)) => {
            tracing::warn!("failed to read area list, using defaults: {message}");
            return Ok(AreaList::default());
        }
        Err(error) => return Err(error),
    };
    match serde_json::from_value(value) {
        Ok(list) => Ok(list),
        Err(error) => {
            tracing::warn!("malformed area list, using defaults: {error}");
            Ok(AreaList::default())
        }
    }
}

async fn save_area_list(storage: &dyn Storage, list: &AreaList) -> CoreResult<()> {
    let value = serde_json::to_value(list)
        .map_err(|error| CoreError::Internal(format!("area list serialize error: {error}")))?;
    storage.write(&AREA_LIST_KEYS, &value).await
}

/// Records a newly created area: appended once to `visited` and `created`,
/// prepended to `newest` (capped), and counted in every total.
pub async fn record_created_area(storage: &dyn Storage, area_id: &str, name: &str) -> CoreResult<()> {
    let mut list = load_area_list(storage).await?;
    let entry = list_entry(area_id, name);

    AreaList::push_unique(&mut list.visited, &entry, area_id);
    AreaList::push_unique(&mut list.created, &entry, area_id);
    list.newest.insert(0, entry);
    list.newest.truncate(NEWEST_LIMIT);
    list.total_areas += 1;
    list.total_public_areas += 1;
    list.total_searchable_public_areas += 1;

    save_area_list(storage, &list).await
}

/// Lists an area that exists outside the create flow (the home area).
/// Returns false when `created` already has it.
pub async fn ensure_created_listed(
    storage: &dyn Storage,
    area_id: &str,
    name: &str,
) -> CoreResult<bool> {
    let list = load_area_list(storage).await?;
    if list
        .created
        .iter()
        .any(|entry| entry.get("id").and_then(Value::as_str) == Some(area_id))
    {
        return Ok(false);
    }
    record_created_area(storage, area_id, name).await?;
    Ok(true)
}

/// Appends the area to `visited` unless already present. Returns whether
/// the list changed.
pub async fn record_visit(storage: &dyn Storage, area_id: &str, name: &str) -> CoreResult<bool> {
    let mut list = load_area_list(storage).await?;
    if !AreaList::push_unique(&mut list.visited, &list_entry(area_id, name), area_id) {
        return Ok(false);
    }
    save_area_list(storage, &list).await?;
    Ok(true)
}
