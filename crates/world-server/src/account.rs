//! The single local account stored at `person/account.json`.

use serde_json::{Map, Value};

use crate::error::{CoreError, CoreResult};
use crate::storage::Storage;

pub(crate) const ACCOUNT_KEYS: [&str; 2] = ["person", "account"];

pub const UNKNOWN_PLACER_ID: &str = "unknown";
pub const ANONYMOUS_PLACER_NAME: &str = "anonymous";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountIdentity {
    pub person_id: String,
    pub screen_name: String,
}

/// Returns the identity when the account document has a non-empty
/// `personId` and `screenName`.
pub async fn load_identity(storage: &dyn Storage) -> CoreResult<Option<AccountIdentity>> {
    let Some(account) = storage.read(&ACCOUNT_KEYS).await? else {
        return Ok(None);
    };
    let person_id = non_empty_str(&account, "personId");
    let screen_name = non_empty_str(&account, "screenName");
    Ok(match (person_id, screen_name) {
        (Some(person_id), Some(screen_name)) => Some(AccountIdentity {
            person_id: person_id.to_string(),
            screen_name: screen_name.to_string(),
        }),
        _ => None,
    })
}

/// Identity stamped onto placements. Falls back to `unknown`/`anonymous`
/// field by field, including when the account cannot be read.
pub async fn placer_identity(storage: &dyn Storage) -> AccountIdentity {
    let account = match storage.read(&ACCOUNT_KEYS).await {
        Ok(account) => account.unwrap_or(Value::Null),
        Err(error) => {
            tracing::warn!("failed to read account for placer identity: {error}");
            Value::Null
        }
    };
    AccountIdentity {
        person_id: non_empty_str(&account, "personId")
            .unwrap_or(UNKNOWN_PLACER_ID)
            .to_string(),
        screen_name: non_empty_str(&account, "screenName")
            .unwrap_or(ANONYMOUS_PLACER_NAME)
            .to_string(),
    }
}

/// The account's `personId`, if any.
pub async fn person_id(storage: &dyn Storage) -> Option<String> {
    match storage.read(&ACCOUNT_KEYS).await {
        Ok(Some(account)) => non_empty_str(&account, "personId").map(str::to_string),
        Ok(None) => None,
        Err(error) => {
            tracing::warn!("failed to read account: {error}");
            None
        }
    }
}

/// The raw account document. A document that is not a JSON object is an
/// error rather than a missing account, so it is never overwritten.
pub async fn load_account(storage: &dyn Storage) -> CoreResult<Option<Map<String, Value>>> {
    match storage.read(&ACCOUNT_KEYS).await? {
        Some(Value::Object(account)) => Ok(Some(account)),
        Some(_) => Err(CoreError::Internal(
            "account document is not a JSON object".to_string(),
        )),
        None => Ok(None),
    }
}

pub async fn save_account(storage: &dyn Storage, account: Map<String, Value>) -> CoreResult<()> {
    storage.write(&ACCOUNT_KEYS, &Value::Object(account)).await
}

/// The account's `homeAreaId`, if set.
pub async fn home_area_id(storage: &dyn Storage) -> CoreResult<Option<String>> {
    let Some(account) = load_account(storage).await? else {
        return Ok(None);
    };
    Ok(account
        .get("homeAreaId")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .map(str::to_string))
}

/// Renames the account. Returns false when there is no account.
pub async fn set_screen_name(storage: &dyn Storage, screen_name: &str) -> CoreResult<bool> {
    let Some(mut account) = load_account(storage).await? else {
        return Ok(false);
    };
    account.insert(
        "screenName".to_string(),
        Value::String(screen_name.to_string()),
    );
    save_account(storage, account).await?;
    Ok(true)
}

/// Adds `area_id` to the account's `ownedAreas`, keeping entries unique.
pub async fn add_owned_area(storage: &dyn Storage, area_id: &str) -> CoreResult<()> {
    let Some(mut fields) = load_account(storage).await? else {
        return Ok(());
    };
    let owned = fields
        .entry("ownedAreas")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !owned.is_array() {
        *owned = Value::Array(Vec::new());
    }
    if let Value::Array(owned) = owned {
        if !owned.iter().any(|id| id.as_str() == Some(area_id)) {
            owned.push(Value::String(area_id.to_string()));
        }
    }
    save_account(storage, fields).await
}

fn non_empty_str<'a>(value: &'a Value, field: &str) -> Option<&'a str> {
    value
        .get(field)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}
