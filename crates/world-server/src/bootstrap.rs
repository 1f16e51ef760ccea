//! First-run setup: the local account, its person-info card and its home
//! area. Runs before the area index is built.

use serde_json::{json, Map, Value};
use uuid::Uuid;

use area_index::NewAreaEntry;

use crate::account::{self, AccountIdentity};
use crate::area_list;
use crate::area_template::write_new_area;
use crate::error::CoreResult;
use crate::ids::generate_area_id;
use crate::storage::Storage;
use crate::utils::time::now_rfc3339;

/// What a bootstrap run had to create.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub created_account: bool,
    pub created_person_info: bool,
    /// The home area, when it was written during this run.
    pub created_home: Option<NewAreaEntry>,
    pub listed_home: bool,
}

/// Ensures the account, person info and home area exist, and that the home
/// area is in the area list. Existing documents are never rewritten.
pub async fn init_defaults(storage: &dyn Storage) -> CoreResult<BootstrapReport> {
    let mut report = BootstrapReport::default();

    let account = match account::load_account(storage).await? {
        Some(account) => account,
        None => {
            let account = new_account();
            account::save_account(storage, account.clone()).await?;
            tracing::info!(
                "initialized account for {}",
                text(&account, "screenName").unwrap_or_default()
            );
            report.created_account = true;
            account
        }
    };

    let (Some(person_id), Some(screen_name)) =
        (text(&account, "personId"), text(&account, "screenName"))
    else {
        tracing::warn!("account has no personId or screenName, skipping first-run setup");
        return Ok(report);
    };
    let identity = AccountIdentity {
        person_id: person_id.to_string(),
        screen_name: screen_name.to_string(),
    };

    let info_keys = ["person", "info", person_id];
    if !storage.exists(&info_keys).await? {
        storage.write(&info_keys, &person_info(&identity)).await?;
        tracing::info!("created person info for {screen_name}");
        report.created_person_info = true;
    }

    let Some(home_id) = text(&account, "homeAreaId") else {
        return Ok(report);
    };
    let home_name = format!("{screen_name}'s home");

    if storage.exists(&["area", "info", home_id]).await? {
        tracing::debug!("home area {home_id} already exists");
    } else {
        write_new_area(storage, home_id, &home_name, &identity).await?;
        tracing::info!("created home area {home_id} for {screen_name}");
        report.created_home = Some(NewAreaEntry {
            id: home_id.to_string(),
            name: home_name.clone(),
            description: None,
        });
    }

    report.listed_home = area_list::ensure_created_listed(storage, home_id, &home_name).await?;
    Ok(report)
}

fn text<'a>(account: &'a Map<String, Value>, field: &str) -> Option<&'a str> {
    account
        .get(field)
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}

fn new_account() -> Map<String, Value> {
    let suffix = Uuid::new_v4().as_u128() % 10_000;
    let mut account = Map::new();
    account.insert("personId".to_string(), Value::String(generate_area_id()));
    account.insert("screenName".to_string(), Value::String(format!("User{suffix}")));
    account.insert("homeAreaId".to_string(), Value::String(generate_area_id()));
    account
}

fn person_info(identity: &AccountIdentity) -> Value {
    json!({
        "id": identity.person_id,
        "screenName": identity.screen_name,
        "age": 0,
        "statusText": "",
        "isFindable": true,
        "isBanned": false,
        "lastActivityOn": now_rfc3339(),
        "isFriend": false,
        "isEditorHere": true,
        "isListEditorHere": true,
        "isOwnerHere": true,
        "isAreaLocked": false,
        "isOnline": true,
    })
}
