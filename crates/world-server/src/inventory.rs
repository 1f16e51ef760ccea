//! The account's inventory, kept under `inventory` in the account document:
//! a flat `ids` list and numbered `pages` of items. Items are placement-like
//! JSON objects (or JSON strings of them) identified by their `Tid`.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

/// Flat `ids` are served in pages of this size.
pub const PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Inventory {
    pub ids: Option<Vec<String>>,
    /// Pages by key. A stored page that is not an array reads as absent.
    pub pages: Option<BTreeMap<String, Vec<Value>>>,
    /// Any other fields found in the stored inventory.
    pub extra: Map<String, Value>,
}

/// One change posted to `/inventory/save` or `/inventory/update`.
#[derive(Debug, Clone, PartialEq)]
pub enum InventoryUpdate {
    ReplaceIds(Vec<String>),
    AddId(String),
    AddItem { page: String, item: Value },
}

impl InventoryUpdate {
    /// Reads `{ids}`, `{id}` or `{page, inventoryItem}` from a request body,
    /// in that order of preference.
    pub fn from_body(body: &Map<String, Value>) -> Option<Self> {
        if let Some(Value::Array(ids)) = body.get("ids") {
            return Some(Self::ReplaceIds(ids.iter().map(value_text).collect()));
        }
        if let Some(id) = body.get("id").filter(|id| !id.is_null()) {
            return Some(Self::AddId(value_text(id)));
        }
        let page = body.get("page").and_then(page_key)?;
        let Some(Value::String(raw)) = body.get("inventoryItem") else {
            return None;
        };
        let item = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.clone()));
        Some(Self::AddItem { page, item })
    }
}

impl Inventory {
    /// Reads the stored inventory. Anything but an object reads as empty.
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Object(fields)) = value else {
            return Self::default();
        };
        let mut extra = fields.clone();
        let ids = match extra.remove("ids") {
            Some(Value::Array(ids)) => Some(ids.iter().map(value_text).collect()),
            _ => None,
        };
        let pages = match extra.remove("pages") {
            Some(Value::Object(pages)) => Some(
                pages
                    .into_iter()
                    .filter_map(|(key, items)| match items {
                        Value::Array(items) => Some((key, items)),
                        _ => None,
                    })
                    .collect(),
            ),
            _ => None,
        };
        Self { ids, pages, extra }
    }

    pub fn to_value(&self) -> Value {
        let mut fields = self.extra.clone();
        if let Some(ids) = &self.ids {
            fields.insert(
                "ids".to_string(),
                Value::Array(ids.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(pages) = &self.pages {
            let pages = pages
                .iter()
                .map(|(key, items)| (key.clone(), Value::Array(items.clone())))
                .collect();
            fields.insert("pages".to_string(), Value::Object(pages));
        }
        Value::Object(fields)
    }

    /// Applies a change. With `replace_same_thing`, an added item replaces
    /// the first item on its page with the same `Tid` instead of appending.
    pub fn apply(&mut self, update: InventoryUpdate, replace_same_thing: bool) {
        match update {
            InventoryUpdate::ReplaceIds(ids) => self.ids = Some(ids),
            InventoryUpdate::AddId(id) => {
                let ids = self.ids.get_or_insert_with(Vec::new);
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
            InventoryUpdate::AddItem { page, item } => {
                let thing_id = item_thing_id(&item).filter(|_| replace_same_thing);
                let items = self.page_mut(&page);
                let existing = thing_id.and_then(|thing_id| {
                    items
                        .iter()
                        .position(|existing| item_thing_id(existing).as_deref() == Some(&thing_id))
                });
                match existing {
                    Some(position) => items[position] = item,
                    None => items.push(item),
                }
            }
        }
    }

    /// Removes every item of `thing_id` from a page. Returns how many went.
    pub fn remove_thing(&mut self, page: &str, thing_id: &str) -> usize {
        let Some(items) = self.pages.as_mut().and_then(|pages| pages.get_mut(page)) else {
            return 0;
        };
        let before = items.len();
        items.retain(|item| item_thing_id(item).as_deref() != Some(thing_id));
        before - items.len()
    }

    /// Moves one item between (or within) pages. Both pages are created if
    /// missing. Out-of-range indexes leave the inventory as it was.
    pub fn move_item(
        &mut self,
        from_page: &str,
        from_index: i64,
        to_page: &str,
        to_index: i64,
    ) -> bool {
        self.page_mut(from_page);
        self.page_mut(to_page);

        let Ok(from_index) = usize::try_from(from_index) else {
            return false;
        };
        if from_index >= self.page_mut(from_page).len() {
            return false;
        }
        let item = self.page_mut(from_page).remove(from_index);

        let target = self.page_mut(to_page);
        match usize::try_from(to_index) {
            Ok(to_index) if to_index <= target.len() => {
                target.insert(to_index, item);
                true
            }
            _ => {
                self.page_mut(from_page).insert(from_index, item);
                false
            }
        }
    }

    /// Items for page `page`: the stored page when there is one, otherwise
    /// a `PAGE_SIZE` slice of `flat_ids`.
    pub fn page_items(&self, page: usize, flat_ids: &[String]) -> Vec<Value> {
        if let Some(items) = self
            .pages
            .as_ref()
            .and_then(|pages| pages.get(&page.to_string()))
        {
            return items.clone();
        }
        flat_ids
            .iter()
            .skip(page.saturating_mul(PAGE_SIZE))
            .take(PAGE_SIZE)
            .cloned()
            .map(Value::String)
            .collect()
    }

    fn page_mut(&mut self, page: &str) -> &mut Vec<Value> {
        self.pages
            .get_or_insert_with(BTreeMap::new)
            .entry(page.to_string())
            .or_default()
    }
}

/// The `Tid` of an inventory item stored as an object or a JSON string.
pub fn item_thing_id(item: &Value) -> Option<String> {
    match item {
        Value::Object(fields) => fields.get("Tid").and_then(Value::as_str).map(str::to_string),
        Value::String(raw) => serde_json::from_str::<Value>(raw)
            .ok()?
            .get("Tid")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Page numbers arrive as numbers (JSON) or strings (forms).
pub fn page_key(value: &Value) -> Option<String> {
    match value {
        Value::String(page) => Some(page.clone()),
        Value::Number(page) => Some(page.to_string()),
        _ => None,
    }
}

/// Leading-integer parse of a number or numeric string (`"3"`, `3`, `"3.7"`).
pub fn index_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|index| index.trunc() as i64)),
        Value::String(text) => {
            let text = text.trim();
            let end = text
                .char_indices()
                .find(|(position, ch)| !(ch.is_ascii_digit() || (*position == 0 && *ch == '-')))
                .map_or(text.len(), |(position, _)| position);
            text[..end].parse().ok()
        }
        _ => None,
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(fields) => fields,
            _ => panic!("body must be an object"),
        }
    }

    #[test]
    fn updates_are_read_in_order_of_preference() {
        assert_eq!(
            InventoryUpdate::from_body(&body(json!({ "ids": ["a", 2], "id": "x" }))),
            Some(InventoryUpdate::ReplaceIds(vec!["a".into(), "2".into()]))
        );
        assert_eq!(
            InventoryUpdate::from_body(&body(json!({ "id": 7 }))),
            Some(InventoryUpdate::AddId("7".into()))
        );
        assert_eq!(
            InventoryUpdate::from_body(&body(json!({ "page": 1, "inventoryItem": "{\"Tid\":\"t1\"}" }))),
            Some(InventoryUpdate::AddItem { page: "1".into(), item: json!({ "Tid": "t1" }) })
        );
        assert_eq!(InventoryUpdate::from_body(&body(json!({ "page": "1" }))), None);
    }

    #[test]
    fn update_replaces_items_with_the_same_thing() {
        let mut inventory = Inventory::default();
        let add = |tid: &str, color: &str| InventoryUpdate::AddItem {
            page: "0".into(),
            item: json!({ "Tid": tid, "C": color }),
        };
        inventory.apply(add("t1", "red"), false);
        inventory.apply(add("t1", "blue"), false);
        assert_eq!(inventory.page_items(0, &[]).len(), 2);

        inventory.apply(add("t1", "green"), true);
        let items = inventory.page_items(0, &[]);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["C"], "green");
    }

    #[test]
    fn remove_matches_object_and_string_items() {
        let mut inventory = Inventory::from_value(Some(&json!({
            "pages": { "0": [{ "Tid": "t1" }, "{\"Tid\":\"t1\"}", "not json", { "Tid": "t2" }] }
        })));
        assert_eq!(inventory.remove_thing("0", "t1"), 2);
        assert_eq!(inventory.page_items(0, &[]), vec![json!("not json"), json!({ "Tid": "t2" })]);
        assert_eq!(inventory.remove_thing("9", "t1"), 0);
    }

    #[test]
    fn move_keeps_items_on_bad_target() {
        let mut inventory = Inventory::from_value(Some(&json!({
            "pages": { "0": ["a", "b", "c"] }
        })));
        assert!(inventory.move_item("0", 0, "1", 0));
        assert_eq!(inventory.page_items(1, &[]), vec![json!("a")]);

        assert!(!inventory.move_item("0", 1, "1", 5));
        assert_eq!(inventory.page_items(0, &[]), vec![json!("b"), json!("c")]);
        assert!(!inventory.move_item("0", 9, "1", 0));
    }

    #[test]
    fn flat_ids_are_paged_when_no_page_is_stored() {
        let ids: Vec<String> = (0..25).map(|n| format!("id{n}")).collect();
        let inventory = Inventory::default();
        assert_eq!(inventory.page_items(0, &ids).len(), PAGE_SIZE);
        let second: Vec<Value> = (20..25).map(|n| json!(format!("id{n}"))).collect();
        assert_eq!(inventory.page_items(1, &ids), second);
    }

    #[test]
    fn stored_inventory_round_trips_unknown_fields() {
        let stored = json!({ "ids": ["a"], "pages": { "0": [] }, "note": true });
        assert_eq!(Inventory::from_value(Some(&stored)).to_value(), stored);
    }

    #[test]
    fn indexes_parse_like_the_client_sends_them() {
        assert_eq!(index_value(&json!(3)), Some(3));
        assert_eq!(index_value(&json!("4")), Some(4));
        assert_eq!(index_value(&json!("5.9")), Some(5));
        assert_eq!(index_value(&json!("-1")), Some(-1));
        assert_eq!(index_value(&json!("x")), None);
    }
}
