//! Core index data structures.
//!
//! `AreaIndexData` is the working set behind the index lock:
//! 1. `entries` - the forward list, in insertion order
//! 2. `by_id` - id to position in `entries`
//! 3. `by_url_name` - normalized name to area id (last insert wins)
//!
//! Every value in `by_url_name` is an id present in `by_id`. All mutation
//! goes through `insert`, which upholds that.

use fnv::FnvHashMap;

use crate::types::AreaIndexEntry;
use crate::url_name::normalize_url_name;

#[derive(Debug, Default, Clone)]
pub struct AreaIndexData {
    entries: Vec<AreaIndexEntry>,
    by_id: FnvHashMap<String, usize>,
    by_url_name: FnvHashMap<String, String>,
}

impl AreaIndexData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a working set by inserting `entries` in order.
    pub fn from_entries(entries: impl IntoIterator<Item = AreaIndexEntry>) -> Self {
        let mut data = Self::new();
        for entry in entries {
            data.insert(entry);
        }
        data
    }

    /// Inserts an entry.
    ///
    /// The urlName mapping is always (re)pointed at `entry.id`. The forward
    /// list only grows if the id is new; an existing entry with the same id
    /// is left untouched. Returns whether the forward list grew.
    pub fn insert(&mut self, entry: AreaIndexEntry) -> bool {
        let url_name = normalize_url_name(&entry.name);
        self.by_url_name.insert(url_name, entry.id.clone());

        if self.by_id.contains_key(&entry.id) {
            return false;
        }
        self.by_id.insert(entry.id.clone(), self.entries.len());
        self.entries.push(entry);
        true
    }

    pub fn get(&self, id: &str) -> Option<&AreaIndexEntry> {
        self.by_id.get(id).and_then(|&pos| self.entries.get(pos))
    }

    pub fn lookup_by_url_name(&self, url_name: &str) -> Option<&str> {
        self.by_url_name.get(url_name).map(String::as_str)
    }

    /// Entries whose name contains `term`, case-sensitively, in insertion order.
    pub fn search(&self, term: &str) -> Vec<AreaIndexEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.name.contains(term))
            .cloned()
            .collect()
    }

    pub fn entries(&self) -> &[AreaIndexEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn url_name_count(&self) -> usize {
        self.by_url_name.len()
    }
}
