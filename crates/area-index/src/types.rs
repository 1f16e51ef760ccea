//! Public types for the area index.
//!
//! These are the shapes persisted in the cache snapshot and returned to
//! search callers. The world-server crate serializes them straight into
//! its API payloads.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// File name of the cache snapshot inside the cache directory.
pub const AREA_INDEX_CACHE_FILE: &str = "areaIndex.json";

/// One indexed area.
///
/// Field order and casing match the cache snapshot format:
/// `{"id","name","description"?,"playerCount"}`. An absent description is
/// omitted rather than written as `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AreaIndexEntry {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub player_count: u32,
}

impl AreaIndexEntry {
    pub fn new(id: impl Into<String>, name: impl Into<String>, description: Option<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description,
            player_count: 0,
        }
    }
}

/// Input for the incremental insert used by the area-creation flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAreaEntry {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
}

impl From<NewAreaEntry> for AreaIndexEntry {
    fn from(entry: NewAreaEntry) -> Self {
        AreaIndexEntry::new(entry.id, entry.name, entry.description)
    }
}

/// Filesystem locations the index reads from and writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaIndexPaths {
    /// Directory holding one `<areaId>.json` info document per area.
    pub info_dir: PathBuf,
    /// The cache snapshot file.
    pub cache_path: PathBuf,
}

impl AreaIndexPaths {
    pub fn new(info_dir: impl Into<PathBuf>, cache_path: impl Into<PathBuf>) -> Self {
        Self {
            info_dir: info_dir.into(),
            cache_path: cache_path.into(),
        }
    }

    /// Standard layout: `<data_dir>/area/info` and `<cache_dir>/areaIndex.json`.
    pub fn from_roots(data_dir: &Path, cache_dir: &Path) -> Self {
        Self::new(
            data_dir.join("area").join("info"),
            cache_dir.join(AREA_INDEX_CACHE_FILE),
        )
    }
}

/// Where the current working set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexSource {
    Empty,
    Cache,
    Scan,
}

/// Index status information.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatus {
    /// Current build state of the index.
    pub state: String,
    /// How the current working set was populated.
    pub source: IndexSource,
    /// Number of entries in the forward list.
    pub entries: usize,
    /// Number of keys in the urlName map.
    pub url_names: usize,
    /// Documents skipped by the most recent scan.
    pub skipped: usize,
    /// Count of successful rebuilds since startup.
    pub rebuild_count: u64,
    pub info_dir: String,
    pub cache_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}
