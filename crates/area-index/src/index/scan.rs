//! Directory scan of the area-info document store.
//!
//! One document per area, named `<areaId>.json`. A document that cannot be
//! read, parsed, or lacks a usable `name` is skipped and logged; it never
//! aborts the scan. Only failing to list the directory itself is an error.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use super::data::AreaIndexData;
use crate::error::{IndexError, Result};
use crate::types::AreaIndexEntry;

/// Extension every area-info document carries.
pub const AREA_DOCUMENT_EXTENSION: &str = "json";

/// A document left out of the scan, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDocument {
    pub file_name: String,
    pub reason: String,
}

/// Result of a full directory scan.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    pub data: AreaIndexData,
    pub skipped: Vec<SkippedDocument>,
}

#[derive(Debug, Deserialize)]
struct AreaInfoDocument {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
}

/// Maps a document file name to its area id.
///
/// The name must be UTF-8, end in `.json`, and leave a non-empty stem with
/// no path separators.
pub fn area_id_from_file_name(file_name: &OsStr) -> Result<String> {
    let name = file_name.to_str().ok_or_else(|| {
        IndexError::InvalidDocumentName(format!("{} is not valid UTF-8", file_name.to_string_lossy()))
    })?;

    let suffix = format!(".{AREA_DOCUMENT_EXTENSION}");
    let stem = name.strip_suffix(&suffix).ok_or_else(|| {
        IndexError::InvalidDocumentName(format!("{name} does not have the .{AREA_DOCUMENT_EXTENSION} extension"))
    })?;

    if stem.is_empty() {
        return Err(IndexError::InvalidDocumentName(format!("{name} has an empty id")));
    }
    if stem.contains('/') || stem.contains('\\') {
        return Err(IndexError::InvalidDocumentName(format!(
            "{name} contains a path separator"
        )));
    }
    Ok(stem.to_string())
}

/// Parses one area-info document into an index entry.
pub fn parse_area_document(id: String, bytes: &[u8]) -> std::result::Result<AreaIndexEntry, String> {
    let document: AreaInfoDocument =
        serde_json::from_slice(bytes).map_err(|error| error.to_string())?;

    let name = match document.name {
        Some(Value::String(name)) if !name.is_empty() => name,
        Some(Value::String(_)) | Some(Value::Null) | None => {
            return Err("Missing name field".to_string())
        }
        Some(_) => return Err("name field is not a string".to_string()),
    };
    let description = match document.description {
        Some(Value::String(description)) => Some(description),
        _ => None,
    };

    Ok(AreaIndexEntry::new(id, name, description))
}

/// Scans every document in `info_dir`, in file-name order.
pub fn scan_info_dir(info_dir: &Path) -> Result<ScanOutcome> {
    let listing = fs::read_dir(info_dir).map_err(|source| IndexError::StoreUnavailable {
        path: info_dir.to_path_buf(),
        source,
    })?;

    let mut outcome = ScanOutcome::default();
    let mut paths: Vec<PathBuf> = Vec::new();
    for dir_entry in listing {
        match dir_entry {
            Ok(dir_entry) => {
                if dir_entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    log::debug!("ignoring directory {} in area store", dir_entry.path().display());
                    continue;
                }
                paths.push(dir_entry.path());
            }
            Err(error) => skip(&mut outcome, "<unreadable entry>".to_string(), error.to_string()),
        }
    }
    paths.sort();

    for path in paths {
        let Some(file_name) = path.file_name() else {
            continue;
        };
        let display_name = file_name.to_string_lossy().into_owned();

        let id = match area_id_from_file_name(file_name) {
            Ok(id) => id,
            Err(error) => {
                skip(&mut outcome, display_name, error.to_string());
                continue;
            }
        };

        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(error) => {
                skip(&mut outcome, display_name, error.to_string());
                continue;
            }
        };

        match parse_area_document(id, &bytes) {
            Ok(entry) => {
                outcome.data.insert(entry);
            }
            Err(reason) => skip(&mut outcome, display_name, reason),
        }
    }

    Ok(outcome)
}

fn skip(outcome: &mut ScanOutcome, file_name: String, reason: String) {
    log::warn!("Skipping {file_name}: {reason}");
    outcome.skipped.push(SkippedDocument { file_name, reason });
}
