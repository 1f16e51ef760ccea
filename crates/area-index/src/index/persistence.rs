//! Cache snapshot read/write operations.
//!
//! The snapshot is a single JSON array of `AreaIndexEntry` values, with no
//! version field. Writes go through a temp file in the same directory and an
//! atomic rename, so a reader never observes a half-written snapshot.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::Path;

use serde_json::Value;
use tempfile::NamedTempFile;

use crate::error::{IndexError, Result};
use crate::types::AreaIndexEntry;

// ---------------------------------------------------------------------------
// Write operations
// ---------------------------------------------------------------------------

/// Writes the forward list to the cache snapshot, replacing any prior one.
pub fn write_cache_snapshot(cache_path: &Path, entries: &[AreaIndexEntry]) -> Result<()> {
    let parent = match cache_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|error| {
        IndexError::Internal(format!(
            "failed to create area index cache directory {}: {error}",
            parent.display()
        ))
    })?;

    let tmp = NamedTempFile::new_in(parent).map_err(|error| {
        IndexError::Internal(format!(
            "failed to create temp cache file in {}: {error}",
            parent.display()
        ))
    })?;

    {
        let mut output = BufWriter::new(tmp.as_file());
        serde_json::to_writer(&mut output, entries)?;
        output.flush()?;
    }
    tmp.as_file().sync_all()?;

    tmp.persist(cache_path).map_err(|error| {
        IndexError::Internal(format!(
            "failed to finalize area index cache {}: {}",
            cache_path.display(),
            error.error
        ))
    })?;

    log::debug!(
        "wrote area index cache to {} ({} entries)",
        cache_path.display(),
        entries.len()
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// Read operations
// ---------------------------------------------------------------------------

/// Loads the cache snapshot.
///
/// Returns `None` when the file is missing, unreadable, not a JSON array, or
/// any element lacks a string `id` or `name`. Callers treat `None` as "no
/// cache" and fall back to a full scan.
pub fn load_cache_snapshot(cache_path: &Path) -> Option<Vec<AreaIndexEntry>> {
    let bytes = match fs::read(cache_path) {
        Ok(bytes) => bytes,
        Err(error) if error.kind() == ErrorKind::NotFound => return None,
        Err(error) => {
            log::warn!(
                "area index cache read failed for {}: {}",
                cache_path.display(),
                error
            );
            return None;
        }
    };

    let value: Value = match serde_json::from_slice(&bytes) {
        Ok(value) => value,
        Err(error) => {
            log::warn!(
                "area index cache parse failed for {}: {}",
                cache_path.display(),
                error
            );
            return None;
        }
    };

    let Value::Array(items) = value else {
        log::warn!(
            "area index cache {} is not an array, ignoring it",
            cache_path.display()
        );
        return None;
    };

    let mut entries = Vec::with_capacity(items.len());
    for (position, item) in items.into_iter().enumerate() {
        match serde_json::from_value::<AreaIndexEntry>(item) {
            Ok(entry) => entries.push(entry),
            Err(error) => {
                log::warn!(
                    "area index cache {} has a malformed entry at {}: {}",
                    cache_path.display(),
                    position,
                    error
                );
                return None;
            }
        }
    }

    log::debug!(
        "loaded area index cache from {} ({} entries)",
        cache_path.display(),
        entries.len()
    );
    Some(entries)
}
