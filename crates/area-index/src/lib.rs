//! In-memory index of world areas backed by per-area JSON documents.
//!
//! This crate provides:
//! - An id and URL-name index over the area-info document store
//! - Case-sensitive substring search in insertion order
//! - A JSON cache snapshot so startup can skip the directory scan
//! - A debounced watcher that rebuilds the index on out-of-band edits

pub mod error;
pub mod index;
pub mod types;
pub mod url_name;
pub mod watcher;

// Re-export main types
pub use error::{IndexError, Result};
pub use index::{AreaIndex, IndexBuildState};
pub use types::{AreaIndexEntry, AreaIndexPaths, IndexSource, IndexStatus, NewAreaEntry};
pub use url_name::normalize_url_name;
pub use watcher::{AreaIndexWatcher, DebouncedRebuild, DEFAULT_REBUILD_DEBOUNCE};
