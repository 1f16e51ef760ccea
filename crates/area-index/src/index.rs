//! Area indexing module.
//!
//! ## Module Structure
//!
//! - `build` - Build state tracking
//! - `data` - Forward list plus id and urlName maps
//! - `manager` - Main API (AreaIndex)
//! - `persistence` - Cache snapshot read/write
//! - `scan` - Area-info directory scan and filename-to-id mapping

mod build;
mod data;
mod manager;
mod persistence;
mod scan;

// Re-export main types
pub use build::IndexBuildState;
pub use data::AreaIndexData;
pub use manager::AreaIndex;
pub use persistence::{load_cache_snapshot, write_cache_snapshot};
pub use scan::{area_id_from_file_name, scan_info_dir, ScanOutcome, SkippedDocument};
