//! AreaIndex - main API for the area index.

use std::sync::atomic::{AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, RwLock};

use super::build::IndexBuildState;
use super::data::AreaIndexData;
use super::persistence::{load_cache_snapshot, write_cache_snapshot};
use super::scan::scan_info_dir;
use crate::error::Result;
use crate::types::{AreaIndexEntry, AreaIndexPaths, IndexSource, IndexStatus, NewAreaEntry};

/// In-memory projection of the area-info store.
///
/// Created once at startup and shared as `Arc<AreaIndex>`. Readers take a
/// short read lock; `rebuild` scans into a fresh `AreaIndexData` without any
/// lock held and swaps it in, so a reader never sees a half-built index.
///
/// Cache writes from `add_entry` and from a scan are serialized on
/// `cache_lane`, but a scan's directory listing is not. A rebuild that listed
/// the directory before a new area's info document was written can therefore
/// overwrite what that area's `add_entry` just stored. The document write
/// itself triggers another watcher notification, so a following rebuild
/// rediscovers the area.
#[derive(Debug)]
pub struct AreaIndex {
    paths: AreaIndexPaths,
    data: RwLock<AreaIndexData>,
    build_state: AtomicU8,
    source: Mutex<IndexSource>,
    skipped: AtomicUsize,
    rebuild_count: AtomicU64,
    last_error: Mutex<Option<String>>,
    cache_lane: Mutex<()>,
}

impl AreaIndex {
    pub fn new(paths: AreaIndexPaths) -> Self {
        Self {
            paths,
            data: RwLock::new(AreaIndexData::new()),
            build_state: AtomicU8::new(IndexBuildState::Idle as u8),
            source: Mutex::new(IndexSource::Empty),
            skipped: AtomicUsize::new(0),
            rebuild_count: AtomicU64::new(0),
            last_error: Mutex::new(None),
            cache_lane: Mutex::new(()),
        }
    }

    pub fn paths(&self) -> &AreaIndexPaths {
        &self.paths
    }

    /// Startup initializer.
    ///
    /// Takes the cache snapshot when one loads, otherwise scans the info
    /// directory and writes a fresh snapshot. Fails only when the info
    /// directory cannot be listed.
    pub fn build(&self) -> Result<()> {
        let started = Instant::now();
        if let Some(entries) = load_cache_snapshot(&self.paths.cache_path) {
            let data = AreaIndexData::from_entries(entries);
            let count = data.len();
            {
                let _lane = self.cache_lane.lock();
                *self.data.write() = data;
                *self.source.lock() = IndexSource::Cache;
                self.skipped.store(0, Ordering::Relaxed);
            }
            IndexBuildState::Ready.store(&self.build_state);
            log::info!(
                "area index loaded from cache {} entries={} elapsed_ms={}",
                self.paths.cache_path.display(),
                count,
                started.elapsed().as_millis()
            );
            return Ok(());
        }

        log::info!(
            "no usable area index cache, scanning {}",
            self.paths.info_dir.display()
        );
        self.scan_and_install()?;
        log::info!(
            "area index built from {} entries={} skipped={} elapsed_ms={}",
            self.paths.info_dir.display(),
            self.len(),
            self.skipped.load(Ordering::Relaxed),
            started.elapsed().as_millis()
        );
        Ok(())
    }

    /// Rescans the info directory regardless of any cache.
    ///
    /// On failure the previous working set stays in place.
    pub fn rebuild(&self) -> Result<()> {
        let started = Instant::now();
        let result = self.scan_and_install();
        match &result {
            Ok(()) => {
                self.rebuild_count.fetch_add(1, Ordering::Relaxed);
                log::info!(
                    "area index rebuilt entries={} skipped={} elapsed_ms={}",
                    self.len(),
                    self.skipped.load(Ordering::Relaxed),
                    started.elapsed().as_millis()
                )
            }
            Err(error) => log::error!("area index rebuild failed: {error}"),
        }
        result
    }

    fn scan_and_install(&self) -> Result<()> {
        IndexBuildState::Building.store(&self.build_state);

        let outcome = match scan_info_dir(&self.paths.info_dir) {
            Ok(outcome) => outcome,
            Err(error) => {
                IndexBuildState::Error.store(&self.build_state);
                *self.last_error.lock() = Some(error.to_string());
                return Err(error);
            }
        };

        let _lane = self.cache_lane.lock();
        let entries = outcome.data.entries().to_vec();
        *self.data.write() = outcome.data;
        *self.source.lock() = IndexSource::Scan;
        self.skipped.store(outcome.skipped.len(), Ordering::Relaxed);

        match write_cache_snapshot(&self.paths.cache_path, &entries) {
            Ok(()) => *self.last_error.lock() = None,
            Err(error) => {
                log::warn!("area index cache write failed: {error}");
                *self.last_error.lock() = Some(error.to_string());
            }
        }
        IndexBuildState::Ready.store(&self.build_state);
        Ok(())
    }

    /// Incremental insert for a newly created area.
    ///
    /// The urlName mapping always moves to this id; the forward list only
    /// grows if the id is new. The whole forward list is written to the cache
    /// snapshot before this returns.
    pub fn add_entry(&self, entry: NewAreaEntry) -> Result<()> {
        let _lane = self.cache_lane.lock();
        let entries = {
            let mut data = self.data.write();
            if !data.insert(entry.into()) {
                log::debug!("area already indexed, url name refreshed");
            }
            data.entries().to_vec()
        };
        write_cache_snapshot(&self.paths.cache_path, &entries)
    }

    /// Resolves a URL name to an area id. `None` is an ordinary miss.
    pub fn lookup_by_url_name(&self, url_name: &str) -> Option<String> {
        self.data.read().lookup_by_url_name(url_name).map(str::to_owned)
    }

    /// Entries whose name contains `term` (case-sensitive), in insertion order.
    /// An empty term matches every entry.
    pub fn search(&self, term: &str) -> Vec<AreaIndexEntry> {
        self.data.read().search(term)
    }

    pub fn get(&self, id: &str) -> Option<AreaIndexEntry> {
        self.data.read().get(id).cloned()
    }

    /// Snapshot of the forward list.
    pub fn entries(&self) -> Vec<AreaIndexEntry> {
        self.data.read().entries().to_vec()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    pub fn state(&self) -> IndexBuildState {
        IndexBuildState::load(&self.build_state)
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuild_count.load(Ordering::Relaxed)
    }

    pub fn status(&self) -> IndexStatus {
        let (entries, url_names) = {
            let data = self.data.read();
            (data.len(), data.url_name_count())
        };
        IndexStatus {
            state: self.state().as_str().to_string(),
            source: *self.source.lock(),
            entries,
            url_names,
            skipped: self.skipped.load(Ordering::Relaxed),
            rebuild_count: self.rebuild_count(),
            info_dir: self.paths.info_dir.to_string_lossy().to_string(),
            cache_path: self.paths.cache_path.to_string_lossy().to_string(),
            last_error: self.last_error.lock().clone(),
        }
    }
}
