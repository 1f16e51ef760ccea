//! Filesystem watching module.
//!
//! This module keeps the index in step with out-of-band edits to the
//! area-info directory:
//! - notify watcher on the info directory (recursive)
//! - Debounced, single-flight full rebuilds

mod debounce;
mod events;

use std::sync::Arc;
use std::time::Duration;

use notify::RecommendedWatcher;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::index::AreaIndex;

pub use debounce::{DebouncedRebuild, RebuildFlight, DEFAULT_REBUILD_DEBOUNCE};
pub use events::{create_index_watcher, is_relevant, AreaChange};

/// A running watcher bound to one index. Dropping it stops watching and
/// discards any pending rebuild.
pub struct AreaIndexWatcher {
    _watcher: RecommendedWatcher,
    debouncer: Arc<DebouncedRebuild>,
    forwarder: JoinHandle<()>,
}

impl std::fmt::Debug for AreaIndexWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AreaIndexWatcher")
            .field("_watcher", &"<watcher>")
            .field("debouncer", &self.debouncer)
            .finish()
    }
}

impl AreaIndexWatcher {
    /// Starts watching the index's info directory.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(index: Arc<AreaIndex>, delay: Duration) -> Result<Self> {
        let (change_tx, mut change_rx) = mpsc::unbounded_channel::<AreaChange>();
        let watcher = create_index_watcher(&index.paths().info_dir, change_tx)?;
        log::info!(
            "watching {} for area changes (debounce {} ms)",
            index.paths().info_dir.display(),
            delay.as_millis()
        );

        let debouncer = Arc::new(DebouncedRebuild::new(index, delay));
        let forward_to = debouncer.clone();
        let forwarder = tokio::spawn(async move {
            while let Some(change) = change_rx.recv().await {
                log::debug!("area watcher detected {:?} on {:?}", change.kind, change.paths);
                forward_to.arm();
            }
        });

        Ok(Self {
            _watcher: watcher,
            debouncer,
            forwarder,
        })
    }
}

impl Drop for AreaIndexWatcher {
    fn drop(&mut self) {
        self.forwarder.abort();
        self.debouncer.cancel();
    }
}
