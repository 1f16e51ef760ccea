//! notify integration for the area-info directory.
//!
//! Watcher callbacks send changes through a tokio channel instead of touching
//! index state directly. The forwarding task is the sole consumer and arms
//! the debounce timer.

use std::path::{Path, PathBuf};

use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc::UnboundedSender;

use crate::error::{IndexError, Result};

/// A change observed under the info directory.
#[derive(Debug, Clone)]
pub struct AreaChange {
    pub kind: EventKind,
    pub paths: Vec<PathBuf>,
}

/// Creates a recursive notify watcher on `info_dir`.
pub fn create_index_watcher(
    info_dir: &Path,
    change_tx: UnboundedSender<AreaChange>,
) -> Result<RecommendedWatcher> {
    let mut watcher =
        recommended_watcher(move |event_result: notify::Result<Event>| match event_result {
            Ok(event) => {
                if !is_relevant(&event) {
                    return;
                }
                let change = AreaChange {
                    kind: event.kind,
                    paths: event.paths,
                };
                if change_tx.send(change).is_err() {
                    log::debug!("area watcher receiver dropped, ignoring change");
                }
            }
            Err(error) => log::warn!("area watcher error: {error}"),
        })
        .map_err(|error| {
            IndexError::Watcher(format!(
                "failed to create area watcher for {}: {error}",
                info_dir.display()
            ))
        })?;

    watcher
        .watch(info_dir, RecursiveMode::Recursive)
        .map_err(|error| {
            IndexError::Watcher(format!("failed to watch {}: {error}", info_dir.display()))
        })?;

    Ok(watcher)
}

/// Access-only events never change a document.
pub fn is_relevant(event: &Event) -> bool {
    !matches!(event.kind, EventKind::Access(_))
}
