//! Optional watch mode (§4.3 "Watch Mode"): file-system watchers on the
//! input paths trigger re-ingestion of changed files through the same
//! pipeline. Watchers are scoped resources; dropping (or calling
//! [`FileWatcher::close`]) tears down every underlying watch.

use std::path::PathBuf;

use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use atlas_types::{AtlasError, Result};

/// A scoped file-system watcher forwarding changed-file paths as they're
/// reported by the OS notification backend.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<PathBuf>,
}

impl FileWatcher {
    pub fn new(paths: &[PathBuf], recursive: bool) -> Result<Self> {
        let (async_tx, async_rx) = mpsc::unbounded_channel();

        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            if let Ok(event) = res {
                for path in event.paths {
                    let _ = async_tx.send(path);
                }
            }
        })
        .map_err(|e| AtlasError::config(format!("failed to create file watcher: {e}")))?;

        let mode = if recursive {
            RecursiveMode::Recursive
        } else {
            RecursiveMode::NonRecursive
        };
        for path in paths {
            watcher
                .watch(path, mode)
                .map_err(|e| AtlasError::config(format!("failed to watch {path:?}: {e}")))?;
        }

        Ok(Self {
            _watcher: watcher,
            receiver: async_rx,
        })
    }

    /// Awaits the next changed-file path; `None` once the watcher is closed.
    pub async fn recv(&mut self) -> Option<PathBuf> {
        self.receiver.recv().await
    }

    /// Explicit shutdown; equivalent to dropping the watcher.
    pub fn close(self) {
        drop(self);
    }
}
