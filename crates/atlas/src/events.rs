//! Event plumbing (§6 "Event stream"): internal progress types are mapped
//! onto `atlas_protocol::AtlasEvent` notifications published on a broadcast
//! channel; the daemon forwards them to subscribed connections.

use atlas_ingest::{FileProgress, ProgressSink};
use atlas_protocol::{AtlasEvent, IngestProgressEvent};
use tokio::sync::broadcast;

#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<AtlasEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AtlasEvent> {
        self.tx.subscribe()
    }

    /// Best-effort: a send with no subscribers is not an error, it just
    /// means nobody is listening right now.
    pub fn publish(&self, event: AtlasEvent) {
        let _ = self.tx.send(event);
    }
}

impl ProgressSink for EventBroadcaster {
    fn on_file_progress(&self, progress: FileProgress) {
        self.publish(AtlasEvent::IngestProgress(IngestProgressEvent {
            file_path: progress.file_path,
            chunks_so_far: progress.chunks_in_file,
            files_processed: progress.files_processed,
            files_total: progress.files_total,
        }));
    }
}
