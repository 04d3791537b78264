//! Progress reporting (§4.3 step 6f "emit progress events if an emitter is
//! attached"). Kept decoupled from the wire protocol: the application layer
//! maps these onto `atlas.ingest.progress` / `atlas.ingest.complete`
//! notifications.

/// Progress after a single file finished processing.
#[derive(Debug, Clone, PartialEq)]
pub struct FileProgress {
    pub file_path: String,
    pub chunks_in_file: usize,
    pub files_processed: usize,
    pub files_total: usize,
}

/// Sink for ingestion progress. The default no-op implementation lets
/// callers that don't care about progress skip wiring one up.
pub trait ProgressSink: Send + Sync {
    fn on_file_progress(&self, _progress: FileProgress) {}
}

/// The default sink: observes nothing.
pub struct NoOpProgressSink;

impl ProgressSink for NoOpProgressSink {}
