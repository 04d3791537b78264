use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Server-to-client notifications (§6 "Event stream").
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "params")]
pub enum AtlasEvent {
    #[serde(rename = "ingest.progress")]
    IngestProgress(IngestProgressEvent),
    #[serde(rename = "ingest.complete")]
    IngestComplete(IngestCompleteEvent),
    #[serde(rename = "consolidate.progress")]
    ConsolidateProgress(ConsolidateProgressEvent),
    #[serde(rename = "watch.file_changed")]
    WatchFileChanged(WatchFileChangedEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestProgressEvent {
    pub file_path: String,
    pub chunks_so_far: usize,
    pub files_processed: usize,
    pub files_total: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestCompleteEvent {
    pub files_processed: usize,
    pub chunks_stored: usize,
    pub errors: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidateProgressEvent {
    pub clusters_evaluated: usize,
    pub consolidations_performed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchFileChangedEvent {
    pub file_path: String,
    pub timestamp: DateTime<Utc>,
}
