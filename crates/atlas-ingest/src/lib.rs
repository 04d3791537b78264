//! The ingestion pipeline (§4.3): file discovery, hierarchical chunking,
//! batch embedding, batch QNTM generation, and sequential multi-collection
//! upsert, wrapped in an HNSW batch-mode scope.

mod chunker;
mod discovery;
mod pipeline;
mod progress;
mod watch;

pub use chunker::chunk_text;
pub use discovery::{compute_root, default_ignore_patterns, expand_paths};
pub use pipeline::{
    chunks_with_qntm_key, ConsolidationTrigger, IngestOptions, IngestOutcome, IngestPipeline,
    DEFAULT_PRIMARY_COLLECTION,
};
pub use progress::{FileProgress, NoOpProgressSink, ProgressSink};
pub use watch::FileWatcher;
