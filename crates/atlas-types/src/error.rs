use thiserror::Error;

/// Cross-component error taxonomy (§7).
///
/// Per-item failures (a single file, a single cluster) are wrapped in
/// [`AtlasError::Ingest`] / [`AtlasError::Consolidation`] and collected by the
/// caller rather than propagated; everything else is a fatal precondition.
#[derive(Debug, Error)]
pub enum AtlasError {
    /// Invalid configuration, dimension mismatch, missing required backend.
    #[error("configuration error: {0}")]
    Config(String),

    /// Transient backend failure; callers should retry with backoff before
    /// surfacing this.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// Non-retryable backend failure (e.g. authentication).
    #[error("backend fatal: {0}")]
    BackendFatal(String),

    /// Payload or QNTM key schema violation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Per-file ingestion failure; wrapped and aggregated in the ingest
    /// result rather than aborting the run.
    #[error("ingest error in {file}: {source}")]
    Ingest {
        file: String,
        #[source]
        source: Box<AtlasError>,
    },

    /// Per-cluster consolidation failure; wrapped, the pass continues.
    #[error("consolidation error in cluster {cluster}: {source}")]
    Consolidation {
        cluster: String,
        #[source]
        source: Box<AtlasError>,
    },

    /// A collection or chunk that was required to exist did not.
    #[error("not found: {0}")]
    NotFound(String),

    /// Cooperative cancellation.
    #[error("operation cancelled")]
    Cancelled,
}

impl AtlasError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn ingest(file: impl Into<String>, source: AtlasError) -> Self {
        Self::Ingest {
            file: file.into(),
            source: Box::new(source),
        }
    }

    pub fn consolidation(cluster: impl Into<String>, source: AtlasError) -> Self {
        Self::Consolidation {
            cluster: cluster.into(),
            source: Box::new(source),
        }
    }

    /// Whether a retry loop should keep going on this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AtlasError::BackendUnavailable(_))
    }
}
