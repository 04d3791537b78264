use async_trait::async_trait;
use atlas_types::{Chunk, ChunkId, Result};
use serde::{Deserialize, Serialize};

use crate::config::{CollectionConfig, HnswUpdate, PayloadIndexSchema};
use crate::filter::PayloadFilter;

/// Collection-level stats (§4.1 `get_collection_info`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInfo {
    pub points_count: u64,
    pub vector_dimensions: usize,
}

/// Opaque continuation token for `scroll` (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollOffset(pub u64);

/// A single scored hit returned by `search` (§4.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredPoint {
    pub id: ChunkId,
    pub score: f32,
    pub payload: Chunk,
}

/// The storage abstraction boundary (§4.1): a single polymorphic interface
/// over a vector + metadata backend. Implementations may be an in-process
/// reference store (see [`crate::MemoryBackend`]) or a client for a real
/// vector database; the rest of Atlas only ever talks to this trait.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn collection_exists(&self, name: &str) -> Result<bool>;

    /// Idempotent per process: a second `create_collection` for a name that
    /// already exists with the same dimension is treated as success
    /// (§4.1 "Failure semantics").
    async fn create_collection(&self, name: &str, cfg: CollectionConfig) -> Result<()>;

    async fn get_collection_info(&self, name: &str) -> Result<CollectionInfo>;

    /// Upsert points under `(id, vector, payload)`. When `wait` is true the
    /// call does not return until the write is durable.
    async fn upsert(&self, name: &str, points: Vec<(ChunkId, Vec<f32>, Chunk)>, wait: bool)
        -> Result<()>;

    async fn scroll(
        &self,
        name: &str,
        limit: usize,
        offset: Option<ScrollOffset>,
        with_payload: bool,
        with_vector: bool,
    ) -> Result<(Vec<Chunk>, Option<ScrollOffset>)>;

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>>;

    /// No-op for backends without payload indexing support.
    async fn create_payload_index(
        &self,
        _name: &str,
        _field: &str,
        _schema: PayloadIndexSchema,
    ) -> Result<()> {
        Ok(())
    }

    /// Applies a partial HNSW config update, used to toggle batch-mode
    /// indexing (§4.1 "HNSW batch mode").
    async fn update_collection(&self, name: &str, update: HnswUpdate) -> Result<()>;

    /// Fanout deletion of a chunk id from a single named collection
    /// (§3 "Collection" invariant: deletion must be idempotent).
    async fn delete(&self, name: &str, ids: &[ChunkId]) -> Result<()>;
}
