use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Importance;

/// A stable, collision-resistant identifier for a chunk.
///
/// Derived deterministically from `(file_path, chunk_index)` so re-ingesting
/// the same file produces the same ids (§3, §8 property 3). Consolidated
/// chunks derive their id from the sorted parent ids plus a content digest
/// instead (§4.5 step 4), via [`ChunkId::for_consolidation`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub String);

impl ChunkId {
    /// `id = hash(file_path || ":" || chunk_index)`.
    pub fn for_chunk(file_path: &str, chunk_index: usize) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(file_path.as_bytes());
        hasher.update(b":");
        hasher.update(chunk_index.to_string().as_bytes());
        Self(hex::encode(&hasher.finalize()[..16]))
    }

    /// `id = hash(sorted(parent_ids) || content_digest)`.
    ///
    /// Sorting the parents first means the id of a merge is order-independent
    /// of the order candidates were discovered in.
    pub fn for_consolidation(parents: &[ChunkId], synthesized_text: &str) -> Self {
        let mut sorted: Vec<&str> = parents.iter().map(|p| p.0.as_str()).collect();
        sorted.sort_unstable();

        let mut hasher = Sha256::new();
        for p in sorted {
            hasher.update(p.as_bytes());
            hasher.update(b"|");
        }
        hasher.update(synthesized_text.as_bytes());
        Self(hex::encode(&hasher.finalize()[..16]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ChunkId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Classification of why a cluster of chunks was consolidated (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationType {
    DuplicateWork,
    SequentialIteration,
    ContextualConvergence,
}

/// Temporal direction inferred for a consolidation, hinted by `created_at`
/// ordering but ultimately LLM-assisted (§4.5, §9 open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsolidationDirection {
    Forward,
    Backward,
    Convergent,
    Unknown,
}

/// Provenance metadata present only on chunks with `consolidated = true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsolidationMeta {
    pub occurrences: u32,
    pub parents: Vec<ChunkId>,
    pub consolidated_from: Vec<ChunkId>,
    pub consolidation_type: ConsolidationType,
    pub consolidation_direction: ConsolidationDirection,
    pub consolidation_reasoning: String,
}

/// The atomic stored unit (§3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub vector: Vec<f32>,
    pub original_text: String,
    pub file_path: String,
    pub file_name: String,
    pub file_type: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
    pub char_count: usize,
    pub qntm_keys: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub importance: Importance,
    pub consolidated: bool,
    pub consolidation: Option<ConsolidationMeta>,
    /// Opaque bag for backend-specific or forward-compatible payload fields
    /// (Design Notes §9, "dynamic payload typing").
    #[serde(default)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Chunk {
    /// Construct a fresh, non-consolidated chunk as produced by ingestion.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_path: String,
        chunk_index: usize,
        total_chunks: usize,
        vector: Vec<f32>,
        original_text: String,
        qntm_keys: Vec<String>,
        importance: Importance,
    ) -> Self {
        let file_name = std::path::Path::new(&file_path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_path.clone());
        let file_type = std::path::Path::new(&file_path)
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        let char_count = original_text.chars().count();
        let id = ChunkId::for_chunk(&file_path, chunk_index);

        Self {
            id,
            vector,
            original_text,
            file_path,
            file_name,
            file_type,
            chunk_index,
            total_chunks,
            char_count,
            qntm_keys,
            created_at: Utc::now(),
            importance,
            consolidated: false,
            consolidation: None,
            extra: BTreeMap::new(),
        }
    }

    /// Mark this chunk as absorbed into a consolidation, without deleting it
    /// (lifecycle in §3: "mutated only via consolidation ... preserving
    /// provenance").
    pub fn mark_consolidated(&mut self) {
        self.consolidated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_is_stable_across_calls() {
        let a = ChunkId::for_chunk("docs/a.md", 3);
        let b = ChunkId::for_chunk("docs/a.md", 3);
        assert_eq!(a, b);
    }

    #[test]
    fn chunk_id_differs_by_index() {
        let a = ChunkId::for_chunk("docs/a.md", 0);
        let b = ChunkId::for_chunk("docs/a.md", 1);
        assert_ne!(a, b);
    }

    #[test]
    fn chunk_id_differs_by_path() {
        let a = ChunkId::for_chunk("docs/a.md", 0);
        let b = ChunkId::for_chunk("docs/b.md", 0);
        assert_ne!(a, b);
    }

    #[test]
    fn consolidation_id_is_order_independent() {
        let p1 = ChunkId::for_chunk("a.md", 0);
        let p2 = ChunkId::for_chunk("b.md", 0);
        let forward = ChunkId::for_consolidation(&[p1.clone(), p2.clone()], "merged text");
        let backward = ChunkId::for_consolidation(&[p2, p1], "merged text");
        assert_eq!(forward, backward);
    }
}
