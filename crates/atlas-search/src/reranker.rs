//! Optional reranking backend (§4.4 step 6).

use async_trait::async_trait;
use atlas_storage::ScoredPoint;
use atlas_types::Result;

/// Reorders the top-K candidates by query+text relevance. When absent,
/// vector order (from the store's own search) is kept.
///
/// Implementations must write the new relevance into each returned
/// `ScoredPoint.score` rather than relying on return order: the caller
/// re-sorts by `score` (then `created_at`, then id) after `rerank` returns
/// to apply the tie-break rules in §4.4, so a reordering that doesn't also
/// update `score` is discarded.
#[async_trait]
pub trait Reranker: Send + Sync {
    async fn rerank(&self, query: &str, candidates: Vec<ScoredPoint>) -> Result<Vec<ScoredPoint>>;
}
