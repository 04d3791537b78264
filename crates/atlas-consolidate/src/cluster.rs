//! Candidate detection (§4.5 "Candidate Detection"): scroll the primary
//! collection and, for each not-yet-clustered chunk, search its own QNTM
//! collection for neighbors at or above the similarity threshold.
//!
//! Grounded on `crates/storage/src/autonomy/gap_detector.rs`'s
//! `vector_search`-over-a-sampled-snapshot pattern, adapted from a
//! background gap scan into a one-shot clustering pass over the whole
//! collection.

use std::collections::HashSet;
use std::sync::Arc;

use atlas_storage::{ScrollOffset, VectorStore};
use atlas_types::{Chunk, Result};

pub const DEFAULT_PRIMARY_COLLECTION: &str = "atlas_context";

/// Neighbors considered per chunk when growing a cluster.
const NEIGHBOR_SEARCH_LIMIT: usize = 20;

/// A group of chunks judged similar enough to be a consolidation candidate.
#[derive(Debug, Clone)]
pub struct ClusterCandidate {
    pub collection: String,
    pub members: Vec<Chunk>,
}

/// Finds cluster candidates across the whole store (§4.5). Each chunk
/// participates in at most one cluster per pass; already-consolidated
/// chunks are never re-clustered directly (re-consolidation of a summary
/// happens only via a later pass that treats it as an ordinary chunk once
/// marked `consolidated=false` again, which Atlas never does — so in
/// practice summaries are excluded here).
pub async fn detect_candidates(
    store: &Arc<dyn VectorStore>,
    similarity_threshold: f32,
) -> Result<Vec<ClusterCandidate>> {
    let chunks = scroll_all(store, DEFAULT_PRIMARY_COLLECTION).await?;

    let mut clustered: HashSet<String> = HashSet::new();
    let mut clusters = Vec::new();

    for chunk in &chunks {
        if chunk.consolidated || clustered.contains(chunk.id.as_str()) {
            continue;
        }
        let Some(key) = chunk.qntm_keys.first() else {
            continue;
        };
        let collection = atlas_qntm::sanitize(key);

        let hits = store
            .search(&collection, &chunk.vector, NEIGHBOR_SEARCH_LIMIT, None)
            .await?;

        let mut members = vec![chunk.clone()];
        for hit in hits {
            if hit.id == chunk.id || hit.score < similarity_threshold {
                continue;
            }
            if hit.payload.consolidated || clustered.contains(hit.id.as_str()) {
                continue;
            }
            members.push(hit.payload);
        }

        if members.len() < 2 {
            continue;
        }

        for member in &members {
            clustered.insert(member.id.as_str().to_string());
        }
        clusters.push(ClusterCandidate { collection, members });
    }

    Ok(clusters)
}

async fn scroll_all(store: &Arc<dyn VectorStore>, name: &str) -> Result<Vec<Chunk>> {
    let mut all = Vec::new();
    let mut offset: Option<ScrollOffset> = None;
    loop {
        let (chunks, next) = store.scroll(name, 256, offset, true, true).await?;
        all.extend(chunks);
        match next {
            Some(o) => offset = Some(o),
            None => break,
        }
    }
    Ok(all)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_storage::{CollectionConfig, MemoryBackend};
    use atlas_types::Importance;

    fn chunk(idx: usize, vector: Vec<f32>, key: &str) -> Chunk {
        Chunk::new(
            format!("f{idx}.md"),
            idx,
            1,
            vector,
            format!("text {idx}"),
            vec![key.to_string()],
            Importance::Normal,
        )
    }

    #[tokio::test]
    async fn groups_near_duplicates_above_threshold() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryBackend::new());
        let collection = atlas_qntm::sanitize("a ~ b ~ c");
        store
            .create_collection(DEFAULT_PRIMARY_COLLECTION, CollectionConfig::new(2))
            .await
            .unwrap();
        store
            .create_collection(&collection, CollectionConfig::new(2))
            .await
            .unwrap();

        let near = [
            chunk(0, vec![1.0, 0.0], "a ~ b ~ c"),
            chunk(1, vec![0.99, 0.01], "a ~ b ~ c"),
            chunk(2, vec![0.0, 1.0], "a ~ b ~ c"),
        ];
        for c in &near {
            store
                .upsert(
                    DEFAULT_PRIMARY_COLLECTION,
                    vec![(c.id.clone(), c.vector.clone(), c.clone())],
                    true,
                )
                .await
                .unwrap();
            store
                .upsert(&collection, vec![(c.id.clone(), c.vector.clone(), c.clone())], true)
                .await
                .unwrap();
        }

        let clusters = detect_candidates(&store, 0.9).await.unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].members.len(), 2);
    }

    #[tokio::test]
    async fn skips_already_consolidated_chunks() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryBackend::new());
        let collection = atlas_qntm::sanitize("a ~ b ~ c");
        store
            .create_collection(DEFAULT_PRIMARY_COLLECTION, CollectionConfig::new(2))
            .await
            .unwrap();
        store
            .create_collection(&collection, CollectionConfig::new(2))
            .await
            .unwrap();

        let mut c = chunk(0, vec![1.0, 0.0], "a ~ b ~ c");
        c.consolidated = true;
        store
            .upsert(
                DEFAULT_PRIMARY_COLLECTION,
                vec![(c.id.clone(), c.vector.clone(), c.clone())],
                true,
            )
            .await
            .unwrap();

        let clusters = detect_candidates(&store, 0.5).await.unwrap();
        assert!(clusters.is_empty());
    }
}
