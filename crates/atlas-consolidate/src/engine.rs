//! The consolidation engine (§4.5): orchestrates a full pass over the
//! store - detection, classification, merge, write, and parent marking -
//! with per-cluster failure isolation and a dry-run mode.
//!
//! Step ordering follows `LearningPipeline`
//! (`crates/storage/src/learning_pipeline.rs`) and `BulkIngester`'s
//! per-item failure aggregation (`crates/bulk-ingester/src/core.rs`):
//! a cluster here plays the role a file plays there - one unit of work
//! that can fail independently of the rest of the pass.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use atlas_context::Context;
use atlas_storage::ensure_collection;
use atlas_types::{AtlasError, Chunk, ChunkId, Result};

use crate::classify::{Classification, ClusterClassifier};
use crate::cluster::{detect_candidates, ClusterCandidate, DEFAULT_PRIMARY_COLLECTION};
use crate::dag::would_create_cycle;
use crate::merge::{build_consolidated_chunk, MergeSynthesizer};

/// A merge that would be performed, surfaced without writing under
/// `dry_run=true` (§4.5 "Dry Run").
#[derive(Debug, Clone)]
pub struct ProposedMerge {
    pub collection: String,
    pub parent_ids: Vec<ChunkId>,
    pub consolidation_type: atlas_types::ConsolidationType,
    pub direction: atlas_types::ConsolidationDirection,
}

#[derive(Debug, Clone, Default)]
pub struct ConsolidationOutcome {
    pub candidates_evaluated: usize,
    pub consolidations_performed: usize,
    pub chunks_absorbed: usize,
    pub proposed: Vec<ProposedMerge>,
}

pub struct ConsolidationEngine {
    context: Arc<Context>,
    classifier: Arc<dyn ClusterClassifier>,
    synthesizer: Arc<dyn MergeSynthesizer>,
    similarity_threshold: f32,
}

impl ConsolidationEngine {
    pub fn new(
        context: Arc<Context>,
        classifier: Arc<dyn ClusterClassifier>,
        synthesizer: Arc<dyn MergeSynthesizer>,
        similarity_threshold: f32,
    ) -> Self {
        Self {
            context,
            classifier,
            synthesizer,
            similarity_threshold,
        }
    }

    /// Runs one full consolidation pass (§4.5). Clusters are processed
    /// sequentially; a failure in one cluster is isolated and does not
    /// abort the pass (§4.5 "Failure Semantics").
    pub async fn run(&self, dry_run: bool) -> Result<ConsolidationOutcome> {
        let store = self.context.vector_storage();
        let clusters = detect_candidates(store, self.similarity_threshold).await?;

        let mut outcome = ConsolidationOutcome {
            candidates_evaluated: clusters.len(),
            ..Default::default()
        };

        for cluster in clusters {
            let label = cluster.collection.clone();
            match self.process_cluster(&cluster, dry_run).await {
                Ok(Some(absorbed)) => {
                    outcome.consolidations_performed += 1;
                    outcome.chunks_absorbed += absorbed;
                }
                Ok(None) => {}
                Err(ProcessOutcome::Proposed(proposed)) => {
                    outcome.proposed.push(proposed);
                }
                Err(ProcessOutcome::Failed(err)) => {
                    let wrapped = AtlasError::consolidation(label, err);
                    warn!(error = %wrapped, "consolidation cluster failed, continuing pass");
                }
            }
        }

        info!(
            candidates_evaluated = outcome.candidates_evaluated,
            consolidations_performed = outcome.consolidations_performed,
            chunks_absorbed = outcome.chunks_absorbed,
            dry_run,
            "consolidation pass complete"
        );

        Ok(outcome)
    }

    /// Returns `Ok(Some(n))` on a real merge absorbing `n` parents,
    /// `Ok(None)` when the cluster was classified-out (below confidence
    /// floor or unrecognized), or an `Err` signaling either a dry-run
    /// proposal or a genuine failure to the caller.
    async fn process_cluster(
        &self,
        cluster: &ClusterCandidate,
        dry_run: bool,
    ) -> std::result::Result<Option<usize>, ProcessOutcome> {
        let classification = self
            .classifier
            .classify(cluster)
            .await
            .map_err(ProcessOutcome::Failed)?;
        let Some(classification) = classification else {
            return Ok(None);
        };

        // Steps 1-3 (synthesize, embed, union_qntm_keys) always run, dry run
        // or not, so a dry run surfaces the same synthesis/embed failures a
        // real run would hit. Only steps 4-6 (id/write/mark) are suppressed.
        let merged = build_consolidated_chunk(&self.context, cluster, &classification, self.synthesizer.as_ref())
            .await
            .map_err(ProcessOutcome::Failed)?;

        if dry_run {
            return Err(ProcessOutcome::Proposed(ProposedMerge {
                collection: cluster.collection.clone(),
                parent_ids: cluster.members.iter().map(|c| c.id.clone()).collect(),
                consolidation_type: classification.consolidation_type,
                direction: classification.direction,
            }));
        }

        let lookup: HashMap<String, Chunk> = cluster
            .members
            .iter()
            .map(|c| (c.id.as_str().to_string(), c.clone()))
            .collect();
        if would_create_cycle(&merged.id, &cluster.members, |id| lookup.get(id.as_str()).cloned()) {
            return Err(ProcessOutcome::Failed(AtlasError::validation(
                "merge would introduce a cycle in the consolidation DAG",
            )));
        }

        match self.write_merge(&merged, cluster).await {
            Ok(()) => Ok(Some(cluster.members.len())),
            Err(err) => {
                self.rollback_merge(&merged).await;
                Err(ProcessOutcome::Failed(err))
            }
        }
    }

    async fn write_merge(&self, merged: &Chunk, cluster: &ClusterCandidate) -> Result<()> {
        let store = self.context.vector_storage();
        let dimension = self.context.dimensions;

        for collection in target_collections(merged) {
            ensure_collection(store, &collection, dimension).await?;
            store
                .upsert(&collection, vec![(merged.id.clone(), merged.vector.clone(), merged.clone())], true)
                .await?;
        }

        for parent in &cluster.members {
            let mut updated = parent.clone();
            updated.mark_consolidated();
            for collection in target_collections(&updated) {
                ensure_collection(store, &collection, dimension).await?;
                store
                    .upsert(
                        &collection,
                        vec![(updated.id.clone(), updated.vector.clone(), updated.clone())],
                        true,
                    )
                    .await?;
            }
        }

        Ok(())
    }

    /// Best-effort rollback of a partially-written merge (§4.5 "Failure
    /// Semantics"): delete the new consolidated id from every collection it
    /// might have reached. Parent mutations are left alone - marking a
    /// parent `consolidated=true` twice is idempotent, so a retried pass
    /// simply redoes it.
    async fn rollback_merge(&self, merged: &Chunk) {
        let store = self.context.vector_storage();
        for collection in target_collections(merged) {
            if let Err(err) = store.delete(&collection, &[merged.id.clone()]).await {
                error!(collection = %collection, error = %err, "rollback delete failed, manual cleanup may be needed");
            }
        }
    }
}

fn target_collections(chunk: &Chunk) -> Vec<String> {
    let mut collections = vec![DEFAULT_PRIMARY_COLLECTION.to_string()];
    for key in &chunk.qntm_keys {
        let sanitized = atlas_qntm::sanitize(key);
        if !collections.contains(&sanitized) {
            collections.push(sanitized);
        }
    }
    collections
}

enum ProcessOutcome {
    Proposed(ProposedMerge),
    Failed(AtlasError),
}

/// Wires a [`ConsolidationEngine`] into `atlas-ingest`'s auto-consolidation
/// hook (§4.3 step 8). A threshold-triggered run is always a real
/// (non-dry-run) pass; its detailed outcome is logged, not returned, since
/// the ingest pipeline only needs success/failure.
#[async_trait]
impl atlas_ingest::ConsolidationTrigger for ConsolidationEngine {
    async fn consolidate(&self) -> Result<()> {
        let outcome = self.run(false).await?;
        info!(
            consolidations_performed = outcome.consolidations_performed,
            chunks_absorbed = outcome.chunks_absorbed,
            "auto-consolidation triggered by ingest threshold"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_context::{BackendRegistry, EmbeddingBackend, JsonLlm};
    use atlas_storage::{CollectionConfig, MemoryBackend, VectorStore};
    use atlas_types::Importance;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingBackend for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
        fn dimension(&self) -> usize {
            2
        }
    }

    struct StubJsonLlm;

    #[async_trait]
    impl JsonLlm for StubJsonLlm {
        async fn complete_json(&self, _prompt: &str, _temperature: f32) -> Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
    }

    struct MockClassifier;

    #[async_trait]
    impl ClusterClassifier for MockClassifier {
        async fn classify(&self, _cluster: &ClusterCandidate) -> Result<Option<Classification>> {
            Ok(Some(Classification {
                consolidation_type: atlas_types::ConsolidationType::DuplicateWork,
                direction: atlas_types::ConsolidationDirection::Convergent,
                confidence: 0.95,
            }))
        }
    }

    struct MockSynthesizer;

    #[async_trait]
    impl MergeSynthesizer for MockSynthesizer {
        async fn synthesize(
            &self,
            _cluster: &ClusterCandidate,
            _classification: &Classification,
        ) -> Result<(String, String)> {
            Ok(("S".to_string(), "near-identical across files".to_string()))
        }
    }

    async fn seeded() -> (Arc<Context>, Arc<dyn VectorStore>) {
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

        for i in 0..3 {
            let chunk = Chunk::new(
                format!("f{i}.md"),
                0,
                1,
                vec![1.0, 0.0],
                format!("duplicate text {i}"),
                vec!["a ~ b ~ c".to_string()],
                Importance::Normal,
            );
            store
                .upsert(
                    DEFAULT_PRIMARY_COLLECTION,
                    vec![(chunk.id.clone(), chunk.vector.clone(), chunk.clone())],
                    true,
                )
                .await
                .unwrap();
            store
                .upsert(&collection, vec![(chunk.id.clone(), chunk.vector.clone(), chunk)], true)
                .await
                .unwrap();
        }

        let registry = BackendRegistry {
            text_embedding: Arc::new(FixedEmbedder),
            code_embedding: None,
            contextualized_embedding: None,
            json_llm: Arc::new(StubJsonLlm),
            text_llm: None,
            vector_storage: store.clone(),
        };
        let context = Arc::new(Context::build(Arc::new(registry)).await.unwrap());
        (context, store)
    }

    #[tokio::test]
    async fn consolidates_three_near_identical_chunks_into_one() {
        let (context, store) = seeded().await;
        let engine = ConsolidationEngine::new(
            context.clone(),
            Arc::new(MockClassifier),
            Arc::new(MockSynthesizer),
            0.9,
        );

        let outcome = engine.run(false).await.unwrap();
        assert_eq!(outcome.candidates_evaluated, 1);
        assert_eq!(outcome.consolidations_performed, 1);
        assert_eq!(outcome.chunks_absorbed, 3);

        let (primary_chunks, _) = store
            .scroll(DEFAULT_PRIMARY_COLLECTION, 100, None, true, false)
            .await
            .unwrap();
        let consolidated: Vec<_> = primary_chunks.iter().filter(|c| c.consolidated && c.consolidation.is_some()).collect();
        assert_eq!(consolidated.len(), 1);
        assert_eq!(consolidated[0].consolidation.as_ref().unwrap().parents.len(), 3);

        let parents_marked = primary_chunks.iter().filter(|c| c.consolidation.is_none() && c.consolidated).count();
        assert_eq!(parents_marked, 3);
    }

    #[tokio::test]
    async fn dry_run_performs_no_writes() {
        let (context, store) = seeded().await;
        let engine = ConsolidationEngine::new(
            context.clone(),
            Arc::new(MockClassifier),
            Arc::new(MockSynthesizer),
            0.9,
        );

        let outcome = engine.run(true).await.unwrap();
        assert_eq!(outcome.candidates_evaluated, 1);
        assert_eq!(outcome.consolidations_performed, 0);
        assert_eq!(outcome.chunks_absorbed, 0);
        assert_eq!(outcome.proposed.len(), 1);

        let (primary_chunks, _) = store
            .scroll(DEFAULT_PRIMARY_COLLECTION, 100, None, true, false)
            .await
            .unwrap();
        assert_eq!(primary_chunks.len(), 3);
        assert!(primary_chunks.iter().all(|c| !c.consolidated));
    }
}
