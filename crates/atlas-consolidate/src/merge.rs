//! Merge (§4.5 "Merge"): synthesize a consolidated chunk from an accepted
//! cluster, embed it, union the parents' QNTM keys, and derive a fresh
//! content-addressed id.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;

use atlas_context::{Context, JsonLlm};
use atlas_types::{AtlasError, Chunk, ChunkId, ConsolidationMeta, Importance, Result};

use crate::classify::Classification;
use crate::cluster::ClusterCandidate;

/// Bound on the number of QNTM keys a consolidated chunk carries (§4.5 step
/// 3, "bounded to top-N by frequency if > cap").
pub const MAX_UNION_KEYS: usize = 8;

#[derive(Debug, Deserialize)]
struct RawSynthesis {
    original_text: String,
    #[serde(default)]
    reasoning: String,
}

#[async_trait]
pub trait MergeSynthesizer: Send + Sync {
    /// Returns `(original_text, reasoning)` for the merged chunk.
    async fn synthesize(
        &self,
        cluster: &ClusterCandidate,
        classification: &Classification,
    ) -> Result<(String, String)>;
}

pub struct LlmMergeSynthesizer {
    llm: Arc<dyn JsonLlm>,
}

impl LlmMergeSynthesizer {
    pub fn new(llm: Arc<dyn JsonLlm>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl MergeSynthesizer for LlmMergeSynthesizer {
    async fn synthesize(
        &self,
        cluster: &ClusterCandidate,
        classification: &Classification,
    ) -> Result<(String, String)> {
        let mut excerpts = String::new();
        for (i, chunk) in cluster.members.iter().enumerate() {
            excerpts.push_str(&format!("[{i}] {}\n", chunk.original_text));
        }
        let prompt = format!(
            "Synthesize a single merged passage capturing the shared meaning of \
             the chunks below, classified as {:?}. Respond as JSON: \
             {{\"original_text\": ..., \"reasoning\": ...}}.\n\n{excerpts}",
            classification.consolidation_type,
        );
        let value = self.llm.complete_json(&prompt, 0.2).await?;
        let raw: RawSynthesis = serde_json::from_value(value)
            .map_err(|e| AtlasError::validation(format!("malformed merge synthesis response: {e}")))?;
        if raw.original_text.trim().is_empty() {
            return Err(AtlasError::validation("merge synthesis returned empty text"));
        }
        Ok((raw.original_text, raw.reasoning))
    }
}

/// Union of parents' QNTM keys, bounded to `cap`, most-frequent first, ties
/// broken alphabetically for determinism.
pub fn union_qntm_keys(cluster: &ClusterCandidate, cap: usize) -> Vec<String> {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for chunk in &cluster.members {
        for key in &chunk.qntm_keys {
            *counts.entry(key.clone()).or_insert(0) += 1;
        }
    }
    let mut keys: Vec<(String, usize)> = counts.into_iter().collect();
    keys.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    keys.truncate(cap);
    keys.into_iter().map(|(k, _)| k).collect()
}

/// Builds the consolidated chunk for an accepted cluster (§4.5 steps 1-4).
/// Does not write to storage or mutate parents.
pub async fn build_consolidated_chunk(
    context: &Context,
    cluster: &ClusterCandidate,
    classification: &Classification,
    synthesizer: &dyn MergeSynthesizer,
) -> Result<Chunk> {
    let (original_text, reasoning) = synthesizer.synthesize(cluster, classification).await?;
    let vector = context.text_embedding().embed(&original_text).await?;
    let union_keys = union_qntm_keys(cluster, MAX_UNION_KEYS);
    let parent_ids: Vec<ChunkId> = cluster.members.iter().map(|c| c.id.clone()).collect();
    let id = ChunkId::for_consolidation(&parent_ids, &original_text);

    let mut chunk = Chunk::new(
        cluster.members[0].file_path.clone(),
        0,
        1,
        vector,
        original_text,
        union_keys,
        Importance::Normal,
    );
    chunk.id = id;
    chunk.consolidated = true;
    chunk.consolidation = Some(ConsolidationMeta {
        occurrences: cluster.members.len() as u32,
        parents: parent_ids.clone(),
        consolidated_from: parent_ids,
        consolidation_type: classification.consolidation_type,
        consolidation_direction: classification.direction,
        consolidation_reasoning: reasoning,
    });
    Ok(chunk)
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_types::{ConsolidationDirection, ConsolidationType};

    fn chunk(idx: usize, keys: &[&str]) -> Chunk {
        Chunk::new(
            format!("f{idx}.md"),
            idx,
            1,
            vec![1.0],
            format!("text {idx}"),
            keys.iter().map(|k| k.to_string()).collect(),
            Importance::Normal,
        )
    }

    #[test]
    fn union_keys_prefers_frequency_then_alphabetical() {
        let cluster = ClusterCandidate {
            collection: "x".to_string(),
            members: vec![
                chunk(0, &["a ~ b ~ c", "z ~ y ~ x"]),
                chunk(1, &["a ~ b ~ c", "m ~ n ~ o"]),
            ],
        };
        let keys = union_qntm_keys(&cluster, 2);
        assert_eq!(keys, vec!["a ~ b ~ c".to_string(), "m ~ n ~ o".to_string()]);
    }

    #[test]
    fn union_keys_respects_cap() {
        let cluster = ClusterCandidate {
            collection: "x".to_string(),
            members: vec![chunk(0, &["a ~ b ~ c", "d ~ e ~ f", "g ~ h ~ i"])],
        };
        assert_eq!(union_qntm_keys(&cluster, 2).len(), 2);
    }

    struct StubSynthesizer;

    #[async_trait]
    impl MergeSynthesizer for StubSynthesizer {
        async fn synthesize(
            &self,
            _cluster: &ClusterCandidate,
            _classification: &Classification,
        ) -> Result<(String, String)> {
            Ok(("merged text".to_string(), "because duplicated".to_string()))
        }
    }

    #[tokio::test]
    async fn build_consolidated_chunk_sets_provenance() {
        use atlas_context::{BackendRegistry, EmbeddingBackend};
        use atlas_storage::MemoryBackend;

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
        struct StubLlm;
        #[async_trait]
        impl JsonLlm for StubLlm {
            async fn complete_json(&self, _prompt: &str, _temperature: f32) -> Result<serde_json::Value> {
                Ok(serde_json::json!({}))
            }
        }

        let registry = BackendRegistry {
            text_embedding: Arc::new(FixedEmbedder),
            code_embedding: None,
            contextualized_embedding: None,
            json_llm: Arc::new(StubLlm),
            text_llm: None,
            vector_storage: Arc::new(MemoryBackend::new()),
        };
        let context = Context::build(Arc::new(registry)).await.unwrap();

        let cluster = ClusterCandidate {
            collection: "a_b_c".to_string(),
            members: vec![chunk(0, &["a ~ b ~ c"]), chunk(1, &["a ~ b ~ c"])],
        };
        let classification = Classification {
            consolidation_type: ConsolidationType::DuplicateWork,
            direction: ConsolidationDirection::Convergent,
            confidence: 0.9,
        };

        let merged = build_consolidated_chunk(&context, &cluster, &classification, &StubSynthesizer)
            .await
            .unwrap();

        assert!(merged.consolidated);
        let meta = merged.consolidation.unwrap();
        assert_eq!(meta.parents.len(), 2);
        assert_eq!(meta.consolidation_type, ConsolidationType::DuplicateWork);
        assert_eq!(meta.consolidation_reasoning, "because duplicated");
    }
}
