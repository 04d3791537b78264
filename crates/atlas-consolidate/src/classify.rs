//! LLM-assisted classification (§4.5 "Classification"): for each cluster,
//! decide whether it is `duplicate_work`, `sequential_iteration`, or
//! `contextual_convergence`, and a temporal direction, subject to a
//! confidence floor.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use atlas_context::JsonLlm;
use atlas_types::{AtlasError, ConsolidationDirection, ConsolidationType, Result};

use crate::cluster::ClusterCandidate;

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub consolidation_type: ConsolidationType,
    pub direction: ConsolidationDirection,
    pub confidence: f32,
}

#[async_trait]
pub trait ClusterClassifier: Send + Sync {
    /// Returns `None` when the cluster should be skipped (classification
    /// confidence below the floor, or an unrecognized classification).
    async fn classify(&self, cluster: &ClusterCandidate) -> Result<Option<Classification>>;
}

#[derive(Debug, Deserialize)]
struct RawClassification {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    direction: String,
    confidence: f32,
}

pub struct LlmClusterClassifier {
    llm: Arc<dyn JsonLlm>,
    confidence_floor: f32,
}

impl LlmClusterClassifier {
    pub fn new(llm: Arc<dyn JsonLlm>, confidence_floor: f32) -> Self {
        Self {
            llm,
            confidence_floor,
        }
    }

    fn build_prompt(cluster: &ClusterCandidate) -> String {
        let mut excerpts = String::new();
        for (i, chunk) in cluster.members.iter().enumerate() {
            excerpts.push_str(&format!(
                "[{i}] file={} created_at={} text={}\n",
                chunk.file_path,
                chunk.created_at.to_rfc3339(),
                truncate(&chunk.original_text, 240),
            ));
        }
        format!(
            "The chunks below were judged semantically similar. Classify the \
             relationship as exactly one of `duplicate_work` (near-identical \
             content across files), `sequential_iteration` (ordered refinements \
             on the same topic), or `contextual_convergence` (distinct contexts \
             expressing the same underlying concept). Infer a direction of \
             `forward`, `backward`, `convergent`, or `unknown` (timestamps are a \
             hint, not a rule). Respond as JSON: {{\"type\": ..., \"direction\": \
             ..., \"confidence\": 0.0-1.0}}.\n\n{excerpts}"
        )
    }
}

#[async_trait]
impl ClusterClassifier for LlmClusterClassifier {
    async fn classify(&self, cluster: &ClusterCandidate) -> Result<Option<Classification>> {
        let prompt = Self::build_prompt(cluster);
        let value = self.llm.complete_json(&prompt, 0.1).await?;
        let raw: RawClassification = serde_json::from_value(value)
            .map_err(|e| AtlasError::validation(format!("malformed classification response: {e}")))?;

        if raw.confidence < self.confidence_floor {
            return Ok(None);
        }

        let consolidation_type = match raw.kind.as_str() {
            "duplicate_work" => ConsolidationType::DuplicateWork,
            "sequential_iteration" => ConsolidationType::SequentialIteration,
            "contextual_convergence" => ConsolidationType::ContextualConvergence,
            other => {
                warn!(kind = %other, "unrecognized consolidation type, skipping cluster");
                return Ok(None);
            }
        };
        let direction = match raw.direction.as_str() {
            "forward" => ConsolidationDirection::Forward,
            "backward" => ConsolidationDirection::Backward,
            "convergent" => ConsolidationDirection::Convergent,
            _ => ConsolidationDirection::Unknown,
        };

        Ok(Some(Classification {
            consolidation_type,
            direction,
            confidence: raw.confidence,
        }))
    }
}

fn truncate(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_types::Importance;

    struct StubLlm(serde_json::Value);

    #[async_trait]
    impl JsonLlm for StubLlm {
        async fn complete_json(&self, _prompt: &str, _temperature: f32) -> Result<serde_json::Value> {
            Ok(self.0.clone())
        }
    }

    fn cluster() -> ClusterCandidate {
        ClusterCandidate {
            collection: "a_b_c".to_string(),
            members: vec![
                atlas_types::Chunk::new(
                    "a.md".into(),
                    0,
                    1,
                    vec![1.0],
                    "one".into(),
                    vec!["a ~ b ~ c".into()],
                    Importance::Normal,
                ),
                atlas_types::Chunk::new(
                    "b.md".into(),
                    0,
                    1,
                    vec![1.0],
                    "two".into(),
                    vec!["a ~ b ~ c".into()],
                    Importance::Normal,
                ),
            ],
        }
    }

    #[tokio::test]
    async fn below_confidence_floor_is_skipped() {
        let llm = StubLlm(serde_json::json!({"type": "duplicate_work", "direction": "convergent", "confidence": 0.2}));
        let classifier = LlmClusterClassifier::new(Arc::new(llm), 0.5);
        assert_eq!(classifier.classify(&cluster()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn accepts_valid_classification_above_floor() {
        let llm = StubLlm(serde_json::json!({"type": "duplicate_work", "direction": "convergent", "confidence": 0.9}));
        let classifier = LlmClusterClassifier::new(Arc::new(llm), 0.5);
        let result = classifier.classify(&cluster()).await.unwrap().unwrap();
        assert_eq!(result.consolidation_type, ConsolidationType::DuplicateWork);
        assert_eq!(result.direction, ConsolidationDirection::Convergent);
    }

    #[tokio::test]
    async fn unknown_type_is_skipped() {
        let llm = StubLlm(serde_json::json!({"type": "something_else", "direction": "convergent", "confidence": 0.9}));
        let classifier = LlmClusterClassifier::new(Arc::new(llm), 0.5);
        assert_eq!(classifier.classify(&cluster()).await.unwrap(), None);
    }
}
