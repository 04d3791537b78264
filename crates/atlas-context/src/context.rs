//! Per-operation context (§4.6): eagerly-resolved backends plus the
//! capability flags computed once at construction.

use std::sync::Arc;

use atlas_types::Result;

use crate::backends::{EmbeddingBackend, JsonLlm, TextLlm, VectorStore};
use crate::registry::{self, BackendRegistry};

/// A resolved, ready-to-use operation context. `ensure_available()` has
/// already been called on every present backend by the time this is
/// constructed; any failure there aborts construction (§4.6 "failure
/// short-circuits the operation with a diagnostic error").
pub struct Context {
    registry: Arc<BackendRegistry>,
    pub contextualized_available: bool,
    pub code_embedding_available: bool,
    pub dimensions: usize,
}

impl Context {
    /// Builds a context from an already-resolved registry, running each
    /// backend's `ensure_available` hook and computing capability flags.
    pub async fn build(registry: Arc<BackendRegistry>) -> Result<Self> {
        registry.text_embedding.ensure_available().await?;
        if let Some(backend) = &registry.code_embedding {
            backend.ensure_available().await?;
        }
        if let Some(backend) = &registry.contextualized_embedding {
            backend.ensure_available().await?;
        }
        if let Some(backend) = &registry.text_llm {
            backend.ensure_available().await?;
        }

        let dimensions = registry.text_embedding.dimension();
        let contextualized_available = registry.contextualized_embedding.is_some();
        let code_embedding_available = registry.code_embedding.is_some();

        Ok(Self {
            registry,
            contextualized_available,
            code_embedding_available,
            dimensions,
        })
    }

    /// Convenience constructor resolving from the process-wide registry.
    pub async fn from_global() -> Result<Self> {
        Self::build(registry::global()?).await
    }

    pub fn text_embedding(&self) -> &Arc<dyn EmbeddingBackend> {
        &self.registry.text_embedding
    }

    pub fn code_embedding(&self) -> Option<&Arc<dyn EmbeddingBackend>> {
        self.registry.code_embedding.as_ref()
    }

    pub fn contextualized_embedding(&self) -> Option<&Arc<dyn EmbeddingBackend>> {
        self.registry.contextualized_embedding.as_ref()
    }

    pub fn json_llm(&self) -> &Arc<dyn JsonLlm> {
        &self.registry.json_llm
    }

    pub fn text_llm(&self) -> Option<&Arc<dyn TextLlm>> {
        self.registry.text_llm.as_ref()
    }

    pub fn vector_storage(&self) -> &Arc<dyn VectorStore> {
        &self.registry.vector_storage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use atlas_storage::MemoryBackend;

    struct FixedEmbedder {
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingBackend for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.0; self.dimension])
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.0; self.dimension]).collect())
        }
        fn dimension(&self) -> usize {
            self.dimension
        }
    }

    struct StubJsonLlm;

    #[async_trait]
    impl JsonLlm for StubJsonLlm {
        async fn complete_json(&self, _prompt: &str, _temperature: f32) -> Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
    }

    fn test_registry() -> BackendRegistry {
        BackendRegistry {
            text_embedding: Arc::new(FixedEmbedder { dimension: 8 }),
            code_embedding: None,
            contextualized_embedding: None,
            json_llm: Arc::new(StubJsonLlm),
            text_llm: None,
            vector_storage: Arc::new(MemoryBackend::new()),
        }
    }

    #[tokio::test]
    async fn computes_capability_flags_and_dimension() {
        let ctx = Context::build(Arc::new(test_registry())).await.unwrap();
        assert_eq!(ctx.dimensions, 8);
        assert!(!ctx.contextualized_available);
        assert!(!ctx.code_embedding_available);
    }
}
