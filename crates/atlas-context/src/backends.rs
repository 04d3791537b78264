//! Embedding and free-text LLM capabilities (§4.6).
//!
//! `EmbeddingBackend` is grounded directly on `EmbeddingProvider`
//! (`crates/storage/src/embedding_provider.rs`); the
//! json-completion and vector-storage capabilities are the traits from
//! `atlas-qntm`/`atlas-storage` re-exported as the other two members of the
//! registry.

use async_trait::async_trait;
use atlas_types::Result;

pub use atlas_qntm::JsonLlm;
pub use atlas_storage::VectorStore;

/// An embedding backend: text in, fixed-dimension vector out. Each
/// registered embedding capability (`text_embedding`, `code_embedding`,
/// `contextualized_embedding`) implements this.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Batch form; order of the result matches `texts` (§4.3 step c).
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Output vector dimension `D` this backend produces.
    fn dimension(&self) -> usize;

    /// One-time preparatory step (e.g. a model pull); failure should
    /// short-circuit the operation with a diagnostic error (§4.6).
    async fn ensure_available(&self) -> Result<()> {
        Ok(())
    }
}

/// Optional free-text completion capability (`text_llm`, §4.6). Distinct
/// from [`JsonLlm`], which is required and returns structured JSON.
#[async_trait]
pub trait TextLlm: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;

    async fn ensure_available(&self) -> Result<()> {
        Ok(())
    }
}
