//! The JSON-completion LLM capability QNTM generation depends on (§4.6
//! `json_llm`). Grounded on `EmbeddingProvider`
//! (`crates/storage/src/embedding_provider.rs`): a minimal async trait that
//! names exactly the capability needed, nothing more.

use async_trait::async_trait;
use atlas_types::Result;

/// A backend capable of returning a JSON completion for a prompt. Atlas
/// never inspects prompt templates or model choice; it only requires that
/// the response parses as JSON.
#[async_trait]
pub trait JsonLlm: Send + Sync {
    async fn complete_json(&self, prompt: &str, temperature: f32) -> Result<serde_json::Value>;
}
