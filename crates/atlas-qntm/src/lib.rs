//! The QNTM key subsystem (§4.2): grammar, sanitization, LLM-backed
//! generation with reuse, and bounded-concurrency batch generation.

mod batch;
mod generator;
mod grammar;
mod llm;
mod reuse_cache;
mod sanitize;

pub use batch::generate_batch;
pub use generator::{GenerationOptions, GenerationResult, KeyGenerator, LlmKeyGenerator, MockKeyGenerator};
pub use grammar::{is_valid_key, validate_key};
pub use llm::JsonLlm;
pub use reuse_cache::ReuseCache;
pub use sanitize::sanitize;
