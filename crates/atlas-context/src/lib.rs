//! Context and configuration (§4.6): the process-wide backend registry,
//! the per-operation `Context` with its eagerly-computed capability flags,
//! and recognized configuration options.

mod backends;
mod config;
mod context;
mod registry;

pub use backends::{EmbeddingBackend, JsonLlm, TextLlm, VectorStore};
pub use config::{
    AtlasConfig, BackendSelection, ChunkingConfig, ConsolidationSettings, HnswSettings,
    QuantizationSettings, SearchSettings,
};
pub use context::Context;
pub use registry::{global, install, reset_for_tests, BackendRegistry};
