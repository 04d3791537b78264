//! Process-wide backend registry (§4.6, §5 "Backend clients are
//! process-wide singletons (lazy-initialized, reset for tests)").
//!
//! Grounded on `crates/storage`'s module-level statics pattern combined
//! with `once_cell`, though here the registry never constructs concrete
//! backend clients itself (they are out of scope, §1) — it only holds
//! whatever the application layer installs at startup.

use std::sync::Arc;

use once_cell::sync::OnceCell;
use parking_lot::RwLock;

use atlas_types::{AtlasError, Result};

use crate::backends::{EmbeddingBackend, JsonLlm, TextLlm, VectorStore};

/// The set of backends a running Atlas instance has resolved. Required
/// members: `text_embedding`, `json_llm`, `vector_storage`. Everything else
/// is an optional capability (§4.6).
pub struct BackendRegistry {
    pub text_embedding: Arc<dyn EmbeddingBackend>,
    pub code_embedding: Option<Arc<dyn EmbeddingBackend>>,
    pub contextualized_embedding: Option<Arc<dyn EmbeddingBackend>>,
    pub json_llm: Arc<dyn JsonLlm>,
    pub text_llm: Option<Arc<dyn TextLlm>>,
    pub vector_storage: Arc<dyn VectorStore>,
}

static REGISTRY: OnceCell<RwLock<Option<Arc<BackendRegistry>>>> = OnceCell::new();

fn slot() -> &'static RwLock<Option<Arc<BackendRegistry>>> {
    REGISTRY.get_or_init(|| RwLock::new(None))
}

/// Installs the process-wide registry. Called once at startup by the
/// application layer after constructing concrete backend clients.
pub fn install(registry: BackendRegistry) {
    *slot().write() = Some(Arc::new(registry));
}

/// Returns the installed registry, or a `ConfigError` if nothing has been
/// installed yet (§7 "Pipeline-wide preconditions ... missing backends ...
/// are fatal").
pub fn global() -> Result<Arc<BackendRegistry>> {
    slot()
        .read()
        .clone()
        .ok_or_else(|| AtlasError::config("no backend registry installed"))
}

/// Test-only reset hook (§5 "reset for tests").
pub fn reset_for_tests() {
    *slot().write() = None;
}
