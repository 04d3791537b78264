//! The Atlas application service (§2 "Application Service"): wires the
//! storage, QNTM, ingestion, search and consolidation crates into the
//! method surface `atlasd`/`atlas-cli` speak over `atlas-protocol`.

mod events;
mod local_backends;
mod service;

pub use events::EventBroadcaster;
pub use local_backends::{HashEmbeddingBackend, LocalJsonLlm};
pub use service::AtlasService;
