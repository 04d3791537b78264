//! Storage abstraction for Atlas (§4.1): collection lifecycle, dimension
//! validation, payload filtering, and HNSW batch-mode scoping over a single
//! [`VectorStore`] trait object.
//!
//! [`MemoryBackend`] is the in-process reference implementation; anything
//! implementing `VectorStore` can stand in for it behind a `BackendRegistry`
//! (see `atlas-context`).

mod collection_manager;
mod config;
mod filter;
mod hnsw_scope;
mod memory_backend;
mod store_trait;

pub use collection_manager::ensure_collection;
pub use config::{
    default_payload_indexes, CollectionConfig, Distance, HnswParams, HnswUpdate,
    PayloadIndexSchema, QuantizationConfig, QuantizationType, M_DEFAULT, M_DISABLED,
};
pub use filter::PayloadFilter;
pub use hnsw_scope::{indexing_scope_depth, with_indexing_disabled, IndexingScopeGuard};
pub use memory_backend::MemoryBackend;
pub use store_trait::{CollectionInfo, ScoredPoint, ScrollOffset, VectorStore};
