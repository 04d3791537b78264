//! Shared data model for Atlas: the `Chunk` record, its identifier scheme,
//! importance levels and the cross-component error taxonomy.
//!
//! Every other Atlas crate depends on this one; it carries no business logic
//! of its own, only the shapes every component agrees on.

mod chunk;
mod error;
mod importance;
pub mod retry;

pub use chunk::{Chunk, ChunkId, ConsolidationDirection, ConsolidationMeta, ConsolidationType};
pub use error::AtlasError;
pub use importance::Importance;
pub use retry::{retry_with_backoff, BackoffConfig};

/// Result alias used throughout the Atlas workspace.
pub type Result<T> = std::result::Result<T, AtlasError>;
