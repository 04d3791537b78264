//! Collection lifecycle helper (§4.1 "Collection lifecycle", §8 property 5).
//!
//! Grounded on `NamespaceManager`
//! (`crates/storage/src/namespace_manager.rs`): fast-path existence check,
//! then a create call that tolerates a concurrent create racing in under it.

use std::sync::Arc;

use atlas_types::{AtlasError, Result};
use tracing::{debug, info};

use crate::config::{default_payload_indexes, CollectionConfig};
use crate::store_trait::VectorStore;

/// Ensures `name` exists with the given `dimension`, creating it (with the
/// standard payload indexes) if absent. Fails with [`AtlasError::Config`] if
/// the collection already exists with a different dimension — dimension
/// integrity must hold before any write (§4.1, §8 property 5).
pub async fn ensure_collection(
    store: &Arc<dyn VectorStore>,
    name: &str,
    dimension: usize,
) -> Result<()> {
    if store.collection_exists(name).await? {
        let info = store.get_collection_info(name).await?;
        if info.vector_dimensions != dimension {
            return Err(AtlasError::config(format!(
                "collection {name} has dimension {}, but backend produces dimension {dimension}",
                info.vector_dimensions
            )));
        }
        debug!(collection = name, dimension, "collection already present");
        return Ok(());
    }

    info!(collection = name, dimension, "creating collection");
    match store
        .create_collection(name, CollectionConfig::new(dimension))
        .await
    {
        Ok(()) => {}
        // A concurrent caller may have created it between our existence
        // check and this call; that's fine as long as dimensions agree,
        // which create_collection itself verifies for same-name creates.
        Err(AtlasError::Config(msg)) => {
            return Err(AtlasError::Config(msg));
        }
        Err(e) => return Err(e),
    }

    for (field, schema) in default_payload_indexes() {
        store.create_payload_index(name, field, schema).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_backend::MemoryBackend;

    #[tokio::test]
    async fn creates_collection_with_payload_indexes_when_absent() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryBackend::new());
        ensure_collection(&store, "primary", 384).await.unwrap();
        let info = store.get_collection_info("primary").await.unwrap();
        assert_eq!(info.vector_dimensions, 384);
    }

    #[tokio::test]
    async fn is_a_no_op_when_dimension_matches() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryBackend::new());
        ensure_collection(&store, "primary", 384).await.unwrap();
        ensure_collection(&store, "primary", 384).await.unwrap();
    }

    #[tokio::test]
    async fn rejects_dimension_mismatch_against_existing_collection() {
        let store: Arc<dyn VectorStore> = Arc::new(MemoryBackend::new());
        ensure_collection(&store, "primary", 384).await.unwrap();
        let err = ensure_collection(&store, "primary", 768).await.unwrap_err();
        assert!(matches!(err, AtlasError::Config(_)));
    }
}
