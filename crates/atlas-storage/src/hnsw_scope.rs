//! Scoped HNSW batch-mode toggle (§4.1 "HNSW batch mode", §5, §9 "Scoped
//! HNSW toggle", §8 property 6).
//!
//! `m = 0` disables graph maintenance during bulk writes; the outermost
//! scope re-enables it (`m = M_DEFAULT`) on every exit path, including
//! error and cancellation. Re-entrancy is tracked by a process-wide counter
//! so nested or overlapping batch scopes only toggle state once.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use atlas_types::Result;
use tracing::{error, warn};

use crate::config::{HnswUpdate, M_DEFAULT, M_DISABLED};
use crate::store_trait::VectorStore;

static INDEXING_DISABLED_DEPTH: AtomicUsize = AtomicUsize::new(0);

/// Current re-entrancy depth, exposed for tests that check §8 property 6
/// ("for any exit path ... a post-condition check observes m = M_DEFAULT").
pub fn indexing_scope_depth() -> usize {
    INDEXING_DISABLED_DEPTH.load(Ordering::SeqCst)
}

/// RAII guard produced by entering a batch scope. Call [`IndexingScopeGuard::close`]
/// on the normal exit path to restore indexing synchronously; if the guard is
/// dropped without `close` having run (error unwind, task cancellation), the
/// outermost guard still restores indexing via a best-effort detached task.
pub struct IndexingScopeGuard {
    store: Arc<dyn VectorStore>,
    collections: Vec<String>,
    owes_restore: bool,
}

impl IndexingScopeGuard {
    async fn enter(store: Arc<dyn VectorStore>, collections: Vec<String>) -> Result<Self> {
        let previous = INDEXING_DISABLED_DEPTH.fetch_add(1, Ordering::SeqCst);
        if previous == 0 {
            for name in &collections {
                store
                    .update_collection(name, HnswUpdate { m: M_DISABLED })
                    .await?;
            }
        }
        Ok(Self {
            store,
            collections,
            owes_restore: true,
        })
    }

    /// Normal-path close: restores indexing synchronously if this was the
    /// outermost scope, and marks the guard so `Drop` does not double-restore.
    pub async fn close(mut self) -> Result<()> {
        self.owes_restore = false;
        let remaining = INDEXING_DISABLED_DEPTH.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            for name in &self.collections {
                self.store
                    .update_collection(name, HnswUpdate { m: M_DEFAULT })
                    .await?;
            }
        }
        Ok(())
    }
}

impl Drop for IndexingScopeGuard {
    fn drop(&mut self) {
        if !self.owes_restore {
            return;
        }
        let remaining = INDEXING_DISABLED_DEPTH.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining != 0 {
            return;
        }
        warn!("HNSW batch scope unwound without close(); restoring indexing from Drop");
        let store = self.store.clone();
        let collections = self.collections.clone();
        tokio::spawn(async move {
            for name in &collections {
                if let Err(e) = store.update_collection(name, HnswUpdate { m: M_DEFAULT }).await {
                    error!(collection = %name, error = %e, "failed to re-enable HNSW indexing after unwind");
                }
            }
        });
    }
}

/// Run `f` with HNSW graph maintenance disabled on `collections` for the
/// duration of the call, guaranteeing indexing is re-enabled on every exit
/// path (§4.1).
pub async fn with_indexing_disabled<F, Fut, T>(
    store: Arc<dyn VectorStore>,
    collections: Vec<String>,
    f: F,
) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let guard = IndexingScopeGuard::enter(store, collections).await?;
    let result = f().await;
    guard.close().await?;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_backend::MemoryBackend;
    use crate::CollectionConfig;

    #[tokio::test]
    async fn restores_m_default_on_success() {
        let store: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
        store
            .create_collection("primary", CollectionConfig::new(3))
            .await
            .unwrap();

        let result = with_indexing_disabled(
            store.clone() as Arc<dyn VectorStore>,
            vec!["primary".to_string()],
            || async { Ok(()) },
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(store.current_m("primary"), Some(M_DEFAULT));
    }

    #[tokio::test]
    async fn restores_m_default_on_error() {
        let store: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
        store
            .create_collection("primary", CollectionConfig::new(3))
            .await
            .unwrap();

        let result: Result<()> = with_indexing_disabled(
            store.clone() as Arc<dyn VectorStore>,
            vec!["primary".to_string()],
            || async { Err(atlas_types::AtlasError::validation("boom")) },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(store.current_m("primary"), Some(M_DEFAULT));
    }

    #[tokio::test]
    async fn nested_scopes_only_toggle_once() {
        let store: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
        store
            .create_collection("primary", CollectionConfig::new(3))
            .await
            .unwrap();

        let outer_store = store.clone();
        with_indexing_disabled(
            store.clone() as Arc<dyn VectorStore>,
            vec!["primary".to_string()],
            || async move {
                assert_eq!(outer_store.current_m("primary"), Some(M_DISABLED));
                let inner_store = outer_store.clone();
                with_indexing_disabled(
                    outer_store.clone() as Arc<dyn VectorStore>,
                    vec!["primary".to_string()],
                    || async move {
                        // Still disabled: nested scope doesn't restore early.
                        assert_eq!(inner_store.current_m("primary"), Some(M_DISABLED));
                        Ok(())
                    },
                )
                .await?;
                // Inner scope closed, but outer scope still holds the depth.
                assert_eq!(outer_store.current_m("primary"), Some(M_DISABLED));
                Ok(())
            },
        )
        .await
        .unwrap();

        assert_eq!(store.current_m("primary"), Some(M_DEFAULT));
        assert_eq!(indexing_scope_depth(), 0);
    }

    #[tokio::test]
    async fn drop_without_close_still_restores() {
        let store: Arc<MemoryBackend> = Arc::new(MemoryBackend::new());
        store
            .create_collection("primary", CollectionConfig::new(3))
            .await
            .unwrap();

        {
            let _guard = IndexingScopeGuard::enter(
                store.clone() as Arc<dyn VectorStore>,
                vec!["primary".to_string()],
            )
            .await
            .unwrap();
            assert_eq!(store.current_m("primary"), Some(M_DISABLED));
            // _guard dropped here without calling close(), simulating
            // cancellation/unwind; restoration happens on a spawned task.
        }
        // Give the spawned restore task a chance to run.
        tokio::task::yield_now().await;
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(store.current_m("primary"), Some(M_DEFAULT));
    }
}
