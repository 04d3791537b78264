//! In-process reference implementation of [`VectorStore`] (§4.1).
//!
//! Grounded on `ConcurrentMemory` (`crates/storage/src/lib.rs`):
//! a `dashmap`-sharded map guarded by `parking_lot`, with brute-force scan
//! search instead of a real HNSW graph. Used as the default backend for
//! tests and for any deployment that doesn't need a standalone vector
//! database.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use atlas_types::{AtlasError, Chunk, ChunkId, Result};

use crate::config::{CollectionConfig, HnswUpdate, PayloadIndexSchema};
use crate::filter::PayloadFilter;
use crate::store_trait::{CollectionInfo, ScoredPoint, ScrollOffset, VectorStore};

struct Point {
    vector: Vec<f32>,
    payload: Chunk,
}

struct Collection {
    config: CollectionConfig,
    points: RwLock<Vec<(ChunkId, Point)>>,
    current_m: AtomicU32,
}

/// `dashmap`-backed [`VectorStore`]. Brute-force dot-product search; fine
/// for the data sizes a single-node reference store is meant to handle.
#[derive(Default)]
pub struct MemoryBackend {
    collections: DashMap<String, Arc<Collection>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            collections: DashMap::new(),
        }
    }

    /// Test/diagnostic hook: current `m` recorded for a collection, or
    /// `None` if the collection doesn't exist.
    pub fn current_m(&self, name: &str) -> Option<u32> {
        self.collections
            .get(name)
            .map(|c| c.current_m.load(Ordering::SeqCst))
    }

    fn get(&self, name: &str) -> Result<Arc<Collection>> {
        self.collections
            .get(name)
            .map(|c| c.clone())
            .ok_or_else(|| AtlasError::not_found(format!("collection {name} does not exist")))
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

#[async_trait]
impl VectorStore for MemoryBackend {
    async fn collection_exists(&self, name: &str) -> Result<bool> {
        Ok(self.collections.contains_key(name))
    }

    async fn create_collection(&self, name: &str, cfg: CollectionConfig) -> Result<()> {
        if let Some(existing) = self.collections.get(name) {
            if existing.config.dimension != cfg.dimension {
                return Err(AtlasError::config(format!(
                    "collection {name} already exists with dimension {}, requested {}",
                    existing.config.dimension, cfg.dimension
                )));
            }
            return Ok(());
        }
        let m = cfg.hnsw.m;
        self.collections.entry(name.to_string()).or_insert_with(|| {
            Arc::new(Collection {
                config: cfg,
                points: RwLock::new(Vec::new()),
                current_m: AtomicU32::new(m),
            })
        });
        Ok(())
    }

    async fn get_collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let collection = self.get(name)?;
        let points = collection.points.read();
        Ok(CollectionInfo {
            points_count: points.len() as u64,
            vector_dimensions: collection.config.dimension,
        })
    }

    async fn upsert(
        &self,
        name: &str,
        points: Vec<(ChunkId, Vec<f32>, Chunk)>,
        _wait: bool,
    ) -> Result<()> {
        let collection = self.get(name)?;
        for (_, vector, _) in &points {
            if vector.len() != collection.config.dimension {
                return Err(AtlasError::config(format!(
                    "vector dimension {} does not match collection {name} dimension {}",
                    vector.len(),
                    collection.config.dimension
                )));
            }
        }
        let mut guard = collection.points.write();
        for (id, vector, payload) in points {
            if let Some(slot) = guard.iter_mut().find(|(existing, _)| existing == &id) {
                slot.1 = Point { vector, payload };
            } else {
                guard.push((id, Point { vector, payload }));
            }
        }
        Ok(())
    }

    async fn scroll(
        &self,
        name: &str,
        limit: usize,
        offset: Option<ScrollOffset>,
        with_payload: bool,
        _with_vector: bool,
    ) -> Result<(Vec<Chunk>, Option<ScrollOffset>)> {
        let collection = self.get(name)?;
        let guard = collection.points.read();
        let start = offset.map(|o| o.0 as usize).unwrap_or(0);
        let page: Vec<Chunk> = guard
            .iter()
            .skip(start)
            .take(limit)
            .map(|(_, p)| {
                if with_payload {
                    p.payload.clone()
                } else {
                    Chunk {
                        original_text: String::new(),
                        ..p.payload.clone()
                    }
                }
            })
            .collect();
        let next = if start + page.len() < guard.len() {
            Some(ScrollOffset((start + page.len()) as u64))
        } else {
            None
        };
        Ok((page, next))
    }

    async fn search(
        &self,
        name: &str,
        vector: &[f32],
        limit: usize,
        filter: Option<&PayloadFilter>,
    ) -> Result<Vec<ScoredPoint>> {
        let collection = self.get(name)?;
        if vector.len() != collection.config.dimension {
            return Err(AtlasError::config(format!(
                "query vector dimension {} does not match collection {name} dimension {}",
                vector.len(),
                collection.config.dimension
            )));
        }
        let guard = collection.points.read();
        let mut scored: Vec<ScoredPoint> = guard
            .iter()
            .filter(|(_, p)| filter.map(|f| f.matches(&p.payload)).unwrap_or(true))
            .map(|(id, p)| ScoredPoint {
                id: id.clone(),
                score: dot(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();
        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.payload.created_at.cmp(&a.payload.created_at))
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        scored.truncate(limit);
        Ok(scored)
    }

    async fn create_payload_index(
        &self,
        _name: &str,
        _field: &str,
        _schema: PayloadIndexSchema,
    ) -> Result<()> {
        Ok(())
    }

    async fn update_collection(&self, name: &str, update: HnswUpdate) -> Result<()> {
        let collection = self.get(name)?;
        collection.current_m.store(update.m, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self, name: &str, ids: &[ChunkId]) -> Result<()> {
        let collection = self.get(name)?;
        let mut guard = collection.points.write();
        guard.retain(|(id, _)| !ids.contains(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atlas_types::Importance;

    fn sample_chunk(path: &str, idx: usize, vector: Vec<f32>) -> (ChunkId, Vec<f32>, Chunk) {
        let chunk = Chunk::new(
            path.to_string(),
            idx,
            1,
            vector.clone(),
            "hello world".to_string(),
            vec!["agent~emits~chunk".to_string()],
            Importance::Normal,
        );
        (chunk.id.clone(), vector, chunk)
    }

    #[tokio::test]
    async fn create_collection_is_idempotent_for_same_dimension() {
        let store = MemoryBackend::new();
        store
            .create_collection("primary", CollectionConfig::new(4))
            .await
            .unwrap();
        store
            .create_collection("primary", CollectionConfig::new(4))
            .await
            .unwrap();
        assert!(store.collection_exists("primary").await.unwrap());
    }

    #[tokio::test]
    async fn create_collection_rejects_dimension_mismatch() {
        let store = MemoryBackend::new();
        store
            .create_collection("primary", CollectionConfig::new(4))
            .await
            .unwrap();
        let err = store
            .create_collection("primary", CollectionConfig::new(8))
            .await
            .unwrap_err();
        assert!(matches!(err, AtlasError::Config(_)));
    }

    #[tokio::test]
    async fn upsert_rejects_wrong_dimension_vector() {
        let store = MemoryBackend::new();
        store
            .create_collection("primary", CollectionConfig::new(3))
            .await
            .unwrap();
        let point = sample_chunk("a.txt", 0, vec![1.0, 0.0]);
        let err = store
            .upsert("primary", vec![point], true)
            .await
            .unwrap_err();
        assert!(matches!(err, AtlasError::Config(_)));
    }

    #[tokio::test]
    async fn search_orders_by_score_desc() {
        let store = MemoryBackend::new();
        store
            .create_collection("primary", CollectionConfig::new(2))
            .await
            .unwrap();
        let close = sample_chunk("a.txt", 0, vec![1.0, 0.0]);
        let far = sample_chunk("b.txt", 0, vec![0.0, 1.0]);
        store
            .upsert("primary", vec![close.clone(), far.clone()], true)
            .await
            .unwrap();
        let hits = store
            .search("primary", &[1.0, 0.0], 10, None)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].id, close.0);
        assert!(hits[0].score >= hits[1].score);
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let store = MemoryBackend::new();
        store
            .create_collection("primary", CollectionConfig::new(2))
            .await
            .unwrap();
        let point = sample_chunk("a.txt", 0, vec![1.0, 0.0]);
        let id = point.0.clone();
        store.upsert("primary", vec![point], true).await.unwrap();
        store.delete("primary", &[id.clone()]).await.unwrap();
        store.delete("primary", &[id]).await.unwrap();
        let info = store.get_collection_info("primary").await.unwrap();
        assert_eq!(info.points_count, 0);
    }
}
