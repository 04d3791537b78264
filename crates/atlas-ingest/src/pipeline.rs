//! The ingestion pipeline orchestrator (§4.3).
//!
//! Grounded on `BulkIngester`/`LearningPipeline`
//! (`crates/bulk-ingester/src/core.rs`, `crates/storage/src/
//! learning_pipeline.rs`): a driver that strings together discovery,
//! chunking, embedding and storage in one orchestration type, reporting
//! per-item failures instead of aborting the whole run.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info, warn};

use atlas_context::Context;
use atlas_qntm::{generate_batch, GenerationResult, KeyGenerator, ReuseCache};
use atlas_storage::{ensure_collection, with_indexing_disabled, PayloadFilter, ScrollOffset, VectorStore};
use atlas_types::{retry_with_backoff, AtlasError, BackoffConfig, Chunk, Importance, Result};

use crate::chunker::chunk_text;
use crate::discovery::{compute_root, default_ignore_patterns, expand_paths};
use crate::progress::{FileProgress, NoOpProgressSink, ProgressSink};

pub const DEFAULT_PRIMARY_COLLECTION: &str = "atlas_context";

/// Hook invoked when the auto-consolidation threshold is crossed (§4.3 step
/// 8). Lives behind a trait so `atlas-ingest` doesn't depend on
/// `atlas-consolidate`; the application layer wires the real engine in.
#[async_trait]
pub trait ConsolidationTrigger: Send + Sync {
    async fn consolidate(&self) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct IngestOptions {
    pub paths: Vec<PathBuf>,
    pub recursive: bool,
    pub root_dir: Option<PathBuf>,
    pub watch: bool,
    pub verbose: bool,
    pub consolidation_threshold: Option<u64>,
    pub allow_consolidation: Option<bool>,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            paths: Vec::new(),
            recursive: true,
            root_dir: None,
            watch: false,
            verbose: false,
            consolidation_threshold: None,
            allow_consolidation: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestOutcome {
    pub files_processed: usize,
    pub chunks_stored: usize,
    pub errors: Vec<String>,
}

pub struct IngestPipeline {
    context: Arc<Context>,
    key_generator: Arc<dyn KeyGenerator>,
    consolidation_trigger: Option<Arc<dyn ConsolidationTrigger>>,
    primary_collection: String,
    chunk_size: usize,
    chunk_overlap: usize,
    chunk_separators: Vec<String>,
    existing_keys_sample_size: usize,
    qntm_concurrency: usize,
    default_consolidation_threshold: u64,
    default_allow_consolidation: bool,
    chunks_since_consolidation: AtomicU64,
}

impl IngestPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: Arc<Context>,
        key_generator: Arc<dyn KeyGenerator>,
        consolidation_trigger: Option<Arc<dyn ConsolidationTrigger>>,
        config: &atlas_context::AtlasConfig,
    ) -> Self {
        Self {
            context,
            key_generator,
            consolidation_trigger,
            primary_collection: DEFAULT_PRIMARY_COLLECTION.to_string(),
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            chunk_separators: config.chunking.chunk_separators.clone(),
            existing_keys_sample_size: 50,
            qntm_concurrency: 8,
            default_consolidation_threshold: config.consolidation.threshold,
            default_allow_consolidation: config.consolidation.allowed,
            chunks_since_consolidation: AtomicU64::new(0),
        }
    }

    /// Scrolls the primary collection gathering the union of `qntm_keys`
    /// (§4.2 "Key Reuse Cache").
    async fn harvest_existing_keys(&self) -> Result<ReuseCache> {
        let store = self.context.vector_storage();
        let mut keys = std::collections::BTreeSet::new();
        let mut offset = None;
        loop {
            let (chunks, next) = store
                .scroll(&self.primary_collection, 256, offset, true, false)
                .await?;
            for chunk in &chunks {
                keys.extend(chunk.qntm_keys.iter().cloned());
            }
            match next {
                Some(o) => offset = Some(o),
                None => break,
            }
        }
        Ok(ReuseCache::from_keys(keys))
    }

    pub async fn ingest(
        &self,
        options: IngestOptions,
        progress: Option<Arc<dyn ProgressSink>>,
    ) -> Result<IngestOutcome> {
        let progress = progress.unwrap_or_else(|| Arc::new(NoOpProgressSink));

        let root = match &options.root_dir {
            Some(r) => r.clone(),
            None => compute_root(&options.paths)?,
        };
        let files = expand_paths(&options.paths, options.recursive, &default_ignore_patterns());

        let store = self.context.vector_storage().clone();
        ensure_collection(&store, &self.primary_collection, self.context.dimensions).await?;

        let reuse_cache = self.harvest_existing_keys().await?;

        let mut outcome = IngestOutcome::default();
        let files_total = files.len();

        let primary = self.primary_collection.clone();
        let result: Result<IngestOutcome> = with_indexing_disabled(store.clone(), vec![primary.clone()], || async {
            let mut outcome = IngestOutcome::default();
            for (idx, file) in files.iter().enumerate() {
                match self.process_file(file, &root, &reuse_cache).await {
                    Ok(chunk_count) => {
                        outcome.files_processed += 1;
                        outcome.chunks_stored += chunk_count;
                        progress.on_file_progress(FileProgress {
                            file_path: relative_path(file, &root),
                            chunks_in_file: chunk_count,
                            files_processed: idx + 1,
                            files_total,
                        });
                        self.chunks_since_consolidation
                            .fetch_add(chunk_count as u64, Ordering::SeqCst);
                    }
                    Err(e) => {
                        error!(file = %file.display(), error = %e, "file ingestion failed");
                        outcome
                            .errors
                            .push(format!("{}: {e}", file.display()));
                    }
                }
            }
            Ok(outcome)
        })
        .await;

        outcome = result?;

        self.maybe_trigger_consolidation(&options).await;

        Ok(outcome)
    }

    async fn maybe_trigger_consolidation(&self, options: &IngestOptions) {
        let Some(trigger) = &self.consolidation_trigger else {
            return;
        };
        let allowed = options
            .allow_consolidation
            .unwrap_or(self.default_allow_consolidation);
        if !allowed {
            return;
        }
        let threshold = options
            .consolidation_threshold
            .unwrap_or(self.default_consolidation_threshold);
        if self.chunks_since_consolidation.load(Ordering::SeqCst) < threshold {
            return;
        }
        match trigger.consolidate().await {
            Ok(()) => {
                self.chunks_since_consolidation.store(0, Ordering::SeqCst);
                info!("auto-consolidation pass completed, counter reset");
            }
            Err(e) => {
                warn!(error = %e, "auto-consolidation pass failed, will retry once threshold is next crossed");
            }
        }
    }

    /// Processes a single file end to end (§4.3 step 6), returning the
    /// number of chunks stored. A fatal condition for *this file* (bad
    /// UTF-8, storage failure after retries) is returned as an `Err`; the
    /// caller records it and continues with the next file.
    async fn process_file(&self, path: &Path, root: &Path, reuse_cache: &ReuseCache) -> Result<usize> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AtlasError::ingest(relative_path(path, root), AtlasError::config(e.to_string())))?;
        let text = String::from_utf8(bytes)
            .map_err(|_| AtlasError::ingest(relative_path(path, root), AtlasError::validation("not valid UTF-8")))?;

        let raw_chunks = chunk_text(&text, &self.chunk_separators, self.chunk_size, self.chunk_overlap);
        if raw_chunks.is_empty() {
            return Ok(0);
        }

        let file_path = relative_path(path, root);

        let vectors = retry_with_backoff(BackoffConfig::default(), "ingest.embed_batch", || {
            let chunks = raw_chunks.clone();
            async move { self.context.text_embedding().embed_batch(&chunks).await }
        })
        .await
        .map_err(|e| AtlasError::ingest(file_path.clone(), e))?;

        if vectors.len() != raw_chunks.len() {
            return Err(AtlasError::ingest(
                file_path.clone(),
                AtlasError::validation("embedding batch size does not match chunk count"),
            ));
        }

        let chunk_inputs: Vec<(String, Option<String>)> =
            raw_chunks.iter().map(|c| (c.clone(), Some(file_path.clone()))).collect();
        let generations = generate_batch(
            &self.key_generator,
            &chunk_inputs,
            reuse_cache,
            self.existing_keys_sample_size,
            self.qntm_concurrency,
        )
        .await;

        let mut stored = 0usize;
        let total_chunks = raw_chunks.len();

        for (idx, ((text, vector), generation)) in raw_chunks
            .into_iter()
            .zip(vectors.into_iter())
            .zip(generations.into_iter())
            .enumerate()
        {
            let GenerationResult { keys, .. } = generation
                .map_err(|e| AtlasError::ingest(file_path.clone(), e))?;

            let chunk = Chunk::new(
                file_path.clone(),
                idx,
                total_chunks,
                vector.clone(),
                text,
                keys.clone(),
                Importance::Normal,
            );

            self.upsert_chunk_fanout(&chunk, &vector, &keys)
                .await
                .map_err(|e| AtlasError::ingest(file_path.clone(), e))?;

            stored += 1;
        }

        Ok(stored)
    }

    /// Sequential fan-out upsert: primary collection first, then every
    /// sanitized QNTM-key collection, all under the same `id` (§4.3 step
    /// 6e, §8 property 4). Sequential so a successful call means every
    /// semantic address reflects the chunk.
    async fn upsert_chunk_fanout(&self, chunk: &Chunk, vector: &[f32], keys: &[String]) -> Result<()> {
        let store = self.context.vector_storage();

        store
            .upsert(
                &self.primary_collection,
                vec![(chunk.id.clone(), vector.to_vec(), chunk.clone())],
                true,
            )
            .await?;

        for key in keys {
            let collection = atlas_qntm::sanitize(key);
            ensure_collection(store, &collection, self.context.dimensions).await?;
            store
                .upsert(&collection, vec![(chunk.id.clone(), vector.to_vec(), chunk.clone())], true)
                .await?;
        }
        Ok(())
    }
}

fn relative_path(path: &Path, root: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

/// Timeline-style scroll of the primary collection filtered by `since`
/// (shared between `atlas-search`'s timeline method and tests here); kept
/// in this crate since it reuses the same `VectorStore` scroll primitive
/// ingestion already depends on.
pub async fn chunks_with_qntm_key(
    store: &Arc<dyn VectorStore>,
    collection: &str,
    filter: &PayloadFilter,
    limit: usize,
) -> Result<Vec<Chunk>> {
    let mut matched = Vec::new();
    let mut offset: Option<ScrollOffset> = None;
    loop {
        let (chunks, next) = store.scroll(collection, 256, offset, true, false).await?;
        for chunk in chunks {
            if filter.matches(&chunk) {
                matched.push(chunk);
                if matched.len() >= limit {
                    return Ok(matched);
                }
            }
        }
        match next {
            Some(o) => offset = Some(o),
            None => break,
        }
    }
    Ok(matched)
}
