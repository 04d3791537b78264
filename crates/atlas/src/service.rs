//! The Application Service (§2 "Application Service"): the single entry
//! point wiring the backend registry, ingestion pipeline, search engine and
//! consolidation engine into the `atlas.*` method surface of §6.
//!
//! Construction shape follows `BulkIngester`/`GridMaster`
//! (`crates/bulk-ingester/src/main.rs`, `crates/grid-master`): one service
//! struct built once at startup from a config, exposing one async method per
//! externally callable operation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use tracing::warn;

use atlas_consolidate::{ConsolidationEngine, LlmClusterClassifier, LlmMergeSynthesizer};
use atlas_context::{AtlasConfig, BackendRegistry, Context, EmbeddingBackend, TextLlm};
use atlas_ingest::{
    ConsolidationTrigger, FileWatcher, IngestOptions, IngestPipeline, ProgressSink,
    DEFAULT_PRIMARY_COLLECTION,
};
use atlas_protocol::{
    AtlasEvent, CollectionStatus, ConsolidateParams, ConsolidateProgressEvent, ConsolidateResult,
    GenerateQntmParams, GenerateQntmResult, HealthLevel, HealthResult, IngestCompleteEvent,
    IngestParams, IngestResult, SearchParams, SearchResult as ProtoSearchResult, StatusResult,
    StorageStatus, TimelineParams, WatchFileChangedEvent,
};
use atlas_qntm::KeyGenerator;
use atlas_search::SearchEngine;
use atlas_types::Result;

use crate::events::EventBroadcaster;

/// No classification in the LLM response below this confidence is acted on
/// (§4.5 "confidence is below a floor are skipped"); no default is named
/// anywhere, so `0.7` is picked here and documented as an open-question
/// resolution in `DESIGN.md`.
const DEFAULT_CONFIDENCE_FLOOR: f32 = 0.7;

/// The unified entry point (§2). One instance per running daemon; the CLI
/// talks to it only through `atlas-protocol` over the wire, never directly.
pub struct AtlasService {
    context: Arc<Context>,
    config: AtlasConfig,
    key_generator: Arc<dyn KeyGenerator>,
    ingest: Arc<IngestPipeline>,
    search: SearchEngine,
    consolidate: Arc<ConsolidationEngine>,
    classifier: Arc<LlmClusterClassifier>,
    synthesizer: Arc<LlmMergeSynthesizer>,
    events: EventBroadcaster,
}

impl AtlasService {
    /// Builds a service from a resolved backend registry and config.
    /// Installs the registry process-wide (§4.6, §5) so any component
    /// falling back to `Context::from_global()` sees the same backends.
    pub async fn initialize(
        registry: BackendRegistry,
        config: AtlasConfig,
        key_generator: Arc<dyn KeyGenerator>,
    ) -> Result<Self> {
        atlas_context::install(registry);
        let context = Arc::new(Context::build(atlas_context::global()?).await?);

        let classifier = Arc::new(LlmClusterClassifier::new(
            context.json_llm().clone(),
            DEFAULT_CONFIDENCE_FLOOR,
        ));
        let synthesizer = Arc::new(LlmMergeSynthesizer::new(context.json_llm().clone()));
        let consolidate = Arc::new(ConsolidationEngine::new(
            context.clone(),
            classifier.clone(),
            synthesizer.clone(),
            config.consolidation.similarity_threshold,
        ));

        let trigger: Arc<dyn ConsolidationTrigger> = consolidate.clone();
        let ingest = Arc::new(IngestPipeline::new(
            context.clone(),
            key_generator.clone(),
            Some(trigger),
            &config,
        ));

        let search = SearchEngine::new(
            context.clone(),
            None,
            config.search.default_limit,
            config.search.oversampling,
        );

        Ok(Self {
            context,
            config,
            key_generator,
            ingest,
            search,
            consolidate,
            classifier,
            synthesizer,
            events: EventBroadcaster::new(256),
        })
    }

    /// A receiver for the service's event stream; used by the daemon to
    /// forward notifications to subscribed connections (§6 "Event stream").
    pub fn subscribe_events(&self) -> tokio::sync::broadcast::Receiver<AtlasEvent> {
        self.events.subscribe()
    }

    pub async fn ingest(&self, params: IngestParams) -> Result<IngestResult> {
        let watch = params.watch.unwrap_or(false);
        let options = IngestOptions {
            paths: params.paths.iter().map(PathBuf::from).collect(),
            recursive: params.recursive.unwrap_or(true),
            root_dir: params.root_dir.map(PathBuf::from),
            watch,
            verbose: params.verbose.unwrap_or(false),
            consolidation_threshold: params.consolidation_threshold.map(|n| n as u64),
            allow_consolidation: params.allow_consolidation,
        };

        let sink: Arc<dyn ProgressSink> = Arc::new(self.events.clone());
        let outcome = self.ingest.ingest(options.clone(), Some(sink.clone())).await?;

        self.events.publish(AtlasEvent::IngestComplete(IngestCompleteEvent {
            files_processed: outcome.files_processed,
            chunks_stored: outcome.chunks_stored,
            errors: outcome.errors.len(),
        }));

        if watch {
            self.spawn_watch(options, sink);
        }

        Ok(IngestResult {
            files_processed: outcome.files_processed,
            chunks_stored: outcome.chunks_stored,
            errors: outcome.errors,
        })
    }

    /// Watch mode (§4.3 "Watch Mode"): file-system watchers on the ingested
    /// paths trigger re-ingestion of changed files through the same
    /// pipeline, emitting `watch.file_changed` alongside the usual
    /// progress/complete events. Runs detached; the caller gets the initial
    /// ingest result back immediately.
    fn spawn_watch(&self, options: IngestOptions, sink: Arc<dyn ProgressSink>) {
        let pipeline = self.ingest.clone();
        let events = self.events.clone();

        tokio::spawn(async move {
            let mut watcher = match FileWatcher::new(&options.paths, options.recursive) {
                Ok(w) => w,
                Err(e) => {
                    warn!(error = %e, "failed to start file watcher, watch mode disabled for this ingest");
                    return;
                }
            };

            while let Some(path) = watcher.recv().await {
                events.publish(AtlasEvent::WatchFileChanged(WatchFileChangedEvent {
                    file_path: path.to_string_lossy().to_string(),
                    timestamp: Utc::now(),
                }));

                let single_file = IngestOptions {
                    paths: vec![path.clone()],
                    recursive: false,
                    root_dir: options.root_dir.clone(),
                    watch: false,
                    verbose: options.verbose,
                    consolidation_threshold: options.consolidation_threshold,
                    allow_consolidation: options.allow_consolidation,
                };

                if let Err(e) = pipeline.ingest(single_file, Some(sink.clone())).await {
                    warn!(error = %e, path = %path.display(), "watch-triggered re-ingest failed");
                }
            }
        });
    }

    pub async fn search(&self, params: SearchParams) -> Result<Vec<ProtoSearchResult>> {
        let query = atlas_search::SearchQuery {
            query: params.query,
            limit: params.limit,
            since: params.since,
            qntm_key: params.qntm_key,
            rerank: params.rerank,
            consolidation_level: params.consolidation_level,
            content_type: params.content_type,
            agent_role: params.agent_role,
            expand_query: params.expand_query,
        };
        let hits = self.search.search(query).await?;
        Ok(hits.into_iter().map(project_search_result).collect())
    }

    pub async fn timeline(&self, params: TimelineParams) -> Result<Vec<ProtoSearchResult>> {
        let limit = params.limit.unwrap_or(self.config.search.default_limit);
        let hits = self.search.timeline(params.since, limit).await?;
        Ok(hits.into_iter().map(project_search_result).collect())
    }

    /// `threshold` overrides the configured similarity threshold for this
    /// one call only; the engine wired into auto-consolidation keeps the
    /// configured default.
    pub async fn consolidate(&self, params: ConsolidateParams) -> Result<ConsolidateResult> {
        let dry_run = params.dry_run.unwrap_or(false);

        let outcome = match params.threshold {
            Some(threshold) => {
                let engine = ConsolidationEngine::new(
                    self.context.clone(),
                    self.classifier.clone(),
                    self.synthesizer.clone(),
                    threshold,
                );
                engine.run(dry_run).await?
            }
            None => self.consolidate.run(dry_run).await?,
        };

        self.events.publish(AtlasEvent::ConsolidateProgress(ConsolidateProgressEvent {
            clusters_evaluated: outcome.candidates_evaluated,
            consolidations_performed: outcome.consolidations_performed,
        }));

        Ok(ConsolidateResult {
            candidates_evaluated: outcome.candidates_evaluated,
            consolidations_performed: outcome.consolidations_performed,
            chunks_absorbed: outcome.chunks_absorbed,
        })
    }

    pub async fn generate_qntm(&self, params: GenerateQntmParams) -> Result<GenerateQntmResult> {
        let existing = params.existing_keys.unwrap_or_default();
        let generated = self
            .key_generator
            .generate(&params.text, &existing, params.context.as_deref())
            .await?;
        Ok(GenerateQntmResult {
            keys: generated.keys,
            reasoning: Some(generated.reasoning),
        })
    }

    /// §7 "degraded when any non-essential backend is missing, unhealthy
    /// when an essential backend (vector storage or embedding) is down".
    pub async fn health(&self) -> HealthResult {
        let mut services = BTreeMap::new();

        services.insert(
            "vector_storage".to_string(),
            match self
                .context
                .vector_storage()
                .collection_exists(DEFAULT_PRIMARY_COLLECTION)
                .await
            {
                Ok(_) => HealthLevel::Healthy,
                Err(_) => HealthLevel::Unhealthy,
            },
        );

        services.insert(
            "text_embedding".to_string(),
            match self.context.text_embedding().ensure_available().await {
                Ok(()) => HealthLevel::Healthy,
                Err(_) => HealthLevel::Unhealthy,
            },
        );

        // json_llm has no liveness probe of its own (§4.6 "capability,
        // nothing more"); its presence was already verified at Context
        // construction, so a built service always reports it healthy.
        services.insert("json_llm".to_string(), HealthLevel::Healthy);

        services.insert(
            "code_embedding".to_string(),
            optional_level(self.context.code_embedding(), |b| b.ensure_available()).await,
        );
        services.insert(
            "contextualized_embedding".to_string(),
            optional_level(self.context.contextualized_embedding(), |b| b.ensure_available()).await,
        );
        services.insert(
            "text_llm".to_string(),
            match self.context.text_llm() {
                Some(backend) => match backend.ensure_available().await {
                    Ok(()) => HealthLevel::Healthy,
                    Err(_) => HealthLevel::Degraded,
                },
                None => HealthLevel::Degraded,
            },
        );

        let overall = if services.values().any(|l| *l == HealthLevel::Unhealthy) {
            HealthLevel::Unhealthy
        } else if services.values().any(|l| *l == HealthLevel::Degraded) {
            HealthLevel::Degraded
        } else {
            HealthLevel::Healthy
        };

        HealthResult {
            overall,
            timestamp: Utc::now(),
            services,
        }
    }

    /// `storage.collections`/`points_count` are scoped to the primary
    /// collection: `VectorStore` has no enumeration method across the
    /// collections a backend may hold (no teacher analogue either - a real
    /// vector database client would expose this through its own admin API,
    /// out of scope per §1's "vector database internals").
    pub async fn status(&self) -> Result<StatusResult> {
        let info = self
            .context
            .vector_storage()
            .get_collection_info(DEFAULT_PRIMARY_COLLECTION)
            .await?;

        let collection = CollectionStatus {
            name: DEFAULT_PRIMARY_COLLECTION.to_string(),
            total_chunks: info.points_count,
            vector_dimensions: info.vector_dimensions,
        };
        let storage = StorageStatus {
            collections: 1,
            points_count: info.points_count,
        };

        let mut backends = BTreeMap::new();
        backends.insert("text_embedding".to_string(), true);
        backends.insert("json_llm".to_string(), true);
        backends.insert("code_embedding".to_string(), self.context.code_embedding_available);
        backends.insert(
            "contextualized_embedding".to_string(),
            self.context.contextualized_available,
        );
        backends.insert("text_llm".to_string(), self.context.text_llm().is_some());

        Ok(StatusResult {
            collection,
            storage,
            backends,
        })
    }
}

async fn optional_level<B, F, Fut>(backend: Option<&Arc<B>>, probe: F) -> HealthLevel
where
    B: ?Sized,
    F: FnOnce(&B) -> Fut,
    Fut: std::future::Future<Output = Result<()>>,
{
    match backend {
        Some(b) => match probe(b.as_ref()).await {
            Ok(()) => HealthLevel::Healthy,
            Err(_) => HealthLevel::Degraded,
        },
        None => HealthLevel::Degraded,
    }
}

fn project_search_result(hit: atlas_search::SearchResult) -> ProtoSearchResult {
    ProtoSearchResult {
        text: hit.text,
        file_path: hit.file_path,
        chunk_index: hit.chunk_index,
        score: hit.score,
        created_at: hit.created_at,
        qntm_key: hit.qntm_key,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    use async_trait::async_trait;
    use atlas_protocol::IngestParams;
    use atlas_qntm::MockKeyGenerator;

    struct FixedEmbedder;

    #[async_trait]
    impl EmbeddingBackend for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![0.1, 0.2, 0.3, 0.4])
        }
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1, 0.2, 0.3, 0.4]).collect())
        }
        fn dimension(&self) -> usize {
            4
        }
    }

    struct StubJsonLlm;

    #[async_trait]
    impl atlas_qntm::JsonLlm for StubJsonLlm {
        async fn complete_json(&self, _prompt: &str, _temperature: f32) -> Result<serde_json::Value> {
            Ok(serde_json::json!({}))
        }
    }

    fn test_registry() -> BackendRegistry {
        BackendRegistry {
            text_embedding: Arc::new(FixedEmbedder),
            code_embedding: None,
            contextualized_embedding: None,
            json_llm: Arc::new(StubJsonLlm),
            text_llm: None,
            vector_storage: Arc::new(atlas_storage::MemoryBackend::new()),
        }
    }

    /// One combined scenario instead of several parallel `#[tokio::test]`s:
    /// `initialize` installs the process-wide registry, and this is the
    /// only test in the crate that touches it.
    #[tokio::test]
    async fn full_service_lifecycle() {
        atlas_context::reset_for_tests();

        let key_generator: Arc<dyn atlas_qntm::KeyGenerator> =
            Arc::new(MockKeyGenerator::new(vec!["content ~ type ~ note".to_string()]));
        let service = AtlasService::initialize(test_registry(), AtlasConfig::default(), key_generator)
            .await
            .unwrap();

        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.md");
        fs::write(&file, "first observation\n\nsecond observation").unwrap();

        let ingest_result = service
            .ingest(IngestParams {
                paths: vec![file.to_string_lossy().to_string()],
                root_dir: Some(dir.path().to_string_lossy().to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ingest_result.files_processed, 1);
        assert!(ingest_result.chunks_stored >= 1);
        assert!(ingest_result.errors.is_empty());

        let hits = service
            .search(SearchParams {
                query: "observation".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(!hits.is_empty());

        let consolidate_result = service
            .consolidate(ConsolidateParams {
                dry_run: Some(true),
                threshold: None,
            })
            .await
            .unwrap();
        assert_eq!(consolidate_result.consolidations_performed, 0);

        let health = service.health().await;
        assert_eq!(health.overall, HealthLevel::Degraded);
        assert_eq!(health.services["vector_storage"], HealthLevel::Healthy);
        assert_eq!(health.services["text_embedding"], HealthLevel::Healthy);
        assert_eq!(health.services["text_llm"], HealthLevel::Degraded);

        let status = service.status().await.unwrap();
        assert_eq!(status.storage.collections, 1);
        assert!(status.collection.total_chunks >= 1);
        assert!(!status.backends["code_embedding"]);

        let generated = service
            .generate_qntm(GenerateQntmParams {
                text: "some chunk text".to_string(),
                existing_keys: None,
                context: None,
            })
            .await
            .unwrap();
        assert_eq!(generated.keys, vec!["content ~ type ~ note".to_string()]);
    }
}
