//! The search layer (§4.4): multi-modal query over collection selection,
//! payload filtering, optional reranking, and deterministic tie-breaking.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use atlas_context::Context;
use atlas_storage::{PayloadFilter, ScoredPoint, ScrollOffset};
use atlas_types::Result;

use crate::expansion::expand_query;
use crate::reranker::Reranker;

/// The primary, always-written collection (mirrors `atlas-ingest`'s
/// `DEFAULT_PRIMARY_COLLECTION`; duplicated rather than shared to keep
/// `atlas-search` independent of the ingestion crate).
pub const DEFAULT_PRIMARY_COLLECTION: &str = "atlas_context";

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    pub query: String,
    pub limit: Option<usize>,
    pub since: Option<DateTime<Utc>>,
    pub qntm_key: Option<String>,
    pub rerank: Option<bool>,
    pub consolidation_level: Option<bool>,
    pub content_type: Option<String>,
    pub agent_role: Option<String>,
    pub expand_query: Option<bool>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub text: String,
    pub file_path: String,
    pub chunk_index: usize,
    pub score: f32,
    pub created_at: DateTime<Utc>,
    pub qntm_key: String,
}

pub struct SearchEngine {
    context: Arc<Context>,
    reranker: Option<Arc<dyn Reranker>>,
    default_limit: usize,
    oversampling: f32,
}

impl SearchEngine {
    pub fn new(
        context: Arc<Context>,
        reranker: Option<Arc<dyn Reranker>>,
        default_limit: usize,
        oversampling: f32,
    ) -> Self {
        Self {
            context,
            reranker,
            default_limit,
            oversampling,
        }
    }

    pub async fn search(&self, query: SearchQuery) -> Result<Vec<SearchResult>> {
        let limit = query.limit.unwrap_or(self.default_limit);

        let mut qntm_key = query.qntm_key.clone();
        if query.expand_query.unwrap_or(false) && qntm_key.is_none() {
            let expanded = expand_query(self.context.json_llm().as_ref(), &query.query).await?;
            qntm_key = expanded.into_iter().next();
        }

        let collection = match &qntm_key {
            Some(key) => atlas_qntm::sanitize(key),
            None => DEFAULT_PRIMARY_COLLECTION.to_string(),
        };

        let vector = self.context.text_embedding().embed(&query.query).await?;

        let filter = PayloadFilter {
            qntm_key: None,
            consolidated: query.consolidation_level,
            created_at_gte: query.since,
            content_type: query.content_type.clone(),
            agent_role: query.agent_role.clone(),
        };

        let rerank = query.rerank.unwrap_or(false) && self.reranker.is_some();
        let fetch_limit = if rerank {
            ((limit as f32) * self.oversampling).ceil() as usize
        } else {
            limit
        };

        let mut hits = self
            .context
            .vector_storage()
            .search(&collection, &vector, fetch_limit, Some(&filter))
            .await?;

        if rerank {
            if let Some(reranker) = &self.reranker {
                hits = reranker.rerank(&query.query, hits).await?;
            }
        }

        // Re-sorts by the (possibly reranked) `score`, so a `Reranker` must
        // write its relevance judgment back into `ScoredPoint.score` - see
        // the contract documented on `Reranker::rerank`.
        sort_deterministically(&mut hits);
        hits.truncate(limit);

        Ok(hits
            .into_iter()
            .map(|hit| project(hit, qntm_key.as_deref()))
            .collect())
    }

    /// `timeline(since, limit)` (§4.4 "Timeline queries"): all chunks with
    /// `created_at >= since` in the primary collection, ordered by
    /// `created_at` descending.
    pub async fn timeline(&self, since: DateTime<Utc>, limit: usize) -> Result<Vec<SearchResult>> {
        let store = self.context.vector_storage();
        let filter = PayloadFilter {
            created_at_gte: Some(since),
            ..PayloadFilter::default()
        };

        let mut matched = Vec::new();
        let mut offset: Option<ScrollOffset> = None;
        loop {
            let (chunks, next) = store
                .scroll(DEFAULT_PRIMARY_COLLECTION, 256, offset, true, false)
                .await?;
            for chunk in chunks {
                if filter.matches(&chunk) {
                    matched.push(chunk);
                }
            }
            match next {
                Some(o) => offset = Some(o),
                None => break,
            }
        }

        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| a.id.as_str().cmp(b.id.as_str())));
        matched.truncate(limit);

        Ok(matched
            .into_iter()
            .map(|chunk| SearchResult {
                text: chunk.original_text,
                file_path: chunk.file_path,
                chunk_index: chunk.chunk_index,
                score: 0.0,
                created_at: chunk.created_at,
                qntm_key: chunk.qntm_keys.first().cloned().unwrap_or_default(),
            })
            .collect())
    }
}

fn sort_deterministically(hits: &mut [ScoredPoint]) {
    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.payload.created_at.cmp(&a.payload.created_at))
            .then_with(|| a.id.as_str().cmp(b.id.as_str()))
    });
}

fn project(hit: ScoredPoint, searched_key: Option<&str>) -> SearchResult {
    let qntm_key = searched_key
        .map(|k| k.to_string())
        .or_else(|| hit.payload.qntm_keys.first().cloned())
        .unwrap_or_default();
    SearchResult {
        text: hit.payload.original_text,
        file_path: hit.payload.file_path,
        chunk_index: hit.payload.chunk_index,
        score: hit.score,
        created_at: hit.payload.created_at,
        qntm_key,
    }
}
