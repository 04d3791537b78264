use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request envelope carried by every `atlas.*` call (§6).
///
/// Internally tagged on `method` with the payload under `params`, matching
/// the §6 method table almost field-for-field; unit variants (no
/// parameters) simply omit `params`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "method", content = "params")]
pub enum AtlasRequest {
    #[serde(rename = "atlas.ingest")]
    Ingest(IngestParams),
    #[serde(rename = "atlas.search")]
    Search(SearchParams),
    #[serde(rename = "atlas.consolidate")]
    Consolidate(ConsolidateParams),
    #[serde(rename = "atlas.timeline")]
    Timeline(TimelineParams),
    #[serde(rename = "atlas.generateQNTM")]
    GenerateQntm(GenerateQntmParams),
    #[serde(rename = "atlas.health")]
    Health,
    #[serde(rename = "atlas.status")]
    Status,
    #[serde(rename = "atlas.subscribe")]
    Subscribe(SubscriptionParams),
    #[serde(rename = "atlas.unsubscribe")]
    Unsubscribe(SubscriptionParams),
}

impl AtlasRequest {
    pub fn method_name(&self) -> &'static str {
        match self {
            AtlasRequest::Ingest(_) => "atlas.ingest",
            AtlasRequest::Search(_) => "atlas.search",
            AtlasRequest::Consolidate(_) => "atlas.consolidate",
            AtlasRequest::Timeline(_) => "atlas.timeline",
            AtlasRequest::GenerateQntm(_) => "atlas.generateQNTM",
            AtlasRequest::Health => "atlas.health",
            AtlasRequest::Status => "atlas.status",
            AtlasRequest::Subscribe(_) => "atlas.subscribe",
            AtlasRequest::Unsubscribe(_) => "atlas.unsubscribe",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestParams {
    pub paths: Vec<String>,
    #[serde(default)]
    pub recursive: Option<bool>,
    #[serde(default)]
    pub root_dir: Option<String>,
    #[serde(default)]
    pub watch: Option<bool>,
    #[serde(default)]
    pub verbose: Option<bool>,
    #[serde(default)]
    pub consolidation_threshold: Option<usize>,
    #[serde(default)]
    pub allow_consolidation: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResult {
    pub files_processed: usize,
    pub chunks_stored: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub since: Option<DateTime<Utc>>,
    #[serde(default)]
    pub qntm_key: Option<String>,
    #[serde(default)]
    pub rerank: Option<bool>,
    #[serde(default)]
    pub consolidation_level: Option<bool>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub agent_role: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub expand_query: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub text: String,
    pub file_path: String,
    pub chunk_index: usize,
    pub score: f32,
    pub created_at: DateTime<Utc>,
    pub qntm_key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidateParams {
    #[serde(default)]
    pub dry_run: Option<bool>,
    #[serde(default)]
    pub threshold: Option<f32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidateResult {
    pub candidates_evaluated: usize,
    pub consolidations_performed: usize,
    pub chunks_absorbed: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineParams {
    pub since: DateTime<Utc>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQntmParams {
    pub text: String,
    #[serde(default)]
    pub existing_keys: Option<Vec<String>>,
    #[serde(default)]
    pub context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateQntmResult {
    pub keys: Vec<String>,
    #[serde(default)]
    pub reasoning: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthLevel {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    pub overall: HealthLevel,
    pub timestamp: DateTime<Utc>,
    pub services: BTreeMap<String, HealthLevel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionStatus {
    pub name: String,
    pub total_chunks: u64,
    pub vector_dimensions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageStatus {
    pub collections: usize,
    pub points_count: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResult {
    pub collection: CollectionStatus,
    pub storage: StorageStatus,
    pub backends: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubscriptionParams {
    pub events: Vec<String>,
}
