use serde::{Deserialize, Serialize};

/// Distance metric for a collection. Only `Dot` is supported: callers are
/// expected to hand in L2-normalized vectors, making dot-product equivalent
/// to cosine similarity (§4.1, §4.3 step c).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Distance {
    #[default]
    Dot,
}

/// HNSW graph parameters. `m = 0` disables graph maintenance entirely
/// (§4.1 "HNSW batch mode"); vectors are still stored, just not indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswParams {
    pub m: u32,
    pub ef_construct: u32,
}

/// Default `m` once batch-mode indexing is re-enabled.
pub const M_DEFAULT: u32 = 16;
/// `m` used while indexing is disabled for bulk writes.
pub const M_DISABLED: u32 = 0;

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: M_DEFAULT,
            ef_construct: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuantizationType {
    Int8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizationConfig {
    pub quantization_type: QuantizationType,
    pub quantile: f32,
    pub always_ram: bool,
}

impl Default for QuantizationConfig {
    fn default() -> Self {
        Self {
            quantization_type: QuantizationType::Int8,
            quantile: 0.99,
            always_ram: true,
        }
    }
}

/// Configuration used to create a collection (§4.1 `create_collection`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub dimension: usize,
    pub distance: Distance,
    pub hnsw: HnswParams,
    pub quantization: Option<QuantizationConfig>,
}

impl CollectionConfig {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            distance: Distance::Dot,
            hnsw: HnswParams::default(),
            quantization: None,
        }
    }

    pub fn with_quantization(mut self, quantization: QuantizationConfig) -> Self {
        self.quantization = Some(quantization);
        self
    }
}

/// Partial update applied to an existing collection's HNSW config
/// (§4.1 `update_collection`), used to toggle batch mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswUpdate {
    pub m: u32,
}

/// Payload field types eligible for an index (§4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadIndexSchema {
    Keyword,
    Datetime,
    Bool,
}

/// The three payload indexes every collection wants (§6 "Persisted state
/// layout"). Implementations that don't support indexes no-op on this.
pub fn default_payload_indexes() -> [(&'static str, PayloadIndexSchema); 3] {
    [
        ("qntm_keys", PayloadIndexSchema::Keyword),
        ("created_at", PayloadIndexSchema::Datetime),
        ("consolidated", PayloadIndexSchema::Bool),
    ]
}
