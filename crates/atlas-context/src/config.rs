//! Recognized configuration options (§4.6).
//!
//! Grounded on `LearnOptions::default()`
//! (`crates/storage/src/learning_pipeline.rs`), which reads tunables from
//! env vars with a `SUTRA_` prefix over hardcoded defaults; Atlas loads a
//! TOML file first, then lets `ATLAS_`-prefixed env vars override specific
//! leaf values on top of it, the same precedence order.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use atlas_types::{AtlasError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub chunk_separators: Vec<String>,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 768,
            chunk_overlap: 100,
            chunk_separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                ". ".to_string(),
                " ".to_string(),
                String::new(),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HnswSettings {
    pub m_default: u32,
    pub ef_construct: u32,
    pub m_disabled: u32,
}

impl Default for HnswSettings {
    fn default() -> Self {
        Self {
            m_default: atlas_storage::M_DEFAULT,
            ef_construct: 100,
            m_disabled: atlas_storage::M_DISABLED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizationSettings {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: String,
    pub quantile: f32,
    pub always_ram: bool,
}

impl Default for QuantizationSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: "int8".to_string(),
            quantile: 0.99,
            always_ram: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    pub default_limit: usize,
    pub hnsw_ef: u32,
    pub quantization_rescore: bool,
    pub oversampling: f32,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            default_limit: 10,
            hnsw_ef: 128,
            quantization_rescore: false,
            oversampling: 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationSettings {
    pub threshold: u64,
    pub similarity_threshold: f32,
    pub allowed: bool,
}

impl Default for ConsolidationSettings {
    fn default() -> Self {
        Self {
            threshold: 500,
            similarity_threshold: 0.88,
            allowed: true,
        }
    }
}

/// A named backend plus its free-form connection parameters (§4.6
/// `embedding.backend`, `llm.backend`, `storage.backend`). Atlas does not
/// interpret these params; they are handed to whatever constructs the
/// concrete backend client at the application layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSelection {
    pub backend: String,
    #[serde(flatten)]
    pub params: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtlasConfig {
    pub chunking: ChunkingConfig,
    pub hnsw: HnswSettings,
    pub quantization: QuantizationSettings,
    pub search: SearchSettings,
    pub consolidation: ConsolidationSettings,
    pub embedding: BackendSelection,
    pub llm: BackendSelection,
    pub storage: BackendSelection,
}

impl AtlasConfig {
    /// Loads configuration from `path` if given (TOML), falling back to
    /// built-in defaults, then applies `ATLAS_`-prefixed environment
    /// overrides on top (§4.6).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let text = std::fs::read_to_string(p)
                    .map_err(|e| AtlasError::config(format!("failed to read config {p:?}: {e}")))?;
                toml::from_str(&text)
                    .map_err(|e| AtlasError::config(format!("failed to parse config {p:?}: {e}")))?
            }
            None => AtlasConfig::default(),
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("ATLAS_CHUNK_SIZE") {
            if let Ok(n) = v.parse() {
                self.chunking.chunk_size = n;
            }
        }
        if let Ok(v) = std::env::var("ATLAS_CHUNK_OVERLAP") {
            if let Ok(n) = v.parse() {
                self.chunking.chunk_overlap = n;
            }
        }
        if let Ok(v) = std::env::var("ATLAS_CONSOLIDATION_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.consolidation.threshold = n;
            }
        }
        if let Ok(v) = std::env::var("ATLAS_CONSOLIDATION_SIMILARITY_THRESHOLD") {
            if let Ok(n) = v.parse() {
                self.consolidation.similarity_threshold = n;
            }
        }
        if let Ok(v) = std::env::var("ATLAS_CONSOLIDATION_ALLOWED") {
            if let Ok(b) = v.parse() {
                self.consolidation.allowed = b;
            }
        }
        if let Ok(v) = std::env::var("ATLAS_SEARCH_DEFAULT_LIMIT") {
            if let Ok(n) = v.parse() {
                self.search.default_limit = n;
            }
        }
    }
}
