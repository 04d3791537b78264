use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Payload filter applied during `search`/`scroll` (§4.1, §4.4 step 4).
///
/// Every field is an AND condition; `None` means "don't filter on this".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PayloadFilter {
    pub qntm_key: Option<String>,
    pub consolidated: Option<bool>,
    pub created_at_gte: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    pub agent_role: Option<String>,
}

impl PayloadFilter {
    pub fn matches(&self, chunk: &atlas_types::Chunk) -> bool {
        if let Some(key) = &self.qntm_key {
            if !chunk.qntm_keys.iter().any(|k| k == key) {
                return false;
            }
        }
        if let Some(consolidated) = self.consolidated {
            if chunk.consolidated != consolidated {
                return false;
            }
        }
        if let Some(since) = self.created_at_gte {
            if chunk.created_at < since {
                return false;
            }
        }
        if let Some(content_type) = &self.content_type {
            match chunk.extra.get("content_type").and_then(|v| v.as_str()) {
                Some(v) if v == content_type => {}
                _ => return false,
            }
        }
        if let Some(agent_role) = &self.agent_role {
            match chunk.extra.get("agent_role").and_then(|v| v.as_str()) {
                Some(v) if v == agent_role => {}
                _ => return false,
            }
        }
        true
    }
}
