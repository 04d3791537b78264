use serde::{Deserialize, Serialize};

/// Coarse importance tag carried on every chunk.
///
/// This is a simple three-level scale, not a learned score: callers (or the
/// ingestion pipeline's defaults) set it explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Importance {
    Low,
    #[default]
    Normal,
    High,
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Importance::Low => "low",
            Importance::Normal => "normal",
            Importance::High => "high",
        };
        write!(f, "{s}")
    }
}
