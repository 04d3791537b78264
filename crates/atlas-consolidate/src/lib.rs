//! The consolidation engine (§4.5): collapses redundant chunks into
//! fewer, higher-quality, DAG-provenanced summaries.

mod classify;
mod cluster;
mod dag;
mod engine;
mod merge;

pub use classify::{Classification, ClusterClassifier, LlmClusterClassifier};
pub use cluster::{detect_candidates, ClusterCandidate, DEFAULT_PRIMARY_COLLECTION};
pub use dag::would_create_cycle;
pub use engine::{ConsolidationEngine, ConsolidationOutcome, ProposedMerge};
pub use merge::{build_consolidated_chunk, union_qntm_keys, LlmMergeSynthesizer, MergeSynthesizer, MAX_UNION_KEYS};
