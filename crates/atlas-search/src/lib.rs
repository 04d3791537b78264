//! Search layer (§4.4): semantic search over the content-addressable store,
//! with QNTM collection selection, payload filtering, optional query
//! expansion and reranking, and temporal (timeline) queries.

mod expansion;
mod reranker;
mod search;

pub use expansion::expand_query;
pub use reranker::Reranker;
pub use search::{SearchEngine, SearchQuery, SearchResult, DEFAULT_PRIMARY_COLLECTION};
