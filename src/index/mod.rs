//! Search index clients.
//!
//! This module provides a `SearchIndex` trait and implementations:
//! - `MemoryIndex` - In-process index for testing and mock mode
//! - `OpenSearchClient` - OpenSearch REST API over HTTPS with basic auth

mod client;
mod memory;
mod opensearch;
mod requests;
mod types;

pub use client::SearchIndex;
pub use memory::MemoryIndex;
pub use opensearch::OpenSearchClient;
pub use requests::{
    validate_index_name, BulkRequest, CreateIndexRequest, FieldMapping, IndexRequest,
    IndexSettings, KnnMethod, KnnMethodParameters, KnnSearchRequest, QueryStringSearchRequest,
};
pub use types::{
    BulkItemError, BulkItemOutcome, BulkItemResult, BulkResponse, ClusterInfo, ClusterVersion, Document,
    HitsMetadata, IndexResponse, SearchHit, SearchResponse, TotalHits,
};
