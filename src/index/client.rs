//! SearchIndex trait defining the interface for index operations.

use async_trait::async_trait;

use super::requests::{
    BulkRequest, CreateIndexRequest, IndexRequest, KnnSearchRequest, QueryStringSearchRequest,
};
use super::types::{BulkResponse, ClusterInfo, IndexResponse, SearchResponse};
use crate::error::ServiceError;

/// Trait defining the interface for search index operations.
///
/// Requests are validated by the implementation before anything is sent.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Check that the index service answers.
    async fn ping(&self) -> Result<(), ServiceError>;

    /// Fetch cluster name and version.
    async fn info(&self) -> Result<ClusterInfo, ServiceError>;

    /// Check whether an index exists.
    async fn index_exists(&self, index: &str) -> Result<bool, ServiceError>;

    /// Create an index with the given settings and mappings.
    async fn create_index(&self, request: &CreateIndexRequest) -> Result<(), ServiceError>;

    /// Index (create or replace) a single document.
    async fn index_document(&self, request: &IndexRequest) -> Result<IndexResponse, ServiceError>;

    /// Write many documents in one batched request.
    ///
    /// Per-document failures are reported in the response, not as an error.
    async fn bulk(&self, request: &BulkRequest) -> Result<BulkResponse, ServiceError>;

    /// k-nearest-neighbor search over a vector field, ordered by descending score.
    async fn knn_search(&self, request: &KnnSearchRequest) -> Result<SearchResponse, ServiceError>;

    /// Lexical search using the engine's query-string syntax.
    async fn query_string_search(
        &self,
        request: &QueryStringSearchRequest,
    ) -> Result<SearchResponse, ServiceError>;

    /// Human-readable endpoint description for logs and health output.
    fn endpoint(&self) -> String;
}
