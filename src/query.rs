//! Embed-then-search service behind the query API.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::embedding::EmbeddingProvider;
use crate::error::ServiceError;
use crate::index::{KnnSearchRequest, SearchHit, SearchIndex};
use crate::metrics;

/// Vector field written by the importer.
pub const VECTOR_FIELD: &str = "embedding";

/// Upper bound for the `limit` of a single search.
pub const MAX_SEARCH_LIMIT: usize = 100;

/// Readiness of the service's dependencies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub embedding_model: String,
    pub embedder_ready: bool,
    pub index: String,
    pub index_endpoint: String,
    pub index_reachable: bool,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.embedder_ready && self.index_reachable
    }
}

/// Composes an embedding provider and a search index.
pub struct QueryService {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn SearchIndex>,
    index_name: String,
    default_limit: usize,
}

impl QueryService {
    /// Create a new QueryService over the given provider and index.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn SearchIndex>,
        index_name: impl Into<String>,
        default_limit: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            index_name: index_name.into(),
            default_limit: default_limit.clamp(1, MAX_SEARCH_LIMIT),
        }
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Embed `text` with the configured provider.
    ///
    /// # Errors
    /// `Validation` for blank text, otherwise whatever the provider returns.
    /// Provider failures are not retried.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        validate_text(text)?;

        let start = Instant::now();
        let vector = self.embedder.embed(text).await?;
        metrics::record_embed_latency(start.elapsed().as_secs_f64() * 1000.0);

        if vector.is_empty() {
            return Err(ServiceError::Decode("provider returned an empty vector".into()));
        }
        Ok(vector)
    }

    /// Embed `text` and return its nearest neighbors.
    ///
    /// Returns at most `limit` hits (default when `None`, clamped to
    /// `1..=MAX_SEARCH_LIMIT`) ordered by non-increasing score.
    pub async fn search(
        &self,
        text: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SearchHit>, ServiceError> {
        validate_text(text)?;
        let limit = limit.unwrap_or(self.default_limit).clamp(1, MAX_SEARCH_LIMIT);

        let vector = self.embed(text).await?;
        let request = KnnSearchRequest::new(&self.index_name, VECTOR_FIELD, vector, limit);

        let start = Instant::now();
        let response = self
            .index
            .knn_search(&request)
            .await
            .map_err(|e| match e {
                ServiceError::Connection(msg) => {
                    warn!(error = %msg, "Search index unreachable");
                    ServiceError::ServiceUnavailable(msg)
                }
                other => other,
            })?;
        let took_ms = start.elapsed().as_secs_f64() * 1000.0;
        metrics::record_knn_latency(took_ms);

        let mut hits = response.hits.hits;
        // Hits arrive ordered; a stable sort keeps ties in index order.
        hits.sort_by(|a, b| b.score.unwrap_or(0.0).total_cmp(&a.score.unwrap_or(0.0)));
        hits.truncate(limit);

        info!(
            index = %self.index_name,
            limit,
            hits = hits.len(),
            took_ms,
            "k-NN search completed"
        );

        Ok(hits)
    }

    /// Probe the provider and the index.
    pub async fn health(&self) -> HealthReport {
        let index_reachable = match self.index.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Health check could not reach the search index");
                false
            }
        };
        let embedder_ready = self.embedder.is_ready();

        HealthReport {
            status: if embedder_ready && index_reachable {
                "ok".to_string()
            } else {
                "degraded".to_string()
            },
            embedding_model: self.embedder.model().to_string(),
            embedder_ready,
            index: self.index_name.clone(),
            index_endpoint: self.index.endpoint(),
            index_reachable,
        }
    }
}

fn validate_text(text: &str) -> Result<(), ServiceError> {
    if text.trim().is_empty() {
        return Err(ServiceError::Validation("text must not be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConnection;
    use crate::embedding::HashEmbedder;
    use crate::index::{IndexRequest, MemoryIndex, OpenSearchClient};
    use serde_json::json;

    async fn seeded() -> (Arc<HashEmbedder>, Arc<MemoryIndex>, QueryService) {
        let embedder = Arc::new(HashEmbedder::new(16));
        let index = Arc::new(MemoryIndex::new());

        for (id, text) in [
            ("1", "whole wheat pasta"),
            ("2", "green tea leaves"),
            ("3", "dark roast coffee"),
            ("4", "wheat crackers"),
        ] {
            let vector = embedder.embed(text).await.unwrap();
            index
                .index_document(
                    &IndexRequest::new("word_embeddings", json!({ "Summary": text, "embedding": vector }))
                        .with_id(id),
                )
                .await
                .unwrap();
        }

        let service = QueryService::new(
            embedder.clone(),
            index.clone(),
            "word_embeddings",
            3,
        );
        (embedder, index, service)
    }

    #[tokio::test]
    async fn test_search_returns_at_most_limit_in_score_order() {
        let (_, _, service) = seeded().await;

        for limit in 1..=5 {
            let hits = service.search("wheat pasta", Some(limit)).await.unwrap();
            assert!(hits.len() <= limit);
            for pair in hits.windows(2) {
                assert!(pair[0].score >= pair[1].score);
            }
        }

        let hits = service.search("whole wheat pasta", Some(1)).await.unwrap();
        assert_eq!(hits[0].id, "1");
    }

    #[tokio::test]
    async fn test_default_limit_applies() {
        let (_, _, service) = seeded().await;
        let hits = service.search("coffee", None).await.unwrap();
        assert_eq!(hits.len(), 3);
    }

    #[tokio::test]
    async fn test_empty_text_makes_no_calls() {
        let (embedder, index, service) = seeded().await;
        let embeds_before = embedder.call_count();
        let requests_before = index.request_count();

        let err = service.search("", Some(3)).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err = service.embed("   ").await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));

        assert_eq!(embedder.call_count(), embeds_before);
        assert_eq!(index.request_count(), requests_before);
    }

    #[tokio::test]
    async fn test_embed_is_stable_in_length() {
        let (_, _, service) = seeded().await;
        let a = service.embed("green tea").await.unwrap();
        let b = service.embed("green tea").await.unwrap();
        assert_eq!(a.len(), b.len());
    }

    #[tokio::test]
    async fn test_missing_index_is_not_found() {
        let service = QueryService::new(
            Arc::new(HashEmbedder::new(8)),
            Arc::new(MemoryIndex::new()),
            "word_embeddings",
            3,
        );
        let err = service.search("tea", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    async fn unreachable_index() -> Arc<OpenSearchClient> {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);
        let conn = IndexConnection {
            host: "127.0.0.1".to_string(),
            port,
            use_ssl: false,
            ..IndexConnection::default()
        };
        Arc::new(OpenSearchClient::new(&conn, std::time::Duration::from_secs(2)).unwrap())
    }

    #[tokio::test]
    async fn test_unreachable_index_is_service_unavailable() {
        let embedder = Arc::new(HashEmbedder::new(8));
        let service = QueryService::new(embedder.clone(), unreachable_index().await, "word_embeddings", 3);

        let err = service.search("tea", None).await.unwrap_err();
        assert!(matches!(err, ServiceError::ServiceUnavailable(_)), "{err:?}");
        assert_eq!(err.status_code(), axum::http::StatusCode::SERVICE_UNAVAILABLE);

        // Embedding does not touch the index.
        assert!(service.embed("tea").await.is_ok());
        assert_eq!(embedder.call_count(), 2);

        let report = service.health().await;
        assert!(!report.index_reachable);
        assert_eq!(report.status, "degraded");
    }

    #[tokio::test]
    async fn test_health_reports_ok() {
        let (_, _, service) = seeded().await;
        let report = service.health().await;
        assert!(report.is_healthy());
        assert_eq!(report.status, "ok");
        assert_eq!(report.embedding_model, "hash-embedder");
        assert_eq!(report.index_endpoint, "memory://");
    }
}
