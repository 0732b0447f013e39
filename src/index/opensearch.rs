//! OpenSearch REST client.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::client::SearchIndex;
use super::requests::{
    validate_index_name, BulkRequest, CreateIndexRequest, IndexRequest, KnnSearchRequest,
    QueryStringSearchRequest,
};
use super::types::{BulkResponse, ClusterInfo, IndexResponse, SearchResponse};
use crate::config::IndexConnection;
use crate::error::ServiceError;

/// Client for a single OpenSearch node, authenticated with HTTP basic auth.
///
/// The handle is cheap to clone; dropping the last clone closes its pooled
/// connections.
#[derive(Clone)]
pub struct OpenSearchClient {
    http: Client,
    base_url: String,
    username: String,
    password: String,
}

impl std::fmt::Debug for OpenSearchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenSearchClient")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

impl OpenSearchClient {
    /// Build a client for the given connection.
    ///
    /// No request is made; call [`SearchIndex::ping`] to check reachability.
    pub fn new(connection: &IndexConnection, timeout: Duration) -> Result<Self, ServiceError> {
        let http = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(!connection.verify_certs)
            .build()
            .map_err(|e| ServiceError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: connection.base_url(),
            username: connection.username.clone(),
            password: connection.password.clone(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .basic_auth(&self.username, Some(&self.password))
    }

    /// URL of `/{index}/_doc/{id}` with each segment percent-encoded.
    fn document_url(&self, index: &str, id: &str) -> Result<Url, ServiceError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ServiceError::Configuration(format!("invalid index URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| {
                ServiceError::Configuration(format!("{} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend([index, "_doc", id]);
        Ok(url)
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ServiceError> {
        builder.send().await.map_err(|e| {
            warn!(error = %e, base_url = %self.base_url, "Search index request failed");
            if e.is_timeout() {
                ServiceError::Connection(format!("request to {} timed out", self.base_url))
            } else {
                ServiceError::Connection(format!("cannot reach {}: {}", self.base_url, e))
            }
        })
    }

    /// Turn non-success statuses into typed errors.
    async fn check(response: Response, subject: &str) -> Result<Response, ServiceError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let reason = error_reason(&body);
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ServiceError::Authentication(reason),
            StatusCode::NOT_FOUND => ServiceError::NotFound(subject.to_string()),
            _ => ServiceError::Request {
                status: status.as_u16(),
                reason,
            },
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ServiceError> {
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ServiceError::Decode(format!("reading response body: {}", e)))?;
        serde_json::from_slice(&bytes).map_err(|e| ServiceError::Decode(e.to_string()))
    }

    async fn search(&self, index: &str, body: &Value) -> Result<SearchResponse, ServiceError> {
        let builder = self
            .request(Method::POST, &format!("/{}/_search", index))
            .json(body);
        let response = Self::check(self.send(builder).await?, index).await?;
        Self::decode(response).await
    }
}

/// Extract `error.reason` from an OpenSearch error body, or fall back to the raw text.
fn error_reason(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            let error = v.get("error")?;
            match error.get("reason").and_then(Value::as_str) {
                Some(reason) => Some(reason.to_string()),
                None => error.as_str().map(str::to_string),
            }
        })
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl SearchIndex for OpenSearchClient {
    async fn ping(&self) -> Result<(), ServiceError> {
        let response = self.send(self.request(Method::HEAD, "/")).await?;
        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(ServiceError::Authentication(
                format!("credentials for '{}' were rejected", self.username),
            )),
            status if status.is_success() => Ok(()),
            status => Err(ServiceError::Connection(format!(
                "ping to {} answered with status {}",
                self.base_url,
                status.as_u16()
            ))),
        }
    }

    async fn info(&self) -> Result<ClusterInfo, ServiceError> {
        let response = self.send(self.request(Method::GET, "/")).await?;
        let response = Self::check(response, "cluster info").await?;
        Self::decode(response).await
    }

    async fn index_exists(&self, index: &str) -> Result<bool, ServiceError> {
        validate_index_name(index)?;
        let response = self
            .send(self.request(Method::HEAD, &format!("/{}", index)))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            _ => Self::check(response, index).await.map(|_| true),
        }
    }

    async fn create_index(&self, request: &CreateIndexRequest) -> Result<(), ServiceError> {
        request.validate()?;
        let builder = self
            .request(Method::PUT, &format!("/{}", request.index))
            .json(&request.to_body());
        Self::check(self.send(builder).await?, &request.index).await?;
        info!(index = %request.index, "Index created");
        Ok(())
    }

    async fn index_document(&self, request: &IndexRequest) -> Result<IndexResponse, ServiceError> {
        request.validate()?;
        let builder = match &request.id {
            Some(id) => self
                .http
                .request(Method::PUT, self.document_url(&request.index, id)?)
                .basic_auth(&self.username, Some(&self.password)),
            None => self.request(Method::POST, &format!("/{}/_doc", request.index)),
        };

        let mut builder = builder.json(&request.body);
        if request.refresh {
            builder = builder.query(&[("refresh", "true")]);
        }

        let response = Self::check(self.send(builder).await?, &request.index).await?;
        let indexed: IndexResponse = Self::decode(response).await?;
        debug!(index = %indexed.index, id = %indexed.id, result = %indexed.result, "Document indexed");
        Ok(indexed)
    }

    async fn bulk(&self, request: &BulkRequest) -> Result<BulkResponse, ServiceError> {
        request.validate()?;
        if request.documents.is_empty() {
            return Ok(BulkResponse::default());
        }

        let builder = self
            .request(Method::POST, "/_bulk")
            .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
            .body(request.to_ndjson()?);

        let response = Self::check(self.send(builder).await?, &request.index).await?;
        Self::decode(response).await
    }

    async fn knn_search(&self, request: &KnnSearchRequest) -> Result<SearchResponse, ServiceError> {
        request.validate()?;
        self.search(&request.index, &request.to_body()).await
    }

    async fn query_string_search(
        &self,
        request: &QueryStringSearchRequest,
    ) -> Result<SearchResponse, ServiceError> {
        request.validate()?;
        self.search(&request.index, &request.to_body()).await
    }

    fn endpoint(&self) -> String {
        self.base_url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::Document;
    use axum::extract::{Path, Query};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::routing::{get, post, put};
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    async fn serve(app: Router) -> IndexConnection {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        IndexConnection {
            host: "127.0.0.1".to_string(),
            port,
            username: "admin".to_string(),
            password: "secret".to_string(),
            use_ssl: false,
            verify_certs: false,
        }
    }

    fn client(conn: &IndexConnection) -> OpenSearchClient {
        OpenSearchClient::new(conn, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_info_sends_basic_auth() {
        let app = Router::new().route(
            "/",
            get(|headers: HeaderMap| async move {
                // "admin:secret"
                assert_eq!(headers["authorization"], "Basic YWRtaW46c2VjcmV0");
                Json(json!({
                    "name": "node-1",
                    "cluster_name": "docker-cluster",
                    "cluster_uuid": "abc",
                    "version": { "distribution": "opensearch", "number": "2.19.1" },
                    "tagline": "The OpenSearch Project"
                }))
            }),
        );
        let conn = serve(app).await;

        let info = client(&conn).info().await.unwrap();
        assert_eq!(info.cluster_name, "docker-cluster");
        assert_eq!(info.version.number, "2.19.1");
    }

    #[tokio::test]
    async fn test_unauthorized_maps_to_authentication() {
        let app = Router::new().route(
            "/",
            get(|| async {
                (
                    AxumStatus::UNAUTHORIZED,
                    Json(json!({ "error": { "reason": "Unauthorized" }, "status": 401 })),
                )
            }),
        );
        let conn = serve(app).await;

        let err = client(&conn).info().await.unwrap_err();
        assert!(matches!(err, ServiceError::Authentication(_)));
    }

    #[tokio::test]
    async fn test_missing_index_maps_to_not_found() {
        let app = Router::new().route(
            "/:index/_search",
            post(|| async {
                (
                    AxumStatus::NOT_FOUND,
                    Json(json!({ "error": { "type": "index_not_found_exception" }, "status": 404 })),
                )
            }),
        );
        let conn = serve(app).await;

        let request = QueryStringSearchRequest::new("missing", "tags:demo");
        let err = client(&conn).query_string_search(&request).await.unwrap_err();
        match err {
            ServiceError::NotFound(subject) => assert_eq!(subject, "missing"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bad_request_carries_reason() {
        let app = Router::new().route(
            "/:index/_search",
            post(|| async {
                (
                    AxumStatus::BAD_REQUEST,
                    Json(json!({ "error": { "type": "query_shard_exception", "reason": "Failed to parse query" }, "status": 400 })),
                )
            }),
        );
        let conn = serve(app).await;

        let request = QueryStringSearchRequest::new("docs", "a:(");
        let err = client(&conn).query_string_search(&request).await.unwrap_err();
        match err {
            ServiceError::Request { status, reason } => {
                assert_eq!(status, 400);
                assert_eq!(reason, "Failed to parse query");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_index_document_with_refresh_and_id() {
        let app = Router::new().route(
            "/:index/_doc/:id",
            put(
                |Path((index, id)): Path<(String, String)>,
                 Query(params): Query<HashMap<String, String>>,
                 Json(body): Json<Value>| async move {
                    assert_eq!(params.get("refresh").map(String::as_str), Some("true"));
                    assert_eq!(body["name"], "Test");
                    Json(json!({ "_index": index, "_id": id, "result": "created", "_version": 1 }))
                },
            ),
        );
        let conn = serve(app).await;

        let request = IndexRequest::new("my-demo-index", json!({ "name": "Test" }))
            .with_id("doc-1")
            .with_refresh(true);
        let response = client(&conn).index_document(&request).await.unwrap();

        assert_eq!(response.id, "doc-1");
        assert_eq!(response.result, "created");
    }

    #[tokio::test]
    async fn test_document_id_is_sent_as_one_path_segment() {
        let app = Router::new().route(
            "/:index/_doc/:id",
            put(
                |Path((index, id)): Path<(String, String)>,
                 Query(params): Query<HashMap<String, String>>| async move {
                    assert_eq!(params.len(), 1);
                    assert_eq!(params.get("refresh").map(String::as_str), Some("true"));
                    Json(json!({ "_index": index, "_id": id, "result": "created", "_version": 1 }))
                },
            ),
        );
        let conn = serve(app).await;
        let client = client(&conn);

        for id in ["a#b", "a?b", "a/b", "50% off"] {
            let request = IndexRequest::new("my-demo-index", json!({ "name": "Test" }))
                .with_id(id)
                .with_refresh(true);
            let response = client.index_document(&request).await.unwrap();
            assert_eq!(response.id, id);
            assert_eq!(response.index, "my-demo-index");
        }
    }

    #[tokio::test]
    async fn test_index_exists_reads_status() {
        let app = Router::new().route(
            "/:index",
            get(|Path(index): Path<String>| async move {
                if index == "present" {
                    AxumStatus::OK
                } else {
                    AxumStatus::NOT_FOUND
                }
            }),
        );
        let conn = serve(app).await;
        let client = client(&conn);

        assert!(client.index_exists("present").await.unwrap());
        assert!(!client.index_exists("absent").await.unwrap());
    }

    #[tokio::test]
    async fn test_bulk_posts_ndjson() {
        let app = Router::new().route(
            "/_bulk",
            post(|headers: HeaderMap, body: String| async move {
                assert_eq!(headers["content-type"], "application/x-ndjson");
                let items: Vec<Value> = body
                    .lines()
                    .skip(1)
                    .step_by(2)
                    .map(|_| json!({ "index": { "status": 201 } }))
                    .collect();
                Json(json!({ "took": 1, "errors": false, "items": items }))
            }),
        );
        let conn = serve(app).await;

        let doc = Document {
            product_id: "P1".into(),
            user_id: "U1".into(),
            score: Some(5),
            summary: "s".into(),
            text: "t".into(),
            combined: String::new(),
            n_tokens: None,
            embedding: None,
            extra: Default::default(),
        };
        let request = BulkRequest::new("word_embeddings", vec![doc.clone(), doc]);
        let response = client(&conn).bulk(&request).await.unwrap();

        assert_eq!(response.written(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connection_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let conn = IndexConnection {
            host: "127.0.0.1".to_string(),
            port,
            use_ssl: false,
            ..IndexConnection::default()
        };

        let err = client(&conn).ping().await.unwrap_err();
        assert!(matches!(err, ServiceError::Connection(_)));
    }

    #[test]
    fn test_error_reason_fallbacks() {
        assert_eq!(
            error_reason(r#"{"error":{"reason":"boom"}}"#),
            "boom"
        );
        assert_eq!(error_reason(r#"{"error":"plain"}"#), "plain");
        assert_eq!(error_reason("not json"), "not json");
    }
}
