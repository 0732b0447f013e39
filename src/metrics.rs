//! Prometheus metrics for the query API.
//!
//! Exposes an HTTP endpoint for Prometheus scraping.

use axum::{routing::get, Router};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::error::ServiceError;

/// Initialize the metrics system and return the Prometheus handle.
pub fn init_metrics() -> Result<PrometheusHandle, ServiceError> {
    describe_histogram!(
        "review_search_embed_latency_ms",
        "Time taken by the embedding provider in milliseconds"
    );
    describe_histogram!(
        "review_search_knn_latency_ms",
        "Time taken by k-NN queries against the search index in milliseconds"
    );
    describe_counter!(
        "review_search_requests_total",
        "Total number of query API requests processed"
    );
    describe_counter!(
        "review_search_errors_total",
        "Total number of failed query API requests"
    );

    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServiceError::Internal(format!("Failed to install Prometheus recorder: {}", e)))
}

/// Record an embedding call latency.
pub fn record_embed_latency(latency_ms: f64) {
    histogram!("review_search_embed_latency_ms").record(latency_ms);
}

/// Record a k-NN query latency.
pub fn record_knn_latency(latency_ms: f64) {
    histogram!("review_search_knn_latency_ms").record(latency_ms);
}

/// Increment the request count for an endpoint.
pub fn increment_requests(endpoint: &'static str) {
    counter!("review_search_requests_total", "endpoint" => endpoint).increment(1);
}

/// Increment the error count for an endpoint.
pub fn increment_errors(endpoint: &'static str) {
    counter!("review_search_errors_total", "endpoint" => endpoint).increment(1);
}

/// Create an Axum router for the metrics HTTP endpoint.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new().route("/metrics", get(move || std::future::ready(handle.render())))
}

/// Start the metrics HTTP server on the given port with auto-detect binding.
pub async fn start_metrics_server(port: u16, handle: PrometheusHandle) -> std::io::Result<()> {
    let app = metrics_router(handle);

    // Auto-detect: Try dual-stack first, fall back to IPv4-only
    let listener = match tokio::net::TcpListener::bind(("::", port)).await {
        Ok(listener) => {
            info!(port = port, bind = "::", "Starting metrics server (dual-stack)");
            listener
        }
        Err(_) => {
            info!(port = port, bind = "0.0.0.0", "Starting metrics server (IPv4-only fallback)");
            tokio::net::TcpListener::bind(("0.0.0.0", port)).await?
        }
    };

    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[test]
    fn test_recorders_without_exporter() {
        // metrics falls back to a no-op recorder when none is installed
        record_embed_latency(5.0);
        record_knn_latency(0.4);
        increment_requests("search");
        increment_errors("search");
    }

    #[tokio::test]
    async fn test_metrics_router_returns_metrics() {
        let handle = PrometheusBuilder::new().build_recorder().handle();

        let app = metrics_router(handle);

        let request = Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap();

        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("content-type").is_some());
    }

    #[tokio::test]
    async fn test_start_metrics_server_binds_and_serves() {
        use http_body_util::Empty;
        use hyper::body::Bytes;
        use std::net::TcpListener as StdTcpListener;

        // Find an available port
        let listener = StdTcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let handle = PrometheusBuilder::new().build_recorder().handle();

        let server_handle = tokio::spawn(async move {
            let _ = start_metrics_server(port, handle).await;
        });

        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let client: hyper_util::client::legacy::Client<_, Empty<Bytes>> =
            hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
                .build_http();

        let uri: hyper::Uri = format!("http://127.0.0.1:{}/metrics", port)
            .parse()
            .unwrap();
        let response = client.get(uri).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);

        server_handle.abort();
    }
}
