//! Query API client failure modes against stub servers.

use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use std::time::Duration;

use review_search::ui::search::{ApiError, QueryApiClient, SearchForm, SearchState};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn client(base: &str, timeout: Duration) -> QueryApiClient {
    QueryApiClient::new(base, timeout).unwrap()
}

#[tokio::test]
async fn test_results_are_decoded() {
    let app = Router::new().route(
        "/embeddings/search",
        get(|| async {
            r#"{"results":[{"_index":"word_embeddings","_id":"1","_score":0.8,"_source":{"Summary":"Yum"}}]}"#
        }),
    );
    let base = serve(app).await;

    let results = client(&base, Duration::from_secs(5))
        .search("cookies", Some(1))
        .await
        .unwrap();
    assert_eq!(results.results.len(), 1);
    assert_eq!(results.results[0].source_str("Summary"), Some("Yum"));
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let app = Router::new().route("/embeddings/search", get(|| async { "<html>oops</html>" }));
    let base = serve(app).await;

    let err = client(&base, Duration::from_secs(5))
        .search("cookies", None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::Decode {
            raw: "<html>oops</html>".into()
        }
    );
}

#[tokio::test]
async fn test_error_status_carries_detail() {
    let app = Router::new().route(
        "/embeddings/search",
        get(|| async {
            (
                StatusCode::SERVICE_UNAVAILABLE,
                r#"{"detail":"Search index unavailable: refused"}"#,
            )
        }),
    );
    let base = serve(app).await;

    let err = client(&base, Duration::from_secs(5))
        .search("cookies", None)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        ApiError::Http {
            status: 503,
            detail: "Search index unavailable: refused".into()
        }
    );
}

#[tokio::test]
async fn test_slow_server_times_out() {
    let app = Router::new().route(
        "/embeddings/search",
        get(|| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            r#"{"results":[]}"#
        }),
    );
    let base = serve(app).await;

    let err = client(&base, Duration::from_millis(100))
        .search("cookies", None)
        .await
        .unwrap_err();
    assert_eq!(err, ApiError::Timeout);
}

#[tokio::test]
async fn test_closed_port_is_connection_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = client(&format!("http://{}", addr), Duration::from_secs(5))
        .search("cookies", None)
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::Connection { .. }));
}

#[tokio::test]
async fn test_form_displays_failure() {
    let app = Router::new().route(
        "/embeddings/search",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let base = serve(app).await;
    let api = client(&base, Duration::from_secs(5));

    let mut form = SearchForm::new();
    let query = form.submit("cookies").unwrap();
    form.resolve(api.search(&query, None).await);

    assert!(matches!(form.state(), SearchState::Displayed { .. }));
    let rendered = form.render();
    assert!(rendered.contains("status 500"));
    assert!(rendered.contains("Raw server response: boom"));
}
