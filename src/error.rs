//! Error types for the search stack.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Errors raised by the embedding provider, the search index client and the
/// services composed from them.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Embedding provider error: {0}")]
    Provider(String),

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Search index unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request rejected with status {status}: {reason}")]
    Request { status: u16, reason: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// HTTP status the query API answers with for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Connection(_) | ServiceError::ServiceUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServiceError::Provider(_)
            | ServiceError::Decode(_)
            | ServiceError::Authentication(_)
            | ServiceError::Request { .. } => StatusCode::BAD_GATEWAY,
            ServiceError::Configuration(_) | ServiceError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[test]
    fn test_validation_maps_to_bad_request() {
        let err = ServiceError::Validation("text must not be empty".into());
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_connection_and_unavailable_map_to_503() {
        assert_eq!(
            ServiceError::Connection("refused".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ServiceError::ServiceUnavailable("refused".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_upstream_failures_map_to_bad_gateway() {
        assert_eq!(
            ServiceError::Provider("quota".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ServiceError::Decode("missing hits".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        let err = ServiceError::Request {
            status: 400,
            reason: "parsing_exception".into(),
        };
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let err = ServiceError::NotFound("word_embeddings".into());
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_error_display() {
        let err = ServiceError::NotFound("word_embeddings".into());
        assert_eq!(format!("{}", err), "Not found: word_embeddings");

        let err = ServiceError::Request {
            status: 400,
            reason: "bad query".into(),
        };
        assert_eq!(
            format!("{}", err),
            "Request rejected with status 400: bad query"
        );
    }

    #[tokio::test]
    async fn test_into_response_carries_detail() {
        let response = ServiceError::Validation("empty".into()).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["detail"], "Invalid input: empty");
    }
}
