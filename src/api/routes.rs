//! Route handlers for the query API.

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{field, info, instrument, Span};

use super::{EmbedResponse, SearchResults};
use crate::error::ServiceError;
use crate::metrics;
use crate::query::{HealthReport, QueryService};

#[derive(Debug, Deserialize)]
struct TextParams {
    #[serde(default)]
    text: String,
    #[serde(default)]
    limit: Option<usize>,
}

/// Query-string rejections become `Validation` errors.
fn text_params(query: Result<Query<TextParams>, QueryRejection>) -> Result<TextParams, ServiceError> {
    query
        .map(|Query(params)| params)
        .map_err(|rejection| ServiceError::Validation(rejection.body_text()))
}

/// Build the router for the query API.
pub fn router(service: Arc<QueryService>) -> Router {
    Router::new()
        .route("/embeddings", get(embed_text))
        .route("/embeddings/", get(embed_text))
        .route("/embeddings/search", get(search_text))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(service)
}

#[instrument(skip_all, fields(text_len = field::Empty))]
async fn embed_text(
    State(service): State<Arc<QueryService>>,
    query: Result<Query<TextParams>, QueryRejection>,
) -> Result<Json<EmbedResponse>, ServiceError> {
    metrics::increment_requests("embed");
    let params = text_params(query).inspect_err(|_| metrics::increment_errors("embed"))?;
    Span::current().record("text_len", params.text.len());

    let vector = service.embed(&params.text).await.inspect_err(|e| {
        metrics::increment_errors("embed");
        info!(error = %e, "Embed request failed");
    })?;

    Ok(Json(EmbedResponse { vector }))
}

#[instrument(skip_all, fields(text = field::Empty, limit = field::Empty))]
async fn search_text(
    State(service): State<Arc<QueryService>>,
    query: Result<Query<TextParams>, QueryRejection>,
) -> Result<Json<SearchResults>, ServiceError> {
    metrics::increment_requests("search");
    let params = text_params(query).inspect_err(|_| metrics::increment_errors("search"))?;
    let span = Span::current();
    span.record("text", params.text.as_str());
    if let Some(limit) = params.limit {
        span.record("limit", limit);
    }

    let results = service
        .search(&params.text, params.limit)
        .await
        .inspect_err(|e| {
            metrics::increment_errors("search");
            info!(error = %e, "Search request failed");
        })?;

    Ok(Json(SearchResults { results }))
}

async fn health(State(service): State<Arc<QueryService>>) -> (StatusCode, Json<HealthReport>) {
    let report = service.health().await;
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
