//! OpenAI-compatible embedding provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{error, info};

use super::provider::EmbeddingProvider;
use crate::config::EmbeddingSettings;
use crate::error::ServiceError;

/// Embedder calling `POST {base_url}/embeddings`.
pub struct OpenAiEmbedder {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl OpenAiEmbedder {
    /// Create a new embedder with a fixed request timeout.
    ///
    /// # Errors
    /// Returns `Configuration` if the API key is empty or the HTTP client
    /// cannot be built.
    pub fn new(settings: &EmbeddingSettings, timeout: Duration) -> Result<Self, ServiceError> {
        if settings.api_key.is_empty() {
            return Err(ServiceError::Configuration(
                "embedding API key is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ServiceError::Configuration(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
        })
    }
}

/// Request payload for the embeddings endpoint.
#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

/// Response payload returned by the embeddings endpoint.
#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        let start = Instant::now();
        let url = format!("{}/embeddings", self.base_url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, url = %url, "Embedding request failed");
                ServiceError::Provider(format!("request failed: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            error!(status = status.as_u16(), "Embedding provider returned an error");
            return Err(ServiceError::Provider(format!(
                "status {}: {}",
                status.as_u16(),
                body
            )));
        }

        let payload: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(format!("embedding response: {}", e)))?;

        let vector = payload
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| ServiceError::Decode("embedding response has no data".to_string()))?;

        info!(
            model = %self.model,
            dimension = vector.len(),
            took_ms = start.elapsed().as_millis() as u64,
            "Embedding computed"
        );

        Ok(vector)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_ready(&self) -> bool {
        !self.api_key.is_empty()
    }
}
