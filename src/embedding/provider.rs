//! Provider trait defining the interface for embedding calls.

use async_trait::async_trait;

use crate::error::ServiceError;

/// Trait defining the interface for embedding providers.
///
/// Implementations include:
/// - `HashEmbedder` - Deterministic vectors without network access
/// - `OpenAiEmbedder` - Remote OpenAI-compatible API
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    ///
    /// # Returns
    /// A vector whose length is fixed for a given model
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError>;

    /// Model identifier reported in health output.
    fn model(&self) -> &str;

    /// Check if the provider is configured to handle requests.
    fn is_ready(&self) -> bool;
}
