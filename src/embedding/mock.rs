//! Hash-based embedder for running the stack without an external provider.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

use super::provider::EmbeddingProvider;
use crate::error::ServiceError;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Embedder that hashes lower-cased tokens into a fixed number of buckets.
///
/// Texts sharing words land close to each other, which is enough to exercise
/// nearest-neighbor search end to end.
pub struct HashEmbedder {
    dimension: usize,
    calls: AtomicUsize,
}

impl HashEmbedder {
    /// Create a new hash embedder producing vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `embed` calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn bucket(&self, token: &str) -> usize {
        let hash = token
            .bytes()
            .fold(FNV_OFFSET, |acc, b| (acc ^ u64::from(b)).wrapping_mul(FNV_PRIME));
        (hash % self.dimension as u64) as usize
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let mut vector = vec![0.0f32; self.dimension];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let token = token.to_lowercase();
            vector[self.bucket(&token)] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|v| *v /= norm);
        }

        debug!(dimension = self.dimension, "Hash embedding computed");
        Ok(vector)
    }

    fn model(&self) -> &str {
        "hash-embedder"
    }

    fn is_ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embedding_is_deterministic() {
        let embedder = HashEmbedder::new(16);
        let first = embedder.embed("whole wheat pasta").await.unwrap();
        let second = embedder.embed("whole wheat pasta").await.unwrap();

        assert_eq!(first.len(), 16);
        assert_eq!(first, second);
        assert_eq!(embedder.call_count(), 2);
    }

    #[tokio::test]
    async fn test_embedding_ignores_case_and_punctuation() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed("Green tea!").await.unwrap();
        let b = embedder.embed("green TEA").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_embedding_is_normalized() {
        let embedder = HashEmbedder::new(8);
        let v = embedder.embed("coffee beans dark roast").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_text_without_tokens_is_zero_vector() {
        let embedder = HashEmbedder::new(4);
        let v = embedder.embed("...").await.unwrap();
        assert_eq!(v, vec![0.0; 4]);
    }
}
