//! Embedding providers turning text into fixed-length vectors.
//!
//! This module provides an `EmbeddingProvider` trait and implementations:
//! - `HashEmbedder` - Deterministic in-process vectors for testing
//! - `OpenAiEmbedder` - OpenAI-compatible `/embeddings` API

mod mock;
mod openai;
mod provider;

pub use mock::HashEmbedder;
pub use openai::OpenAiEmbedder;
pub use provider::EmbeddingProvider;
