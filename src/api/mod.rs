//! HTTP surface of the query API.

mod routes;

pub use routes::router;

use serde::{Deserialize, Serialize};

use crate::index::SearchHit;

/// Body of `GET /embeddings`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbedResponse {
    pub vector: Vec<f32>,
}

/// Body of `GET /embeddings/search`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchResults {
    #[serde(default)]
    pub results: Vec<SearchHit>,
}
