//! Documents and response payloads exchanged with the search index.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One imported product review.
///
/// Field names match the CSV header and the index mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "ProductId")]
    pub product_id: String,
    #[serde(rename = "UserId")]
    pub user_id: String,
    #[serde(rename = "Score", skip_serializing_if = "Option::is_none", default)]
    pub score: Option<i64>,
    #[serde(rename = "Summary")]
    pub summary: String,
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(default)]
    pub combined: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub n_tokens: Option<i64>,
    /// Absent when the source row had no embedding
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub embedding: Option<Vec<f32>>,
    /// Source columns outside the fixed schema, stored as strings
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// Cluster information returned by `GET /`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterInfo {
    pub name: String,
    pub cluster_name: String,
    pub cluster_uuid: String,
    pub version: ClusterVersion,
    pub tagline: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterVersion {
    pub number: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution: Option<String>,
}

/// Result of indexing a single document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexResponse {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_id")]
    pub id: String,
    /// `created` or `updated`
    pub result: String,
    #[serde(rename = "_version", default)]
    pub version: u64,
}

/// Response of a `_bulk` request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkResponse {
    #[serde(default)]
    pub took: u64,
    pub errors: bool,
    pub items: Vec<BulkItemResult>,
}

impl BulkResponse {
    /// Number of documents the index accepted.
    pub fn written(&self) -> usize {
        self.items.iter().filter(|item| item.is_success()).count()
    }

    /// Items the index rejected.
    pub fn failures(&self) -> impl Iterator<Item = &BulkItemResult> {
        self.items.iter().filter(|item| !item.is_success())
    }
}

/// Outcome of one `index` action inside a bulk request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemResult {
    #[serde(rename = "index")]
    pub outcome: BulkItemOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemOutcome {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BulkItemError>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemError {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub reason: Option<String>,
}

impl BulkItemResult {
    pub fn is_success(&self) -> bool {
        self.outcome.error.is_none() && (200..300).contains(&self.outcome.status)
    }
}

/// Response of a `_search` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub took: u64,
    pub hits: HitsMetadata,
}

impl SearchResponse {
    /// Total hit count reported by the index, falling back to the returned hits.
    pub fn total(&self) -> u64 {
        self.hits
            .total
            .as_ref()
            .map(|t| t.value)
            .unwrap_or(self.hits.hits.len() as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HitsMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<TotalHits>,
    pub hits: Vec<SearchHit>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalHits {
    pub value: u64,
    #[serde(default)]
    pub relation: String,
}

/// A stored document paired with its relevance or similarity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(rename = "_index", default)]
    pub index: String,
    #[serde(rename = "_id", default)]
    pub id: String,
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    #[serde(rename = "_source", default)]
    pub source: Value,
}

impl SearchHit {
    /// String field of the stored document, if present.
    pub fn source_str(&self, field: &str) -> Option<&str> {
        self.source.get(field).and_then(Value::as_str)
    }
}
