//! Typed request structs for index operations.
//!
//! Every request is validated before it is transmitted, so malformed input
//! fails locally with `ServiceError::Validation`.

use serde::Serialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use super::types::Document;
use crate::error::ServiceError;

const INVALID_NAME_CHARS: &[char] = &['\\', '/', '*', '?', '"', '<', '>', '|', ' ', ',', '#', ':'];

/// Check an index name against the engine's naming rules.
pub fn validate_index_name(name: &str) -> Result<(), ServiceError> {
    if name.is_empty() {
        return Err(ServiceError::Validation("index name must not be empty".into()));
    }
    if name == "." || name == ".." {
        return Err(ServiceError::Validation(format!(
            "index name '{}' is reserved",
            name
        )));
    }
    if name.starts_with(['_', '-', '+']) {
        return Err(ServiceError::Validation(format!(
            "index name '{}' must not start with '_', '-' or '+'",
            name
        )));
    }
    if name.chars().any(|c| c.is_uppercase() || INVALID_NAME_CHARS.contains(&c)) {
        return Err(ServiceError::Validation(format!(
            "index name '{}' must be lowercase without spaces or \\/*?\"<>|,#:",
            name
        )));
    }
    Ok(())
}

/// Index a single JSON document.
#[derive(Debug, Clone)]
pub struct IndexRequest {
    pub index: String,
    /// Generated by the index when `None`
    pub id: Option<String>,
    pub body: Value,
    /// Make the document visible to search immediately
    pub refresh: bool,
}

impl IndexRequest {
    pub fn new(index: impl Into<String>, body: Value) -> Self {
        Self {
            index: index.into(),
            id: None,
            body,
            refresh: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_index_name(&self.index)?;
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(ServiceError::Validation("document id must not be blank".into()));
            }
        }
        if !self.body.is_object() {
            return Err(ServiceError::Validation(
                "document body must be a JSON object".into(),
            ));
        }
        Ok(())
    }
}

/// Write many documents into one index.
#[derive(Debug, Clone)]
pub struct BulkRequest {
    pub index: String,
    pub documents: Vec<Document>,
}

impl BulkRequest {
    pub fn new(index: impl Into<String>, documents: Vec<Document>) -> Self {
        Self {
            index: index.into(),
            documents,
        }
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_index_name(&self.index)
    }

    /// Newline-delimited body for `POST /_bulk`.
    pub fn to_ndjson(&self) -> Result<String, ServiceError> {
        let action = serde_json::to_string(&json!({ "index": { "_index": self.index } }))
            .map_err(|e| ServiceError::Internal(e.to_string()))?;

        let mut body = String::new();
        for doc in &self.documents {
            let source =
                serde_json::to_string(doc).map_err(|e| ServiceError::Internal(e.to_string()))?;
            body.push_str(&action);
            body.push('\n');
            body.push_str(&source);
            body.push('\n');
        }
        Ok(body)
    }
}

/// k-nearest-neighbor query over a vector field.
#[derive(Debug, Clone)]
pub struct KnnSearchRequest {
    pub index: String,
    pub field: String,
    pub vector: Vec<f32>,
    pub k: usize,
}

impl KnnSearchRequest {
    pub fn new(index: impl Into<String>, field: impl Into<String>, vector: Vec<f32>, k: usize) -> Self {
        Self {
            index: index.into(),
            field: field.into(),
            vector,
            k,
        }
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_index_name(&self.index)?;
        if self.field.is_empty() {
            return Err(ServiceError::Validation("vector field must not be empty".into()));
        }
        if self.k == 0 {
            return Err(ServiceError::Validation("k must be at least 1".into()));
        }
        if self.vector.is_empty() {
            return Err(ServiceError::Validation("query vector is empty".into()));
        }
        if self.vector.iter().any(|v| !v.is_finite()) {
            return Err(ServiceError::Validation(
                "query vector contains non-finite values".into(),
            ));
        }
        Ok(())
    }

    /// Search body: `size` and `k` both equal the requested neighbor count.
    pub fn to_body(&self) -> Value {
        let mut field = Map::new();
        field.insert(
            self.field.clone(),
            json!({ "vector": self.vector, "k": self.k }),
        );
        json!({ "size": self.k, "query": { "knn": field } })
    }
}

/// Lexical query-string search.
#[derive(Debug, Clone)]
pub struct QueryStringSearchRequest {
    pub index: String,
    pub query: String,
    /// Engine default (10) when `None`
    pub size: Option<usize>,
}

impl QueryStringSearchRequest {
    pub fn new(index: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            query: query.into(),
            size: None,
        }
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = Some(size);
        self
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_index_name(&self.index)?;
        if self.query.trim().is_empty() {
            return Err(ServiceError::Validation("query string must not be empty".into()));
        }
        if self.size == Some(0) {
            return Err(ServiceError::Validation("size must be at least 1".into()));
        }
        Ok(())
    }

    pub fn to_body(&self) -> Value {
        let mut body = json!({ "query": { "query_string": { "query": self.query } } });
        if let Some(size) = self.size {
            body["size"] = json!(size);
        }
        body
    }
}

/// Index-level settings for a k-NN enabled index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IndexSettings {
    pub knn: bool,
    #[serde(rename = "knn.algo_param.ef_search")]
    pub ef_search: u32,
    pub number_of_shards: u32,
    pub number_of_replicas: u32,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            knn: true,
            ef_search: 100,
            number_of_shards: 1,
            number_of_replicas: 0,
        }
    }
}

/// Mapping of a single field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldMapping {
    Keyword,
    Text,
    Integer,
    KnnVector { dimension: usize, method: KnnMethod },
}

/// Approximate nearest-neighbor method of a `knn_vector` field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnnMethod {
    pub name: String,
    pub engine: String,
    pub space_type: String,
    pub parameters: KnnMethodParameters,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnnMethodParameters {
    pub ef_construction: u32,
    pub m: u32,
}

impl KnnMethod {
    /// HNSW graph on the faiss engine with euclidean distance.
    pub fn hnsw_l2() -> Self {
        Self {
            name: "hnsw".to_string(),
            engine: "faiss".to_string(),
            space_type: "l2".to_string(),
            parameters: KnnMethodParameters {
                ef_construction: 256,
                m: 8,
            },
        }
    }
}

/// Create an index with settings and field mappings.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateIndexRequest {
    pub index: String,
    pub settings: IndexSettings,
    pub properties: BTreeMap<String, FieldMapping>,
}

impl CreateIndexRequest {
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            settings: IndexSettings::default(),
            properties: BTreeMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, mapping: FieldMapping) -> Self {
        self.properties.insert(name.into(), mapping);
        self
    }

    /// Declared dimension of a `knn_vector` field.
    pub fn vector_dimension(&self, field: &str) -> Option<usize> {
        match self.properties.get(field) {
            Some(FieldMapping::KnnVector { dimension, .. }) => Some(*dimension),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), ServiceError> {
        validate_index_name(&self.index)?;
        for (name, mapping) in &self.properties {
            if let FieldMapping::KnnVector { dimension: 0, .. } = mapping {
                return Err(ServiceError::Validation(format!(
                    "vector field '{}' needs a positive dimension",
                    name
                )));
            }
        }
        Ok(())
    }

    /// Body for `PUT /{index}`.
    pub fn to_body(&self) -> Value {
        json!({
            "settings": { "index": self.settings },
            "mappings": { "properties": self.properties },
        })
    }
}
