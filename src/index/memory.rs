//! In-process search index for testing and mock mode.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::info;

use super::client::SearchIndex;
use super::requests::{
    validate_index_name, BulkRequest, CreateIndexRequest, IndexRequest, KnnSearchRequest,
    QueryStringSearchRequest,
};
use super::types::{
    BulkItemError, BulkItemOutcome, BulkItemResult, BulkResponse, ClusterInfo, ClusterVersion,
    HitsMetadata, IndexResponse, SearchHit, SearchResponse, TotalHits,
};
use crate::error::ServiceError;

#[derive(Default)]
struct StoredIndex {
    definition: Option<CreateIndexRequest>,
    /// Insertion-ordered documents, keyed by id
    documents: Vec<(String, Value)>,
}

impl StoredIndex {
    /// Reject vectors whose length disagrees with a declared `knn_vector` mapping.
    fn check_vectors(&self, source: &Value) -> Result<(), String> {
        let Some(definition) = &self.definition else {
            return Ok(());
        };
        for field in definition.properties.keys() {
            let (Some(expected), Some(value)) =
                (definition.vector_dimension(field), source.get(field))
            else {
                continue;
            };
            let actual = value.as_array().map(Vec::len).unwrap_or(0);
            if actual != expected {
                return Err(format!(
                    "Vector dimension mismatch for field [{}]. Expected: {}, Given: {}",
                    field, expected, actual
                ));
            }
        }
        Ok(())
    }

    fn upsert(&mut self, id: String, source: Value) -> &'static str {
        match self.documents.iter_mut().find(|(existing, _)| *existing == id) {
            Some(slot) => {
                slot.1 = source;
                "updated"
            }
            None => {
                self.documents.push((id, source));
                "created"
            }
        }
    }
}

/// Search index held in memory.
///
/// Implements the subset of engine behavior the stack relies on: vector
/// dimension checks, euclidean k-NN scoring (`1 / (1 + d²)`) and a simple
/// `field:term` query-string match.
pub struct MemoryIndex {
    indices: RwLock<HashMap<String, StoredIndex>>,
    requests: AtomicUsize,
}

impl MemoryIndex {
    pub fn new() -> Self {
        info!("Initializing in-memory search index");
        Self {
            indices: RwLock::new(HashMap::new()),
            requests: AtomicUsize::new(0),
        }
    }

    /// Number of trait calls served so far.
    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Number of documents stored in an index.
    pub async fn document_count(&self, index: &str) -> usize {
        self.indices
            .read()
            .await
            .get(index)
            .map(|stored| stored.documents.len())
            .unwrap_or(0)
    }

    /// Stored source of a document.
    pub async fn get_document(&self, index: &str, id: &str) -> Option<Value> {
        let indices = self.indices.read().await;
        indices
            .get(index)?
            .documents
            .iter()
            .find(|(doc_id, _)| doc_id == id)
            .map(|(_, source)| source.clone())
    }

    /// All stored sources of an index in insertion order.
    pub async fn documents(&self, index: &str) -> Vec<Value> {
        self.indices
            .read()
            .await
            .get(index)
            .map(|stored| stored.documents.iter().map(|(_, s)| s.clone()).collect())
            .unwrap_or_default()
    }

    fn count(&self) {
        self.requests.fetch_add(1, Ordering::SeqCst);
    }

    fn response(index: &str, mut hits: Vec<SearchHit>, size: usize) -> SearchResponse {
        hits.sort_by(|a, b| {
            b.score
                .unwrap_or(0.0)
                .total_cmp(&a.score.unwrap_or(0.0))
        });
        let total = hits.len() as u64;
        hits.truncate(size);
        for hit in &mut hits {
            hit.index = index.to_string();
        }
        SearchResponse {
            took: 0,
            hits: HitsMetadata {
                total: Some(TotalHits {
                    value: total,
                    relation: "eq".to_string(),
                }),
                hits,
            },
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn vector_of(value: &Value) -> Option<Vec<f32>> {
    value
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

fn l2_score(a: &[f32], b: &[f32]) -> f64 {
    let distance: f64 = a
        .iter()
        .zip(b)
        .map(|(x, y)| f64::from(x - y).powi(2))
        .sum();
    1.0 / (1.0 + distance)
}

/// Count query terms matched by a document. `field:term` restricts the match
/// to one field; a bare term may match any string field.
fn query_string_score(source: &Value, query: &str) -> usize {
    let Some(fields) = source.as_object() else {
        return 0;
    };

    let contains = |value: &Value, term: &str| match value {
        Value::String(s) => s.to_lowercase().contains(term),
        Value::Array(items) => items
            .iter()
            .any(|i| i.as_str().is_some_and(|s| s.to_lowercase().contains(term))),
        Value::Number(n) => n.to_string() == term,
        Value::Bool(b) => b.to_string() == term,
        _ => false,
    };

    query
        .split_whitespace()
        .filter(|t| !matches!(*t, "AND" | "OR"))
        .map(|t| t.trim_matches('"').to_lowercase())
        .filter(|term| match term.split_once(':') {
            Some((field, value)) => fields.get(field).is_some_and(|v| contains(v, value)),
            None => fields.values().any(|v| contains(v, term)),
        })
        .count()
}

#[async_trait]
impl SearchIndex for MemoryIndex {
    async fn ping(&self) -> Result<(), ServiceError> {
        self.count();
        Ok(())
    }

    async fn info(&self) -> Result<ClusterInfo, ServiceError> {
        self.count();
        Ok(ClusterInfo {
            name: "memory-node".to_string(),
            cluster_name: "in-memory".to_string(),
            cluster_uuid: String::new(),
            version: ClusterVersion {
                number: env!("CARGO_PKG_VERSION").to_string(),
                distribution: Some("memory".to_string()),
            },
            tagline: "In-process search index".to_string(),
        })
    }

    async fn index_exists(&self, index: &str) -> Result<bool, ServiceError> {
        self.count();
        validate_index_name(index)?;
        Ok(self.indices.read().await.contains_key(index))
    }

    async fn create_index(&self, request: &CreateIndexRequest) -> Result<(), ServiceError> {
        self.count();
        request.validate()?;
        let mut indices = self.indices.write().await;
        if indices.contains_key(&request.index) {
            return Err(ServiceError::Request {
                status: 400,
                reason: format!("index [{}] already exists", request.index),
            });
        }
        indices.insert(
            request.index.clone(),
            StoredIndex {
                definition: Some(request.clone()),
                documents: Vec::new(),
            },
        );
        Ok(())
    }

    async fn index_document(&self, request: &IndexRequest) -> Result<IndexResponse, ServiceError> {
        self.count();
        request.validate()?;
        let mut indices = self.indices.write().await;
        let stored = indices.entry(request.index.clone()).or_default();

        stored
            .check_vectors(&request.body)
            .map_err(|reason| ServiceError::Request { status: 400, reason })?;

        let id = request
            .id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
        let result = stored.upsert(id.clone(), request.body.clone());

        Ok(IndexResponse {
            index: request.index.clone(),
            id,
            result: result.to_string(),
            version: 1,
        })
    }

    async fn bulk(&self, request: &BulkRequest) -> Result<BulkResponse, ServiceError> {
        self.count();
        request.validate()?;
        let mut indices = self.indices.write().await;
        let stored = indices.entry(request.index.clone()).or_default();

        let mut items = Vec::with_capacity(request.documents.len());
        for doc in &request.documents {
            let source =
                serde_json::to_value(doc).map_err(|e| ServiceError::Internal(e.to_string()))?;
            let id = uuid::Uuid::new_v4().simple().to_string();

            let outcome = match stored.check_vectors(&source) {
                Ok(()) => {
                    stored.upsert(id.clone(), source);
                    BulkItemOutcome {
                        id: Some(id),
                        status: 201,
                        error: None,
                    }
                }
                Err(reason) => BulkItemOutcome {
                    id: Some(id),
                    status: 400,
                    error: Some(BulkItemError {
                        kind: "mapper_parsing_exception".to_string(),
                        reason: Some(reason),
                    }),
                },
            };
            items.push(BulkItemResult { outcome });
        }

        Ok(BulkResponse {
            took: 0,
            errors: items.iter().any(|item| !item.is_success()),
            items,
        })
    }

    async fn knn_search(&self, request: &KnnSearchRequest) -> Result<SearchResponse, ServiceError> {
        self.count();
        request.validate()?;
        let indices = self.indices.read().await;
        let stored = indices
            .get(&request.index)
            .ok_or_else(|| ServiceError::NotFound(request.index.clone()))?;

        let hits = stored
            .documents
            .iter()
            .filter_map(|(id, source)| {
                let vector = vector_of(source.get(&request.field)?)?;
                if vector.len() != request.vector.len() {
                    return None;
                }
                Some(SearchHit {
                    index: String::new(),
                    id: id.clone(),
                    score: Some(l2_score(&request.vector, &vector)),
                    source: source.clone(),
                })
            })
            .collect();

        Ok(Self::response(&request.index, hits, request.k))
    }

    async fn query_string_search(
        &self,
        request: &QueryStringSearchRequest,
    ) -> Result<SearchResponse, ServiceError> {
        self.count();
        request.validate()?;
        let indices = self.indices.read().await;
        let stored = indices
            .get(&request.index)
            .ok_or_else(|| ServiceError::NotFound(request.index.clone()))?;

        let hits = stored
            .documents
            .iter()
            .filter_map(|(id, source)| {
                let matched = query_string_score(source, &request.query);
                (matched > 0).then(|| SearchHit {
                    index: String::new(),
                    id: id.clone(),
                    score: Some(matched as f64),
                    source: source.clone(),
                })
            })
            .collect();

        Ok(Self::response(&request.index, hits, request.size.unwrap_or(10)))
    }

    fn endpoint(&self) -> String {
        "memory://".to_string()
    }
}
