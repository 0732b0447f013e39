//! Bulk import of precomputed review embeddings from CSV.
//!
//! The CSV carries `ProductId, UserId, Score, Summary, Text, combined,
//! n_tokens, embedding` columns (plus an unnamed leading row id, which is
//! dropped). Any other column is indexed as a string field. `embedding` holds
//! comma-separated floats, optionally wrapped in brackets.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::index::{
    BulkRequest, CreateIndexRequest, Document, FieldMapping, KnnMethod, SearchIndex,
};
use crate::query::VECTOR_FIELD;

const SCHEMA_COLUMNS: [&str; 8] = [
    "ProductId", "UserId", "Score", "Summary", "Text", "combined", "n_tokens", "embedding",
];

/// Row-id columns written by dataframe exports.
fn is_row_id(header: &str) -> bool {
    header.trim().is_empty() || header.starts_with("Unnamed:")
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    #[serde(rename = "ProductId", default)]
    product_id: String,
    #[serde(rename = "UserId", default)]
    user_id: String,
    #[serde(rename = "Score", default, deserialize_with = "csv::invalid_option")]
    score: Option<i64>,
    #[serde(rename = "Summary", default)]
    summary: String,
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(default)]
    combined: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    n_tokens: Option<i64>,
    #[serde(default)]
    embedding: String,
}

/// Outcome of a bulk import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub dimension: usize,
    /// Whether this run created the index
    pub created_index: bool,
    pub attempted: usize,
    pub written: usize,
    pub failed: usize,
}

fn open(path: &Path) -> Result<csv::Reader<File>, ServiceError> {
    csv::Reader::from_path(path).map_err(|e| {
        ServiceError::Configuration(format!("cannot read CSV {}: {}", path.display(), e))
    })
}

fn strip_brackets(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
        .unwrap_or(trimmed)
        .trim()
}

/// Parse an embedding cell. Blank cells yield `None`.
pub fn parse_embedding(raw: &str) -> Result<Option<Vec<f32>>, String> {
    let inner = strip_brackets(raw);
    if inner.is_empty() {
        return Ok(None);
    }
    inner
        .split(',')
        .map(|part| {
            let part = part.trim();
            part.parse::<f32>()
                .map_err(|_| format!("'{}' is not a number", part))
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Some)
}

/// Dimension of the first non-empty embedding in the CSV.
///
/// # Errors
/// `Configuration` if the file cannot be read or holds no embedding.
pub fn embedding_dimension(path: &Path) -> Result<usize, ServiceError> {
    let mut reader = open(path)?;
    for row in reader.deserialize::<CsvRow>() {
        let row = row.map_err(|e| ServiceError::Configuration(format!("malformed CSV: {}", e)))?;
        let inner = strip_brackets(&row.embedding);
        if !inner.is_empty() {
            return Ok(inner.split(',').count());
        }
    }
    Err(ServiceError::Configuration(format!(
        "no non-empty embeddings found in {}",
        path.display()
    )))
}

/// Settings and mappings of the review index for vectors of `dimension`.
pub fn index_definition(index: &str, dimension: usize) -> CreateIndexRequest {
    CreateIndexRequest::new(index)
        .field("ProductId", FieldMapping::Keyword)
        .field("UserId", FieldMapping::Keyword)
        .field("Score", FieldMapping::Integer)
        .field("Summary", FieldMapping::Text)
        .field("Text", FieldMapping::Text)
        .field("combined", FieldMapping::Text)
        .field("n_tokens", FieldMapping::Integer)
        .field(
            VECTOR_FIELD,
            FieldMapping::KnnVector {
                dimension,
                method: KnnMethod::hnsw_l2(),
            },
        )
}

/// Read every row of the CSV into documents.
pub fn read_documents(path: &Path) -> Result<Vec<Document>, ServiceError> {
    let mut reader = open(path)?;
    let headers = reader
        .headers()
        .map_err(|e| ServiceError::Configuration(format!("malformed CSV header: {}", e)))?
        .clone();

    let mut documents = Vec::new();
    for record in reader.records() {
        let record =
            record.map_err(|e| ServiceError::Validation(format!("malformed CSV: {}", e)))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);

        let row: CsvRow = record
            .deserialize(Some(&headers))
            .map_err(|e| ServiceError::Validation(format!("line {}: {}", line, e)))?;
        let embedding = parse_embedding(&row.embedding)
            .map_err(|e| ServiceError::Validation(format!("line {}: embedding {}", line, e)))?;
        let extra: BTreeMap<String, Value> = headers
            .iter()
            .zip(record.iter())
            .filter(|(header, _)| !is_row_id(header) && !SCHEMA_COLUMNS.contains(header))
            .map(|(header, value)| (header.to_string(), Value::String(value.to_string())))
            .collect();

        documents.push(Document {
            product_id: row.product_id,
            user_id: row.user_id,
            score: row.score,
            summary: row.summary,
            text: row.text,
            combined: row.combined,
            n_tokens: row.n_tokens,
            embedding,
            extra,
        });
    }
    Ok(documents)
}

/// Loads a CSV export into the search index.
pub struct Importer {
    index: Arc<dyn SearchIndex>,
    index_name: String,
}

impl Importer {
    pub fn new(index: Arc<dyn SearchIndex>, index_name: impl Into<String>) -> Self {
        Self {
            index,
            index_name: index_name.into(),
        }
    }

    /// Ensure the index exists and bulk-write every row of `path`.
    ///
    /// Index creation and the bulk write are not transactional: rows the
    /// index rejects are counted in the report and left out, nothing is
    /// rolled back.
    pub async fn run(&self, path: &Path) -> Result<ImportReport, ServiceError> {
        let dimension = embedding_dimension(path)?;
        info!(path = %path.display(), dimension, "Embedding dimension detected");

        let created_index = if self.index.index_exists(&self.index_name).await? {
            info!(index = %self.index_name, "Index exists, skipping creation");
            false
        } else {
            self.index
                .create_index(&index_definition(&self.index_name, dimension))
                .await?;
            info!(index = %self.index_name, dimension, "Created index");
            true
        };

        let documents = read_documents(path)?;
        let attempted = documents.len();
        let response = self
            .index
            .bulk(&BulkRequest::new(&self.index_name, documents))
            .await?;

        for failure in response.failures() {
            warn!(
                id = ?failure.outcome.id,
                status = failure.outcome.status,
                reason = ?failure.outcome.error.as_ref().and_then(|e| e.reason.as_deref()),
                "Document rejected by index"
            );
        }

        let written = response.written();
        let report = ImportReport {
            dimension,
            created_index,
            attempted,
            written,
            failed: attempted.saturating_sub(written),
        };
        info!(
            index = %self.index_name,
            attempted = report.attempted,
            written = report.written,
            failed = report.failed,
            "Bulk import finished"
        );
        Ok(report)
    }
}
