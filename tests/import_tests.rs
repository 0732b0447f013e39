//! Integration tests for the bulk CSV importer.

use std::io::Write;
use std::sync::Arc;

use review_search::error::ServiceError;
use review_search::import::{embedding_dimension, index_definition, read_documents, Importer};
use review_search::index::{MemoryIndex, SearchIndex};
use tempfile::NamedTempFile;

const HEADER: &str = ",ProductId,UserId,Score,Summary,Text,combined,n_tokens,embedding";

fn csv_file(rows: &[&str]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "{}", HEADER).unwrap();
    for row in rows {
        writeln!(file, "{}", row).unwrap();
    }
    file.flush().unwrap();
    file
}

fn two_rows() -> NamedTempFile {
    csv_file(&[
        r#"0,B001,U1,5,Great,Good product,"Title: Great; Content: Good product",10,"[0.1, 0.2, 0.3]""#,
        "1,B002,U2,1,Bad,Broken,Title: Bad; Content: Broken,4,",
    ])
}

#[tokio::test]
async fn test_import_creates_index_and_writes_rows() {
    let csv = two_rows();
    let index = Arc::new(MemoryIndex::new());
    let importer = Importer::new(index.clone(), "word_embeddings");

    let report = importer.run(csv.path()).await.unwrap();

    assert_eq!(report.dimension, 3);
    assert!(report.created_index);
    assert_eq!(report.attempted, 2);
    assert_eq!(report.written, 2);
    assert_eq!(report.failed, 0);

    let docs = index.documents("word_embeddings").await;
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0]["ProductId"], "B001");
    assert_eq!(docs[0]["Score"], 5);
    assert_eq!(docs[0]["embedding"].as_array().unwrap().len(), 3);
    assert_eq!(docs[1]["Summary"], "Bad");
    assert!(docs[1].get("embedding").is_none());
}

#[tokio::test]
async fn test_import_without_embeddings_touches_nothing() {
    let csv = csv_file(&["0,B001,U1,5,Great,Good,combined,10,"]);
    let index = Arc::new(MemoryIndex::new());
    let importer = Importer::new(index.clone(), "word_embeddings");

    let err = importer.run(csv.path()).await.unwrap_err();

    assert!(matches!(err, ServiceError::Configuration(_)));
    assert_eq!(index.request_count(), 0);
}

#[tokio::test]
async fn test_existing_index_is_not_recreated() {
    let csv = two_rows();
    let index = Arc::new(MemoryIndex::new());
    index
        .create_index(&index_definition("word_embeddings", 3))
        .await
        .unwrap();

    let report = Importer::new(index.clone(), "word_embeddings")
        .run(csv.path())
        .await
        .unwrap();

    assert!(!report.created_index);
    assert_eq!(index.document_count("word_embeddings").await, 2);
}

#[tokio::test]
async fn test_rows_with_wrong_dimension_are_counted_as_failed() {
    let csv = csv_file(&[
        r#"0,B001,U1,5,Great,Good,combined,10,"0.1,0.2,0.3""#,
        r#"1,B002,U2,4,Okay,Fine,combined,8,"0.1,0.2""#,
    ]);
    let index = Arc::new(MemoryIndex::new());

    let report = Importer::new(index.clone(), "word_embeddings")
        .run(csv.path())
        .await
        .unwrap();

    assert_eq!(report.attempted, 2);
    assert_eq!(report.written, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(index.document_count("word_embeddings").await, 1);
}

#[test]
fn test_dimension_uses_first_non_empty_embedding() {
    let csv = csv_file(&[
        "0,B001,U1,5,Great,Good,combined,10,",
        r#"1,B002,U2,4,Okay,Fine,combined,8,"[1,2,3,4]""#,
    ]);
    assert_eq!(embedding_dimension(csv.path()).unwrap(), 4);
}

#[test]
fn test_malformed_embedding_reports_line() {
    let csv = csv_file(&[r#"0,B001,U1,5,Great,Good,combined,10,"0.1,oops""#]);
    let err = read_documents(csv.path()).unwrap_err();
    match err {
        ServiceError::Validation(msg) => assert!(msg.contains("line 2"), "{msg}"),
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_blank_numeric_cells_become_none() {
    let csv = csv_file(&[r#"0,B001,U1,,Great,Good,combined,,"0.5""#]);
    let docs = read_documents(csv.path()).unwrap();
    assert_eq!(docs[0].score, None);
    assert_eq!(docs[0].n_tokens, None);
    assert_eq!(docs[0].embedding, Some(vec![0.5]));
}

#[test]
fn test_missing_file_is_configuration_error() {
    let err = embedding_dimension(std::path::Path::new("/nonexistent/reviews.csv")).unwrap_err();
    assert!(matches!(err, ServiceError::Configuration(_)));
}

#[tokio::test]
async fn test_extra_columns_are_kept_and_row_id_dropped() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "Unnamed: 0,ProductId,UserId,Score,Summary,Text,combined,n_tokens,embedding,Time,HelpfulnessNumerator").unwrap();
    writeln!(file, r#"7,B001,U1,5,Great,Good,combined,10,"0.1,0.2",1303862400,1"#).unwrap();
    file.flush().unwrap();

    let docs = read_documents(file.path()).unwrap();
    assert_eq!(docs[0].extra.len(), 2);
    assert_eq!(docs[0].extra["Time"], "1303862400");

    let index = Arc::new(MemoryIndex::new());
    Importer::new(index.clone(), "word_embeddings")
        .run(file.path())
        .await
        .unwrap();
    let stored = &index.documents("word_embeddings").await[0];
    assert_eq!(stored["Time"], "1303862400");
    assert_eq!(stored["HelpfulnessNumerator"], "1");
    assert!(stored.get("Unnamed: 0").is_none());
    assert!(stored.get("").is_none());
}
