//! Bulk-load a CSV of precomputed review embeddings into the search index.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use review_search::config::{IndexConnection, DEFAULT_INDEX_NAME};
use review_search::import::Importer;
use review_search::index::{OpenSearchClient, SearchIndex};
use review_search::logging::{self, LogTarget};

#[derive(Parser, Debug)]
#[command(name = "import-embeddings", version, about = "Bulk-load review embeddings from CSV")]
struct Args {
    /// CSV file with ProductId, UserId, Score, Summary, Text, combined, n_tokens and embedding columns
    #[arg(default_value = "./data/fine_food_reviews_with_embeddings_1k.csv")]
    csv: PathBuf,

    /// Target index
    #[arg(long, env = "INDEX_NAME", default_value = DEFAULT_INDEX_NAME)]
    index: String,

    /// Timeout for each request to the index
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(LogTarget::Stdout, "info");
    let args = Args::parse();

    let connection = IndexConnection::from_env();
    let client = OpenSearchClient::new(&connection, Duration::from_secs(args.timeout_secs))?;
    client
        .ping()
        .await
        .with_context(|| format!("search index at {} is unreachable", client.endpoint()))?;
    info!(endpoint = %client.endpoint(), "Connected to search index");

    let importer = Importer::new(Arc::new(client), args.index.clone());
    let report = importer
        .run(&args.csv)
        .await
        .inspect_err(|e| error!(error = %e, csv = %args.csv.display(), "Import failed"))?;

    println!(
        "Imported {} of {} documents into '{}' ({} failed, dimension {}{})",
        report.written,
        report.attempted,
        args.index,
        report.failed,
        report.dimension,
        if report.created_index { ", index created" } else { "" }
    );
    Ok(())
}
