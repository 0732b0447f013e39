//! Query API for the review embedding index.
//!
//! Embeds query text with an OpenAI-compatible provider and runs k-NN
//! searches against an OpenSearch index.
//!
//! # Environment Variables
//! - `OPENAI_API_KEY` - Embedding API key (required unless MOCK_BACKENDS=true)
//! - `OPENSEARCH_INITIAL_ADMIN_PASSWORD` - Index password (required unless MOCK_BACKENDS=true)
//! - `API_PORT` - HTTP listen port (default: 8000)
//! - `METRICS_PORT` - Prometheus metrics port (default: 9090)
//! - `MOCK_BACKENDS` - Use in-process backends for testing (default: false)
//! - `RUST_LOG` - Log level (default: info)

use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use review_search::config::Config;
use review_search::embedding::{EmbeddingProvider, HashEmbedder, OpenAiEmbedder};
use review_search::index::{MemoryIndex, OpenSearchClient, SearchIndex};
use review_search::logging::{self, LogTarget};
use review_search::query::QueryService;
use review_search::{api, metrics};

/// Run healthcheck mode: probe `/health` over IPv6 and IPv4 loopback.
async fn run_healthcheck() -> anyhow::Result<()> {
    let port = std::env::var("API_PORT").unwrap_or_else(|_| "8000".to_string());
    let urls = match std::env::var("HEALTHCHECK_URL") {
        Ok(url) => vec![url],
        Err(_) => vec![
            format!("http://[::1]:{}/health", port),
            format!("http://127.0.0.1:{}/health", port),
        ],
    };

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;
    for url in &urls {
        match client.get(url).send().await {
            Ok(response) if response.status().is_success() => {
                eprintln!("healthcheck: query API is healthy (via {})", url);
                std::process::exit(0);
            }
            Ok(response) => {
                eprintln!("healthcheck: {} answered {}", url, response.status());
            }
            Err(_) => continue,
        }
    }

    eprintln!("healthcheck: query API is not healthy");
    std::process::exit(1);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init(LogTarget::Stdout, "info");

    let program_name = std::env::args()
        .next()
        .and_then(|path| {
            std::path::Path::new(&path)
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
        })
        .unwrap_or_default();

    if program_name == "healthcheck" {
        return run_healthcheck().await;
    }

    info!("Starting embedding query API");

    let config = Config::from_env().inspect_err(|e| error!("Configuration error: {}", e))?;

    info!(
        api_port = config.api_port,
        metrics_port = config.metrics_port,
        index = %config.index_name,
        mock_backends = config.mock_backends,
        "Configuration loaded"
    );

    let metrics_handle = metrics::init_metrics()?;

    // No silent fallbacks: an unreachable index is fatal unless mocks are requested.
    let (embedder, index): (Arc<dyn EmbeddingProvider>, Arc<dyn SearchIndex>) =
        if config.mock_backends {
            info!("MOCK_BACKENDS=true: using hash embedder and in-memory index");
            (Arc::new(HashEmbedder::default()), Arc::new(MemoryIndex::new()))
        } else {
            let embedder = OpenAiEmbedder::new(&config.embedding, config.request_timeout)?;
            let client = OpenSearchClient::new(&config.index, config.request_timeout)?;
            if let Err(e) = client.ping().await {
                error!(
                    error = %e,
                    endpoint = %client.endpoint(),
                    "FATAL: search index unreachable with MOCK_BACKENDS=false. Set MOCK_BACKENDS=true for testing."
                );
                return Err(e.into());
            }
            info!(endpoint = %client.endpoint(), model = embedder.model(), "Backends ready");
            (Arc::new(embedder), Arc::new(client))
        };

    let service = Arc::new(QueryService::new(
        embedder,
        index,
        config.index_name.clone(),
        config.search_limit,
    ));

    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = metrics::start_metrics_server(metrics_port, metrics_handle).await {
            error!(error = %e, "Metrics server stopped");
        }
    });

    let addr = config.listen_addr().await?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %addr, "Query API listening");

    axum::serve(listener, api::router(service)).await?;
    Ok(())
}
