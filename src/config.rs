//! Configuration module for the search stack.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Index name used by the importer and the query API.
pub const DEFAULT_INDEX_NAME: &str = "word_embeddings";

/// Connection parameters for the search index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexConnection {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Talk HTTPS to the index
    pub use_ssl: bool,
    /// Verify the server certificate (off for self-signed development clusters)
    pub verify_certs: bool,
}

impl IndexConnection {
    /// Load index connection parameters from the environment.
    ///
    /// # Environment Variables
    /// - `OPENSEARCH_HOST` (default: localhost)
    /// - `OPENSEARCH_PORT` (default: 9200)
    /// - `OPENSEARCH_USER` (default: admin)
    /// - `OPENSEARCH_INITIAL_ADMIN_PASSWORD` (default: empty)
    /// - `OPENSEARCH_USE_SSL` (default: true)
    /// - `OPENSEARCH_VERIFY_CERTS` (default: false)
    pub fn from_env() -> Self {
        Self {
            host: env::var("OPENSEARCH_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env_parse("OPENSEARCH_PORT", 9200),
            username: env::var("OPENSEARCH_USER").unwrap_or_else(|_| "admin".to_string()),
            password: env::var("OPENSEARCH_INITIAL_ADMIN_PASSWORD").unwrap_or_default(),
            use_ssl: env_flag("OPENSEARCH_USE_SSL", true),
            verify_certs: env_flag("OPENSEARCH_VERIFY_CERTS", false),
        }
    }

    /// Base URL of the index REST endpoint, without a trailing slash.
    pub fn base_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("{}://[{}]:{}", scheme, self.host, self.port)
        } else {
            format!("{}://{}:{}", scheme, self.host, self.port)
        }
    }
}

impl Default for IndexConnection {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 9200,
            username: "admin".to_string(),
            password: String::new(),
            use_ssl: true,
            verify_certs: false,
        }
    }
}

/// Embedding provider settings.
#[derive(Debug, Clone)]
pub struct EmbeddingSettings {
    pub api_key: String,
    /// OpenAI-compatible API root, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub model: String,
}

/// Query API configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub index: IndexConnection,
    pub index_name: String,
    pub embedding: EmbeddingSettings,
    /// HTTP port of the query API
    pub api_port: u16,
    /// Prometheus metrics HTTP port
    pub metrics_port: u16,
    /// Bind address (supports IPv4, IPv6, or dual-stack)
    pub bind_address: String,
    /// Use the in-memory index and hash embedder instead of external services
    pub mock_backends: bool,
    /// Number of hits returned when the caller does not pass a limit
    pub search_limit: usize,
    /// Timeout applied to every outbound HTTP call
    pub request_timeout: Duration,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `OPENSEARCH_*` - see [`IndexConnection::from_env`]
    /// - `INDEX_NAME` - target index (default: word_embeddings)
    /// - `OPENAI_API_KEY` - embedding API key (required unless MOCK_BACKENDS=true)
    /// - `OPENAI_BASE_URL` - embedding API root (default: https://api.openai.com/v1)
    /// - `EMBEDDING_MODEL` - embedding model (default: text-embedding-3-small)
    /// - `API_PORT` - HTTP listen port (default: 8000)
    /// - `METRICS_PORT` - Prometheus metrics port (default: 9090)
    /// - `BIND_ADDRESS` - Bind address (default: auto-detect [::] or 0.0.0.0)
    /// - `SEARCH_LIMIT` - default number of search hits (default: 3)
    /// - `REQUEST_TIMEOUT_SECS` - outbound HTTP timeout (default: 30)
    /// - `MOCK_BACKENDS` - use in-process backends for testing (default: false)
    /// - `RUST_LOG` - Log level (default: info)
    pub fn from_env() -> Result<Self, ConfigError> {
        let mock_backends = env_flag("MOCK_BACKENDS", false);
        let index = IndexConnection::from_env();

        let api_key = env::var("OPENAI_API_KEY").unwrap_or_default();
        if !mock_backends && api_key.is_empty() {
            return Err(ConfigError::MissingRequired("OPENAI_API_KEY"));
        }
        if !mock_backends && index.password.is_empty() {
            return Err(ConfigError::MissingRequired(
                "OPENSEARCH_INITIAL_ADMIN_PASSWORD",
            ));
        }

        let embedding = EmbeddingSettings {
            api_key,
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
                .trim_end_matches('/')
                .to_string(),
            model: env::var("EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
        };

        let search_limit = env_parse("SEARCH_LIMIT", 3usize);
        if search_limit == 0 {
            return Err(ConfigError::Invalid {
                name: "SEARCH_LIMIT",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Config {
            index,
            index_name: env::var("INDEX_NAME").unwrap_or_else(|_| DEFAULT_INDEX_NAME.to_string()),
            embedding,
            api_port: env_parse("API_PORT", 8000),
            metrics_port: env_parse("METRICS_PORT", 9090),
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "auto".to_string()),
            mock_backends,
            search_limit,
            request_timeout: Duration::from_secs(env_parse("REQUEST_TIMEOUT_SECS", 30)),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Resolve the socket address the query API listens on.
    ///
    /// `auto` tries dual-stack `[::]` first and falls back to `0.0.0.0`.
    pub async fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let port = self.api_port;
        if self.bind_address == "auto" {
            let dual_stack = SocketAddr::from(([0u16; 8], port));
            return Ok(match tokio::net::TcpListener::bind(dual_stack).await {
                Ok(_) => dual_stack,
                Err(_) => SocketAddr::from(([0u8, 0, 0, 0], port)),
            });
        }

        let bind_str = if self.bind_address.contains(':') && !self.bind_address.starts_with('[') {
            format!("[{}]:{}", self.bind_address, port)
        } else {
            format!("{}:{}", self.bind_address, port)
        };
        bind_str.parse().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDRESS",
            reason: format!("cannot parse '{}'", bind_str),
        })
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| v.eq_ignore_ascii_case("true") || v == "1")
        .unwrap_or(default)
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}
