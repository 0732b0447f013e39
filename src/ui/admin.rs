//! Index console: cluster status, document indexing and query-string search.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::IndexConnection;
use crate::error::ServiceError;
use crate::index::{
    ClusterInfo, IndexRequest, IndexResponse, OpenSearchClient, QueryStringSearchRequest,
    SearchIndex, SearchResponse,
};

/// How long a connected client is reused.
pub const DEFAULT_CLIENT_TTL: Duration = Duration::from_secs(300);

/// Opens a verified connection to a search index.
#[async_trait]
pub trait IndexConnector: Send + Sync {
    async fn connect(&self, params: &IndexConnection)
        -> Result<Arc<dyn SearchIndex>, ServiceError>;
}

/// Connector building [`OpenSearchClient`]s and pinging them once.
pub struct OpenSearchConnector {
    timeout: Duration,
}

impl OpenSearchConnector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl IndexConnector for OpenSearchConnector {
    async fn connect(
        &self,
        params: &IndexConnection,
    ) -> Result<Arc<dyn SearchIndex>, ServiceError> {
        let client = OpenSearchClient::new(params, self.timeout)?;
        client.ping().await?;
        info!(endpoint = %client.endpoint(), "Connected to search index");
        Ok(Arc::new(client))
    }
}

struct CachedClient {
    params: IndexConnection,
    client: Arc<dyn SearchIndex>,
    connected_at: Instant,
}

/// Reuses one connected client for a bounded time window.
///
/// A new connection is made when the parameters change or the window has
/// elapsed. Failed connections are not cached.
pub struct ClientCache {
    connector: Arc<dyn IndexConnector>,
    ttl: Duration,
    entry: Option<CachedClient>,
}

impl ClientCache {
    pub fn new(connector: Arc<dyn IndexConnector>, ttl: Duration) -> Self {
        Self {
            connector,
            ttl,
            entry: None,
        }
    }

    /// Connected client for `params`, reconnecting if needed.
    pub async fn get(
        &mut self,
        params: &IndexConnection,
    ) -> Result<Arc<dyn SearchIndex>, ServiceError> {
        if let Some(entry) = &self.entry {
            if entry.params == *params && entry.connected_at.elapsed() < self.ttl {
                return Ok(Arc::clone(&entry.client));
            }
            debug!("Cached index client expired or parameters changed");
        }

        self.entry = None;
        let client = self.connector.connect(params).await?;
        self.entry = Some(CachedClient {
            params: params.clone(),
            client: Arc::clone(&client),
            connected_at: Instant::now(),
        });
        Ok(client)
    }

    pub fn is_connected(&self) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|e| e.connected_at.elapsed() < self.ttl)
    }

    /// Drop the cached client.
    pub fn close(&mut self) {
        if self.entry.take().is_some() {
            info!("Closed cached index client");
        }
    }
}

/// Console action, used to phrase error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Connect,
    ClusterInfo,
    IndexDocument,
    Search,
}

impl fmt::Display for AdminAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AdminAction::Connect => "connecting",
            AdminAction::ClusterInfo => "fetching cluster info",
            AdminAction::IndexDocument => "indexing",
            AdminAction::Search => "searching",
        })
    }
}

/// A failed console action.
#[derive(Debug)]
pub struct AdminError {
    pub action: AdminAction,
    pub index: Option<String>,
    pub source: ServiceError,
}

impl AdminError {
    fn new(action: AdminAction, index: Option<&str>, source: ServiceError) -> Self {
        Self {
            action,
            index: index.map(str::to_string),
            source,
        }
    }
}

impl fmt::Display for AdminError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            ServiceError::Connection(msg) => write!(
                f,
                "Connection error while {}: {}. Make sure the search service is running and host/port are correct.",
                self.action, msg
            ),
            ServiceError::Authentication(_) => {
                f.write_str("Authentication failed. Please check user name and password.")
            }
            ServiceError::NotFound(subject) => match &self.index {
                Some(index) => write!(f, "Index '{}' not found.", index),
                None => write!(f, "Error while {}: '{}' not found.", self.action, subject),
            },
            ServiceError::Validation(msg) => write!(f, "Invalid input: {}", msg),
            ServiceError::Request { status, reason } => write!(
                f,
                "Error in {} request: status {}, info: {}",
                self.action, status, reason
            ),
            other => write!(f, "Error while {}: {}", self.action, other),
        }
    }
}

impl std::error::Error for AdminError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

/// Stateless console actions over a cached client.
pub struct AdminConsole {
    cache: ClientCache,
    params: IndexConnection,
}

impl AdminConsole {
    pub fn new(cache: ClientCache, params: IndexConnection) -> Self {
        Self { cache, params }
    }

    pub fn params(&self) -> &IndexConnection {
        &self.params
    }

    /// Replace the connection parameters; the next action reconnects.
    pub fn set_params(&mut self, params: IndexConnection) {
        self.params = params;
    }

    async fn client(
        &mut self,
        action: AdminAction,
        index: Option<&str>,
    ) -> Result<Arc<dyn SearchIndex>, AdminError> {
        self.cache
            .get(&self.params)
            .await
            .map_err(|e| AdminError::new(action, index, e))
    }

    /// Connect (or reuse the cached connection) without running an action.
    pub async fn connect(&mut self) -> Result<(), AdminError> {
        self.client(AdminAction::Connect, None).await.map(|_| ())
    }

    pub async fn cluster_info(&mut self) -> Result<ClusterInfo, AdminError> {
        let client = self.client(AdminAction::ClusterInfo, None).await?;
        client
            .info()
            .await
            .map_err(|e| AdminError::new(AdminAction::ClusterInfo, None, e))
    }

    /// Validate `body_json` and index it, visible to search immediately.
    ///
    /// Input is checked before any connection is made; invalid input never
    /// reaches the index.
    pub async fn index_document(
        &mut self,
        index: &str,
        id: Option<&str>,
        body_json: &str,
    ) -> Result<IndexResponse, AdminError> {
        let action = AdminAction::IndexDocument;
        let invalid = |msg: String| AdminError::new(action, Some(index), ServiceError::Validation(msg));

        if index.trim().is_empty() {
            return Err(invalid("Please provide an index name.".to_string()));
        }
        let body: Value = serde_json::from_str(body_json)
            .map_err(|e| invalid(format!("Invalid JSON in document body: {}", e)))?;

        let mut request = IndexRequest::new(index.trim(), body).with_refresh(true);
        if let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) {
            request = request.with_id(id);
        }
        request
            .validate()
            .map_err(|e| AdminError::new(action, Some(index), e))?;

        let client = self.client(action, Some(index)).await?;
        client
            .index_document(&request)
            .await
            .map_err(|e| AdminError::new(action, Some(index), e))
    }

    pub async fn search(&mut self, index: &str, query: &str) -> Result<SearchResponse, AdminError> {
        let action = AdminAction::Search;
        if index.trim().is_empty() {
            return Err(AdminError::new(
                action,
                None,
                ServiceError::Validation("Please provide an index name to search.".to_string()),
            ));
        }

        let request = QueryStringSearchRequest::new(index.trim(), query);
        request
            .validate()
            .map_err(|e| AdminError::new(action, Some(index), e))?;

        let client = self.client(action, Some(index)).await?;
        client
            .query_string_search(&request)
            .await
            .map_err(|e| AdminError::new(action, Some(index), e))
    }

    /// Drop the cached connection.
    pub fn close(&mut self) {
        self.cache.close();
    }
}

/// A parsed console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdminCommand {
    Help,
    Quit,
    Info,
    Connect {
        host: String,
        port: u16,
        username: Option<String>,
        password: Option<String>,
    },
    Index {
        index: String,
        id: Option<String>,
        body: String,
    },
    Search {
        index: String,
        query: String,
    },
}

impl AdminCommand {
    /// Parse one console line.
    ///
    /// - `index <index> [<id>] <json>` (the body starts at the first `{` or `[`)
    /// - `search <index> <query...>`
    /// - `connect <host> <port> [user] [password]`
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();

        match command {
            "help" => Ok(AdminCommand::Help),
            "quit" | "exit" => Ok(AdminCommand::Quit),
            "info" => Ok(AdminCommand::Info),
            "connect" => {
                let parts: Vec<&str> = rest.split_whitespace().collect();
                if parts.len() < 2 || parts.len() > 4 {
                    return Err("Usage: connect <host> <port> [user] [password]".to_string());
                }
                let port = parts[1]
                    .parse()
                    .map_err(|_| format!("'{}' is not a valid port", parts[1]))?;
                Ok(AdminCommand::Connect {
                    host: parts[0].to_string(),
                    port,
                    username: parts.get(2).map(|s| s.to_string()),
                    password: parts.get(3).map(|s| s.to_string()),
                })
            }
            "index" => {
                let usage = || "Usage: index <index> [<id>] <json>".to_string();
                let (index, rest) = rest.split_once(' ').ok_or_else(usage)?;
                let rest = rest.trim();
                let (id, body) = if rest.starts_with(['{', '[']) {
                    (None, rest)
                } else {
                    let (id, body) = rest.split_once(' ').ok_or_else(usage)?;
                    (Some(id.to_string()), body.trim())
                };
                Ok(AdminCommand::Index {
                    index: index.to_string(),
                    id,
                    body: body.to_string(),
                })
            }
            "search" => {
                let (index, query) = rest
                    .split_once(' ')
                    .ok_or_else(|| "Usage: search <index> <query>".to_string())?;
                Ok(AdminCommand::Search {
                    index: index.to_string(),
                    query: query.trim().to_string(),
                })
            }
            other => Err(format!(
                "Unknown command: '{}'. Type 'help' for available commands.",
                other
            )),
        }
    }
}

/// Text for a finished query-string search.
pub fn render_search(response: &SearchResponse) -> String {
    let mut out = format!("Search finished. {} hits found.", response.total());
    if response.hits.hits.is_empty() {
        out.push_str("\nNo documents match your query.");
        return out;
    }
    for hit in &response.hits.hits {
        let view = json!({ "_id": hit.id, "_score": hit.score, "_source": hit.source });
        out.push('\n');
        out.push_str(&serde_json::to_string_pretty(&view).unwrap_or_else(|_| view.to_string()));
    }
    out
}
