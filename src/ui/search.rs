//! Search form: state machine, query API client and result rendering.

use reqwest::Client;
use serde_json::Value;
use std::fmt::Write as _;
use std::time::Duration;
use tracing::{debug, warn};

use super::{preview, truncate_text};
use crate::api::SearchResults;
use crate::index::SearchHit;

/// Description length shown per result.
pub const MAX_DESC_LENGTH: usize = 350;

/// Characters of a raw response body shown when it cannot be decoded.
pub const RAW_PREVIEW_LENGTH: usize = 500;

/// Failures talking to the query API, each with its own user-facing message.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    #[error("API request timed out. The server might be busy.")]
    Timeout,

    #[error("Could not connect to the API at {url}. Is the backend running?")]
    Connection { url: String },

    #[error("API request failed with status {status}. Server error detail: {detail}")]
    Http { status: u16, detail: String },

    #[error("Failed to decode JSON response from API. Raw response: {raw}...")]
    Decode { raw: String },

    #[error("API request failed: {0}")]
    Request(String),
}

/// Client for `GET /embeddings/search`.
#[derive(Debug, Clone)]
pub struct QueryApiClient {
    http: Client,
    search_url: String,
}

impl QueryApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Request(e.to_string()))?;
        Ok(Self {
            http,
            search_url: format!("{}/embeddings/search", base_url.trim_end_matches('/')),
        })
    }

    pub fn search_url(&self) -> &str {
        &self.search_url
    }

    /// Run a search through the query API.
    pub async fn search(&self, text: &str, limit: Option<usize>) -> Result<SearchResults, ApiError> {
        let mut request = self.http.get(&self.search_url).query(&[("text", text)]);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit)]);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;
        let status = response.status();
        let body = response.text().await.map_err(|e| self.transport_error(e))?;

        if !status.is_success() {
            let detail = match serde_json::from_str::<Value>(&body) {
                Ok(value) => value
                    .get("detail")
                    .map(|d| d.as_str().map(str::to_string).unwrap_or_else(|| d.to_string()))
                    .unwrap_or_else(|| value.to_string()),
                Err(_) => format!("Raw server response: {}...", preview(&body, RAW_PREVIEW_LENGTH)),
            };
            warn!(status = status.as_u16(), "Query API returned an error");
            return Err(ApiError::Http {
                status: status.as_u16(),
                detail,
            });
        }

        serde_json::from_str(&body).map_err(|e| {
            debug!(error = %e, "Query API response is not valid JSON");
            ApiError::Decode {
                raw: preview(&body, RAW_PREVIEW_LENGTH),
            }
        })
    }

    fn transport_error(&self, err: reqwest::Error) -> ApiError {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_connect() {
            ApiError::Connection {
                url: self.search_url.clone(),
            }
        } else {
            ApiError::Request(err.to_string())
        }
    }
}

/// Outcome shown after a search finished.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    Results(Vec<SearchHit>),
    Failed(ApiError),
}

/// Form state.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchState {
    /// Nothing submitted yet
    Idle,
    /// Query submitted, awaiting the API
    Loading { query: String },
    /// Results or an error are on screen
    Displayed { query: String, outcome: SearchOutcome },
}

/// Reasons a submission is refused without changing state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    #[error("Please enter a search query.")]
    EmptyQuery,

    #[error("Still searching for '{0}'.")]
    Busy(String),
}

/// The search form as a state machine.
#[derive(Debug)]
pub struct SearchForm {
    state: SearchState,
}

impl SearchForm {
    pub fn new() -> Self {
        Self {
            state: SearchState::Idle,
        }
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Submit query text. On success the form is `Loading` and the trimmed
    /// query to send is returned.
    pub fn submit(&mut self, text: &str) -> Result<String, SubmitError> {
        if let SearchState::Loading { query } = &self.state {
            return Err(SubmitError::Busy(query.clone()));
        }
        let query = text.trim();
        if query.is_empty() {
            return Err(SubmitError::EmptyQuery);
        }
        self.state = SearchState::Loading {
            query: query.to_string(),
        };
        Ok(query.to_string())
    }

    /// Record the API's answer. Ignored unless a query is loading.
    pub fn resolve(&mut self, result: Result<SearchResults, ApiError>) {
        let SearchState::Loading { query } = &self.state else {
            warn!("Search result arrived with no query in flight");
            return;
        };
        let outcome = match result {
            Ok(results) => SearchOutcome::Results(results.results),
            Err(err) => SearchOutcome::Failed(err),
        };
        self.state = SearchState::Displayed {
            query: query.clone(),
            outcome,
        };
    }

    /// Text for the current state.
    pub fn render(&self) -> String {
        match &self.state {
            SearchState::Idle => {
                "Enter a query to find semantically similar items in the index.".to_string()
            }
            SearchState::Loading { query } => {
                format!("Searching for items similar to '{}'...", query)
            }
            SearchState::Displayed {
                outcome: SearchOutcome::Failed(err),
                ..
            } => err.to_string(),
            SearchState::Displayed {
                query,
                outcome: SearchOutcome::Results(hits),
            } => render_hits(query, hits),
        }
    }
}

impl Default for SearchForm {
    fn default() -> Self {
        Self::new()
    }
}

/// Render ranked hits: summary, product id, shortened text and score.
pub fn render_hits(query: &str, hits: &[SearchHit]) -> String {
    if hits.is_empty() {
        return format!(
            "No results found for '{}'. Try searching for something else!",
            query
        );
    }

    let mut out = format!("Results for '{}':\n", query);
    for hit in hits {
        let title = hit.source_str("Summary").unwrap_or("No Summary");
        let product_id = hit.source_str("ProductId").unwrap_or("N/A");
        let description = match hit.source_str("Text") {
            Some(text) if !text.is_empty() => truncate_text(text, MAX_DESC_LENGTH),
            _ => "No Description".to_string(),
        };
        let score = hit
            .score
            .map(|s| format!("{:.3}", s))
            .unwrap_or_else(|| "n/a".to_string());

        let _ = write!(
            out,
            "\n{}\n  Product ID: {}\n  {}\n  Similarity Score: {}\n{}\n",
            title,
            product_id,
            description,
            score,
            "-".repeat(40)
        );
    }
    out
}
