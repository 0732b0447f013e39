//! Review embedding search library.
//!
//! This library exposes the core modules shared by the binaries and the
//! integration tests:
//! - `embedding` / `index` - clients for the embedding provider and search index
//! - `query` / `api` - embed-then-search service and its HTTP routes
//! - `import` - bulk CSV importer
//! - `ui` - terminal search form and index console

pub mod api;
pub mod config;
pub mod embedding;
pub mod error;
pub mod import;
pub mod index;
pub mod logging;
pub mod metrics;
pub mod query;
pub mod ui;
