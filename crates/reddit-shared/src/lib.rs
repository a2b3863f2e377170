//! Shared types for the Reddit MCP server: the analytics core, the Reddit
//! listing model and its text rendering, configuration and JSON-RPC types.

pub mod analytics;
pub mod analytics_state;
pub mod analytics_store;
pub mod config;
pub mod error;
pub mod import;
pub mod reddit;
pub mod rpc;
pub mod summary;

pub use analytics::Analytics;
pub use analytics_state::{AnalyticsState, ToolCallRecord, MAX_RECENT_CALLS};
pub use analytics_store::AnalyticsStore;
pub use config::ServerConfig;
pub use error::RedditError;
pub use import::{BackupImport, ImportTotals};
pub use summary::{summarize, AnalyticsSummary, SERVER_NAME};

/// Crate version, reported in health and summary responses
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
