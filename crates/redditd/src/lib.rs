//! redditd - Reddit MCP server with request and tool-call analytics.

pub mod mcp;
pub mod middleware;
pub mod reddit_client;
pub mod routes;
pub mod server;
pub mod shutdown;
pub mod tools;

pub use reddit_client::{Credentials, RedditClient};
pub use server::{build_router, AppState, SharedState};
