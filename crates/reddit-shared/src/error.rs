//! Error types for the Reddit MCP server.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedditError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid import payload: {0}")]
    InvalidImport(String),

    #[error("Reddit API error: {0}")]
    Reddit(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl RedditError {
    /// HTTP status code to report when this error reaches a route handler.
    pub fn status_code(&self) -> u16 {
        match self {
            RedditError::InvalidImport(_) | RedditError::Json(_) => 400,
            RedditError::Reddit(_) => 502,
            RedditError::Io(_) | RedditError::Config(_) => 500,
        }
    }
}

pub type Result<T> = std::result::Result<T, RedditError>;
