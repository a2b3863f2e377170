//! Configuration for the Reddit MCP server.
//!
//! Sources in increasing precedence: built-in defaults, an optional TOML
//! file, then environment variables. Command-line flags are applied on top
//! by the daemon.

use crate::analytics_state::MAX_RECENT_CALLS;
use crate::analytics_store::{AnalyticsStore, DEFAULT_ANALYTICS_DIR};
use crate::error::{RedditError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// HTTP listener configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HttpConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Maximum accepted request body in bytes
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_body_bytes() -> usize {
    1024 * 1024
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

/// Analytics persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AnalyticsConfig {
    /// Directory holding analytics.json
    #[serde(default = "default_analytics_dir")]
    pub dir: PathBuf,

    /// Periodic flush cadence in seconds (0 disables the periodic flush)
    #[serde(default = "default_save_interval")]
    pub save_interval_secs: u64,

    /// Recent tool calls retained
    #[serde(default = "default_max_recent_calls")]
    pub max_recent_calls: usize,
}

fn default_analytics_dir() -> PathBuf {
    PathBuf::from(DEFAULT_ANALYTICS_DIR)
}

fn default_save_interval() -> u64 {
    60
}

fn default_max_recent_calls() -> usize {
    MAX_RECENT_CALLS
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            dir: default_analytics_dir(),
            save_interval_secs: default_save_interval(),
            max_recent_calls: default_max_recent_calls(),
        }
    }
}

/// Reddit API access
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedditConfig {
    /// Fallback OAuth client id when a request supplies none
    #[serde(default)]
    pub client_id: String,

    #[serde(default)]
    pub client_secret: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_user_agent() -> String {
    format!("reddit-mcp-server/{} (by reddit-mcp)", crate::VERSION)
}

fn default_timeout() -> u64 {
    30
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: default_user_agent(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Full server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ServerConfig {
    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub analytics: AnalyticsConfig,

    #[serde(default)]
    pub reddit: RedditConfig,
}

impl ServerConfig {
    /// Load config: file (if any) then environment overrides.
    ///
    /// A missing or invalid file is logged and replaced by defaults.
    pub fn load(path: Option<&Path>) -> Self {
        let mut config = match path {
            Some(p) => Self::load_from_path(p).unwrap_or_else(|e| {
                warn!("Config {} unusable, using defaults: {}", p.display(), e);
                ServerConfig::default()
            }),
            None => ServerConfig::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: ServerConfig =
            toml::from_str(&content).map_err(|e| RedditError::Config(e.to_string()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST").filter(|v| !v.is_empty()) {
            self.http.host = host;
        }
        parse_env(&lookup, "PORT", &mut self.http.port);
        if let Some(dir) = lookup("ANALYTICS_DIR").filter(|v| !v.is_empty()) {
            self.analytics.dir = PathBuf::from(dir);
        }
        parse_env(&lookup, "ANALYTICS_SAVE_INTERVAL_SECS", &mut self.analytics.save_interval_secs);
        parse_env(&lookup, "ANALYTICS_MAX_RECENT_CALLS", &mut self.analytics.max_recent_calls);
        if let Some(id) = lookup("REDDIT_CLIENT_ID") {
            self.reddit.client_id = id;
        }
        if let Some(secret) = lookup("REDDIT_CLIENT_SECRET") {
            self.reddit.client_secret = secret;
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }

    pub fn analytics_store(&self) -> AnalyticsStore {
        AnalyticsStore::new(&self.analytics.dir)
    }
}

fn parse_env<F, T>(lookup: &F, key: &str, slot: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(value) => *slot = value,
            Err(_) => warn!("Ignoring invalid {}={:?}", key, raw),
        }
    }
}
