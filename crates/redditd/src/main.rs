//! redditd - Reddit MCP server
//!
//! Serves the MCP endpoint and the analytics dashboard, persisting usage
//! counters across restarts.

use anyhow::Result;
use clap::Parser;
use reddit_shared::{Analytics, ServerConfig, SERVER_NAME, VERSION};
use redditd::server::{self, AppState};
use redditd::shutdown::{spawn_periodic_flush, FlushOnDrop};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Reddit MCP server
#[derive(Parser)]
#[command(name = "redditd")]
#[command(about = "Reddit MCP server with usage analytics", long_about = None)]
#[command(version)]
struct Args {
    /// TOML config file
    #[arg(long, env = "REDDIT_MCP_CONFIG")]
    config: Option<PathBuf>,

    /// Bind address (overrides $HOST)
    #[arg(long)]
    host: Option<String>,

    /// Listen port (overrides $PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Directory holding analytics.json (overrides $ANALYTICS_DIR)
    #[arg(long)]
    analytics_dir: Option<PathBuf>,
}

impl Args {
    fn apply(self, config: &mut ServerConfig) {
        if let Some(host) = self.host {
            config.http.host = host;
        }
        if let Some(port) = self.port {
            config.http.port = port;
        }
        if let Some(dir) = self.analytics_dir {
            config.analytics.dir = dir;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,reqwest=warn,hyper=warn")),
        )
        .init();

    let args = Args::parse();
    let mut config = ServerConfig::load(args.config.as_deref());
    args.apply(&mut config);

    info!("{} v{} starting", SERVER_NAME, VERSION);

    let analytics = Arc::new(
        Analytics::open(config.analytics_store()).with_max_recent_calls(config.analytics.max_recent_calls),
    );
    let _flush_guard = FlushOnDrop::new(Arc::clone(&analytics));

    let flusher = spawn_periodic_flush(
        Arc::clone(&analytics),
        Duration::from_secs(config.analytics.save_interval_secs),
    );

    let state = Arc::new(AppState::new(Arc::clone(&analytics), &config));
    let result = server::run(state, &config).await;

    if let Some(flusher) = flusher {
        flusher.abort();
    }
    analytics.shutdown();
    info!("Shutdown complete");
    result
}
