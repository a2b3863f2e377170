//! HTTP server for redditd

use crate::middleware::{track_requests, CLIENT_ID_HEADER, CLIENT_SECRET_HEADER};
use crate::mcp::{self, SESSION_HEADER};
use crate::reddit_client::{Credentials, RedditClient};
use crate::routes;
use crate::shutdown::shutdown_signal;
use anyhow::{Context, Result};
use axum::http::{header, HeaderName, Method};
use axum::{middleware, routing::post, Router};
use reddit_shared::config::{HttpConfig, ServerConfig};
use reddit_shared::Analytics;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

/// Upper bound for one request, Reddit round trips included
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Application state shared across handlers
pub struct AppState {
    pub analytics: Arc<Analytics>,
    pub reddit: RedditClient,
    /// Credentials from configuration, the lowest-priority source
    pub default_credentials: Credentials,
}

impl AppState {
    pub fn new(analytics: Arc<Analytics>, config: &ServerConfig) -> Self {
        Self {
            analytics,
            reddit: RedditClient::new(&config.reddit),
            default_credentials: Credentials::new(&config.reddit.client_id, &config.reddit.client_secret),
        }
    }

    pub fn with_reddit_client(mut self, reddit: RedditClient) -> Self {
        self.reddit = reddit;
        self
    }
}

pub type SharedState = Arc<AppState>;

/// All routes with CORS, tracing, limits and request tracking applied.
pub fn build_router(state: SharedState, http: &HttpConfig) -> Router {
    Router::new()
        .merge(routes::health_routes())
        .merge(routes::analytics_routes())
        .route("/mcp", post(mcp::handle))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(RequestBodyLimitLayer::new(http.max_body_bytes))
        .layer(cors_layer())
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static("mcp-protocol-version"),
            HeaderName::from_static(SESSION_HEADER),
            HeaderName::from_static(CLIENT_ID_HEADER),
            HeaderName::from_static(CLIENT_SECRET_HEADER),
        ])
        .expose_headers([HeaderName::from_static(SESSION_HEADER)])
}

/// Run the HTTP server until SIGINT or SIGTERM
pub async fn run(state: SharedState, config: &ServerConfig) -> Result<()> {
    let app = build_router(state, &config.http);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("Listening on http://{}", addr);
    info!("  MCP endpoint:  http://{}/mcp", addr);
    info!("  Dashboard:     http://{}/analytics/dashboard", addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("HTTP server stopped");
    Ok(())
}
