//! API routes for redditd

use crate::server::SharedState;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use reddit_shared::analytics_state::iso_timestamp;
use reddit_shared::{AnalyticsSummary, BackupImport, RedditError, SERVER_NAME, VERSION};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

pub const TRANSPORT: &str = "streamable-http";

const DASHBOARD_HTML: &str = include_str!("../assets/dashboard.html");

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub server: String,
    pub version: String,
    pub transport: String,
    pub timestamp: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            server: SERVER_NAME.to_string(),
            version: VERSION.to_string(),
            transport: TRANSPORT.to_string(),
            timestamp: iso_timestamp(chrono::Utc::now()),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    pub total_requests: u64,
    pub total_tool_calls: u64,
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<SharedState> {
    Router::new().route("/health", get(health))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

// ============================================================================
// Analytics Routes
// ============================================================================

pub fn analytics_routes() -> Router<SharedState> {
    Router::new()
        .route("/analytics", get(analytics_summary))
        .route("/analytics/dashboard", get(dashboard))
        .route("/analytics/import", post(import_backup))
}

async fn analytics_summary(State(state): State<SharedState>) -> Json<AnalyticsSummary> {
    Json(state.analytics.summary())
}

async fn dashboard() -> Html<&'static str> {
    Html(DASHBOARD_HTML)
}

async fn import_backup(State(state): State<SharedState>, body: Bytes) -> Response {
    let payload = match BackupImport::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!("Rejected analytics import: {}", e);
            return error_response(&e);
        }
    };

    // Import flushes to disk before returning
    let analytics = state.analytics.clone();
    match tokio::task::spawn_blocking(move || analytics.import_backup(&payload)).await {
        Ok(totals) => {
            info!("Analytics backup imported");
            Json(ImportResponse {
                success: true,
                message: "Analytics imported successfully".to_string(),
                total_requests: totals.total_requests,
                total_tool_calls: totals.total_tool_calls,
            })
            .into_response()
        }
        Err(e) => {
            error!("Analytics import task failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "import failed"})),
            )
                .into_response()
        }
    }
}

fn error_response(e: &RedditError) -> Response {
    let status = StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({"error": e.to_string()}))).into_response()
}
