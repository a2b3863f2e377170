//! Router-level tests: routes, request tracking, import and the MCP
//! endpoint against a local stand-in for Reddit.

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::get;
use axum::{Json, Router};
use http_body_util::BodyExt;
use reddit_shared::{Analytics, AnalyticsStore, ServerConfig};
use redditd::{build_router, AppState, RedditClient};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use tempfile::tempdir;
use tower::ServiceExt;

fn test_app(dir: &Path, reddit: Option<RedditClient>) -> (Router, Arc<Analytics>) {
    let config = ServerConfig::default();
    let analytics = Arc::new(Analytics::open(AnalyticsStore::new(dir)));
    let mut state = AppState::new(Arc::clone(&analytics), &config);
    if let Some(client) = reddit {
        state = state.with_reddit_client(client);
    }
    (build_router(Arc::new(state), &config.http), analytics)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
    (status, headers, body)
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let (status, headers, body) = send(app, request).await;
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, headers, value)
}

fn get_req(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_req(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-forwarded-for", "203.0.113.9, 10.0.0.1")
        .header("user-agent", "test-client/1.0")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn rpc(method: &str, params: Value) -> String {
    json!({"jsonrpc": "2.0", "id": 1, "method": method, "params": params}).to_string()
}

fn listing(children: Vec<Value>) -> Value {
    json!({"kind": "Listing", "data": {"children": children}})
}

/// Serve canned Reddit responses on a local port.
async fn mock_reddit() -> RedditClient {
    let hot = listing(vec![
        json!({"kind": "t3", "data": {
            "id": "abc123", "title": "Rust 2024 is out", "score": 420, "num_comments": 69,
            "author": "ferris", "is_self": false, "url": "https://blog.rust-lang.org",
            "permalink": "/r/rust/comments/abc123/rust_2024/"
        }}),
        json!({"kind": "t3", "data": {
            "id": "def456", "title": "Ask anything", "score": 3, "num_comments": 0,
            "author": null, "is_self": true, "selftext": "Weekly thread",
            "permalink": "/r/rust/comments/def456/ask/"
        }}),
    ]);
    let post = json!([
        listing(vec![json!({"kind": "t3", "data": {
            "id": "abc123", "title": "Rust 2024 is out", "score": 420, "author": "ferris",
            "is_self": true, "selftext": "Release notes inside"
        }})]),
        listing(vec![json!({"kind": "t1", "data": {
            "id": "c1", "author": "alice", "score": 12, "body": "Great release",
            "replies": listing(vec![json!({"kind": "t1", "data": {
                "id": "c2", "author": "bob", "score": 4, "body": "Agreed", "replies": ""
            }})])
        }})]),
    ]);

    let app = Router::new()
        .route("/r/rust/hot.json", get(move || async move { Json(hot) }))
        .route("/comments/abc123.json", get(move || async move { Json(post) }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let base = format!("http://{}", addr);
    RedditClient::new(&ServerConfig::default().reddit).with_base_urls(&base, &base)
}

#[tokio::test]
async fn test_health_reports_status_and_is_tracked() {
    let dir = tempdir().unwrap();
    let (app, analytics) = test_app(dir.path(), None);

    let (status, _, body) = send_json(&app, get_req("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["server"], "Reddit MCP Server");
    assert_eq!(body["transport"], "streamable-http");
    assert!(body["timestamp"].as_str().unwrap().ends_with('Z'));

    let state = analytics.snapshot();
    assert_eq!(state.total_requests, 1);
    assert_eq!(state.requests_by_endpoint.get("/health"), Some(&1));
    assert_eq!(state.requests_by_method.get("GET"), Some(&1));
    assert_eq!(state.clients_by_ip.get("unknown"), Some(&1));
}

#[tokio::test]
async fn test_query_string_is_not_part_of_endpoint() {
    let dir = tempdir().unwrap();
    let (app, analytics) = test_app(dir.path(), None);

    let (status, _, body) = send_json(&app, get_req("/analytics?foo=bar")).await;
    assert_eq!(status, StatusCode::OK);
    // The summary is computed after this request was tracked
    assert_eq!(body["totalRequests"], 1);
    assert_eq!(body["breakdown"]["byEndpoint"]["/analytics"], 1);

    let state = analytics.snapshot();
    assert_eq!(state.requests_by_endpoint.get("/analytics"), Some(&1));
    assert!(state.requests_by_endpoint.keys().all(|k| !k.contains('?')));
}

#[tokio::test]
async fn test_unknown_route_is_still_tracked() {
    let dir = tempdir().unwrap();
    let (app, analytics) = test_app(dir.path(), None);

    let (status, _, _) = send(&app, get_req("/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(analytics.snapshot().requests_by_endpoint.get("/nope"), Some(&1));
}

#[tokio::test]
async fn test_dashboard_serves_html() {
    let dir = tempdir().unwrap();
    let (app, _) = test_app(dir.path(), None);

    let (status, headers, body) = send(&app, get_req("/analytics/dashboard")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers["content-type"].to_str().unwrap().starts_with("text/html"));
    let html = String::from_utf8(body).unwrap();
    assert!(html.contains("basePath + '/analytics'"));
}

#[tokio::test]
async fn test_import_twice_is_additive() {
    let dir = tempdir().unwrap();
    let (app, analytics) = test_app(dir.path(), None);
    let payload = r#"{"totalRequests": 5, "totalToolCalls": 2, "breakdown": {"byTool": {"fetch_reddit_hot_threads": 3}}}"#;

    let (status, _, first) = send_json(&app, post_req("/analytics/import", payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["success"], true);
    // 1 tracked import request + 5 imported
    assert_eq!(first["totalRequests"], 6);
    assert_eq!(first["totalToolCalls"], 2);

    let (_, _, second) = send_json(&app, post_req("/analytics/import", payload)).await;
    assert_eq!(second["totalRequests"], 12);
    assert_eq!(second["totalToolCalls"], 4);

    let state = analytics.snapshot();
    assert_eq!(state.tool_calls.get("fetch_reddit_hot_threads"), Some(&6));

    let saved = AnalyticsStore::new(dir.path()).read().unwrap().unwrap();
    assert_eq!(saved.total_requests, 12);
}

#[tokio::test]
async fn test_malformed_import_is_rejected_without_changes() {
    let dir = tempdir().unwrap();
    let (app, analytics) = test_app(dir.path(), None);

    for body in ["not json", "[1, 2]", r#"{"totalRequests": 2.5}"#, r#"{"breakdown": {"byTool": {"x": "many"}}}"#] {
        let (status, _, value) = send_json(&app, post_req("/analytics/import", body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?}", body);
        assert!(value["error"].as_str().unwrap().contains("Invalid import"));
    }

    let invalid_utf8 = Request::builder()
        .method("POST")
        .uri("/analytics/import")
        .header("content-type", "application/json")
        .body(Body::from(b"{\"breakdown\": {\"byTool\": {\"\xff\": 1}}}".to_vec()))
        .unwrap();
    let (status, _, _) = send_json(&app, invalid_utf8).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let state = analytics.snapshot();
    assert_eq!(state.total_requests, 5);
    assert_eq!(state.total_tool_calls, 0);
    assert!(state.tool_calls.is_empty());
}

#[tokio::test]
async fn test_negative_import_decrements_and_stops_at_zero() {
    let dir = tempdir().unwrap();
    let (app, analytics) = test_app(dir.path(), None);
    analytics.track_tool_call("fetch_reddit_hot_threads", "ip", None);
    analytics.track_tool_call("fetch_reddit_hot_threads", "ip", None);

    let payload = r#"{"totalRequests": -100, "totalToolCalls": -1, "breakdown": {"byTool": {"fetch_reddit_hot_threads": -5}}}"#;
    let (status, _, body) = send_json(&app, post_req("/analytics/import", payload)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["totalRequests"], 0);
    assert_eq!(body["totalToolCalls"], 1);

    let state = analytics.snapshot();
    assert_eq!(state.tool_calls.get("fetch_reddit_hot_threads"), Some(&0));
}

#[tokio::test]
async fn test_mcp_initialize_returns_session() {
    let dir = tempdir().unwrap();
    let (app, _) = test_app(dir.path(), None);

    let (status, headers, body) = send_json(
        &app,
        post_req("/mcp", &rpc("initialize", json!({"protocolVersion": "2025-03-26"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["serverInfo"]["name"], "Reddit MCP Server");
    assert!(body["result"]["capabilities"]["tools"].is_object());

    let session = headers["mcp-session-id"].to_str().unwrap();
    assert_eq!(session.len(), 36);
}

#[tokio::test]
async fn test_mcp_notification_is_accepted_without_body() {
    let dir = tempdir().unwrap();
    let (app, _) = test_app(dir.path(), None);

    let body = json!({"jsonrpc": "2.0", "method": "notifications/initialized"}).to_string();
    let (status, _, bytes) = send(&app, post_req("/mcp", &body)).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn test_mcp_tools_list_and_unknown_method() {
    let dir = tempdir().unwrap();
    let (app, _) = test_app(dir.path(), None);

    let (_, _, body) = send_json(&app, post_req("/mcp", &rpc("tools/list", json!({})))).await;
    let names: Vec<&str> = body["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["fetch_reddit_hot_threads", "fetch_reddit_post_content"]);

    let (status, _, body) = send_json(&app, post_req("/mcp", &rpc("sampling/create", json!({})))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["error"]["code"], -32601);
}

#[tokio::test]
async fn test_mcp_parse_error_and_bad_params() {
    let dir = tempdir().unwrap();
    let (app, analytics) = test_app(dir.path(), None);

    let (status, _, body) = send_json(&app, post_req("/mcp", "{not json")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], -32700);

    let (_, _, body) = send_json(
        &app,
        post_req("/mcp", &rpc("tools/call", json!({"name": "fetch_reddit_hot_threads", "arguments": {}}))),
    )
    .await;
    assert_eq!(body["error"]["code"], -32602);

    let (_, _, body) = send_json(&app, post_req("/mcp", &rpc("tools/call", json!({"name": "rm_rf"})))).await;
    assert_eq!(body["error"]["code"], -32602);

    // Rejected calls do not count as tool calls
    assert_eq!(analytics.snapshot().total_tool_calls, 0);
}

#[tokio::test]
async fn test_mcp_null_id_gets_a_response() {
    let dir = tempdir().unwrap();
    let (app, _) = test_app(dir.path(), None);

    let body = json!({"jsonrpc": "2.0", "id": null, "method": "ping"}).to_string();
    let (status, _, value) = send_json(&app, post_req("/mcp", &body)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(value["id"], Value::Null);
    assert_eq!(value["result"], json!({}));
}

#[tokio::test]
async fn test_mcp_batch_skips_notifications() {
    let dir = tempdir().unwrap();
    let (app, _) = test_app(dir.path(), None);

    let batch = json!([
        {"jsonrpc": "2.0", "id": 1, "method": "ping"},
        {"jsonrpc": "2.0", "method": "notifications/initialized"},
        {"jsonrpc": "2.0", "id": 2, "method": "resources/list"}
    ])
    .to_string();
    let (status, _, body) = send_json(&app, post_req("/mcp", &batch)).await;
    assert_eq!(status, StatusCode::OK);
    let responses = body.as_array().unwrap();
    assert_eq!(responses.len(), 2);
    assert_eq!(responses[0]["result"], json!({}));
    assert_eq!(responses[1]["result"]["resources"][0]["uri"], "health://status");
}

#[tokio::test]
async fn test_mcp_health_resource() {
    let dir = tempdir().unwrap();
    let (app, _) = test_app(dir.path(), None);

    let (_, _, body) = send_json(
        &app,
        post_req("/mcp", &rpc("resources/read", json!({"uri": "health://status"}))),
    )
    .await;
    let text = body["result"]["contents"][0]["text"].as_str().unwrap();
    let health: Value = serde_json::from_str(text).unwrap();
    assert_eq!(health["status"], "healthy");

    let (_, _, body) = send_json(
        &app,
        post_req("/mcp", &rpc("resources/read", json!({"uri": "file:///etc/passwd"}))),
    )
    .await;
    assert_eq!(body["error"]["code"], -32602);
}

#[tokio::test]
async fn test_hot_threads_tool_call_is_tracked() {
    let dir = tempdir().unwrap();
    let (app, analytics) = test_app(dir.path(), Some(mock_reddit().await));

    let (status, _, body) = send_json(
        &app,
        post_req(
            "/mcp",
            &rpc("tools/call", json!({"name": "fetch_reddit_hot_threads", "arguments": {"subreddit": "rust", "limit": 2}})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["isError"], false);

    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Title: Rust 2024 is out\nScore: 420\nComments: 69\nAuthor: ferris\nType: link\n"));
    assert!(text.contains("Content: /r/rust/comments/abc123/rust_2024/"));
    assert!(text.contains("---\n\nTitle: Ask anything"));
    assert!(text.contains("Author: [deleted]\nType: text\nContent: Weekly thread"));

    let state = analytics.snapshot();
    assert_eq!(state.total_tool_calls, 1);
    assert_eq!(state.tool_calls.get("fetch_reddit_hot_threads"), Some(&1));
    let call = &state.recent_tool_calls[0];
    assert_eq!(call.tool, "fetch_reddit_hot_threads");
    assert_eq!(call.client_ip, "203.0.113.9");
    assert_eq!(call.user_agent, "test-client/1.0");
    assert_eq!(state.clients_by_ip.get("203.0.113.9"), Some(&1));
}

#[tokio::test]
async fn test_post_content_tool_renders_comment_tree() {
    let dir = tempdir().unwrap();
    let (app, _) = test_app(dir.path(), Some(mock_reddit().await));

    let (_, _, body) = send_json(
        &app,
        post_req(
            "/mcp",
            &rpc("tools/call", json!({"name": "fetch_reddit_post_content", "arguments": {"post_id": "abc123"}})),
        ),
    )
    .await;
    assert_eq!(body["result"]["isError"], false);

    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Title: Rust 2024 is out\nScore: 420\nAuthor: ferris\nType: text\nContent: Release notes inside\n"));
    assert!(text.contains("\nComments:\n"));
    assert!(text.contains("* Author: alice\n  Score: 12\n  Great release\n"));
    assert!(text.contains("-- * Author: bob\n--   Score: 4\n--   Agreed\n"));
}

#[tokio::test]
async fn test_reddit_failure_is_reported_in_tool_text() {
    let dir = tempdir().unwrap();
    let (app, analytics) = test_app(dir.path(), Some(mock_reddit().await));

    let (status, _, body) = send_json(
        &app,
        post_req(
            "/mcp",
            &rpc("tools/call", json!({"name": "fetch_reddit_hot_threads", "arguments": {"subreddit": "missing"}})),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["isError"], true);
    let text = body["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("An error occurred: "));

    // The attempt still counts
    assert_eq!(analytics.snapshot().total_tool_calls, 1);
}
