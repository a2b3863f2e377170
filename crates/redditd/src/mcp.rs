//! MCP endpoint: JSON-RPC 2.0 over HTTP POST.
//!
//! Stateless. `initialize` hands out a session id but no per-session state
//! is kept; batches are answered as an array.

use crate::middleware::{client_ip, request_credentials, user_agent};
use crate::reddit_client::Credentials;
use crate::routes::HealthResponse;
use crate::server::SharedState;
use crate::tools::{tool_definitions, ToolCall};
use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use reddit_shared::rpc::{
    RpcRequest, RpcResponse, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR,
};
use reddit_shared::{SERVER_NAME, VERSION};
use serde_json::{json, Value};
use std::net::SocketAddr;
use tracing::{debug, info};

pub const PROTOCOL_VERSION: &str = "2025-03-26";
pub const SESSION_HEADER: &str = "mcp-session-id";
pub const HEALTH_RESOURCE_URI: &str = "health://status";

/// Caller details carried into tool execution
pub struct CallContext {
    pub client_ip: String,
    pub user_agent: Option<String>,
    pub credentials: Credentials,
}

/// What one JSON-RPC message produced
struct Outcome {
    response: Option<RpcResponse>,
    new_session: bool,
}

pub async fn handle(
    State(state): State<SharedState>,
    connect: Option<ConnectInfo<SocketAddr>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let message: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            let resp = RpcResponse::error(Value::Null, PARSE_ERROR, format!("Parse error: {}", e));
            return (StatusCode::BAD_REQUEST, Json(resp)).into_response();
        }
    };

    let ctx = CallContext {
        client_ip: client_ip(&headers, connect.map(|ConnectInfo(addr)| addr)),
        user_agent: user_agent(&headers),
        credentials: request_credentials(&state.default_credentials, &uri, &headers),
    };

    let mut new_session = false;
    let body = match message {
        Value::Array(batch) => {
            if batch.is_empty() {
                let resp = RpcResponse::error(Value::Null, INVALID_REQUEST, "Empty batch".to_string());
                return (StatusCode::BAD_REQUEST, Json(resp)).into_response();
            }
            let mut responses = Vec::with_capacity(batch.len());
            for item in batch {
                let outcome = handle_message(&state, &ctx, item).await;
                new_session |= outcome.new_session;
                responses.extend(outcome.response);
            }
            if responses.is_empty() {
                None
            } else {
                Some(json!(responses))
            }
        }
        single => {
            let outcome = handle_message(&state, &ctx, single).await;
            new_session = outcome.new_session;
            outcome.response.map(|r| json!(r))
        }
    };

    let session = if new_session {
        HeaderValue::from_str(&uuid::Uuid::new_v4().to_string()).ok()
    } else {
        headers.get(SESSION_HEADER).cloned()
    };

    let mut response = match body {
        Some(body) => Json(body).into_response(),
        None => StatusCode::ACCEPTED.into_response(),
    };
    if let Some(session) = session {
        response.headers_mut().insert(SESSION_HEADER, session);
    }
    response
}

async fn handle_message(state: &SharedState, ctx: &CallContext, message: Value) -> Outcome {
    let request: RpcRequest = match serde_json::from_value(message.clone()) {
        Ok(req) => req,
        Err(e) => {
            let id = message.get("id").cloned().unwrap_or(Value::Null);
            return Outcome {
                response: Some(RpcResponse::error(id, INVALID_REQUEST, format!("Invalid request: {}", e))),
                new_session: false,
            };
        }
    };

    if request.is_notification() {
        debug!("MCP notification {}", request.method);
        return Outcome { response: None, new_session: false };
    }

    let new_session = request.method == "initialize";
    let response = dispatch(state, ctx, request).await;
    Outcome { response: Some(response), new_session }
}

/// Route one JSON-RPC request to its method.
pub async fn dispatch(state: &SharedState, ctx: &CallContext, request: RpcRequest) -> RpcResponse {
    let id = request.id.clone().unwrap_or(Value::Null);

    match request.method.as_str() {
        "initialize" => {
            let requested = request
                .params
                .as_ref()
                .and_then(|p| p.get("protocolVersion"))
                .and_then(Value::as_str)
                .unwrap_or(PROTOCOL_VERSION);
            info!("MCP client initializing (protocol {})", requested);
            RpcResponse::success(
                id,
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {
                        "tools": {"listChanged": false},
                        "resources": {"subscribe": false, "listChanged": false}
                    },
                    "serverInfo": {"name": SERVER_NAME, "version": VERSION}
                }),
            )
        }
        "ping" => RpcResponse::success(id, json!({})),
        "tools/list" => RpcResponse::success(id, json!({"tools": tool_definitions()})),
        "tools/call" => call_tool(state, ctx, id, request.params).await,
        "resources/list" => RpcResponse::success(
            id,
            json!({
                "resources": [{
                    "uri": HEALTH_RESOURCE_URI,
                    "name": "Server health",
                    "description": "Health status of the server",
                    "mimeType": "application/json"
                }]
            }),
        ),
        "resources/read" => read_resource(id, request.params),
        other => RpcResponse::error(id, METHOD_NOT_FOUND, format!("Method not found: {}", other)),
    }
}

async fn call_tool(state: &SharedState, ctx: &CallContext, id: Value, params: Option<Value>) -> RpcResponse {
    let params = params.unwrap_or(Value::Null);
    let Some(name) = params.get("name").and_then(Value::as_str) else {
        return RpcResponse::error(id, INVALID_PARAMS, "Missing tool name".to_string());
    };

    let call = match ToolCall::parse(name, params.get("arguments").cloned()) {
        Ok(call) => call,
        Err(e) => return RpcResponse::error(id, INVALID_PARAMS, e.to_string()),
    };

    state
        .analytics
        .track_tool_call(call.name(), &ctx.client_ip, ctx.user_agent.as_deref());
    info!("Tool call {} from {}", call.name(), ctx.client_ip);

    let output = call.execute(&state.reddit, &ctx.credentials).await;
    RpcResponse::success(id, output.to_result())
}

fn read_resource(id: Value, params: Option<Value>) -> RpcResponse {
    let uri = params
        .as_ref()
        .and_then(|p| p.get("uri"))
        .and_then(Value::as_str)
        .unwrap_or_default();
    if uri != HEALTH_RESOURCE_URI {
        return RpcResponse::error(id, INVALID_PARAMS, format!("Unknown resource: {}", uri));
    }

    let text = serde_json::to_string(&HealthResponse::healthy()).unwrap_or_default();
    RpcResponse::success(
        id,
        json!({
            "contents": [{
                "uri": HEALTH_RESOURCE_URI,
                "mimeType": "application/json",
                "text": text
            }]
        }),
    )
}
