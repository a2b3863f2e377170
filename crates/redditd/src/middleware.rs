//! Request tracking middleware and caller identification helpers.

use crate::reddit_client::Credentials;
use crate::server::SharedState;
use axum::{
    extract::{ConnectInfo, Query, Request, State},
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use std::collections::HashMap;
use std::net::SocketAddr;

pub const CLIENT_ID_HEADER: &str = "x-reddit-client-id";
pub const CLIENT_SECRET_HEADER: &str = "x-reddit-client-secret";

/// Record every inbound request exactly once, before dispatch.
pub async fn track_requests(State(state): State<SharedState>, request: Request, next: Next) -> Response {
    let client_ip = client_ip(request.headers(), connect_addr(&request));
    let user_agent = user_agent(request.headers());
    let endpoint = request
        .uri()
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());

    state.analytics.track_request(
        request.method().as_str(),
        &endpoint,
        &client_ip,
        user_agent.as_deref(),
    );

    next.run(request).await
}

fn connect_addr(request: &Request) -> Option<SocketAddr> {
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Caller IP: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// socket peer, else `"unknown"`.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(forwarded) = header_str(headers, "x-forwarded-for") {
        if let Some(first) = forwarded.split(',').next().map(str::trim) {
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }

    if let Some(real_ip) = header_str(headers, "x-real-ip").map(str::trim) {
        if !real_ip.is_empty() {
            return real_ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

pub fn user_agent(headers: &HeaderMap) -> Option<String> {
    header_str(headers, header::USER_AGENT.as_str()).map(str::to_string)
}

/// Reddit credentials for this request: `defaults`, overridden by the
/// `client_id`/`client_secret` query parameters, overridden by the
/// `X-Reddit-Client-*` headers.
pub fn request_credentials(defaults: &Credentials, uri: &Uri, headers: &HeaderMap) -> Credentials {
    let query = Query::<HashMap<String, String>>::try_from_uri(uri)
        .map(|Query(params)| params)
        .unwrap_or_default();

    defaults
        .clone()
        .overridden_by(
            query.get("client_id").map(String::as_str),
            query.get("client_secret").map(String::as_str),
        )
        .overridden_by(
            header_str(headers, CLIENT_ID_HEADER),
            header_str(headers, CLIENT_SECRET_HEADER),
        )
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}
