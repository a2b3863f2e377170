//! Client-facing analytics summary.
//!
//! A pure projection of [`AnalyticsState`]: bounded views of the hourly and
//! user-agent maps, the ten most recent tool calls, and the raw breakdown
//! maps. The JSON shape is what the dashboard and the import endpoint expect.

use crate::analytics_state::{AnalyticsState, ToolCallRecord};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::BTreeMap;

/// Server name reported in summaries and health responses
pub const SERVER_NAME: &str = "Reddit MCP Server";

/// Hour buckets included in a summary
pub const SUMMARY_HOURS: usize = 24;

/// User agents included in `topClients`
pub const SUMMARY_TOP_CLIENTS: usize = 10;

/// Recent tool calls included in a summary
pub const SUMMARY_RECENT_CALLS: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub by_method: BTreeMap<String, u64>,
    pub by_endpoint: BTreeMap<String, u64>,
    pub by_tool: BTreeMap<String, u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSummary {
    pub server: String,
    pub version: String,
    pub uptime: String,
    pub server_start_time: String,
    pub total_requests: u64,
    pub total_tool_calls: u64,
    pub breakdown: Breakdown,
    pub recent_tool_calls: Vec<ToolCallRecord>,
    /// Newest hour first
    #[serde(serialize_with = "ordered_map")]
    pub hourly_requests: Vec<(String, u64)>,
    /// Highest count first, ties by ascending user agent
    #[serde(serialize_with = "ordered_map")]
    pub top_clients: Vec<(String, u64)>,
}

/// Project a summary out of `state`. `uptime` is supplied by the caller so
/// the projection stays independent of the clock.
pub fn summarize(state: &AnalyticsState, uptime: String) -> AnalyticsSummary {
    let hourly_requests = state
        .hourly_requests
        .iter()
        .rev()
        .take(SUMMARY_HOURS)
        .map(|(hour, count)| (hour.clone(), *count))
        .collect();

    // BTreeMap iteration is key-ascending and sort_by is stable, so equal
    // counts stay in key order.
    let mut clients: Vec<(String, u64)> = state
        .clients_by_user_agent
        .iter()
        .map(|(agent, count)| (agent.clone(), *count))
        .collect();
    clients.sort_by(|a, b| b.1.cmp(&a.1));
    clients.truncate(SUMMARY_TOP_CLIENTS);

    AnalyticsSummary {
        server: SERVER_NAME.to_string(),
        version: crate::VERSION.to_string(),
        uptime,
        server_start_time: state.server_start_time.clone(),
        total_requests: state.total_requests,
        total_tool_calls: state.total_tool_calls,
        breakdown: Breakdown {
            by_method: state.requests_by_method.clone(),
            by_endpoint: state.requests_by_endpoint.clone(),
            by_tool: state.tool_calls.clone(),
        },
        recent_tool_calls: state
            .recent_tool_calls
            .iter()
            .take(SUMMARY_RECENT_CALLS)
            .cloned()
            .collect(),
        hourly_requests,
        top_clients: clients,
    }
}

/// Serialize pairs as a JSON object, keeping their order.
fn ordered_map<S: Serializer>(entries: &[(String, u64)], serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(entries.len()))?;
    for (key, value) in entries {
        map.serialize_entry(key, value)?;
    }
    map.end()
}
