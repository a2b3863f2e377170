//! Persisted analytics document and the key normalization rules shared by
//! the aggregator, the summary projector and the importer.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};

/// Maximum recent tool calls retained in memory and on disk.
pub const MAX_RECENT_CALLS: usize = 100;

/// User agents are keyed by their first 50 characters.
pub const USER_AGENT_MAX_CHARS: usize = 50;

/// Substituted when a request carries no user agent.
pub const UNKNOWN_USER_AGENT: &str = "unknown";

/// One entry of the recent tool call log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    pub tool: String,
    pub timestamp: String,
    pub client_ip: String,
    pub user_agent: String,
}

/// Full analytics state, one per process.
///
/// Field names match the on-disk JSON document. Missing fields in a loaded
/// document fall back to the values of a fresh state, which is what lets
/// older files gain newly added counters on upgrade.
///
/// Every keyed map only ever grows. Long running deployments should rotate
/// the persisted file externally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsState {
    pub server_start_time: String,
    pub total_requests: u64,
    pub total_tool_calls: u64,
    pub requests_by_method: BTreeMap<String, u64>,
    pub requests_by_endpoint: BTreeMap<String, u64>,
    pub tool_calls: BTreeMap<String, u64>,
    pub recent_tool_calls: VecDeque<ToolCallRecord>,
    pub clients_by_ip: BTreeMap<String, u64>,
    pub clients_by_user_agent: BTreeMap<String, u64>,
    pub hourly_requests: BTreeMap<String, u64>,
}

impl Default for AnalyticsState {
    fn default() -> Self {
        Self::started_at(Utc::now())
    }
}

impl AnalyticsState {
    /// Fresh state whose start time is `start`
    pub fn started_at(start: DateTime<Utc>) -> Self {
        Self {
            server_start_time: iso_timestamp(start),
            total_requests: 0,
            total_tool_calls: 0,
            requests_by_method: BTreeMap::new(),
            requests_by_endpoint: BTreeMap::new(),
            tool_calls: BTreeMap::new(),
            recent_tool_calls: VecDeque::new(),
            clients_by_ip: BTreeMap::new(),
            clients_by_user_agent: BTreeMap::new(),
            hourly_requests: BTreeMap::new(),
        }
    }

    /// Parse the stored start time. Accepts RFC 3339 and zone-less ISO-8601
    /// (read as UTC).
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.server_start_time)
    }

    /// Uptime at `now`, see [`uptime_since`]
    pub fn uptime_at(&self, now: DateTime<Utc>) -> String {
        uptime_since(&self.server_start_time, now)
    }
}

/// Uptime from a stored start timestamp, or `"unknown"` if it won't parse.
pub fn uptime_since(start_time: &str, now: DateTime<Utc>) -> String {
    match parse_timestamp(start_time) {
        Some(start) => format_uptime((now - start).num_seconds()),
        None => "unknown".to_string(),
    }
}

/// Increment a keyed counter, creating the key on first observation.
pub fn bump(map: &mut BTreeMap<String, u64>, key: &str, by: u64) {
    match map.get_mut(key) {
        Some(count) => *count = count.saturating_add(by),
        None => {
            map.insert(key.to_string(), by);
        }
    }
}

/// Endpoint path with everything from the first `?` removed.
pub fn normalize_endpoint(endpoint: &str) -> &str {
    match endpoint.find('?') {
        Some(idx) => &endpoint[..idx],
        None => endpoint,
    }
}

/// User agent truncated to [`USER_AGENT_MAX_CHARS`] characters, or
/// `"unknown"` when absent.
pub fn short_user_agent(user_agent: Option<&str>) -> String {
    match user_agent {
        Some(ua) if !ua.is_empty() => ua.chars().take(USER_AGENT_MAX_CHARS).collect(),
        _ => UNKNOWN_USER_AGENT.to_string(),
    }
}

/// Hour bucket key, `YYYY-MM-DDTHH`
pub fn hour_key(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H").to_string()
}

/// ISO-8601 UTC timestamp with microseconds and a trailing `Z`
pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Render elapsed seconds using the two coarsest units that apply.
///
/// `"{d}d {h}h {m}m"` once a day has passed, `"{h}h {m}m"` once an hour has
/// passed, `"{m}m"` otherwise. Negative spans (clock skew) render as `"0m"`.
pub fn format_uptime(total_seconds: i64) -> String {
    let total = total_seconds.max(0);
    let days = total / 86_400;
    let hours = (total % 86_400) / 3_600;
    let minutes = (total % 3_600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}
