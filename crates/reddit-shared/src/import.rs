//! Backup import: additive merge of a summary-shaped document.
//!
//! The payload is parsed in full before anything is applied, so a malformed
//! document leaves live counters untouched. Counts must be integers; their
//! sign and the key names are not validated. A negative count lowers the
//! live counter, which stops at zero.
//!
//! The import endpoint is unauthenticated and trusts whatever counts it is
//! given. Put it behind auth or rate limiting before exposing it publicly.

use crate::analytics_state::AnalyticsState;
use crate::error::{RedditError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportBreakdown {
    pub by_method: Option<BTreeMap<String, i64>>,
    pub by_endpoint: Option<BTreeMap<String, i64>>,
    pub by_tool: Option<BTreeMap<String, i64>>,
}

/// Parsed import payload. Fields the summary carries but the importer does
/// not merge (uptime, recent calls, hourly data) are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupImport {
    pub total_requests: Option<i64>,
    pub total_tool_calls: Option<i64>,
    pub breakdown: Option<ImportBreakdown>,
}

/// Totals after an import, echoed back to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportTotals {
    pub total_requests: u64,
    pub total_tool_calls: u64,
}

impl BackupImport {
    pub fn from_json(raw: &str) -> Result<Self> {
        Self::from_slice(raw.as_bytes())
    }

    /// Parse a raw request body. Invalid UTF-8 is rejected like any other
    /// malformed JSON.
    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_slice(raw)
            .map_err(|e| RedditError::InvalidImport(format!("body is not valid JSON: {}", e)))?;
        Self::from_value(value)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        if !value.is_object() {
            return Err(RedditError::InvalidImport(
                "expected a JSON object".to_string(),
            ));
        }
        serde_json::from_value(value).map_err(|e| RedditError::InvalidImport(e.to_string()))
    }

    /// Add every present counter into `state`, saturating at both ends.
    pub fn apply_to(&self, state: &mut AnalyticsState) -> ImportTotals {
        if let Some(n) = self.total_requests {
            state.total_requests = state.total_requests.saturating_add_signed(n);
        }
        if let Some(n) = self.total_tool_calls {
            state.total_tool_calls = state.total_tool_calls.saturating_add_signed(n);
        }

        if let Some(breakdown) = &self.breakdown {
            merge_counts(&mut state.requests_by_method, breakdown.by_method.as_ref());
            merge_counts(&mut state.requests_by_endpoint, breakdown.by_endpoint.as_ref());
            merge_counts(&mut state.tool_calls, breakdown.by_tool.as_ref());
        }

        ImportTotals {
            total_requests: state.total_requests,
            total_tool_calls: state.total_tool_calls,
        }
    }
}

fn merge_counts(live: &mut BTreeMap<String, u64>, incoming: Option<&BTreeMap<String, i64>>) {
    for (key, delta) in incoming.into_iter().flatten() {
        let count = live.entry(key.clone()).or_insert(0);
        *count = count.saturating_add_signed(*delta);
    }
}
