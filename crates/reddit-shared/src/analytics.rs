//! Thread-safe analytics aggregator.
//!
//! One [`Analytics`] is constructed at startup and shared by handle with
//! every request handler. Tracking, snapshot and summary each take the state
//! mutex for exactly one in-memory operation, so every field touched by a
//! tracked event changes as one unit. Flushing copies the state under the
//! mutex and writes the file after releasing it; a separate save lock keeps
//! concurrent flushes ordered without ever blocking trackers on disk I/O.

use crate::analytics_state::{
    bump, hour_key, iso_timestamp, normalize_endpoint, short_user_agent, uptime_since,
    AnalyticsState, ToolCallRecord, MAX_RECENT_CALLS,
};
use crate::analytics_store::AnalyticsStore;
use crate::error::Result;
use crate::import::{BackupImport, ImportTotals};
use crate::summary::{summarize, AnalyticsSummary};
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

pub struct Analytics {
    state: Mutex<AnalyticsState>,
    save_lock: Mutex<()>,
    store: AnalyticsStore,
    max_recent_calls: usize,
    shut_down: AtomicBool,
}

impl Analytics {
    /// Hydrate from `store` (creating the file if missing) and wrap the result.
    pub fn open(store: AnalyticsStore) -> Self {
        let state = store.load();
        Self::with_state(store, state)
    }

    /// Wrap an already loaded state. Nothing is read from disk.
    pub fn with_state(store: AnalyticsStore, state: AnalyticsState) -> Self {
        Self {
            state: Mutex::new(state),
            save_lock: Mutex::new(()),
            store,
            max_recent_calls: MAX_RECENT_CALLS,
            shut_down: AtomicBool::new(false),
        }
    }

    /// Override how many recent tool calls are retained.
    pub fn with_max_recent_calls(mut self, max: usize) -> Self {
        self.max_recent_calls = max;
        self
    }

    // A panic elsewhere while holding the lock cannot leave a half-applied
    // event (each event is applied in full before the guard drops), so a
    // poisoned lock is safe to keep using.
    fn lock_state(&self) -> MutexGuard<'_, AnalyticsState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Record one inbound HTTP request.
    pub fn track_request(&self, method: &str, endpoint: &str, client_ip: &str, user_agent: Option<&str>) {
        self.track_request_at(method, endpoint, client_ip, user_agent, Utc::now());
    }

    /// [`Analytics::track_request`] with an explicit clock reading.
    pub fn track_request_at(
        &self,
        method: &str,
        endpoint: &str,
        client_ip: &str,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let agent = short_user_agent(user_agent);
        let hour = hour_key(now);
        let endpoint = normalize_endpoint(endpoint);

        let mut state = self.lock_state();
        state.total_requests = state.total_requests.saturating_add(1);
        bump(&mut state.requests_by_method, method, 1);
        bump(&mut state.requests_by_endpoint, endpoint, 1);
        bump(&mut state.clients_by_ip, client_ip, 1);
        bump(&mut state.clients_by_user_agent, &agent, 1);
        bump(&mut state.hourly_requests, &hour, 1);
    }

    /// Record one tool invocation.
    pub fn track_tool_call(&self, tool_name: &str, client_ip: &str, user_agent: Option<&str>) {
        self.track_tool_call_at(tool_name, client_ip, user_agent, Utc::now());
    }

    pub fn track_tool_call_at(
        &self,
        tool_name: &str,
        client_ip: &str,
        user_agent: Option<&str>,
        now: DateTime<Utc>,
    ) {
        let record = ToolCallRecord {
            tool: tool_name.to_string(),
            timestamp: iso_timestamp(now),
            client_ip: client_ip.to_string(),
            user_agent: short_user_agent(user_agent),
        };

        let mut state = self.lock_state();
        state.total_tool_calls = state.total_tool_calls.saturating_add(1);
        bump(&mut state.tool_calls, tool_name, 1);
        state.recent_tool_calls.push_front(record);
        state.recent_tool_calls.truncate(self.max_recent_calls);
    }

    /// Independent copy of the full state
    pub fn snapshot(&self) -> AnalyticsState {
        self.lock_state().clone()
    }

    /// Human-readable time since the recorded server start
    pub fn uptime(&self) -> String {
        let start = self.lock_state().server_start_time.clone();
        uptime_since(&start, Utc::now())
    }

    /// Bounded summary for the dashboard. Computed under the lock without
    /// copying the full state.
    pub fn summary(&self) -> AnalyticsSummary {
        let now = Utc::now();
        let state = self.lock_state();
        summarize(&state, state.uptime_at(now))
    }

    /// Merge a backup into live counters, then flush.
    pub fn import_backup(&self, incoming: &BackupImport) -> ImportTotals {
        let totals = {
            let mut state = self.lock_state();
            incoming.apply_to(&mut state)
        };
        info!(
            "Imported analytics backup: totals now {} requests, {} tool calls",
            totals.total_requests, totals.total_tool_calls
        );
        self.flush();
        totals
    }

    /// Persist the current state, returning any I/O or encode failure.
    pub fn save(&self) -> Result<()> {
        let _ordered = self.save_lock.lock().unwrap_or_else(|p| p.into_inner());
        let snapshot = self.snapshot();
        self.store.save(&snapshot)
    }

    /// Persist the current state. Failures are logged, never returned; the
    /// in-memory state stays authoritative until the next successful save.
    pub fn flush(&self) -> bool {
        match self.save() {
            Ok(()) => {
                debug!("Saved analytics to {}", self.store.path().display());
                true
            }
            Err(e) => {
                warn!("Failed to save analytics to {}: {}", self.store.path().display(), e);
                false
            }
        }
    }

    /// Final flush before exit. Safe to call from every shutdown path; only
    /// the first call writes.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.flush() {
            info!("Analytics flushed to {} on shutdown", self.store.path().display());
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }
}
