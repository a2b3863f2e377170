//! Analytics store backed by a single pretty-printed JSON file.
//!
//! Loading never fails: a missing file is created from defaults, and an
//! unreadable or unparseable file is logged and replaced in memory by a
//! fresh state. Saving writes a temp file and renames it into place, so a
//! reader sees either the previous document or the new one.

use crate::analytics_state::AnalyticsState;
use crate::error::Result;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name inside the analytics directory
pub const ANALYTICS_FILE_NAME: &str = "analytics.json";

/// Default analytics directory when none is configured
pub const DEFAULT_ANALYTICS_DIR: &str = "/app/data";

#[derive(Debug, Clone)]
pub struct AnalyticsStore {
    path: PathBuf,
}

impl AnalyticsStore {
    /// Store at `{data_dir}/analytics.json`
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            path: data_dir.as_ref().join(ANALYTICS_FILE_NAME),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load persisted state, falling back to defaults on any failure.
    ///
    /// When no file exists yet, the default state is written immediately so
    /// the directory and file are established at startup.
    pub fn load(&self) -> AnalyticsState {
        match self.read() {
            Ok(Some(state)) => {
                info!(
                    "Loaded analytics from {} ({} total requests)",
                    self.path.display(),
                    state.total_requests
                );
                state
            }
            Ok(None) => {
                info!("No existing analytics file at {}, starting fresh", self.path.display());
                let state = AnalyticsState::default();
                if let Err(e) = self.save(&state) {
                    warn!("Failed to create analytics file {}: {}", self.path.display(), e);
                }
                state
            }
            Err(e) => {
                warn!("Failed to load analytics from {}: {}", self.path.display(), e);
                AnalyticsState::default()
            }
        }
    }

    /// Read and parse the file. `Ok(None)` when it does not exist.
    ///
    /// Top-level fields absent from the document keep the values of a fresh
    /// state; a stored `serverStartTime` is kept verbatim.
    pub fn read(&self) -> Result<Option<AnalyticsState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let state: AnalyticsState = serde_json::from_str(&raw)?;
        Ok(Some(state))
    }

    /// Write the full state as pretty JSON, creating the directory first.
    pub fn save(&self, state: &AnalyticsState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(state)?;

        let temp_path = self.path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.flush()?;
        }
        fs::rename(&temp_path, &self.path)?;

        Ok(())
    }
}
