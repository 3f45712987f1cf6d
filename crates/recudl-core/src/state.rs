//! Append-only JSON state log for download outcomes.
//!
//! One entry per completion or failure, with the segment index to resume
//! from when there is one. The log is fire-and-forget: a corrupt or
//! unwritable file is tolerated and never aborts a download.

use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Default log location, relative to the working directory.
pub const STATE_FILE: &str = "recu_state.json";

// Serializes read-modify-write cycles from concurrent workers.
static WRITE_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "COMPLETE")]
    Complete,
    #[serde(rename = "FAILED")]
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateEntry {
    pub timestamp: u64,
    pub url: String,
    pub filename: String,
    pub status: Status,
    /// Segment index the run stopped at, when it failed.
    pub last_index: Option<usize>,
    /// Index of the entry in the config's URL list.
    pub source_index: usize,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateLog {
    #[serde(default)]
    pub entries: Vec<StateEntry>,
}

/// Loads the log, treating a missing or corrupt file as empty.
pub fn load(path: &Path) -> StateLog {
    match fs::read_to_string(path) {
        Ok(data) => serde_json::from_str(&data).unwrap_or_default(),
        Err(_) => StateLog::default(),
    }
}

/// Appends one entry and rewrites the log.
pub fn record(
    path: &Path,
    url: &str,
    filename: &str,
    status: Status,
    last_index: Option<usize>,
    source_index: usize,
) -> Result<()> {
    let _guard = WRITE_LOCK.lock().unwrap();
    let mut log = load(path);
    log.entries.push(StateEntry {
        timestamp: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
        url: url.to_string(),
        filename: filename.to_string(),
        status,
        last_index,
        source_index,
    });
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).context("failed to create state dir")?;
        }
    }
    let data = serde_json::to_string_pretty(&log).context("failed to serialize state log")?;
    fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

/// [`record`], with failures logged instead of surfaced.
pub fn record_best_effort(
    path: &Path,
    url: &str,
    filename: &str,
    status: Status,
    last_index: Option<usize>,
    source_index: usize,
) {
    if let Err(e) = record(path, url, filename, status, last_index, source_index) {
        tracing::warn!("state log update failed: {e}");
    }
}
