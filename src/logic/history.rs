//! Scan History Ledger
//!
//! Append-only, capped log of past scans, most-recent-first, persisted as a
//! single JSON array. Corrupt or missing storage reads as empty; concurrent
//! writers race on read-modify-write and last write wins (accepted).

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants;
use crate::logic::inference::PredictionResult;

const HISTORY_FILE_NAME: &str = "scan_history.json";

/// Default ledger path under the platform data dir
pub fn default_history_path() -> PathBuf {
    constants::data_dir().join(HISTORY_FILE_NAME)
}

/// One persisted scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    /// The submitted image, stored verbatim as a base64 data URL
    pub image_data_url: String,
    /// Defensive: `None` only if persistence runs before a result exists
    pub prediction: Option<PredictionResult>,
}

pub struct HistoryLedger {
    path: PathBuf,
}

impl HistoryLedger {
    pub fn open_default() -> Self {
        Self::with_path(default_history_path())
    }

    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Assign a fresh id and timestamp, prepend, truncate to the cap and
    /// persist synchronously. Returns the stored entry.
    pub fn append(
        &self,
        image_data_url: &str,
        prediction: Option<PredictionResult>,
    ) -> HistoryEntry {
        let entry = HistoryEntry {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            image_data_url: image_data_url.to_string(),
            prediction,
        };

        let mut entries = self.list();
        entries.insert(0, entry.clone());
        entries.truncate(constants::HISTORY_LIMIT);
        save_entries(&self.path, &entries);

        entry
    }

    /// All stored entries, most-recent-first. Absent or unparseable storage
    /// yields an empty list, never an error.
    pub fn list(&self) -> Vec<HistoryEntry> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_slice(&data) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("Scan history unreadable ({}), treating as empty", e);
                Vec::new()
            }
        }
    }

    /// Remove all entries. Idempotent.
    pub fn clear(&self) {
        match fs::remove_file(&self.path) {
            Ok(()) => log::info!("Cleared scan history"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => log::error!("Failed to clear scan history: {}", e),
        }
    }

}

fn save_entries(path: &Path, entries: &[HistoryEntry]) {
    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            log::error!("Failed to create history dir: {}", e);
            return;
        }
    }
    match serde_json::to_vec_pretty(entries) {
        Ok(json) => {
            if let Err(e) = fs::write(path, json) {
                log::error!("Failed to write scan history: {}", e);
            }
        }
        Err(e) => log::error!("Failed to serialize scan history: {}", e),
    }
}
