use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::locator::Locator;

/// Upload state of a catalogued recording
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SyncStatus {
    /// Remote persistence is not configured
    #[default]
    LocalOnly,
    /// Upload failed and awaits a manual retry
    PendingSync { reason: String },
    Synced { remote_id: String, path: String },
}

/// Catalog record of one finished recording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: String,

    pub artifact_id: String,

    pub timestamp: DateTime<Utc>,

    /// Full precision; round only for display
    pub duration_secs: f64,

    pub size: u64,

    pub mime_type: String,

    #[serde(default)]
    pub sync: SyncStatus,

    /// Rebuilt on load, never persisted
    #[serde(skip)]
    pub locator: Option<Locator>,
}

impl HistoryEntry {
    /// File extension for the stored payload
    pub fn extension(&self) -> &str {
        self.mime_type
            .split(';')
            .next()
            .and_then(|mime| mime.split('/').nth(1))
            .unwrap_or("bin")
    }
}
