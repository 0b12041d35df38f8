use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Sync gateway status: idle until the first attempt, then success/error with
/// a timestamp. Recoverable by manual re-trigger only; there is no retry queue.
pub struct SyncStatus {
    pub busy: bool,
    pub state: &'static str,
    pub last_synced_at: Option<String>,
    pub message: Option<String>,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            busy: false,
            state: "idle",
            last_synced_at: None,
            message: None,
        }
    }
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub sync: SyncStatus,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            db: None,
            sync: SyncStatus::default(),
        }
    }
}
