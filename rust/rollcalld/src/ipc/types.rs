use crate::ledger::LedgerWatch;
use crate::store::SqliteStore;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// A live `attendance.subscribe` registration.
pub struct ActiveWatch {
    pub id: String,
    pub watch: LedgerWatch,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<SqliteStore>,
    pub watches: Vec<ActiveWatch>,
    pub next_watch_id: u64,
}

impl AppState {
    /// Swap in a new workspace. Subscriptions belong to the old store and are dropped.
    pub fn select_workspace(&mut self, path: PathBuf, store: SqliteStore) {
        self.watches.clear();
        self.workspace = Some(path);
        self.store = Some(store);
    }
}
