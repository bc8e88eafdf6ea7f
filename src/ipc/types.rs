use std::path::PathBuf;

use serde::Deserialize;

use crate::store::{MemoryStore, Store};

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    /// In-memory until `workspace.select` swaps in the workspace database.
    pub store: Box<dyn Store>,
}

impl AppState {
    pub fn new() -> Self {
        Self {
            workspace: None,
            store: Box::new(MemoryStore::default()),
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
