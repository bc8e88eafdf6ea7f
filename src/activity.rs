use crate::store::Store;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const ACTIVITY_KEY: &str = "activity.log";
pub const MAX_ENTRIES: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEntry {
    pub id: String,
    pub at: String,
    pub action: String,
    #[serde(default)]
    pub detail: serde_json::Value,
}

/// Oldest first, as stored.
fn load_entries(store: &dyn Store) -> anyhow::Result<Vec<ActivityEntry>> {
    let Some(raw) = store.load(ACTIVITY_KEY)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_value(raw) {
        Ok(v) => Ok(v),
        Err(e) => {
            log::warn!("discarding unreadable activity log: {}", e);
            Ok(Vec::new())
        }
    }
}

pub fn record(
    store: &mut dyn Store,
    action: &str,
    detail: serde_json::Value,
) -> anyhow::Result<ActivityEntry> {
    let entry = ActivityEntry {
        id: Uuid::new_v4().to_string(),
        at: chrono::Utc::now().to_rfc3339(),
        action: action.to_string(),
        detail,
    };
    let mut entries = load_entries(store)?;
    entries.push(entry.clone());
    if entries.len() > MAX_ENTRIES {
        let excess = entries.len() - MAX_ENTRIES;
        entries.drain(0..excess);
    }
    store.save(ACTIVITY_KEY, &serde_json::to_value(&entries)?)?;
    Ok(entry)
}

/// Newest first.
pub fn list(store: &dyn Store, limit: Option<usize>) -> anyhow::Result<Vec<ActivityEntry>> {
    let mut entries = load_entries(store)?;
    entries.reverse();
    if let Some(limit) = limit {
        entries.truncate(limit);
    }
    Ok(entries)
}

pub fn clear(store: &mut dyn Store) -> anyhow::Result<usize> {
    let n = load_entries(store)?.len();
    store.clear(ACTIVITY_KEY)?;
    Ok(n)
}
