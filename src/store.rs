use crate::db;
use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

/// Keyed JSON persistence for drafts, settings and the activity log.
pub trait Store {
    fn load(&self, key: &str) -> anyhow::Result<Option<Value>>;
    fn save(&mut self, key: &str, value: &Value) -> anyhow::Result<()>;
    /// Returns whether a value was removed.
    fn clear(&mut self, key: &str) -> anyhow::Result<bool>;
    /// Keys starting with `prefix`, ascending.
    fn keys(&self, prefix: &str) -> anyhow::Result<Vec<String>>;
    /// Make everything saved so far durable on disk.
    fn flush(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Used until a workspace is selected. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: BTreeMap<String, Value>,
}

impl Store for MemoryStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<Value>> {
        Ok(self.values.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &Value) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn clear(&mut self, key: &str) -> anyhow::Result<bool> {
        Ok(self.values.remove(key).is_some())
    }

    fn keys(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        Ok(self
            .values
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(workspace: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            conn: db::open_db(workspace)?,
        })
    }
}

impl Store for SqliteStore {
    fn load(&self, key: &str) -> anyhow::Result<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value_json FROM kv_store WHERE key = ?",
                [key],
                |r| r.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => Ok(Some(serde_json::from_str(&text)?)),
            None => Ok(None),
        }
    }

    fn save(&mut self, key: &str, value: &Value) -> anyhow::Result<()> {
        let text = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT INTO kv_store(key, value_json, updated_at) VALUES(?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
               value_json = excluded.value_json,
               updated_at = excluded.updated_at",
            (key, text, chrono::Utc::now().to_rfc3339()),
        )?;
        Ok(())
    }

    fn clear(&mut self, key: &str) -> anyhow::Result<bool> {
        let n = self
            .conn
            .execute("DELETE FROM kv_store WHERE key = ?", [key])?;
        Ok(n > 0)
    }

    fn keys(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT key FROM kv_store WHERE substr(key, 1, ?) = ? ORDER BY key")?;
        let keys = stmt
            .query_map((prefix.chars().count() as i64, prefix), |r| r.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn flush(&self) -> anyhow::Result<()> {
        self.conn
            .query_row("PRAGMA wal_checkpoint(FULL)", [], |_| Ok(()))?;
        Ok(())
    }
}
