//! Namespaced key-value storage.
//!
//! The agent keeps sessions, PRDs, notes and work contexts in a simple
//! `get/set/delete` store addressed by namespace + key. Two backends are
//! provided: an in-memory map and a SQLite table.
//!
//! ## Database Schema
//!
//! ```sql
//! CREATE TABLE kv (
//!     namespace  TEXT NOT NULL,
//!     key        TEXT NOT NULL,
//!     data       TEXT NOT NULL,     -- JSON document
//!     updated_at INTEGER NOT NULL,  -- unix seconds
//!     PRIMARY KEY (namespace, key)
//! );
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;

/// Well-known namespaces.
pub mod namespaces {
    pub const SESSIONS: &str = "sessions";
    pub const PRDS: &str = "prds";
    pub const NOTES: &str = "notes";
    pub const CONTEXTS: &str = "contexts";
}

/// Result of a `get`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KvEntry {
    pub exists: bool,
    pub data: Option<Value>,
}

impl KvEntry {
    pub fn missing() -> Self {
        Self::default()
    }

    pub fn found(data: Value) -> Self {
        Self {
            exists: true,
            data: Some(data),
        }
    }
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<KvEntry, StoreError>;
    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError>;
    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError>;
}

// ── In-memory backend ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<(String, String), Value>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<KvEntry, StoreError> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(&(namespace.to_string(), key.to_string()))
            .cloned()
            .map(KvEntry::found)
            .unwrap_or_default())
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        self.entries
            .write()
            .await
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }
}

// ── SQLite backend ──────────────────────────────────────────────────────────

/// SQLite-backed store. The connection lives behind a mutex and every call
/// runs on the blocking pool.
#[derive(Clone)]
pub struct SqliteKvStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKvStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Unavailable(format!("{}: {e}", parent.display())))?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                namespace  TEXT NOT NULL,
                key        TEXT NOT NULL,
                data       TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (namespace, key)
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| StoreError::Unavailable("connection mutex poisoned".into()))?;
            f(&guard)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("blocking task failed: {e}")))?
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<KvEntry, StoreError> {
        let (namespace, key) = (namespace.to_string(), key.to_string());
        self.with_conn(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT data FROM kv WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key],
                    |row| row.get(0),
                )
                .optional()?;
            match raw {
                Some(text) => Ok(KvEntry::found(serde_json::from_str(&text)?)),
                None => Ok(KvEntry::missing()),
            }
        })
        .await
    }

    async fn set(&self, namespace: &str, key: &str, value: Value) -> Result<(), StoreError> {
        let (namespace, key) = (namespace.to_string(), key.to_string());
        let text = serde_json::to_string(&value)?;
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO kv (namespace, key, data, updated_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(namespace, key) DO UPDATE SET data = excluded.data, updated_at = excluded.updated_at",
                params![namespace, key, text, chrono::Utc::now().timestamp()],
            )?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), StoreError> {
        let (namespace, key) = (namespace.to_string(), key.to_string());
        self.with_conn(move |conn| {
            conn.execute(
                "DELETE FROM kv WHERE namespace = ?1 AND key = ?2",
                params![namespace, key],
            )?;
            Ok(())
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    async fn exercise(store: &dyn KvStore) {
        assert_eq!(store.get("notes", "a").await.unwrap(), KvEntry::missing());

        store.set("notes", "a", json!({"title": "A"})).await.unwrap();
        let entry = store.get("notes", "a").await.unwrap();
        assert!(entry.exists);
        assert_eq!(entry.data, Some(json!({"title": "A"})));

        // Same key in another namespace is independent
        assert!(!store.get("prds", "a").await.unwrap().exists);

        store.set("notes", "a", json!({"title": "B"})).await.unwrap();
        assert_eq!(
            store.get("notes", "a").await.unwrap().data,
            Some(json!({"title": "B"}))
        );

        store.delete("notes", "a").await.unwrap();
        assert!(!store.get("notes", "a").await.unwrap().exists);

        // Deleting a missing key is not an error
        store.delete("notes", "missing").await.unwrap();
    }

    #[tokio::test]
    async fn memory_store_crud() {
        exercise(&MemoryKvStore::new()).await;
    }

    #[tokio::test]
    async fn sqlite_store_crud() {
        let store = SqliteKvStore::open_in_memory().unwrap();
        exercise(&store).await;
    }

    #[tokio::test]
    async fn sqlite_store_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("agentprd.db");
        {
            let store = SqliteKvStore::open(&path).unwrap();
            store.set("prds", "x", json!([1, 2, 3])).await.unwrap();
        }
        let reopened = SqliteKvStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("prds", "x").await.unwrap().data,
            Some(json!([1, 2, 3]))
        );
    }
}
