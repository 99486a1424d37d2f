//! SQLite-based cache namespace storage
//!
//! Persists both cache namespaces across worker restarts. Each row is one
//! cached response, keyed by a hash of its namespace and request key.

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::key::cache_key;
use crate::error::CacheError;
use crate::worker::CacheStore;
use crate::worker::types::Response;

/// Schema version - increment to trigger nuke-and-rebuild
const SCHEMA_VERSION: i32 = 1;

type Result<T> = std::result::Result<T, CacheError>;

/// SQLite-backed cache namespaces
pub struct SqliteCacheStore {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl SqliteCacheStore {
    /// Open or create storage at the default XDG cache location
    pub fn open() -> Result<Self> {
        let cache_dir = Self::cache_dir()?;
        Self::open_at(&cache_dir)
    }

    /// Get the cache directory path (~/.cache/pulsemind-sw on Linux)
    pub fn cache_dir() -> Result<PathBuf> {
        let cache_base = dirs::cache_dir().ok_or(CacheError::NoHome)?;
        Ok(cache_base.join("pulsemind-sw"))
    }

    /// Open storage in a specific directory
    pub fn open_at(cache_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(cache_dir)
            .map_err(|e| CacheError::Io(format!("Failed to create cache dir: {}", e)))?;

        let db_path = cache_dir.join("caches.db");
        let conn = Connection::open(&db_path)?;

        // Check schema version - nuke if mismatched
        let version: i32 = conn
            .pragma_query_value(None, "user_version", |r| r.get(0))
            .unwrap_or(0);

        if version != 0 && version != SCHEMA_VERSION {
            log::info!(
                "Cache schema version mismatch ({} != {}), rebuilding",
                version,
                SCHEMA_VERSION
            );
            drop(conn);
            std::fs::remove_file(&db_path)
                .map_err(|e| CacheError::Io(format!("Failed to remove cache DB: {}", e)))?;
            return Self::open_at(cache_dir);
        }

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS namespaces (
                name TEXT PRIMARY KEY NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS cache_entries (
                entry_key TEXT PRIMARY KEY NOT NULL,
                namespace TEXT NOT NULL,
                request_key TEXT NOT NULL,
                status INTEGER NOT NULL,
                content_type TEXT,
                body BLOB NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_namespace ON cache_entries(namespace);
            "#,
        )?;

        conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path,
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }

    /// Delete every namespace and entry
    pub fn clear_all(&self) -> Result<ClearStats> {
        let conn = self.conn()?;
        let entries: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |r| r.get(0))?;
        let namespaces: i64 = conn.query_row("SELECT COUNT(*) FROM namespaces", [], |r| r.get(0))?;

        conn.execute("DELETE FROM cache_entries", [])?;
        conn.execute("DELETE FROM namespaces", [])?;

        Ok(ClearStats {
            namespaces_removed: namespaces as usize,
            entries_removed: entries as usize,
        })
    }

    /// Per-namespace statistics, sorted by name
    pub fn stats(&self) -> Result<Vec<NamespaceStats>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT n.name, n.created_at, COUNT(e.entry_key), COALESCE(SUM(LENGTH(e.body)), 0)
             FROM namespaces n
             LEFT JOIN cache_entries e ON e.namespace = n.name
             GROUP BY n.name
             ORDER BY n.name",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(NamespaceStats {
                name: row.get(0)?,
                created_at: row.get(1)?,
                entries: row.get::<_, i64>(2)? as usize,
                size_bytes: row.get::<_, i64>(3)? as usize,
            })
        })?;

        let stats = rows.collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(stats)
    }
}

/// Statistics about a cache clear operation
#[derive(Debug)]
pub struct ClearStats {
    pub namespaces_removed: usize,
    pub entries_removed: usize,
}

/// Statistics about one namespace
#[derive(Debug, Clone)]
pub struct NamespaceStats {
    pub name: String,
    pub created_at: i64,
    pub entries: usize,
    pub size_bytes: usize,
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn namespaces(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM namespaces ORDER BY created_at, name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    async fn delete_namespace(&self, namespace: &str) -> Result<bool> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM cache_entries WHERE namespace = ?1",
            params![namespace],
        )?;
        let deleted = conn.execute("DELETE FROM namespaces WHERE name = ?1", params![namespace])?;
        Ok(deleted > 0)
    }

    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Response>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT status, content_type, body FROM cache_entries WHERE entry_key = ?1",
                params![cache_key(namespace, key)],
                |row| {
                    Ok(Response {
                        status: row.get(0)?,
                        content_type: row.get(1)?,
                        body: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(row)
    }

    async fn put(&self, namespace: &str, key: &str, response: &Response) -> Result<()> {
        let conn = self.conn()?;
        let now = Utc::now().timestamp();

        conn.execute(
            "INSERT OR IGNORE INTO namespaces (name, created_at) VALUES (?1, ?2)",
            params![namespace, now],
        )?;
        conn.execute(
            "INSERT OR REPLACE INTO cache_entries
             (entry_key, namespace, request_key, status, content_type, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                cache_key(namespace, key),
                namespace,
                key,
                response.status,
                response.content_type,
                response.body,
                now
            ],
        )?;
        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM cache_entries WHERE entry_key = ?1",
            params![cache_key(namespace, key)],
        )?;
        Ok(deleted > 0)
    }

    async fn keys(&self, namespace: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT request_key FROM cache_entries WHERE namespace = ?1 ORDER BY request_key",
        )?;
        let keys = stmt
            .query_map(params![namespace], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(keys)
    }
}
