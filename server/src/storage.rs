//! Database storage layer for the Barangay Desk server
//!
//! The document tree is kept one row per top-level subtree (`users`,
//! `employees`, ...), each holding that subtree as JSON text. A write loads
//! the subtrees it touches, applies the tree operation to them and writes
//! them back inside one transaction, so multi-path updates land together.

use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Sqlite};
use std::path::Path;
use tokio::sync::Mutex;

use barangay_core::tree;

use crate::crypto;
use crate::error::Result;
use crate::models::Session;

pub struct Storage {
    pool: Pool<Sqlite>,
    /// SQLite has a single writer; serializing here keeps read-modify-write
    /// cycles from interleaving.
    write_lock: Mutex<()>,
}

impl Storage {
    pub async fn new(database_path: &str) -> anyhow::Result<Self> {
        // Ensure directory exists
        if let Some(parent) = Path::new(database_path).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let database_url = format!("sqlite:{}?mode=rwc", database_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(10)
            .connect(&database_url)
            .await?;

        Self::from_pool(pool).await
    }

    /// Private in-memory database. One connection, kept open, since every
    /// new connection to `:memory:` would see an empty database.
    pub async fn in_memory() -> anyhow::Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;

        Self::from_pool(pool).await
    }

    async fn from_pool(pool: Pool<Sqlite>) -> anyhow::Result<Self> {
        let storage = Self {
            pool,
            write_lock: Mutex::new(()),
        };
        storage.initialize_schema().await?;
        Ok(storage)
    }

    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                root TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                email TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL,
                is_valid INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS password_resets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL,
                requested_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE INDEX IF NOT EXISTS idx_sessions_expires ON sessions(expires_at);
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // ========================================================================
    // Document Operations
    // ========================================================================

    /// Read the value at `path`; `None` when nothing is stored there.
    pub async fn get(&self, path: &str) -> Result<Option<Value>> {
        let Some(root) = tree::root_of(path) else {
            let doc = self.export().await?;
            return Ok(if doc.is_null() { None } else { Some(doc) });
        };

        let row: Option<(String,)> = sqlx::query_as("SELECT body FROM documents WHERE root = ?")
            .bind(root)
            .fetch_optional(&self.pool)
            .await?;

        let Some((body,)) = row else {
            return Ok(None);
        };

        let mut wrapper = Map::new();
        wrapper.insert(root.to_string(), serde_json::from_str(&body)?);
        Ok(tree::get(&Value::Object(wrapper), path).cloned())
    }

    /// The whole tree, or `Value::Null` when empty.
    pub async fn export(&self) -> Result<Value> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT root, body FROM documents ORDER BY root")
                .fetch_all(&self.pool)
                .await?;

        if rows.is_empty() {
            return Ok(Value::Null);
        }

        let mut doc = Map::new();
        for (root, body) in rows {
            doc.insert(root, serde_json::from_str(&body)?);
        }
        Ok(Value::Object(doc))
    }

    /// Apply `mutate` to the subtrees named in `touched` and persist the
    /// result atomically. An empty root name means the whole tree. Returns
    /// the roots whose stored value was written or deleted.
    pub async fn write<F>(&self, touched: &[String], mutate: F) -> Result<Vec<String>>
    where
        F: FnOnce(&mut Value) -> barangay_core::Result<()>,
    {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let whole = touched.iter().any(|r| r.is_empty());
        let rows: Vec<(String, String)> = if whole {
            sqlx::query_as("SELECT root, body FROM documents")
                .fetch_all(&mut *tx)
                .await?
        } else {
            let mut rows = Vec::new();
            for root in touched {
                let row: Option<(String, String)> =
                    sqlx::query_as("SELECT root, body FROM documents WHERE root = ?")
                        .bind(root)
                        .fetch_optional(&mut *tx)
                        .await?;
                rows.extend(row);
            }
            rows
        };

        let mut scratch = Map::new();
        for (root, body) in rows {
            scratch.insert(root, serde_json::from_str(&body)?);
        }
        let mut affected: Vec<String> = scratch.keys().cloned().collect();
        let mut doc = Value::Object(scratch);

        mutate(&mut doc)?;

        if let Value::Object(map) = &doc {
            for key in map.keys() {
                if !affected.contains(key) {
                    affected.push(key.clone());
                }
            }
        }

        for root in &affected {
            match tree::get(&doc, root) {
                Some(value) => {
                    sqlx::query(
                        "INSERT INTO documents (root, body, updated_at) VALUES (?, ?, datetime('now'))
                         ON CONFLICT(root) DO UPDATE SET body = excluded.body, updated_at = excluded.updated_at",
                    )
                    .bind(root)
                    .bind(serde_json::to_string(value)?)
                    .execute(&mut *tx)
                    .await?;
                }
                None => {
                    sqlx::query("DELETE FROM documents WHERE root = ?")
                        .bind(root)
                        .execute(&mut *tx)
                        .await?;
                }
            }
        }

        tx.commit().await?;
        Ok(affected)
    }

    // ========================================================================
    // Session Operations
    // ========================================================================

    pub async fn create_session(
        &self,
        email: &str,
        token: &str,
        ttl_hours: i64,
    ) -> Result<DateTime<Utc>> {
        let token_hash = crypto::hash_secret(token);
        let now = Utc::now();
        let expires_at = now + Duration::hours(ttl_hours);

        sqlx::query(
            "INSERT INTO sessions (token_hash, email, created_at, expires_at, is_valid)
             VALUES (?, ?, ?, ?, 1)",
        )
        .bind(&token_hash)
        .bind(email)
        .bind(now.timestamp())
        .bind(expires_at.timestamp())
        .execute(&self.pool)
        .await?;

        Ok(expires_at)
    }

    pub async fn validate_session(&self, token: &str) -> Result<Option<Session>> {
        let token_hash = crypto::hash_secret(token);

        let session = sqlx::query_as::<_, Session>(
            "SELECT token_hash, email, created_at, expires_at, is_valid
             FROM sessions
             WHERE token_hash = ? AND is_valid = 1 AND expires_at > ?",
        )
        .bind(&token_hash)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await?;

        Ok(session)
    }

    pub async fn invalidate_session(&self, token: &str) -> Result<()> {
        let token_hash = crypto::hash_secret(token);

        sqlx::query("UPDATE sessions SET is_valid = 0 WHERE token_hash = ?")
            .bind(&token_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn record_password_reset(&self, email: &str) -> Result<()> {
        sqlx::query("INSERT INTO password_resets (email) VALUES (?)")
            .bind(email)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn count_password_resets(&self, email: &str) -> Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM password_resets WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;

        Ok(count.0)
    }

    // ========================================================================
    // Cleanup
    // ========================================================================

    pub async fn cleanup_expired(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ? OR is_valid = 0")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
