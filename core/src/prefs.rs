//! Operator-local preferences using SQLite
//!
//! Nothing in here is authoritative; it only remembers UI choices between
//! sessions on one machine.

use std::collections::HashSet;
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;

const REMEMBERED_USERNAME: &str = "remembered_username";
const DISMISSED_FEEDBACK: &str = "dismissed_feedback";
const SESSION_TOKEN: &str = "session_token";

pub struct LocalPrefs {
    conn: Mutex<Connection>,
}

impl LocalPrefs {
    pub fn new(data_dir: &str) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = Path::new(data_dir).join("prefs.db");
        Self::from_connection(Connection::open(db_path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            "#,
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ========================================================================
    // Settings
    // ========================================================================

    pub fn save_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn delete_setting(&self, key: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ========================================================================
    // Remember me
    // ========================================================================

    /// Remember the sign-in username, or forget it with `None`.
    pub fn remember_username(&self, username: Option<&str>) -> Result<()> {
        match username.map(str::trim).filter(|u| !u.is_empty()) {
            Some(name) => self.save_setting(REMEMBERED_USERNAME, name),
            None => self.delete_setting(REMEMBERED_USERNAME),
        }
    }

    pub fn remembered_username(&self) -> Result<Option<String>> {
        self.get_setting(REMEMBERED_USERNAME)
    }

    // ========================================================================
    // Session
    // ========================================================================

    pub fn save_session_token(&self, token: &str) -> Result<()> {
        self.save_setting(SESSION_TOKEN, token)
    }

    pub fn session_token(&self) -> Result<Option<String>> {
        self.get_setting(SESSION_TOKEN)
    }

    pub fn clear_session(&self) -> Result<()> {
        self.delete_setting(SESSION_TOKEN)
    }

    // ========================================================================
    // Dismissed feedback notifications
    // ========================================================================

    pub fn dismissed_feedback(&self) -> Result<HashSet<String>> {
        let Some(raw) = self.get_setting(DISMISSED_FEEDBACK)? else {
            return Ok(HashSet::new());
        };
        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(keys) => Ok(keys.into_iter().collect()),
            Err(e) => {
                log::warn!("Discarding unreadable dismissed feedback list: {}", e);
                Ok(HashSet::new())
            }
        }
    }

    pub fn dismiss_feedback(&self, key: &str) -> Result<()> {
        let mut keys: Vec<String> = self.dismissed_feedback()?.into_iter().collect();
        if keys.iter().any(|k| k == key) {
            return Ok(());
        }
        keys.push(key.to_string());
        keys.sort();
        self.save_setting(DISMISSED_FEEDBACK, &serde_json::to_string(&keys)?)
    }

    pub fn clear_dismissed_feedback(&self) -> Result<()> {
        self.delete_setting(DISMISSED_FEEDBACK)
    }
}
