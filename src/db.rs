// 💾 SQLite store - options and role memberships on disk
//
// One table of JSON option values keyed like OptionKey, one table of users,
// one of (user, role) pairs. Writes are upserts: last write wins.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::directory::SubjectProvider;
use crate::error::CounterError;
use crate::store::{OptionKey, OptionStore};
use crate::subject::Subject;

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    // ==========================================================================
    // Options Table (one JSON value per key; scope '' means no scope)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS options (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uid TEXT NOT NULL,
            subject_kind TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            scope_id TEXT NOT NULL DEFAULT '',
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (uid, subject_kind, subject_id, scope_id)
        )",
        [],
    )?;

    // ==========================================================================
    // Users & Memberships
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY,
            login_name TEXT UNIQUE NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS memberships (
            user_id INTEGER NOT NULL,
            role TEXT NOT NULL,
            UNIQUE (user_id, role)
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_memberships_role ON memberships(role)",
        [],
    )?;

    Ok(())
}

/// SQLite-backed option store and directory
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {:?}", path))?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        setup_database(&conn).context("Failed to set up database")?;
        Ok(SqliteStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| CounterError::LockPoisoned("database").into())
    }

    pub fn register_user(&self, user_id: u64, login_name: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO users (id, login_name) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET login_name = excluded.login_name",
            params![to_sql_id(user_id)?, login_name],
        )?;
        Ok(())
    }

    pub fn assign_role(&self, user_id: u64, role: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO memberships (user_id, role) VALUES (?1, ?2)",
            params![to_sql_id(user_id)?, role],
        )?;
        tracing::debug!(user_id, role, "Assigned role");
        Ok(())
    }

    pub fn remove_role(&self, user_id: u64, role: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM memberships WHERE user_id = ?1 AND role = ?2",
            params![to_sql_id(user_id)?, role],
        )?;
        Ok(())
    }

    /// When the option under `key` was last written
    pub fn updated_at(&self, key: &OptionKey) -> Result<Option<DateTime<Utc>>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT updated_at FROM options
                 WHERE uid = ?1 AND subject_kind = ?2 AND subject_id = ?3 AND scope_id = ?4",
                params![key.uid, key.subject_kind.as_str(), key.subject_id, scope(key)],
                |row| row.get(0),
            )
            .optional()?;

        raw.map(|s| {
            DateTime::parse_from_rfc3339(&s)
                .map(|dt| dt.with_timezone(&Utc))
                .with_context(|| format!("Invalid timestamp in options table: {}", s))
        })
        .transpose()
    }
}

fn scope(key: &OptionKey) -> &str {
    key.scope_id.as_deref().unwrap_or("")
}

fn to_sql_id(user_id: u64) -> Result<i64> {
    i64::try_from(user_id).with_context(|| format!("User id out of range: {}", user_id))
}

impl OptionStore for SqliteStore {
    fn read(&self, key: &OptionKey) -> Result<Option<Value>> {
        let conn = self.conn()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM options
                 WHERE uid = ?1 AND subject_kind = ?2 AND subject_id = ?3 AND scope_id = ?4",
                params![key.uid, key.subject_kind.as_str(), key.subject_id, scope(key)],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read option")?;

        Ok(raw.map(|text| {
            serde_json::from_str(&text).unwrap_or_else(|e| {
                tracing::warn!(error = %e, uid = %key.uid, subject_id = %key.subject_id, "Corrupt option value");
                Value::Null
            })
        }))
    }

    fn write(&self, key: &OptionKey, value: Value) -> Result<()> {
        let json = serde_json::to_string(&value)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO options (uid, subject_kind, subject_id, scope_id, value, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(uid, subject_kind, subject_id, scope_id)
             DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![
                key.uid,
                key.subject_kind.as_str(),
                key.subject_id,
                scope(key),
                json,
                Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to write option")?;
        Ok(())
    }
}

impl SubjectProvider for SqliteStore {
    fn role_members(&self, role: &str) -> Result<Vec<u64>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT user_id FROM memberships WHERE role = ?1 ORDER BY user_id")?;

        let ids = stmt
            .query_map(params![role], |row| row.get::<_, i64>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        // Negative ids cannot come from assign_role; skip anything foreign
        Ok(ids.into_iter().filter_map(|id| u64::try_from(id).ok()).collect())
    }

    fn user_for_login(&self, login_name: &str, user_id: u64) -> Result<Option<Subject>> {
        let conn = self.conn()?;
        let id: Option<i64> = conn
            .query_row(
                "SELECT id FROM users WHERE id = ?1
                 UNION ALL
                 SELECT id FROM users WHERE login_name = ?2
                 LIMIT 1",
                params![to_sql_id(user_id)?, login_name],
                |row| row.get(0),
            )
            .optional()?;

        Ok(id.and_then(|id| u64::try_from(id).ok()).map(Subject::user))
    }
}
