//! Durable credential storage using SQLite.
//!
//! One row per session; the token pair is kept as a JSON document so the
//! column layout does not change when token fields do.

use super::{CredentialStore, SessionRecord, TokenRecord};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Session storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE sessions (
///     session_id     TEXT PRIMARY KEY,
///     owner_identity TEXT NOT NULL,
///     display_name   TEXT NOT NULL,
///     token_info     TEXT NOT NULL,   -- JSON-encoded TokenRecord
///     created_at     TEXT NOT NULL,   -- ISO 8601 timestamp
///     updated_at     TEXT NOT NULL    -- ISO 8601 timestamp
/// );
/// CREATE INDEX idx_sessions_owner ON sessions(owner_identity);
/// ```
///
/// # Thread Safety
/// - Connection is wrapped in Mutex for safe concurrent access
/// - Schema creation uses `IF NOT EXISTS`, so reopening an existing file is safe
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
}

const SELECT_COLUMNS: &str =
    "SELECT session_id, owner_identity, display_name, token_info, created_at, updated_at FROM sessions";

impl SqliteCredentialStore {
    /// Creates or opens a session store.
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file (`:memory:` for tests)
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open session database at {}", db_path.display()))?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.create_schema()?;
        Ok(store)
    }

    fn create_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id     TEXT PRIMARY KEY,
                owner_identity TEXT NOT NULL,
                display_name   TEXT NOT NULL,
                token_info     TEXT NOT NULL,
                created_at     TEXT NOT NULL,
                updated_at     TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_owner ON sessions(owner_identity);",
        )
        .context("Failed to create sessions table")?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Session database lock poisoned"))
    }
}

/// Raw column values; parsed outside the rusqlite row callback.
struct RawSession {
    session_id: String,
    owner_identity: String,
    display_name: String,
    token_info: String,
    created_at: String,
    updated_at: String,
}

impl RawSession {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            session_id: row.get(0)?,
            owner_identity: row.get(1)?,
            display_name: row.get(2)?,
            token_info: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_record(self) -> Result<SessionRecord> {
        let token: TokenRecord = serde_json::from_str(&self.token_info)
            .with_context(|| format!("Failed to parse token_info for session {}", self.session_id))?;
        Ok(SessionRecord {
            token,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
            session_id: self.session_id,
            owner_identity: self.owner_identity,
            display_name: self.display_name,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Failed to parse timestamp '{}'", value))
}

impl CredentialStore for SqliteCredentialStore {
    fn get(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!("{} WHERE session_id = ?1", SELECT_COLUMNS),
                params![session_id],
                RawSession::from_row,
            )
            .optional()
            .context("Failed to query session")?;
        raw.map(RawSession::into_record).transpose()
    }

    /// Upsert keyed by `session_id`; `created_at` of an existing row is kept.
    fn put(&self, record: &SessionRecord) -> Result<()> {
        let token_info =
            serde_json::to_string(&record.token).context("Failed to encode token_info")?;

        self.lock()?
            .execute(
                r#"
                INSERT INTO sessions (
                    session_id, owner_identity, display_name,
                    token_info, created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(session_id) DO UPDATE SET
                    owner_identity = excluded.owner_identity,
                    display_name = excluded.display_name,
                    token_info = excluded.token_info,
                    updated_at = excluded.updated_at
                "#,
                params![
                    record.session_id,
                    record.owner_identity,
                    record.display_name,
                    token_info,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )
            .context("Failed to store session")?;

        Ok(())
    }

    fn find_by_identity(&self, owner_identity: &str) -> Result<Option<SessionRecord>> {
        let conn = self.lock()?;
        let raw = conn
            .query_row(
                &format!(
                    "{} WHERE owner_identity = ?1 ORDER BY updated_at DESC LIMIT 1",
                    SELECT_COLUMNS
                ),
                params![owner_identity],
                RawSession::from_row,
            )
            .optional()
            .context("Failed to query session by identity")?;
        raw.map(RawSession::into_record).transpose()
    }

    fn count(&self) -> Result<usize> {
        let count: i64 = self
            .lock()?
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))
            .context("Failed to count sessions")?;
        Ok(count as usize)
    }
}
