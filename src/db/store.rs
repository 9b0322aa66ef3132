//! SQLite database store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult, Row};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::models::*;
use super::CheckStore;

/// Fixed-width UTC timestamp format; lexical order equals time order.
const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.9f";

const CHECK_COLUMNS: &str = "id, service_id, online, status, latency_ms, error, created_at";

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        Self::with_connection(Connection::open(path)?)
    }

    /// Create a store backed by a private in-memory database.
    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, DbError> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn();
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    // A panic while holding the lock cannot leave a half-applied statement
    // behind, so a poisoned connection is still usable.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CheckStore for Store {
    fn append(&self, record: &CheckRecord) -> Result<i64, DbError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO checks (service_id, online, status, latency_ms, error, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.service_id,
                record.online,
                record.status.map(i64::from),
                i64::try_from(record.latency_ms).unwrap_or(i64::MAX),
                record.error,
                format_db_time(record.created_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn latest(&self, service_id: &str) -> Result<Option<CheckRecord>, DbError> {
        let conn = self.conn();
        let record = conn
            .query_row(
                &format!(
                    "SELECT {} FROM checks WHERE service_id = ?1 ORDER BY created_at DESC, id DESC LIMIT 1",
                    CHECK_COLUMNS
                ),
                params![service_id],
                row_to_check,
            )
            .optional()?;
        Ok(record)
    }

    fn since(&self, service_id: &str, since: DateTime<Utc>) -> Result<Vec<CheckRecord>, DbError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM checks WHERE service_id = ?1 AND created_at >= ?2 ORDER BY created_at ASC, id ASC",
            CHECK_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![service_id, format_db_time(since)], row_to_check)?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(records)
    }
}

fn row_to_check(row: &Row<'_>) -> SqlResult<CheckRecord> {
    let status: Option<i64> = row.get(3)?;
    let latency: i64 = row.get(4)?;
    let time_str: String = row.get(6)?;
    let created_at = parse_db_time(&time_str)
        .ok_or_else(|| rusqlite::Error::InvalidColumnType(6, "created_at".to_string(), Type::Text))?;

    Ok(CheckRecord {
        id: row.get(0)?,
        service_id: row.get(1)?,
        online: row.get(2)?,
        status: status.and_then(|s| u16::try_from(s).ok()),
        latency_ms: u64::try_from(latency).unwrap_or(0),
        error: row.get(5)?,
        created_at,
    })
}

fn format_db_time(t: DateTime<Utc>) -> String {
    t.format(TIME_FORMAT).to_string()
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    let formats = [TIME_FORMAT, "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
