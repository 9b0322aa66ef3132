//! Database module for eryx-status.
//!
//! Provides the append-only check log and its SQLite implementation.

mod models;
mod store;

pub use models::*;
pub use store::*;

use chrono::{DateTime, Utc};

/// Read/write contract of the check log.
///
/// Appends are atomic: a record is visible whole or not at all.
pub trait CheckStore: Send + Sync {
    /// Append a record and return its id.
    fn append(&self, record: &CheckRecord) -> Result<i64, DbError>;

    /// Most recent record for a service.
    fn latest(&self, service_id: &str) -> Result<Option<CheckRecord>, DbError>;

    /// All records for a service created at or after `since`, oldest first.
    fn since(&self, service_id: &str, since: DateTime<Utc>) -> Result<Vec<CheckRecord>, DbError>;
}
