//! Database model types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::probe::CheckResult;

/// One persisted probe outcome. Never updated once written.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckRecord {
    /// Row id, 0 until inserted.
    pub id: i64,
    pub service_id: String,
    pub online: bool,
    pub status: Option<u16>,
    #[serde(rename = "latency")]
    pub latency_ms: u64,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CheckRecord {
    /// Build an unsaved record from a probe result.
    pub fn from_result(service_id: &str, result: CheckResult, created_at: DateTime<Utc>) -> Self {
        Self {
            id: 0,
            service_id: service_id.to_string(),
            online: result.online,
            status: result.status,
            latency_ms: result.latency_ms,
            error: result.error,
            created_at,
        }
    }
}
