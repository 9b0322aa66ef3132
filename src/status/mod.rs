//! Status aggregation over the check log.
//!
//! Everything here is read-only: the aggregator turns stored checks into the
//! current per-service status, the overall system status and the history
//! used for charting.

use crate::config::{ConfigProvider, ServiceDefinition};
use crate::db::{CheckRecord, CheckStore, DbError};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::sync::Arc;

/// Length of the trailing uptime and history window.
pub const UPTIME_WINDOW_HOURS: i64 = 24;

/// Overall classification of the monitored system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    /// Every service is online (also the answer for no services).
    Operational,
    /// Some, but not all, services are online.
    Degraded,
    /// No service is online.
    Outage,
}

impl OverallStatus {
    pub fn from_states<I: IntoIterator<Item = bool>>(states: I) -> Self {
        let (mut any_up, mut any_down) = (false, false);
        for online in states {
            if online {
                any_up = true;
            } else {
                any_down = true;
            }
        }

        match (any_up, any_down) {
            (_, false) => OverallStatus::Operational,
            (false, true) => OverallStatus::Outage,
            (true, true) => OverallStatus::Degraded,
        }
    }
}

/// Current status of one service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub online: bool,
    pub status: Option<u16>,
    #[serde(rename = "latency")]
    pub latency_ms: u64,
    #[serde(rename = "uptime")]
    pub uptime_percent: f64,
    pub last_check: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

/// Status of every configured service, in configuration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SystemStatus {
    pub overall: OverallStatus,
    pub services: Vec<ServiceStatus>,
}

/// One point of a service's history.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPoint {
    pub online: bool,
    #[serde(rename = "latency")]
    pub latency_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl From<CheckRecord> for HistoryPoint {
    fn from(r: CheckRecord) -> Self {
        Self {
            online: r.online,
            latency_ms: r.latency_ms,
            created_at: r.created_at,
        }
    }
}

/// Percentage of online checks, rounded to two decimals.
///
/// An empty window counts as fully up.
pub fn uptime_percent(records: &[CheckRecord]) -> f64 {
    if records.is_empty() {
        return 100.0;
    }
    let up = records.iter().filter(|r| r.online).count();
    let pct = up as f64 / records.len() as f64 * 100.0;
    (pct * 100.0).round() / 100.0
}

fn uptime_window() -> ChronoDuration {
    ChronoDuration::hours(UPTIME_WINDOW_HOURS)
}

/// Computes status views from the check log.
pub struct Aggregator {
    store: Arc<dyn CheckStore>,
    config: Arc<ConfigProvider>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn CheckStore>, config: Arc<ConfigProvider>) -> Self {
        Self { store, config }
    }

    /// Status of a single service as of `now`.
    ///
    /// With no checks recorded yet the service is reported online.
    pub fn service_status(
        &self,
        service: &ServiceDefinition,
        now: DateTime<Utc>,
    ) -> Result<ServiceStatus, DbError> {
        let mut window = self.store.since(&service.id, now - uptime_window())?;
        window.retain(|r| r.created_at <= now);

        // The current state comes from the same read as the uptime figure, so
        // an append landing mid-request cannot split them.
        let last = match window.last() {
            Some(r) => Some(r.clone()),
            None => self.store.latest(&service.id)?.filter(|r| r.created_at <= now),
        };

        let mut status = ServiceStatus {
            id: service.id.clone(),
            name: service.name.clone(),
            description: service.description.clone(),
            online: true,
            status: None,
            latency_ms: 0,
            uptime_percent: uptime_percent(&window),
            last_check: None,
            error: None,
        };

        if let Some(last) = last {
            status.online = last.online;
            status.status = last.status;
            status.latency_ms = last.latency_ms;
            status.last_check = Some(last.created_at);
            status.error = last.error;
        }

        Ok(status)
    }

    /// Status of a configured service by id; `None` if it is not configured.
    pub fn current_status(
        &self,
        service_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<ServiceStatus>, DbError> {
        let cfg = self.config.snapshot();
        cfg.service(service_id)
            .map(|s| self.service_status(s, now))
            .transpose()
    }

    /// Status of every configured service plus the overall classification.
    pub fn system_status(&self, now: DateTime<Utc>) -> Result<SystemStatus, DbError> {
        let cfg = self.config.snapshot();
        let services = cfg
            .services
            .iter()
            .map(|s| self.service_status(s, now))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SystemStatus {
            overall: OverallStatus::from_states(services.iter().map(|s| s.online)),
            services,
        })
    }

    /// Checks of a service within `window` before `now`, oldest first.
    ///
    /// Lookups are by id value; unknown ids simply have no history.
    pub fn history(
        &self,
        service_id: &str,
        window: ChronoDuration,
        now: DateTime<Utc>,
    ) -> Result<Vec<HistoryPoint>, DbError> {
        let records = self.store.since(service_id, now - window)?;
        Ok(records
            .into_iter()
            .filter(|r| r.created_at <= now)
            .map(HistoryPoint::from)
            .collect())
    }

    /// History over the standard 24h window.
    pub fn recent_history(
        &self,
        service_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<HistoryPoint>, DbError> {
        self.history(service_id, uptime_window(), now)
    }
}
