//! Probe module for service liveness checks.
//!
//! Supports HTTP and TCP probes. Every probe resolves to a [`CheckResult`];
//! failures are data, not errors.

mod http;
mod tcp;

pub use http::*;
pub use tcp::*;

use serde::{Deserialize, Deserializer, Serialize};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default per-probe timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// User agent sent with every HTTP probe.
pub const USER_AGENT: &str = "eryx-status/1.0";

/// Probe error types.
///
/// These never leave the probe module as errors: [`CheckResult::failed`]
/// turns them into an offline result.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("{0}")]
    Network(String),
    #[error("{0}")]
    Config(String),
    #[error("probe crashed: {0}")]
    Fault(String),
}

/// Which strategy checks a service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeKind {
    #[default]
    Http,
    Tcp,
}

impl ProbeKind {
    /// Parse a kind tag from configuration.
    ///
    /// Anything other than `tcp` is treated as HTTP. Unknown tags are logged
    /// so a typo in `services.json` does not go unnoticed.
    pub fn parse_lossy(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "tcp" => ProbeKind::Tcp,
            "http" | "https" | "" => ProbeKind::Http,
            other => {
                tracing::warn!("Unknown probe type {:?}, falling back to http", other);
                ProbeKind::Http
            }
        }
    }
}

impl<'de> Deserialize<'de> for ProbeKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = Option::<String>::deserialize(deserializer)?;
        Ok(tag.as_deref().map(ProbeKind::parse_lossy).unwrap_or_default())
    }
}

/// Normalized outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub online: bool,
    /// HTTP response code, if a response head was received.
    pub status: Option<u16>,
    pub latency_ms: u64,
    pub error: Option<String>,
}

impl CheckResult {
    pub fn up(latency_ms: u64) -> Self {
        Self {
            online: true,
            status: None,
            latency_ms,
            error: None,
        }
    }

    pub fn failed(latency_ms: u64, err: &ProbeError) -> Self {
        Self {
            online: false,
            status: None,
            latency_ms,
            error: Some(err.to_string()),
        }
    }
}

/// Milliseconds elapsed since `start`, saturating.
pub(crate) fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Run the probe matching `kind` against a target.
///
/// A TCP probe without a port fails immediately without touching the network.
pub async fn run_probe(
    kind: ProbeKind,
    target: &str,
    port: Option<u16>,
    timeout: Duration,
) -> CheckResult {
    match kind {
        ProbeKind::Http => run_http_probe(target, timeout).await,
        ProbeKind::Tcp => match port.filter(|p| *p != 0) {
            Some(port) => run_tcp_probe(target, port, timeout).await,
            None => CheckResult::failed(
                0,
                &ProbeError::Config("no port specified".to_string()),
            ),
        },
    }
}
