//! Configuration module for eryx-status.
//!
//! Two layers: [`ServerConfig`] comes from environment variables with
//! sensible defaults, and [`ConfigProvider`] serves immutable snapshots of the
//! monitored services read from `services.json`.

use crate::probe::ProbeKind;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;

/// Check interval used when the configuration omits it or sets it to zero.
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 300;

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address for the web server (default: "0.0.0.0")
    pub host: String,
    /// HTTP port for the web server (default: 6348)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "eryx-status.db")
    pub db_path: String,
    /// Path to the services file (default: "services.json")
    pub services_path: String,
    /// Directory of a built front-end to serve, if any
    pub static_dir: Option<String>,
    /// Per-probe timeout (default: 10s)
    pub probe_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            http_port: 6348,
            db_path: "eryx-status.db".to_string(),
            services_path: "services.json".to_string(),
            static_dir: None,
            probe_timeout: crate::probe::DEFAULT_TIMEOUT,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `ERYX_HOST`: bind address (default: 0.0.0.0)
    /// - `ERYX_PORT`: HTTP port (default: 6348)
    /// - `ERYX_DB_PATH`: database file path (default: "eryx-status.db")
    /// - `ERYX_SERVICES_PATH`: services file (default: "services.json")
    /// - `ERYX_STATIC_DIR`: front-end directory to serve (default: unset)
    /// - `ERYX_PROBE_TIMEOUT_SECS`: probe timeout in seconds (default: 10)
    pub fn load() -> Self {
        let mut cfg = Self::default();

        if let Ok(host) = env::var("ERYX_HOST") {
            cfg.host = host;
        }

        if let Ok(port_str) = env::var("ERYX_PORT") {
            if let Ok(port) = port_str.parse() {
                cfg.http_port = port;
            }
        }

        if let Ok(db_path) = env::var("ERYX_DB_PATH") {
            cfg.db_path = db_path;
        }

        if let Ok(path) = env::var("ERYX_SERVICES_PATH") {
            cfg.services_path = path;
        }

        cfg.static_dir = env::var("ERYX_STATIC_DIR").ok().filter(|d| !d.is_empty());

        if let Ok(secs) = env::var("ERYX_PROBE_TIMEOUT_SECS") {
            if let Ok(secs) = secs.parse::<u64>() {
                if secs > 0 {
                    cfg.probe_timeout = Duration::from_secs(secs);
                }
            }
        }

        cfg
    }
}

/// Configuration error types.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("services file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("failed to read services file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse services file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("service with empty id")]
    EmptyId,
    #[error("duplicate service id: {0}")]
    DuplicateId(String),
}

/// One monitored service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: String,
    pub name: String,
    /// URL for HTTP probes, host for TCP probes.
    #[serde(rename = "url")]
    pub target: String,
    #[serde(rename = "type", default)]
    pub kind: ProbeKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A point-in-time snapshot of the monitor configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Seconds between sweeps.
    #[serde(default)]
    pub check_interval: u64,
    #[serde(default)]
    pub services: Vec<ServiceDefinition>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            check_interval: DEFAULT_CHECK_INTERVAL_SECS,
            services: Vec::new(),
        }
    }
}

impl MonitorConfig {
    /// Parse and validate a configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut cfg: MonitorConfig = serde_json::from_str(json)?;
        if cfg.check_interval == 0 {
            cfg.check_interval = DEFAULT_CHECK_INTERVAL_SECS;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    /// Service ids must be non-empty and unique.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for s in &self.services {
            if s.id.is_empty() {
                return Err(ConfigError::EmptyId);
            }
            if !seen.insert(s.id.as_str()) {
                return Err(ConfigError::DuplicateId(s.id.clone()));
            }
        }
        Ok(())
    }

    pub fn service(&self, id: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.id == id)
    }
}

/// Hands out configuration snapshots and re-reads them on demand.
///
/// A snapshot is never modified after it is published; `reload` swaps in a
/// new one, so holders of the previous `Arc` keep a consistent view.
pub struct ConfigProvider {
    path: Option<PathBuf>,
    current: RwLock<Arc<MonitorConfig>>,
}

impl ConfigProvider {
    /// Read the services file. Fails if it is missing or invalid.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let cfg = read_config(&path)?;
        Ok(Self {
            path: Some(path),
            current: RwLock::new(Arc::new(cfg)),
        })
    }

    /// A provider over a fixed in-memory configuration.
    pub fn fixed(cfg: MonitorConfig) -> Self {
        Self {
            path: None,
            current: RwLock::new(Arc::new(cfg)),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<MonitorConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Discard the current snapshot and read a fresh one.
    ///
    /// On failure the previous snapshot stays in place.
    pub fn reload(&self) -> Result<Arc<MonitorConfig>, ConfigError> {
        let Some(path) = &self.path else {
            return Ok(self.snapshot());
        };

        let fresh = Arc::new(read_config(path)?);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = fresh.clone();
        tracing::info!(
            "Configuration reloaded: {} services, check interval {}s",
            fresh.services.len(),
            fresh.check_interval
        );
        Ok(fresh)
    }
}

fn read_config(path: &Path) -> Result<MonitorConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    let raw = std::fs::read_to_string(path)?;
    MonitorConfig::from_json(&raw)
}
