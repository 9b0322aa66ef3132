//! Scheduler module: runs a sweep over every configured service at a fixed
//! cadence and records one check per service.

use crate::config::{ConfigProvider, ServiceDefinition};
use crate::db::{CheckRecord, CheckStore, DbError};
use crate::probe::{elapsed_ms, run_probe, CheckResult, ProbeError};

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Time between sweeps for a configured check interval in seconds.
///
/// Cadence has minute resolution: the interval is floored to whole minutes,
/// with a minimum of one minute.
pub fn sweep_interval(check_interval_secs: u64) -> Duration {
    let mins = (check_interval_secs / 60).max(1);
    Duration::from_secs(mins * 60)
}

/// Whether a sweep that started at `tick_at` ran into the next tick.
fn overran(tick_at: Instant, period: Duration, now: Instant) -> bool {
    now >= tick_at + period
}

/// Outcome counts of one sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepSummary {
    pub checked: usize,
    pub online: usize,
}

struct Running {
    stop: broadcast::Sender<()>,
    handle: JoinHandle<()>,
}

/// Drives probes for all services. Only one sweep runs at a time.
pub struct Scheduler {
    store: Arc<dyn CheckStore>,
    config: Arc<ConfigProvider>,
    timeout: Duration,
    running: Mutex<Option<Running>>,
}

impl Scheduler {
    pub fn new(store: Arc<dyn CheckStore>, config: Arc<ConfigProvider>, timeout: Duration) -> Self {
        Self {
            store,
            config,
            timeout,
            running: Mutex::new(None),
        }
    }

    /// Start the sweep loop. The first sweep runs immediately.
    pub async fn start(self: &Arc<Self>) {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return; // Already running
        }

        let (stop_tx, stop_rx) = broadcast::channel(1);
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            this.run_loop(stop_rx).await;
        });

        *running = Some(Running {
            stop: stop_tx,
            handle,
        });
    }

    /// Stop the sweep loop, letting an in-flight sweep finish first.
    pub async fn stop(&self) {
        let running = self.running.lock().await.take();
        if let Some(running) = running {
            let _ = running.stop.send(());
            if let Err(e) = running.handle.await {
                tracing::error!("Scheduler: loop ended abnormally: {}", e);
            }
            tracing::info!("Scheduler: stopped");
        }
    }

    async fn run_loop(&self, mut stop_rx: broadcast::Receiver<()>) {
        let mut period = sweep_interval(self.config.snapshot().check_interval);
        tracing::info!("Scheduler: sweeping every {} min", period.as_secs() / 60);

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = stop_rx.recv() => break,
                tick_at = interval.tick() => {
                    // The sweep is awaited here, so the stop signal and the
                    // next tick are only observed once it has finished.
                    match self.run_sweep().await {
                        Ok(s) => tracing::info!("Sweep complete: {}/{} services online", s.online, s.checked),
                        Err(e) => tracing::error!("Sweep aborted, check store write failed: {}", e),
                    }

                    let next = sweep_interval(self.config.snapshot().check_interval);
                    if next != period {
                        tracing::info!("Scheduler: cadence changed to every {} min", next.as_secs() / 60);
                        period = next;
                        interval = tokio::time::interval_at(Instant::now() + period, period);
                        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    } else if overran(tick_at, period, Instant::now()) {
                        tracing::warn!("Sweep overran the {} min cadence, skipping a tick", period.as_secs() / 60);
                        interval.reset();
                    }
                }
            }
        }
    }

    /// Probe every configured service once, in configuration order, and
    /// append one record per service.
    ///
    /// Offline services are recorded, never escalated. A store failure aborts
    /// the rest of the sweep.
    pub async fn run_sweep(&self) -> Result<SweepSummary, DbError> {
        let cfg = self.config.snapshot();
        let mut summary = SweepSummary::default();

        for service in &cfg.services {
            let result = self.check_service(service).await;
            if let Some(err) = &result.error {
                tracing::warn!("Service {} ({}) is down: {}", service.name, service.id, err);
            }

            let record = CheckRecord::from_result(&service.id, result, Utc::now());
            self.store.append(&record)?;

            summary.checked += 1;
            if record.online {
                summary.online += 1;
            }
        }

        Ok(summary)
    }

    /// Run one probe in its own task so a crashing probe only fails its own
    /// service.
    async fn check_service(&self, service: &ServiceDefinition) -> CheckResult {
        let kind = service.kind;
        let target = service.target.clone();
        let port = service.port;
        let timeout = self.timeout;

        let start = std::time::Instant::now();
        let task = tokio::spawn(async move { run_probe(kind, &target, port, timeout).await });

        match task.await {
            Ok(result) => result,
            Err(e) => CheckResult::failed(elapsed_ms(start), &ProbeError::Fault(e.to_string())),
        }
    }
}
