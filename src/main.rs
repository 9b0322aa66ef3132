//! eryx-status - Service Availability Monitor
//!
//! Probes configured HTTP and TCP services on a fixed cadence, records every
//! check in SQLite and serves the aggregated status over a small JSON API.

mod config;
mod db;
mod probe;
mod scheduler;
mod status;
mod web;

use config::{ConfigProvider, ServerConfig};
use db::Store;
use scheduler::Scheduler;
use status::Aggregator;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("eryx_status=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting eryx-status on {}:{}...", cfg.host, cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // A missing or broken services file is fatal at startup.
    let services = Arc::new(ConfigProvider::load(&cfg.services_path)?);
    tracing::info!(
        "Loaded {} services from {}",
        services.snapshot().services.len(),
        cfg.services_path
    );

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized successfully");

    // Start scheduler
    let scheduler = Arc::new(Scheduler::new(store.clone(), services.clone(), cfg.probe_timeout));
    scheduler.start().await;

    // Start web server
    let aggregator = Arc::new(Aggregator::new(store, services.clone()));
    let server = Server::new(cfg, services, aggregator);
    let result = server.start(shutdown_signal()).await;

    // Let an in-flight sweep finish before exiting.
    scheduler.stop().await;

    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
