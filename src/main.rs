//! dbmonitor - Database Liveness and Diagnostics Service
//!
//! Exposes health, metrics, tablespace, session and read-only query
//! endpoints for one or more databases to synthetic-monitoring callers.

mod config;
mod db;
mod probe;
mod targets;
mod web;

use config::ServerConfig;
use db::ConnectionFactory;
use probe::Monitor;
use targets::TargetRegistry;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("dbmonitor=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting dbmonitor on port {}...", cfg.http_port);

    // Build the immutable target registry
    let registry = Arc::new(TargetRegistry::from_configs(cfg.targets.clone())?);
    for target in registry.list() {
        tracing::info!(
            "Registered target {} ({}) at {}",
            target.name,
            target.driver,
            target.database_identifier()
        );
    }

    let monitor = Monitor::new(registry, Arc::new(ConnectionFactory::new()));

    // Start web server
    let server = Server::new(cfg, monitor);
    server.start().await?;

    Ok(())
}
