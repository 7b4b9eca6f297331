//! SAKURA Cloud Exporter
//!
//! Serves Prometheus metrics for the resources of one SAKURA Cloud account.
//! Every scrape queries the cloud API live; only billing data is cached.

use anyhow::{Context, Result};
use clap::Parser;
use exporter_lib::{
    client::{ApiClient, BillingApi, ClientConfig},
    collector::build_collectors,
    health::HealthRegistry,
    observability::{ExporterMetrics, StructuredLogger},
    scrape::CollectorSet,
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod api;
mod config;

const EXPORTER_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let cli = config::Cli::parse();
    let config = config::ExporterConfig::load(&cli)?;

    // Initialize tracing with JSON output and env filter
    let default_level = if config.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(fmt::layer().json())
        .init();

    info!(version = EXPORTER_VERSION, "Starting sakuracloud-exporter");

    let client = Arc::new(
        ApiClient::new(ClientConfig {
            root_url: config.api_root_url.clone(),
            token: config.token.clone(),
            secret: config.secret.clone(),
            timeout: config.api_timeout(),
            ..ClientConfig::default()
        })
        .context("Failed to create API client")?,
    );

    let health_registry = HealthRegistry::new();

    // Refuse to start with credentials the API does not accept
    let auth = client
        .auth_status()
        .await
        .context("Failed to verify API credentials")?;
    health_registry.record_credentials_verified().await;
    info!(account_id = %auth.account.id, account_name = %auth.account.name, "Credentials verified");

    let metrics = ExporterMetrics::new();
    metrics.set_build_info(EXPORTER_VERSION);

    let logger = StructuredLogger::new(&config.webaddr);

    let collectors = build_collectors(client, &auth.account.id, &config.disabled_collectors);
    for collector in &collectors {
        metrics.init_collector(collector.name());
        health_registry.register(collector.name()).await;
    }

    let collector_set = CollectorSet::new(collectors, config.zones.clone(), Arc::new(metrics.clone()))
        .with_logger(logger.clone());
    info!(collectors = ?collector_set.names(), "Collectors enabled");
    logger.log_startup(EXPORTER_VERSION, &auth.account.id, &config.zones);

    let app_state = Arc::new(api::AppState::new(
        health_registry.clone(),
        metrics,
        collector_set,
        config.webpath.clone(),
    ));

    health_registry.mark_ready().await;

    api::serve(&config.webaddr, app_state, shutdown_signal(logger)).await?;

    info!("Shutting down");
    Ok(())
}

async fn shutdown_signal(logger: StructuredLogger) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    logger.log_shutdown("SIGINT received");
}
