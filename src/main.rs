// Main entry point - Dependency injection and sampling/server startup
mod application;
mod domain;
mod infrastructure;
mod presentation;

use std::collections::BTreeMap;
use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing_subscriber::EnvFilter;

use crate::application::battery_gateway::DeviceDiscovery;
use crate::application::energy_monitor::EnergyMonitor;
use crate::application::sampler::Sampler;
use crate::application::state_store::StateStore;
use crate::infrastructure::config::load_app_config;
use crate::infrastructure::discovery_client::DiscoveryClient;
use crate::infrastructure::json_state_store::JsonFileStateStore;
use crate::infrastructure::sonnen_client::SonnenClient;
use crate::presentation::app_state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_app_config().context("Failed to load configuration")?;

    // Shared adapters (infrastructure layer)
    let discovery: Arc<dyn DeviceDiscovery> = Arc::new(DiscoveryClient::new(
        config.discovery_url.clone(),
        config.request_timeout(),
    )?);
    let store: Arc<dyn StateStore> = Arc::new(JsonFileStateStore::new(&config.state_dir));

    // One monitor and sampling task per device (application layer)
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut monitors = BTreeMap::new();
    let mut sampling_tasks = JoinSet::new();

    for device in &config.devices {
        let reader = Arc::new(SonnenClient::new(device.token.clone(), config.request_timeout())?);
        let sampler = Sampler::new(
            device.id.clone(),
            device.address.clone(),
            reader,
            discovery.clone(),
        );
        let monitor = Arc::new(EnergyMonitor::restore(sampler, store.clone()).await);

        sampling_tasks.spawn(monitor.clone().run(config.poll_interval(), shutdown_rx.clone()));
        monitors.insert(device.id.clone(), monitor);
    }

    if monitors.is_empty() {
        tracing::warn!("No devices configured, only the HTTP API will run");
    }

    // Build router (presentation layer)
    let router = presentation::router(Arc::new(AppState { monitors }));

    // Start server
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("Invalid listen address {}", config.listen_addr))?;
    tracing::info!("Starting sonnen-energy service on {}", addr);

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;

    // Let in-flight ticks finish and persist before exiting
    tracing::info!("Shutting down sampling tasks");
    let _ = shutdown_tx.send(true);
    while sampling_tasks.join_next().await.is_some() {}

    Ok(())
}
