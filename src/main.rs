//! `parkbestd`: opens the configured store, wires the service and runs the expiry sweeps
//! until Ctrl-C.

use std::sync::Arc;

use anyhow::Context;
use parkbest_core::builders::build_service;
use parkbest_core::config::ParkingConfig;
use parkbest_core::core::AppResult;
use parkbest_core::infra::{ConfiguredStore, SandboxGateway};
use parkbest_core::runtime::health;
use parkbest_core::util::{init_tracing, SystemClock};

#[tokio::main]
async fn main() -> AppResult<()> {
    let cfg = ParkingConfig::from_env()
        .map_err(anyhow::Error::msg)
        .context("loading configuration")?;
    init_tracing();

    let store = Arc::new(ConfiguredStore::open(&cfg.store).context("opening store")?);
    tracing::info!(backend = store.kind(), gateway = ?cfg.gateway, "starting parkbestd");

    let parts = build_service(&cfg, store, SandboxGateway::new(), Arc::new(SystemClock))
        .context("wiring service")?;
    parts.scheduler.start();
    tracing::info!(healthy = health().ok, "parkbestd ready");

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    tracing::info!("shutdown requested");
    parts.scheduler.stop().await;
    Ok(())
}
