//! `serve`: runs the dispatcher, poll loop, and supervisor until the process
//! receives a shutdown signal.

use super::{connect_store, load_config};
use anyhow::Context;
use migrator_scheduler::{ProviderRegistry, Scheduler};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub async fn run(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = Arc::new(connect_store(&config).await?);
    let providers: ProviderRegistry = crate::build_provider_registry(&config);

    info!(
        workers = config.migration.workers,
        poll_interval_seconds = config.migration.poll_interval_seconds,
        "starting scheduler"
    );
    let scheduler = Scheduler::spawn(store, providers, config.migration.clone());

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("shutdown signal received");
    scheduler.shutdown();

    Ok(())
}
