//! Subcommand bodies, one module per `clap` subcommand group.

pub mod batch;
pub mod migrate;
pub mod repo;
pub mod serve;

use anyhow::Context;
use migrator_core::config::Config;
use std::path::Path;

/// Shared config-loading path every subcommand goes through: global config
/// unless `--config` points somewhere else, per `Config::load`.
pub fn load_config(config_path: Option<&Path>) -> anyhow::Result<Config> {
    Config::load(config_path).context("failed to load configuration")
}

pub async fn connect_store(config: &Config) -> anyhow::Result<migrator_storage::PostgresStore> {
    migrator_storage::PostgresStore::connect(&config.database.dsn)
        .await
        .context("failed to connect to the migration store")
}
