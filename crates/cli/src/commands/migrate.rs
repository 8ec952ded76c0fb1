//! `migrate status`: prints a rollup of repository/batch counts and the
//! setup and discovery progress markers.

use super::{connect_store, load_config};
use migrator_core::entities::RepositoryStatus;
use migrator_core::filter::{BatchFilter, RepositoryFilter};
use migrator_storage::Store;
use std::path::Path;

const ALL_STATUSES: &[RepositoryStatus] = &[
    RepositoryStatus::Pending,
    RepositoryStatus::PreMigration,
    RepositoryStatus::ArchiveGenerating,
    RepositoryStatus::ArchiveUploading,
    RepositoryStatus::MigrationInProgress,
    RepositoryStatus::MigrationComplete,
    RepositoryStatus::Complete,
    RepositoryStatus::DryRunInProgress,
    RepositoryStatus::DryRunComplete,
    RepositoryStatus::DryRunFailed,
    RepositoryStatus::MigrationFailed,
    RepositoryStatus::RolledBack,
    RepositoryStatus::WontMigrate,
];

pub async fn status(config_path: Option<&Path>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store = connect_store(&config).await?;

    let setup = store.get_setup_status().await?;
    let discovery = store.get_discovery_progress().await?;
    let batches = store.list_batches(&BatchFilter::new()).await?;

    println!(
        "setup: {}",
        if setup.completed { "complete" } else { "in progress" }
    );
    println!(
        "discovery: {} repositories discovered, {} profiled",
        discovery.repositories_discovered, discovery.repositories_profiled
    );
    println!("batches: {}", batches.len());
    println!("repositories by status:");
    for status in ALL_STATUSES {
        let count = store
            .count_repositories(&RepositoryFilter::new().with_status(*status))
            .await?;
        if count > 0 {
            println!("  {status:<22} {count}");
        }
    }

    Ok(())
}
