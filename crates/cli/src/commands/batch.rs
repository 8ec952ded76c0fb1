//! `batch create/add/remove/start/delete`.

use super::{connect_store, load_config};
use anyhow::Context;
use migrator_core::entities::{Batch, BatchDefaults, BatchStatus, MigrationApi};
use migrator_services::{BatchService, NullBatchScheduler};
use std::path::Path;
use std::sync::Arc;

fn service(store: Arc<dyn migrator_storage::Store>) -> BatchService {
    BatchService::new(store, Arc::new(NullBatchScheduler))
}

pub async fn create(
    config_path: Option<&Path>,
    name: String,
    batch_type: String,
    migration_api: String,
    destination_org: Option<String>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store: Arc<dyn migrator_storage::Store> = Arc::new(connect_store(&config).await?);

    let migration_api = match migration_api.to_lowercase().as_str() {
        "gei" => MigrationApi::Gei,
        "elm" => MigrationApi::Elm,
        other => anyhow::bail!("unrecognized migration api '{other}', expected 'gei' or 'elm'"),
    };

    let batch = Batch {
        id: 0,
        name,
        description: None,
        batch_type,
        status: BatchStatus::Pending,
        migration_api,
        defaults: BatchDefaults {
            destination_org,
            exclude_releases: false,
            exclude_attachments: false,
        },
        scheduled_at: None,
        started_at: None,
        completed_at: None,
        dry_run_started_at: None,
        dry_run_completed_at: None,
    };
    let created = store.create_batch(&batch).await.context("failed to create batch")?;
    println!("created batch {} ('{}')", created.id, created.name);
    Ok(())
}

pub async fn add(config_path: Option<&Path>, batch_id: i64, repository_ids: Vec<i64>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store: Arc<dyn migrator_storage::Store> = Arc::new(connect_store(&config).await?);
    let outcomes = service(store)
        .add_repositories_to_batch(batch_id, &repository_ids)
        .await?;
    for outcome in outcomes {
        if outcome.added {
            println!("repository {} added", outcome.repository_id);
        } else {
            println!(
                "repository {} skipped: {}",
                outcome.repository_id,
                outcome.reason.as_deref().unwrap_or("not eligible")
            );
        }
    }
    Ok(())
}

pub async fn remove(config_path: Option<&Path>, batch_id: i64, repository_ids: Vec<i64>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store: Arc<dyn migrator_storage::Store> = Arc::new(connect_store(&config).await?);
    let removed = service(store)
        .remove_repositories_from_batch(batch_id, &repository_ids)
        .await?;
    println!("removed {removed} repositories from batch {batch_id}");
    Ok(())
}

pub async fn start(config_path: Option<&Path>, batch_id: i64, dry_run: bool) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store: Arc<dyn migrator_storage::Store> = Arc::new(connect_store(&config).await?);
    let service = service(store);
    let batch = if dry_run {
        service.start_dry_run(batch_id).await?
    } else {
        service.start_batch(batch_id).await?
    };
    println!("batch {} status is now '{}'", batch.id, batch.status);
    Ok(())
}

pub async fn delete(config_path: Option<&Path>, batch_id: i64) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store: Arc<dyn migrator_storage::Store> = Arc::new(connect_store(&config).await?);
    service(store).delete_batch(batch_id).await?;
    println!("deleted batch {batch_id}");
    Ok(())
}
