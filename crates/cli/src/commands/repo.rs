//! `repo show/reset/wont-migrate`.

use super::{connect_store, load_config};
use migrator_services::RepositoryService;
use std::path::Path;
use std::sync::Arc;

fn service(store: Arc<dyn migrator_storage::Store>) -> RepositoryService {
    RepositoryService::new(store)
}

pub async fn show(config_path: Option<&Path>, full_name: String) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store: Arc<dyn migrator_storage::Store> = Arc::new(connect_store(&config).await?);
    let details = service(store).get_repository_with_details(&full_name).await?;

    let repo = &details.repository;
    println!("{} (id {})", repo.full_name, repo.id);
    println!("  status: {}", repo.status);
    println!("  batch_id: {:?}", repo.batch_id);
    println!(
        "  destination: {}",
        repo.destination_full_name.as_deref().unwrap_or("-")
    );
    if let Some(history) = &details.history {
        println!("  history entries: {}", history.len());
    }
    if let Some(dependencies) = &details.dependencies {
        println!("  dependencies: {}", dependencies.len());
    }
    Ok(())
}

pub async fn reset(config_path: Option<&Path>, full_name: String, initiated_by: Option<String>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store: Arc<dyn migrator_storage::Store> = Arc::new(connect_store(&config).await?);
    let repo = service(store)
        .reset_to_discovered(&full_name, initiated_by.as_deref())
        .await?;
    println!("{} reset to '{}'", repo.full_name, repo.status);
    Ok(())
}

pub async fn wont_migrate(
    config_path: Option<&Path>,
    full_name: String,
    initiated_by: Option<String>,
) -> anyhow::Result<()> {
    let config = load_config(config_path)?;
    let store: Arc<dyn migrator_storage::Store> = Arc::new(connect_store(&config).await?);
    let repo = service(store)
        .mark_as_wont_migrate(&full_name, initiated_by.as_deref())
        .await?;
    println!("{} marked as '{}'", repo.full_name, repo.status);
    Ok(())
}
