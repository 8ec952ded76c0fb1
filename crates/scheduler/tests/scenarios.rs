//! End-to-end scheduler scenarios (spec.md §8): drives the real dispatcher,
//! poll loop, and supervisor tasks against a `MockStore` and
//! `MockProviderAdapter`, with virtual time so backoff and poll intervals
//! resolve without real wall-clock waits.

use migrator_core::config::{DestRepoExistsAction, MigrationConfig, PostMigrationMode};
use migrator_core::entities::{
    Batch, BatchDefaults, BatchStatus, MigrationApi, MigrationExclusions, Repository,
    RepositoryProfile, RepositoryStatus, ValidationFindings,
};
use migrator_provider::{MigrationPhase, MockProviderAdapter, ProviderError};
use migrator_scheduler::{ProviderRegistry, Scheduler};
use migrator_services::BatchScheduler;
use migrator_storage::MockStore;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

fn repo(batch_id: i64) -> Repository {
    Repository {
        id: 0,
        full_name: "acme/alpha".to_string(),
        source_id: 1,
        source_url: "https://github.com/acme/alpha".to_string(),
        organization: None,
        profile: RepositoryProfile::default(),
        validation: ValidationFindings::default(),
        status: RepositoryStatus::Pending,
        batch_id: Some(batch_id),
        priority: 0,
        destination_full_name: None,
        destination_url: None,
        source_migration_id: None,
        is_source_locked: false,
        exclusions: MigrationExclusions::default(),
        validation_status: None,
        validation_details: None,
        destination_data: None,
        error_message: None,
        discovered_at: chrono::Utc::now(),
        updated_at: chrono::Utc::now(),
        migrated_at: None,
        last_discovery_at: None,
        last_dry_run_at: None,
    }
}

fn batch() -> Batch {
    Batch {
        id: 0,
        name: "B1".to_string(),
        description: None,
        batch_type: "standard".to_string(),
        status: BatchStatus::InProgress,
        migration_api: MigrationApi::Gei,
        defaults: BatchDefaults {
            destination_org: Some("acme-dest".to_string()),
            exclude_releases: false,
            exclude_attachments: false,
        },
        scheduled_at: None,
        started_at: Some(chrono::Utc::now()),
        completed_at: None,
        dry_run_started_at: None,
        dry_run_completed_at: None,
    }
}

fn config() -> MigrationConfig {
    MigrationConfig {
        workers: 2,
        poll_interval_seconds: 1,
        post_migration_mode: PostMigrationMode::Always,
        dest_repo_exists_action: DestRepoExistsAction::Fail,
        visibility_handling: Default::default(),
        max_retry_attempts: 5,
        backoff_base_seconds: 2,
        backoff_cap_seconds: 600,
    }
}

/// S1: happy path. A single repository runs pre_migration through
/// migration_complete, passes validation (default profile counts are all
/// zero, so every ratio is `None` and the verdict is `Passed`), lands on
/// `complete`, and the owning batch is marked `completed`. Exactly 5
/// `MigrationHistory` rows are written: claim, archive_generating,
/// archive_uploading, migration_in_progress, migration_complete.
#[tokio::test(start_paused = true)]
async fn s1_happy_path_reaches_complete_with_five_history_rows() {
    let store = Arc::new(MockStore::new());
    let batch_id = store.seed_batch(batch());
    let repo_id = store.seed_repository(repo(batch_id));

    let adapter = Arc::new(MockProviderAdapter::new());
    // The dispatcher's single start_migration call will allocate id "1"
    // since this is the only repository in flight.
    adapter.enqueue_phase("1", MigrationPhase::InProgress, Some(25.0), None);
    adapter.enqueue_phase("1", MigrationPhase::InProgress, Some(75.0), None);
    adapter.enqueue_phase("1", MigrationPhase::Succeeded, Some(100.0), None);

    let providers = ProviderRegistry::new(adapter.clone());
    let scheduler = Scheduler::spawn_with_jitter(store.clone(), providers, config(), false);
    scheduler.enqueue_batch(batch_id).await.unwrap();

    tokio::time::sleep(Duration::from_secs(120)).await;

    let final_repo = store.get_repository_by_id(repo_id).await.unwrap().unwrap();
    assert_eq!(final_repo.status, RepositoryStatus::Complete);
    assert!(final_repo.migrated_at.is_some());
    assert_eq!(
        final_repo.destination_full_name.as_deref(),
        Some("acme-dest/alpha")
    );

    let history = store.get_migration_history(repo_id).await.unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(history[0].status, RepositoryStatus::PreMigration);
    assert_eq!(history[1].status, RepositoryStatus::ArchiveGenerating);
    assert_eq!(history[2].status, RepositoryStatus::ArchiveUploading);
    assert_eq!(history[3].status, RepositoryStatus::MigrationInProgress);
    assert_eq!(history[4].status, RepositoryStatus::MigrationComplete);

    let final_batch = store.get_batch(batch_id).await.unwrap().unwrap();
    assert_eq!(final_batch.status, BatchStatus::Completed);
    assert!(final_batch.completed_at.is_some());
}

/// S2: the destination rate-limits the first two `StartMigration` calls.
/// With jitter disabled the cumulative backoff before the third (and
/// successful) attempt is exactly `2 + 4 = 6` seconds, and no duplicate
/// `pre_migration` history row is written across the retries.
#[tokio::test(start_paused = true)]
async fn s2_rate_limited_start_retries_then_succeeds_with_one_pre_migration_row() {
    let store = Arc::new(MockStore::new());
    let batch_id = store.seed_batch(batch());
    let repo_id = store.seed_repository(repo(batch_id));

    let adapter = Arc::new(MockProviderAdapter::new());
    adapter.enqueue_rate_limited("acme/alpha", 2);
    adapter.enqueue_phase("1", MigrationPhase::Succeeded, Some(100.0), None);

    let providers = ProviderRegistry::new(adapter.clone());
    let scheduler = Scheduler::spawn_with_jitter(store.clone(), providers, config(), false);
    scheduler.enqueue_batch(batch_id).await.unwrap();

    tokio::time::sleep(Duration::from_secs(120)).await;

    let history = store.get_migration_history(repo_id).await.unwrap();
    let pre_migration_rows = history
        .iter()
        .filter(|h| h.status == RepositoryStatus::PreMigration)
        .count();
    assert_eq!(pre_migration_rows, 1);

    let final_repo = store.get_repository_by_id(repo_id).await.unwrap().unwrap();
    assert_eq!(final_repo.status, RepositoryStatus::Complete);

    let retry_logs: Vec<_> = store
        .get_migration_logs(repo_id, None, None, 100, 0)
        .await
        .unwrap()
        .into_iter()
        .filter(|l| l.operation == "start_migration_retry")
        .collect();
    assert_eq!(retry_logs.len(), 2);
}

/// S4: the destination already has a repository at the requested location.
/// With `dest_repo_exists_action = skip`, the repository goes straight to
/// `migration_complete` without ever running validation (no
/// `destination_full_name` is recorded, since the adapter never actually
/// created anything), and the history message records why.
#[tokio::test(start_paused = true)]
async fn s4_destination_exists_with_skip_policy_completes_without_validation() {
    let store = Arc::new(MockStore::new());
    let batch_id = store.seed_batch(batch());
    let repo_id = store.seed_repository(repo(batch_id));

    let adapter = Arc::new(MockProviderAdapter::new());
    adapter.enqueue_start_response(
        "acme/alpha",
        Err(ProviderError::AlreadyExists(
            "acme-dest/alpha already exists".to_string(),
        )),
    );

    let providers = ProviderRegistry::new(adapter.clone());
    let mut cfg = config();
    cfg.dest_repo_exists_action = DestRepoExistsAction::Skip;
    let scheduler = Scheduler::spawn_with_jitter(store.clone(), providers, cfg, false);
    scheduler.enqueue_batch(batch_id).await.unwrap();

    tokio::time::sleep(Duration::from_secs(30)).await;

    let final_repo = store.get_repository_by_id(repo_id).await.unwrap().unwrap();
    assert_eq!(final_repo.status, RepositoryStatus::MigrationComplete);
    assert_eq!(final_repo.validation_status, None);
    assert!(final_repo.destination_full_name.is_none());

    let history = store.get_migration_history(repo_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, RepositoryStatus::PreMigration);
    assert_eq!(history[1].status, RepositoryStatus::MigrationComplete);
    assert!(history[1]
        .message
        .as_ref()
        .unwrap()
        .contains("destination already existed"));
}

/// Dry runs never write an `archive_generating`/`archive_uploading`/
/// `migration_in_progress` history trail and never touch `batch.status`.
#[tokio::test(start_paused = true)]
async fn dry_run_completes_without_touching_batch_status() {
    let store = Arc::new(MockStore::new());
    let mut b = batch();
    b.status = BatchStatus::Ready;
    b.started_at = None;
    b.dry_run_started_at = Some(chrono::Utc::now());
    let batch_id = store.seed_batch(b);
    let repo_id = store.seed_repository(repo(batch_id));

    let adapter = Arc::new(MockProviderAdapter::new());
    adapter.enqueue_phase("1", MigrationPhase::Succeeded, Some(100.0), None);

    let providers = ProviderRegistry::new(adapter.clone());
    let scheduler = Scheduler::spawn_with_jitter(store.clone(), providers, config(), false);
    scheduler.enqueue_batch(batch_id).await.unwrap();

    tokio::time::sleep(Duration::from_secs(60)).await;

    let final_repo = store.get_repository_by_id(repo_id).await.unwrap().unwrap();
    assert_eq!(final_repo.status, RepositoryStatus::DryRunComplete);
    assert!(final_repo.last_dry_run_at.is_some());

    let final_batch = store.get_batch(batch_id).await.unwrap().unwrap();
    assert_eq!(final_batch.status, BatchStatus::Ready);
    assert!(final_batch.dry_run_completed_at.is_some());

    let history = store.get_migration_history(repo_id).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].status, RepositoryStatus::DryRunInProgress);
    assert_eq!(history[1].status, RepositoryStatus::DryRunComplete);
}
