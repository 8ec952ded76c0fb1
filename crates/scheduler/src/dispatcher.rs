//! The dispatcher (C6, spec.md §4.6): continuously selects eligible work,
//! claims repositories via CAS, and makes the single `StartMigration` call
//! for each — retrying rate-limited/transient failures with backoff before
//! releasing its slot. Advancing a started migration through the rest of
//! its lifecycle is the poll loop's job.

use crate::context::SchedulerContext;
use crate::options::build_migration_options;
use crate::transitions::{mark_failed, write_history, write_log};
use migrator_core::config::DestRepoExistsAction;
use migrator_core::entities::{Batch, LogLevel, Repository, RepositoryStatus};
use migrator_core::filter::{BatchFilter, RepositoryFilter};
use migrator_provider::ProviderError;
use std::sync::Arc;
use tokio::sync::{watch, Notify, Semaphore};

/// Fallback rescan cadence: catches batches started without going through
/// `enqueue_batch` (e.g. recovered from a crash) without needing a new scan
/// for every single work item.
const SCAN_FALLBACK_INTERVAL: std::time::Duration = std::time::Duration::from_secs(5);

pub struct Dispatcher {
    ctx: Arc<SchedulerContext>,
    semaphore: Arc<Semaphore>,
    notify: Arc<Notify>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<SchedulerContext>, notify: Arc<Notify>) -> Self {
        let workers = ctx.config.workers.max(1);
        Self {
            ctx,
            semaphore: Arc::new(Semaphore::new(workers)),
            notify,
        }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("dispatcher stopping: no new work will be pulled");
                        return;
                    }
                }
                _ = self.notify.notified() => {}
                _ = tokio::time::sleep(SCAN_FALLBACK_INTERVAL) => {}
            }
            if *shutdown.borrow() {
                return;
            }
            self.scan_and_dispatch().await;
        }
    }

    async fn scan_and_dispatch(&self) {
        let batches = match self.ctx.store.list_batches(&BatchFilter::new()).await {
            Ok(batches) => batches,
            Err(e) => {
                tracing::error!(error = %e, "dispatcher failed to list batches");
                return;
            }
        };

        for batch in batches {
            if batch.status == migrator_core::entities::BatchStatus::InProgress {
                self.dispatch_batch_members(&batch, false).await;
            }
            if batch.dry_run_started_at.is_some() && batch.dry_run_completed_at.is_none() {
                self.dispatch_batch_members(&batch, true).await;
            }
        }
    }

    async fn dispatch_batch_members(&self, batch: &Batch, dry_run: bool) {
        let members = match self
            .ctx
            .store
            .list_repositories(&RepositoryFilter::new().with_batch(batch.id).with_status(RepositoryStatus::Pending))
            .await
        {
            Ok(members) => members,
            Err(e) => {
                tracing::error!(batch_id = batch.id, error = %e, "dispatcher failed to list batch members");
                return;
            }
        };

        for repo in members {
            if !self.ctx.active_migrations.insert(repo.id) {
                continue;
            }
            let ctx = self.ctx.clone();
            let semaphore = self.semaphore.clone();
            let batch = batch.clone();
            tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        ctx.active_migrations.remove(&repo.id);
                        return;
                    }
                };
                process_repository(&ctx, repo, Some(batch), dry_run).await;
            });
        }
    }
}

/// Claims one repository and makes the single `StartMigration` call,
/// retrying rate-limited/transient failures with backoff (spec.md §4.6,
/// transitions 1–2 and Retry & backoff).
async fn process_repository(
    ctx: &SchedulerContext,
    repository: Repository,
    batch: Option<Batch>,
    dry_run: bool,
) {
    let target_status = if dry_run {
        RepositoryStatus::DryRunInProgress
    } else {
        RepositoryStatus::PreMigration
    };
    let phase = if dry_run { "dry_run_in_progress" } else { "pre_migration" };

    let claimed = ctx
        .store
        .claim_repository(repository.id, RepositoryStatus::Pending, target_status)
        .await;
    match claimed {
        Ok(true) => {}
        Ok(false) => {
            ctx.active_migrations.remove(&repository.id);
            return;
        }
        Err(e) => {
            tracing::error!(repository_id = repository.id, error = %e, "failed to claim repository");
            ctx.active_migrations.remove(&repository.id);
            return;
        }
    }

    if let Err(e) = write_history(
        ctx,
        repository.id,
        target_status,
        phase,
        Some("claimed by dispatcher".to_string()),
        None,
    )
    .await
    {
        tracing::error!(repository_id = repository.id, error = %e, "failed to write claim history");
    }

    let options = build_migration_options(
        &repository,
        batch.as_ref(),
        &ctx.config,
        Some(repository.profile.visibility),
        dry_run,
    );

    let max_attempts = ctx.config.max_retry_attempts.max(1);
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let adapter = ctx.providers.resolve(repository.source_id);
        match adapter.start_migration(&repository, &options).await {
            Ok(result) => {
                on_start_succeeded(ctx, repository.clone(), &options, result, dry_run).await;
                break;
            }
            Err(ProviderError::AlreadyExists(msg)) => {
                handle_dest_repo_exists(ctx, repository.clone(), msg, dry_run).await;
                break;
            }
            Err(e) if e.is_retryable() => {
                if attempt >= max_attempts {
                    let _ = mark_failed(
                        ctx,
                        repository.clone(),
                        phase,
                        format!("exhausted {max_attempts} retry attempts: {e}"),
                        dry_run,
                    )
                    .await;
                    break;
                }
                let delay = crate::backoff::delay_for_attempt(
                    attempt,
                    ctx.config.backoff_base_seconds,
                    ctx.config.backoff_cap_seconds,
                    ctx.jitter,
                );
                write_log(
                    ctx,
                    repository.id,
                    LogLevel::Warn,
                    phase,
                    "start_migration_retry",
                    format!("attempt {attempt} failed with {e}; retrying in {delay:?}"),
                )
                .await;
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                let _ = mark_failed(ctx, repository.clone(), phase, e.to_string(), dry_run).await;
                break;
            }
        }
    }

    ctx.active_migrations.remove(&repository.id);
}

async fn on_start_succeeded(
    ctx: &SchedulerContext,
    mut repository: Repository,
    options: &migrator_provider::MigrationOptions,
    result: migrator_provider::StartMigrationResult,
    dry_run: bool,
) {
    repository.source_migration_id = Some(result.source_migration_id);
    repository.is_source_locked = !dry_run && result.lock_acquired;
    if !dry_run {
        repository.destination_full_name =
            Some(format!("{}/{}", options.destination_org, options.destination_repo_name));
    }
    let next_status = if dry_run {
        RepositoryStatus::DryRunInProgress
    } else {
        RepositoryStatus::ArchiveGenerating
    };
    repository.status = next_status;

    if let Err(e) = ctx.store.update_repository(&repository).await {
        tracing::error!(repository_id = repository.id, error = %e, "failed to persist start_migration result");
        return;
    }

    if !dry_run {
        if let Err(e) = write_history(
            ctx,
            repository.id,
            RepositoryStatus::ArchiveGenerating,
            "archive_generating",
            Some("destination import started".to_string()),
            None,
        )
        .await
        {
            tracing::error!(repository_id = repository.id, error = %e, "failed to write archive_generating history");
        }
    }
}

/// spec.md §4.6, "Dest-repo-exists handling".
async fn handle_dest_repo_exists(
    ctx: &SchedulerContext,
    mut repository: Repository,
    message: String,
    dry_run: bool,
) {
    match ctx.config.dest_repo_exists_action {
        DestRepoExistsAction::Fail => {
            let _ = mark_failed(
                ctx,
                repository,
                "pre_migration",
                format!("destination already existed: {message}"),
                dry_run,
            )
            .await;
        }
        DestRepoExistsAction::Skip => {
            let target = if dry_run {
                RepositoryStatus::DryRunComplete
            } else {
                RepositoryStatus::MigrationComplete
            };
            repository.status = target;
            if let Err(e) = ctx.store.update_repository(&repository).await {
                tracing::error!(repository_id = repository.id, error = %e, "failed to persist skip-policy completion");
                return;
            }
            let _ = write_history(
                ctx,
                repository.id,
                target,
                if dry_run { "dry_run_complete" } else { "migration_complete" },
                Some(format!("destination already existed: {message}")),
                None,
            )
            .await;
        }
        // "Overwrite" is adapter-specific; our adapters don't implement it,
        // so per spec.md §4.6 ("if unsupported, treat as fail") it falls
        // through to the fail branch.
        DestRepoExistsAction::Overwrite => {
            let _ = mark_failed(
                ctx,
                repository,
                "pre_migration",
                format!("destination overwrite requested but unsupported by adapter: {message}"),
                dry_run,
            )
            .await;
        }
    }
}
