//! The poll loop (C6, spec.md §4.6, transition 3): advances every
//! in-flight migration by at most one status step per tick, and triggers
//! post-migration validation on completion.

use crate::context::SchedulerContext;
use crate::transitions::{mark_failed, write_history, write_log};
use migrator_core::entities::{LogLevel, Repository, RepositoryStatus, ValidationStatus};
use migrator_core::config::PostMigrationMode;
use migrator_core::filter::RepositoryFilter;
use migrator_eligibility::{classify_validation, ValidationDeltas};
use migrator_provider::{MigrationPhase, MigrationStateReport};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::interval;

const IN_FLIGHT_STATUSES: &[RepositoryStatus] = &[
    RepositoryStatus::ArchiveGenerating,
    RepositoryStatus::ArchiveUploading,
    RepositoryStatus::MigrationInProgress,
    RepositoryStatus::DryRunInProgress,
];

pub struct PollLoop {
    ctx: Arc<SchedulerContext>,
}

impl PollLoop {
    pub fn new(ctx: Arc<SchedulerContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(std::time::Duration::from_secs(self.ctx.config.poll_interval_seconds.max(1)));
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("poll loop stopping");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    self.tick().await;
                }
            }
            if *shutdown.borrow() {
                return;
            }
        }
    }

    async fn tick(&self) {
        for status in IN_FLIGHT_STATUSES {
            let repos = match self
                .ctx
                .store
                .list_repositories(&RepositoryFilter::new().with_status(*status))
                .await
            {
                Ok(repos) => repos,
                Err(e) => {
                    tracing::error!(status = %status, error = %e, "poll loop failed to list in-flight repositories");
                    continue;
                }
            };
            for repo in repos {
                if repo.source_migration_id.is_none() {
                    continue;
                }
                self.ctx.rate_limiter.acquire(repo.source_id).await;
                self.poll_one(repo).await;
            }
        }
    }

    async fn poll_one(&self, repository: Repository) {
        let dry_run = repository.status == RepositoryStatus::DryRunInProgress;
        let migration_id = match &repository.source_migration_id {
            Some(id) => id.clone(),
            None => return,
        };
        let adapter = self.ctx.providers.resolve(repository.source_id);
        let report = match adapter.get_migration_state(&migration_id).await {
            Ok(report) => report,
            Err(e) if e.is_retryable() => {
                write_log(
                    &self.ctx,
                    repository.id,
                    LogLevel::Warn,
                    "poll",
                    "get_migration_state_retry",
                    format!("transient poll failure: {e}"),
                )
                .await;
                return;
            }
            Err(e) => {
                let _ = mark_failed(&self.ctx, repository, "poll", e.to_string(), dry_run).await;
                return;
            }
        };

        match report.phase {
            MigrationPhase::Queued => {}
            MigrationPhase::InProgress => self.advance_one_step(repository, &report, dry_run).await,
            MigrationPhase::Succeeded => self.complete(repository, dry_run).await,
            MigrationPhase::Failed => {
                let message = report
                    .error_message
                    .unwrap_or_else(|| "destination reported migration failure".to_string());
                let _ = mark_failed(&self.ctx, repository, "poll", message, dry_run).await;
            }
            MigrationPhase::NotFound => {
                let _ = mark_failed(
                    &self.ctx,
                    repository,
                    "poll",
                    "destination no longer recognizes this migration id".to_string(),
                    dry_run,
                )
                .await;
            }
        }
    }

    /// Advances exactly one step along the happy path (spec.md §4.6,
    /// transition 3: "never skips a status even if the destination reports
    /// a later phase in a single poll").
    async fn advance_one_step(&self, mut repository: Repository, report: &MigrationStateReport, dry_run: bool) {
        if dry_run {
            return;
        }
        let next = match repository.status {
            RepositoryStatus::ArchiveGenerating => Some((RepositoryStatus::ArchiveUploading, "archive_uploading")),
            RepositoryStatus::ArchiveUploading => {
                Some((RepositoryStatus::MigrationInProgress, "migration_in_progress"))
            }
            _ => None,
        };
        let Some((next_status, phase)) = next else {
            return;
        };
        repository.status = next_status;
        if let Err(e) = self.ctx.store.update_repository(&repository).await {
            tracing::error!(repository_id = repository.id, error = %e, "failed to persist poll advance");
            return;
        }
        if let Err(e) = write_history(
            &self.ctx,
            repository.id,
            next_status,
            phase,
            report.progress_percent.map(|p| format!("{p:.0}% reported by destination")),
            None,
        )
        .await
        {
            tracing::error!(repository_id = repository.id, error = %e, "failed to write poll-advance history");
        }
    }

    async fn complete(&self, mut repository: Repository, dry_run: bool) {
        let source_migration_id = repository.source_migration_id.clone();

        if dry_run {
            repository.status = RepositoryStatus::DryRunComplete;
            repository.last_dry_run_at = Some(chrono::Utc::now());
            if let Err(e) = self.ctx.store.update_repository(&repository).await {
                tracing::error!(repository_id = repository.id, error = %e, "failed to persist dry-run completion");
                return;
            }
            let _ = write_history(
                &self.ctx,
                repository.id,
                RepositoryStatus::DryRunComplete,
                "dry_run_complete",
                Some("dry run completed successfully".to_string()),
                None,
            )
            .await;
            return;
        }

        repository.status = RepositoryStatus::MigrationComplete;
        repository.migrated_at = Some(chrono::Utc::now());
        if let Err(e) = self.ctx.store.update_repository(&repository).await {
            tracing::error!(repository_id = repository.id, error = %e, "failed to persist migration completion");
            return;
        }
        if let Err(e) = write_history(
            &self.ctx,
            repository.id,
            RepositoryStatus::MigrationComplete,
            "migration_complete",
            Some("destination import succeeded".to_string()),
            None,
        )
        .await
        {
            tracing::error!(repository_id = repository.id, error = %e, "failed to write migration_complete history");
            return;
        }

        if repository.is_source_locked {
            if let Some(migration_id) = &source_migration_id {
                let adapter = self.ctx.providers.resolve(repository.source_id);
                if let Err(e) = adapter.unlock_source(migration_id).await {
                    write_log(
                        &self.ctx,
                        repository.id,
                        LogLevel::Warn,
                        "migration_complete",
                        "unlock_source",
                        format!("best-effort unlock after success failed: {e}"),
                    )
                    .await;
                } else {
                    repository.is_source_locked = false;
                    let _ = self.ctx.store.update_repository(&repository).await;
                }
            }
        }

        self.run_post_migration_validation(repository).await;
    }

    /// Validation disabled (spec.md §4.6 transition 4: "advances to
    /// `complete` iff validation passes or is disabled"). Mirrors the
    /// `Passed` branch below minus the actual destination comparison.
    async fn complete_without_validation(&self, mut repository: Repository) {
        repository.status = RepositoryStatus::Complete;
        if let Err(e) = self.ctx.store.update_repository(&repository).await {
            tracing::error!(
                repository_id = repository.id,
                error = %e,
                "failed to persist completion with post-migration validation disabled"
            );
        }
    }

    /// spec.md §4.6: "`post_migration_mode` controls whether
    /// `ValidateDestinationRepo` runs automatically after a successful
    /// migration." `ProductionOnly` has no distinct signal to key off in
    /// this data model, so it is treated the same as `Always` (documented
    /// in the grounding ledger).
    async fn run_post_migration_validation(&self, mut repository: Repository) {
        let should_validate = !matches!(self.ctx.config.post_migration_mode, PostMigrationMode::Off);
        if !should_validate {
            self.complete_without_validation(repository).await;
            return;
        }
        let Some(destination_full_name) = repository.destination_full_name.clone() else {
            return;
        };
        let Some((org, name)) = destination_full_name.split_once('/') else {
            return;
        };

        let adapter = self.ctx.providers.resolve(repository.source_id);
        let snapshot = match adapter.validate_destination_repo(org, name).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                write_log(
                    &self.ctx,
                    repository.id,
                    LogLevel::Warn,
                    "validation",
                    "validate_destination_repo",
                    format!("post-migration validation call failed: {e}"),
                )
                .await;
                return;
            }
        };

        let ratio = |source: u64, dest: u64| -> Option<f64> {
            if source == 0 {
                None
            } else {
                Some(dest as f64 / source as f64)
            }
        };
        let deltas = ValidationDeltas {
            size_ratio: ratio(repository.profile.total_size_bytes, snapshot.size_bytes),
            commit_count_ratio: ratio(repository.profile.commit_count, snapshot.commit_count),
            issue_count_ratio: None,
            pr_count_ratio: None,
            branch_count_ratio: ratio(repository.profile.branch_count, snapshot.branch_count),
        };
        let status = classify_validation(&deltas);

        repository.validation_status = Some(status);
        repository.validation_details = Some(serde_json::json!({
            "size_bytes": snapshot.size_bytes,
            "commit_count": snapshot.commit_count,
            "issue_count": snapshot.issue_count,
            "pr_count": snapshot.pr_count,
            "branch_count": snapshot.branch_count,
            "release_count": snapshot.release_count,
        }));
        if status == ValidationStatus::Passed {
            repository.status = RepositoryStatus::Complete;
        }

        if let Err(e) = self.ctx.store.update_repository(&repository).await {
            tracing::error!(repository_id = repository.id, error = %e, "failed to persist validation result");
            return;
        }
        write_log(
            &self.ctx,
            repository.id,
            if status == ValidationStatus::Failed {
                LogLevel::Error
            } else {
                LogLevel::Info
            },
            "validation",
            "validate_destination_repo",
            format!("post-migration validation result: {status}"),
        )
        .await;
    }
}
