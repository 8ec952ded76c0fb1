//! Batch-completion supervisor (spec.md §4.4/§4.6): watches `in_progress`
//! and in-flight-dry-run batches and flips them to `completed` (or stamps
//! `dry_run_completed_at`) once every member has reached a terminal state.

use crate::context::SchedulerContext;
use migrator_core::entities::{Batch, BatchStatus, RepositoryStatus};
use migrator_core::filter::{BatchFilter, RepositoryFilter};
use migrator_storage::BatchProgressUpdate;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::interval;

const SUPERVISOR_INTERVAL: std::time::Duration = std::time::Duration::from_secs(10);

pub struct Supervisor {
    ctx: Arc<SchedulerContext>,
}

impl Supervisor {
    pub fn new(ctx: Arc<SchedulerContext>) -> Self {
        Self { ctx }
    }

    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(SUPERVISOR_INTERVAL);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("supervisor stopping");
                        return;
                    }
                }
                _ = ticker.tick() => {
                    self.sweep().await;
                }
            }
            if *shutdown.borrow() {
                return;
            }
        }
    }

    async fn sweep(&self) {
        let batches = match self.ctx.store.list_batches(&BatchFilter::new()).await {
            Ok(batches) => batches,
            Err(e) => {
                tracing::error!(error = %e, "supervisor failed to list batches");
                return;
            }
        };

        for batch in batches {
            if batch.status == BatchStatus::InProgress {
                self.check_batch_completion(&batch).await;
            }
            if batch.dry_run_started_at.is_some() && batch.dry_run_completed_at.is_none() {
                self.check_dry_run_completion(&batch).await;
            }
        }
    }

    async fn check_batch_completion(&self, batch: &Batch) {
        let members = match self
            .ctx
            .store
            .list_repositories(&RepositoryFilter::new().with_batch(batch.id))
            .await
        {
            Ok(members) => members,
            Err(e) => {
                tracing::error!(batch_id = batch.id, error = %e, "supervisor failed to list batch members");
                return;
            }
        };

        let still_running = members.iter().any(|r| {
            matches!(
                r.status,
                RepositoryStatus::Pending
                    | RepositoryStatus::PreMigration
                    | RepositoryStatus::ArchiveGenerating
                    | RepositoryStatus::ArchiveUploading
                    | RepositoryStatus::MigrationInProgress
            )
        });
        if still_running || members.is_empty() {
            return;
        }

        let any_failed = members
            .iter()
            .any(|r| r.status == RepositoryStatus::MigrationFailed);
        let final_status = if any_failed {
            BatchStatus::Failed
        } else {
            BatchStatus::Completed
        };

        let completed_at = chrono::Utc::now();
        if let Err(e) = self
            .ctx
            .store
            .update_batch_progress(
                batch.id,
                &BatchProgressUpdate {
                    status: Some(final_status),
                    completed_at: Some(completed_at),
                    ..Default::default()
                },
            )
            .await
        {
            tracing::error!(batch_id = batch.id, status = %final_status, error = %e, "failed to update batch status");
            return;
        }
        tracing::info!(
            batch_id = batch.id,
            status = %final_status,
            "batch finished: every member reached a terminal state"
        );
    }

    async fn check_dry_run_completion(&self, batch: &Batch) {
        let members = match self
            .ctx
            .store
            .list_repositories(&RepositoryFilter::new().with_batch(batch.id))
            .await
        {
            Ok(members) => members,
            Err(e) => {
                tracing::error!(batch_id = batch.id, error = %e, "supervisor failed to list dry-run batch members");
                return;
            }
        };
        let still_running = members
            .iter()
            .any(|r| r.status == RepositoryStatus::DryRunInProgress);
        if still_running {
            return;
        }

        let mut updated = batch.clone();
        updated.dry_run_completed_at = Some(chrono::Utc::now());
        if let Err(e) = self.ctx.store.update_batch(&updated).await {
            tracing::error!(batch_id = batch.id, error = %e, "failed to stamp dry_run_completed_at");
            return;
        }
        tracing::info!(batch_id = batch.id, "dry run completed for every member");
    }
}
