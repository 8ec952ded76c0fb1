//! Shared helpers for writing state transitions: every status change the
//! scheduler makes is paired with a `MigrationHistory` row (for visible
//! phases) and a `MigrationLog` entry (spec.md §7: "The scheduler logs
//! every state transition, both success and failure, into MigrationLog and
//! into MigrationHistory for visible phases").

use crate::context::SchedulerContext;
use chrono::Utc;
use migrator_core::entities::{LogLevel, MigrationHistory, MigrationLog, Repository, RepositoryStatus};
use migrator_core::error::Result;

pub async fn write_history(
    ctx: &SchedulerContext,
    repository_id: i64,
    status: RepositoryStatus,
    phase: &str,
    message: Option<String>,
    error_message: Option<String>,
) -> Result<()> {
    let now = Utc::now();
    ctx.store
        .create_migration_history(&MigrationHistory {
            id: 0,
            repository_id,
            status,
            phase: phase.to_string(),
            message,
            error_message,
            started_at: now,
            completed_at: Some(now),
            duration_seconds: Some(0.0),
        })
        .await?;
    Ok(())
}

pub async fn write_log(
    ctx: &SchedulerContext,
    repository_id: i64,
    level: LogLevel,
    phase: &str,
    operation: &str,
    message: impl Into<String>,
) {
    let entry = MigrationLog {
        id: 0,
        repository_id,
        history_id: None,
        level,
        phase: phase.to_string(),
        operation: operation.to_string(),
        message: message.into(),
        detail: None,
        initiated_by: None,
        logged_at: Utc::now(),
    };
    if let Err(e) = ctx.store.create_migration_log(&entry).await {
        tracing::warn!(repository_id, error = %e, "failed to write migration log entry");
    }
}

/// Moves a repository to `migration_failed` (or `dry_run_failed` when
/// `dry_run` is set), recording `error_message` on both the repository row
/// and the history entry, then attempts a best-effort unlock (spec.md
/// §4.6, transition 5).
pub async fn mark_failed(
    ctx: &SchedulerContext,
    mut repository: Repository,
    phase: &str,
    error_message: String,
    dry_run: bool,
) -> Result<()> {
    let target_status = if dry_run {
        RepositoryStatus::DryRunFailed
    } else {
        RepositoryStatus::MigrationFailed
    };
    repository.status = target_status;
    repository.error_message = Some(error_message.clone());
    ctx.store.update_repository(&repository).await?;

    write_history(
        ctx,
        repository.id,
        target_status,
        phase,
        None,
        Some(error_message.clone()),
    )
    .await?;
    write_log(
        ctx,
        repository.id,
        LogLevel::Error,
        phase,
        "transition",
        format!("repository failed: {error_message}"),
    )
    .await;

    if !dry_run && repository.is_source_locked {
        if let Some(migration_id) = &repository.source_migration_id {
            let adapter = ctx.providers.resolve(repository.source_id);
            match adapter.unlock_source(migration_id).await {
                Ok(()) => {
                    write_log(
                        ctx,
                        repository.id,
                        LogLevel::Info,
                        phase,
                        "unlock_source",
                        "source unlocked after failure",
                    )
                    .await;
                }
                Err(e) => {
                    write_log(
                        ctx,
                        repository.id,
                        LogLevel::Warn,
                        phase,
                        "unlock_source",
                        format!("best-effort unlock failed: {e}"),
                    )
                    .await;
                }
            }
        }
    }

    Ok(())
}
