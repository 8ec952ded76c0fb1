//! Batch lifecycle service (C4, spec.md §4.4).

use async_trait::async_trait;
use chrono::Utc;
use migrator_core::entities::{Batch, BatchStatCounts, BatchStatus, Bucket, Repository};
use migrator_core::error::{Error, Result};
use migrator_core::filter::RepositoryFilter;
use migrator_storage::{BatchProgressUpdate, Store};
use std::sync::Arc;

/// The scheduler hook a `BatchService` calls when `StartBatch` succeeds
/// (spec.md §4.4: "enqueues the batch with C6"). Kept as a trait here so
/// `migrator-services` never depends on `migrator-scheduler` — the binary
/// that wires the two together implements this against the real
/// dispatcher.
#[async_trait]
pub trait BatchScheduler: Send + Sync {
    async fn enqueue_batch(&self, batch_id: i64) -> Result<()>;
}

/// A no-op scheduler hook, useful for tests and for any caller that only
/// wants to observe batch-state transitions without actually dispatching
/// work.
#[derive(Default)]
pub struct NullBatchScheduler;

#[async_trait]
impl BatchScheduler for NullBatchScheduler {
    async fn enqueue_batch(&self, _batch_id: i64) -> Result<()> {
        Ok(())
    }
}

/// Per-repository outcome of an `AddRepositoriesToBatch` call (spec.md
/// §4.4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchAddOutcome {
    pub repository_id: i64,
    pub added: bool,
    pub reason: Option<String>,
}

/// Whether a batch can be deleted right now, and why not if it can't
/// (spec.md §4.4, `CanDeleteBatch`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionEligibility {
    pub can_delete: bool,
    pub reason: Option<String>,
}

pub struct BatchWithStats {
    pub batch: Batch,
    pub counts: BatchStatCounts,
}

pub struct BatchService {
    store: Arc<dyn Store>,
    scheduler: Arc<dyn BatchScheduler>,
}

impl BatchService {
    pub fn new(store: Arc<dyn Store>, scheduler: Arc<dyn BatchScheduler>) -> Self {
        Self { store, scheduler }
    }

    /// `GetBatchWithStats` (spec.md §4.4): fetches the batch and buckets
    /// member statuses into the four counters.
    pub async fn get_batch_with_stats(&self, id: i64) -> Result<BatchWithStats> {
        let batch = self
            .store
            .get_batch(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("batch {id} not found")))?;

        let members = self
            .store
            .list_repositories(&RepositoryFilter::new().with_batch(id))
            .await?;

        let mut counts = BatchStatCounts::default();
        for repo in &members {
            match BatchStatCounts::bucket_for(repo.status) {
                Bucket::Completed => counts.completed += 1,
                Bucket::InProgress => counts.in_progress += 1,
                Bucket::Pending => counts.pending += 1,
                Bucket::Failed => counts.failed += 1,
                Bucket::None => {}
            }
        }

        Ok(BatchWithStats { batch, counts })
    }

    /// `AddRepositoriesToBatch` (spec.md §4.4): requires `status ∈ {pending,
    /// ready}`; evaluates every repository independently against C3, only
    /// sets `batch_id` on the ones that pass.
    pub async fn add_repositories_to_batch(
        &self,
        batch_id: i64,
        repository_ids: &[i64],
    ) -> Result<Vec<BatchAddOutcome>> {
        let batch = self
            .store
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("batch {batch_id} not found")))?;
        require_batch_status(&batch, &[BatchStatus::Pending, BatchStatus::Ready])?;

        let repositories = self.store.get_repositories_by_ids(repository_ids).await?;
        let mut outcomes = Vec::with_capacity(repository_ids.len());
        let mut eligible_ids = Vec::new();

        for id in repository_ids {
            let Some(repo) = repositories.iter().find(|r| r.id == *id) else {
                outcomes.push(BatchAddOutcome {
                    repository_id: *id,
                    added: false,
                    reason: Some("repository not found".to_string()),
                });
                continue;
            };
            let (eligible, reason) = migrator_eligibility::is_eligible_for_batch(repo);
            if eligible {
                eligible_ids.push(*id);
                outcomes.push(BatchAddOutcome {
                    repository_id: *id,
                    added: true,
                    reason: None,
                });
            } else {
                outcomes.push(BatchAddOutcome {
                    repository_id: *id,
                    added: false,
                    reason,
                });
            }
        }

        if !eligible_ids.is_empty() {
            self.store
                .add_repositories_to_batch(batch_id, &eligible_ids)
                .await?;
        }

        Ok(outcomes)
    }

    /// `RemoveRepositoriesFromBatch` (spec.md §4.4): requires `status ∈
    /// {pending, ready}`; a repository is removed only if its current
    /// `batch_id` equals `batch_id`.
    pub async fn remove_repositories_from_batch(
        &self,
        batch_id: i64,
        repository_ids: &[i64],
    ) -> Result<u64> {
        let batch = self
            .store
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| Error::not_found(format!("batch {batch_id} not found")))?;
        require_batch_status(&batch, &[BatchStatus::Pending, BatchStatus::Ready])?;

        self.store
            .remove_repositories_from_batch(batch_id, repository_ids)
            .await
    }

    /// `CanDeleteBatch` (spec.md §4.4): delete permitted only for `pending`
    /// batches.
    pub async fn can_delete_batch(&self, id: i64) -> Result<DeletionEligibility> {
        let batch = self
            .store
            .get_batch(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("batch {id} not found")))?;
        Ok(if batch.status == BatchStatus::Pending {
            DeletionEligibility {
                can_delete: true,
                reason: None,
            }
        } else {
            DeletionEligibility {
                can_delete: false,
                reason: Some(format!(
                    "cannot delete batch with status '{}'",
                    batch.status
                )),
            }
        })
    }

    /// `DeleteBatch` (spec.md §4.1, §4.4): the store nulls every member's
    /// `batch_id` and deletes the batch row in one transaction.
    pub async fn delete_batch(&self, id: i64) -> Result<()> {
        let eligibility = self.can_delete_batch(id).await?;
        if !eligibility.can_delete {
            return Err(Error::validation(
                eligibility
                    .reason
                    .unwrap_or_else(|| "batch cannot be deleted".to_string()),
            ));
        }
        self.store.delete_batch(id).await
    }

    /// `StartBatch` (spec.md §4.4): requires `status ∈ {pending, ready}`;
    /// rejects `migration_api = ELM` per spec.md §9's open question
    /// ("the core must reject ELM with a ValidationFailure at batch-start
    /// time rather than silently falling back"); sets `in_progress`,
    /// persists `started_at`, then enqueues with the scheduler — in that
    /// order, satisfying the concurrency invariant that no batch starts its
    /// members before `started_at` is durable (spec.md §4.6, invariant 2).
    pub async fn start_batch(&self, id: i64) -> Result<Batch> {
        let mut batch = self
            .store
            .get_batch(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("batch {id} not found")))?;
        require_batch_status(&batch, &[BatchStatus::Pending, BatchStatus::Ready])?;

        if batch.migration_api == migrator_core::entities::MigrationApi::Elm {
            return Err(Error::validation(
                "the ELM migration API is reserved; no adapter is implemented",
            ));
        }

        let started_at = Utc::now();
        self.store
            .update_batch_progress(
                id,
                &BatchProgressUpdate {
                    status: Some(BatchStatus::InProgress),
                    started_at: Some(started_at),
                    ..Default::default()
                },
            )
            .await?;
        batch.status = BatchStatus::InProgress;
        batch.started_at = Some(started_at);

        self.scheduler.enqueue_batch(id).await?;
        Ok(batch)
    }

    /// `StartDryRun` (spec.md §4.4/§4.6 dry-run branch): stamps
    /// `dry_run_started_at` without touching `batch.status`, since a dry
    /// run can run alongside (or instead of) the batch's normal lifecycle.
    /// Requires `status ∈ {pending, ready}`, same as `StartBatch`.
    pub async fn start_dry_run(&self, id: i64) -> Result<Batch> {
        let mut batch = self
            .store
            .get_batch(id)
            .await?
            .ok_or_else(|| Error::not_found(format!("batch {id} not found")))?;
        require_batch_status(&batch, &[BatchStatus::Pending, BatchStatus::Ready])?;

        if batch.dry_run_started_at.is_some() {
            return Err(Error::validation(format!(
                "batch {id} already has a dry run in progress"
            )));
        }

        let started_at = Utc::now();
        batch.dry_run_started_at = Some(started_at);
        self.store.update_batch(&batch).await?;

        self.scheduler.enqueue_batch(id).await?;
        Ok(batch)
    }
}

fn require_batch_status(batch: &Batch, allowed: &[BatchStatus]) -> Result<()> {
    if allowed.contains(&batch.status) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "batch {} has status '{}', expected one of {:?}",
            batch.id,
            batch.status,
            allowed.iter().map(|s| s.to_string()).collect::<Vec<_>>()
        )))
    }
}

/// Buckets members of `repos` that belong to `batch_id`; exposed for
/// property tests that need the bucketing in isolation from storage.
pub fn bucket_members(batch_id: i64, repos: &[Repository]) -> BatchStatCounts {
    let mut counts = BatchStatCounts::default();
    for repo in repos.iter().filter(|r| r.batch_id == Some(batch_id)) {
        match BatchStatCounts::bucket_for(repo.status) {
            Bucket::Completed => counts.completed += 1,
            Bucket::InProgress => counts.in_progress += 1,
            Bucket::Pending => counts.pending += 1,
            Bucket::Failed => counts.failed += 1,
            Bucket::None => {}
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use migrator_core::entities::{
        BatchDefaults, MigrationApi, MigrationExclusions, RepositoryProfile, RepositoryStatus,
        ValidationFindings,
    };
    use migrator_storage::MockStore;
    use pretty_assertions::assert_eq;

    fn base_batch(status: BatchStatus) -> Batch {
        Batch {
            id: 0,
            name: "B1".to_string(),
            description: None,
            batch_type: "standard".to_string(),
            status,
            migration_api: MigrationApi::Gei,
            defaults: BatchDefaults::default(),
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            dry_run_started_at: None,
            dry_run_completed_at: None,
        }
    }

    fn base_repo(status: RepositoryStatus) -> Repository {
        Repository {
            id: 0,
            full_name: "acme/alpha".to_string(),
            source_id: 1,
            source_url: "https://github.com/acme/alpha".to_string(),
            organization: None,
            profile: RepositoryProfile::default(),
            validation: ValidationFindings::default(),
            status,
            batch_id: None,
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
            discovered_at: Utc::now(),
            updated_at: Utc::now(),
            migrated_at: None,
            last_discovery_at: None,
            last_dry_run_at: None,
        }
    }

    fn service() -> (BatchService, Arc<MockStore>) {
        let store = Arc::new(MockStore::new());
        let service = BatchService::new(store.clone(), Arc::new(NullBatchScheduler));
        (service, store)
    }

    #[tokio::test]
    async fn oversized_repo_is_rejected_with_reason_and_batch_id_unchanged() {
        let (service, store) = service();
        let batch_id = store.seed_batch(base_batch(BatchStatus::Ready));
        let mut repo = base_repo(RepositoryStatus::Pending);
        repo.validation.has_oversized_repository = true;
        let repo_id = store.seed_repository(repo);

        let outcomes = service
            .add_repositories_to_batch(batch_id, &[repo_id])
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].added);
        assert!(outcomes[0].reason.as_ref().unwrap().contains("40 GiB"));
        let repo = store.get_repository_by_id(repo_id).await.unwrap().unwrap();
        assert_eq!(repo.batch_id, None);
    }

    #[tokio::test]
    async fn eligible_repo_is_added_and_batch_id_set() {
        let (service, store) = service();
        let batch_id = store.seed_batch(base_batch(BatchStatus::Pending));
        let repo_id = store.seed_repository(base_repo(RepositoryStatus::Pending));

        let outcomes = service
            .add_repositories_to_batch(batch_id, &[repo_id])
            .await
            .unwrap();

        assert!(outcomes[0].added);
        let repo = store.get_repository_by_id(repo_id).await.unwrap().unwrap();
        assert_eq!(repo.batch_id, Some(batch_id));
    }

    #[tokio::test]
    async fn add_then_remove_restores_prior_batch_id() {
        let (service, store) = service();
        let batch_id = store.seed_batch(base_batch(BatchStatus::Pending));
        let repo_id = store.seed_repository(base_repo(RepositoryStatus::Pending));

        service
            .add_repositories_to_batch(batch_id, &[repo_id])
            .await
            .unwrap();
        let removed = service
            .remove_repositories_from_batch(batch_id, &[repo_id])
            .await
            .unwrap();

        assert_eq!(removed, 1);
        let repo = store.get_repository_by_id(repo_id).await.unwrap().unwrap();
        assert_eq!(repo.batch_id, None);
    }

    #[tokio::test]
    async fn in_progress_batch_cannot_be_deleted() {
        let (service, store) = service();
        let batch_id = store.seed_batch(base_batch(BatchStatus::InProgress));

        let eligibility = service.can_delete_batch(batch_id).await.unwrap();
        assert!(!eligibility.can_delete);
        assert!(service.delete_batch(batch_id).await.is_err());
    }

    #[tokio::test]
    async fn delete_batch_nulls_every_member_batch_id() {
        let (service, store) = service();
        let batch_id = store.seed_batch(base_batch(BatchStatus::Pending));
        let mut repo = base_repo(RepositoryStatus::Pending);
        repo.batch_id = Some(batch_id);
        let repo_id = store.seed_repository(repo);

        service.delete_batch(batch_id).await.unwrap();

        assert!(store.get_batch(batch_id).await.unwrap().is_none());
        let repo = store.get_repository_by_id(repo_id).await.unwrap().unwrap();
        assert_eq!(repo.batch_id, None);
    }

    #[tokio::test]
    async fn start_batch_rejects_elm_migration_api() {
        let (service, store) = service();
        let mut batch = base_batch(BatchStatus::Ready);
        batch.migration_api = MigrationApi::Elm;
        let batch_id = store.seed_batch(batch);

        let err = service.start_batch(batch_id).await.unwrap_err();
        assert!(matches!(err, Error::ValidationFailure(_)));
    }

    #[tokio::test]
    async fn start_batch_persists_started_at_before_returning() {
        let (service, store) = service();
        let batch_id = store.seed_batch(base_batch(BatchStatus::Ready));

        let batch = service.start_batch(batch_id).await.unwrap();

        assert_eq!(batch.status, BatchStatus::InProgress);
        assert!(batch.started_at.is_some());
        let persisted = store.get_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(persisted.status, BatchStatus::InProgress);
        assert!(persisted.started_at.is_some());
    }

    #[tokio::test]
    async fn start_dry_run_stamps_started_at_without_changing_status() {
        let (service, store) = service();
        let batch_id = store.seed_batch(base_batch(BatchStatus::Ready));

        let batch = service.start_dry_run(batch_id).await.unwrap();

        assert_eq!(batch.status, BatchStatus::Ready);
        assert!(batch.dry_run_started_at.is_some());
        let persisted = store.get_batch(batch_id).await.unwrap().unwrap();
        assert_eq!(persisted.status, BatchStatus::Ready);
        assert!(persisted.dry_run_started_at.is_some());
    }

    #[tokio::test]
    async fn start_dry_run_rejected_when_already_running() {
        let (service, store) = service();
        let batch_id = store.seed_batch(base_batch(BatchStatus::Ready));
        service.start_dry_run(batch_id).await.unwrap();

        let err = service.start_dry_run(batch_id).await.unwrap_err();
        assert!(matches!(err, Error::ValidationFailure(_)));
    }
}
