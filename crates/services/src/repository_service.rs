//! Per-repository state-transition service (C5, spec.md §4.5).

use migrator_core::entities::{MigrationHistory, Repository, RepositoryDependency, RepositoryStatus};
use migrator_core::error::{Error, Result};
use migrator_storage::Store;
use std::sync::Arc;

/// Result of `GetRepositoryWithDetails` (spec.md §4.5): sub-list failures
/// are logged, never propagated — the repository itself is the only part
/// of this call that can fail outright.
#[derive(Debug, Clone)]
pub struct RepositoryDetails {
    pub repository: Repository,
    pub history: Option<Vec<MigrationHistory>>,
    pub dependencies: Option<Vec<RepositoryDependency>>,
}

/// `GetDependencyChain` result (spec.md §4.5): only `is_local = true`
/// dependencies are returned on the outgoing side.
#[derive(Debug, Clone, Default)]
pub struct DependencyChain {
    pub dependents: Vec<Repository>,
    pub local_dependencies: Vec<RepositoryDependency>,
}

pub struct RepositoryService {
    store: Arc<dyn Store>,
}

impl RepositoryService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Fetches the repository, then concurrently attempts history and
    /// dependency sub-lists. A sub-list failure is logged but does not fail
    /// the call (spec.md §4.5, §7: "sub-operations ... swallow sub-errors
    /// and log them").
    pub async fn get_repository_with_details(&self, full_name: &str) -> Result<RepositoryDetails> {
        let repository = self
            .store
            .get_repository(full_name)
            .await?
            .ok_or_else(|| Error::not_found(format!("repository '{full_name}' not found")))?;

        let (history_result, dependencies_result) = futures::join!(
            self.store.get_migration_history(repository.id),
            self.store.get_repository_dependencies(repository.id)
        );

        let history = match history_result {
            Ok(h) => Some(h),
            Err(e) => {
                tracing::warn!(
                    repository = %full_name,
                    error = %e,
                    "failed to load migration history for GetRepositoryWithDetails"
                );
                None
            }
        };
        let dependencies = match dependencies_result {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::warn!(
                    repository = %full_name,
                    error = %e,
                    "failed to load dependencies for GetRepositoryWithDetails"
                );
                None
            }
        };

        Ok(RepositoryDetails {
            repository,
            history,
            dependencies,
        })
    }

    /// `MarkAsWontMigrate` (spec.md §4.5): guarded by
    /// `migrator_eligibility::can_mark_as_wont_migrate`; writes one
    /// MigrationHistory row describing the user-initiated transition.
    pub async fn mark_as_wont_migrate(
        &self,
        full_name: &str,
        initiated_by: Option<&str>,
    ) -> Result<Repository> {
        let mut repository = self
            .store
            .get_repository(full_name)
            .await?
            .ok_or_else(|| Error::not_found(format!("repository '{full_name}' not found")))?;

        if !migrator_eligibility::can_mark_as_wont_migrate(repository.status) {
            return Err(Error::validation(format!(
                "repository '{full_name}' has status '{}' and cannot be marked as won't-migrate",
                repository.status
            )));
        }

        let previous_status = repository.status;
        repository.status = RepositoryStatus::WontMigrate;
        self.store.update_repository(&repository).await?;
        self.record_user_transition(
            repository.id,
            RepositoryStatus::WontMigrate,
            format!("marked as won't-migrate from '{previous_status}'"),
            initiated_by,
        )
        .await?;

        Ok(repository)
    }

    /// `ResetToDiscovered` (spec.md §4.5): guarded by
    /// `migrator_eligibility::can_reset_to_discovered`; on success status
    /// becomes `pending` and `batch_id` is cleared.
    pub async fn reset_to_discovered(
        &self,
        full_name: &str,
        initiated_by: Option<&str>,
    ) -> Result<Repository> {
        let mut repository = self
            .store
            .get_repository(full_name)
            .await?
            .ok_or_else(|| Error::not_found(format!("repository '{full_name}' not found")))?;

        if !migrator_eligibility::can_reset_to_discovered(repository.status) {
            return Err(Error::validation(format!(
                "repository '{full_name}' has status '{}' and cannot be reset to discovered",
                repository.status
            )));
        }

        let previous_status = repository.status;
        repository.status = RepositoryStatus::Pending;
        repository.batch_id = None;
        self.store.update_repository(&repository).await?;
        self.record_user_transition(
            repository.id,
            RepositoryStatus::Pending,
            format!("reset to discovered from '{previous_status}'"),
            initiated_by,
        )
        .await?;

        Ok(repository)
    }

    /// `CheckBatchEligibility` (spec.md §4.5): pure delegation to C3.
    pub async fn check_batch_eligibility(
        &self,
        full_name: &str,
    ) -> Result<(bool, Option<String>)> {
        let repository = self
            .store
            .get_repository(full_name)
            .await?
            .ok_or_else(|| Error::not_found(format!("repository '{full_name}' not found")))?;
        Ok(migrator_eligibility::is_eligible_for_batch(&repository))
    }

    /// `GetDependencyChain` (spec.md §4.5): reads both directions from the
    /// Store; only `is_local = true` dependencies on the outgoing side.
    pub async fn get_dependency_chain(&self, full_name: &str) -> Result<DependencyChain> {
        let repository = self
            .store
            .get_repository(full_name)
            .await?
            .ok_or_else(|| Error::not_found(format!("repository '{full_name}' not found")))?;

        let dependents = self.store.get_dependent_repositories(full_name).await?;
        let local_dependencies = self
            .store
            .get_repository_dependencies(repository.id)
            .await?
            .into_iter()
            .filter(|d| d.is_local)
            .collect();

        Ok(DependencyChain {
            dependents,
            local_dependencies,
        })
    }

    async fn record_user_transition(
        &self,
        repository_id: i64,
        status: RepositoryStatus,
        message: String,
        initiated_by: Option<&str>,
    ) -> Result<()> {
        let now = chrono::Utc::now();
        self.store
            .create_migration_history(&MigrationHistory {
                id: 0,
                repository_id,
                status,
                phase: "user_initiated".to_string(),
                message: Some(message),
                error_message: None,
                started_at: now,
                completed_at: Some(now),
                duration_seconds: Some(0.0),
            })
            .await?;

        self.store
            .create_migration_log(&migrator_core::entities::MigrationLog {
                id: 0,
                repository_id,
                history_id: None,
                level: migrator_core::entities::LogLevel::Info,
                phase: "user_initiated".to_string(),
                operation: status.to_string(),
                message: format!("status transitioned to '{status}' by user action"),
                detail: None,
                initiated_by: initiated_by.map(str::to_string),
                logged_at: now,
            })
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use migrator_core::entities::{MigrationExclusions, RepositoryProfile, ValidationFindings};
    use migrator_storage::MockStore;
    use pretty_assertions::assert_eq;

    fn base_repo(status: RepositoryStatus) -> Repository {
        Repository {
            id: 0,
            full_name: "acme/beta".to_string(),
            source_id: 1,
            source_url: "https://github.com/acme/beta".to_string(),
            organization: None,
            profile: RepositoryProfile::default(),
            validation: ValidationFindings::default(),
            status,
            batch_id: Some(1),
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

    #[tokio::test]
    async fn reset_from_failure_clears_batch_and_sets_pending() {
        let store = Arc::new(MockStore::new());
        store.seed_repository(base_repo(RepositoryStatus::MigrationFailed));
        let service = RepositoryService::new(store.clone());

        let repo = service.reset_to_discovered("acme/beta", Some("alice")).await.unwrap();

        assert_eq!(repo.status, RepositoryStatus::Pending);
        assert_eq!(repo.batch_id, None);
        let (eligible, _) = service.check_batch_eligibility("acme/beta").await.unwrap();
        assert!(eligible);
    }

    #[tokio::test]
    async fn reset_from_pending_is_rejected() {
        let store = Arc::new(MockStore::new());
        store.seed_repository(base_repo(RepositoryStatus::Pending));
        let service = RepositoryService::new(store);

        let err = service
            .reset_to_discovered("acme/beta", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ValidationFailure(_)));
    }

    #[tokio::test]
    async fn mark_as_wont_migrate_rejected_on_complete() {
        let store = Arc::new(MockStore::new());
        store.seed_repository(base_repo(RepositoryStatus::Complete));
        let service = RepositoryService::new(store);

        let err = service
            .mark_as_wont_migrate("acme/beta", None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ValidationFailure(_)));
    }

    #[tokio::test]
    async fn mark_as_wont_migrate_writes_history_row() {
        let store = Arc::new(MockStore::new());
        let repo_id = store.seed_repository(base_repo(RepositoryStatus::MigrationFailed));
        let service = RepositoryService::new(store.clone());

        service
            .mark_as_wont_migrate("acme/beta", Some("bob"))
            .await
            .unwrap();

        let history = store.get_migration_history(repo_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, RepositoryStatus::WontMigrate);
    }

    #[tokio::test]
    async fn get_repository_with_details_returns_partial_result_on_not_found_repo() {
        let store = Arc::new(MockStore::new());
        let service = RepositoryService::new(store);

        let err = service
            .get_repository_with_details("ghost/repo")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
