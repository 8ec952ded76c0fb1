#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod error;
pub mod mock;
pub mod postgres;

pub use mock::MockStore;
pub use postgres::PostgresStore;

use async_trait::async_trait;
use migrator_core::entities::{
    Batch, DiscoveryProgress, MigrationHistory, MigrationLog, Repository, RepositoryDependency,
    SetupStatus, Source,
};
use migrator_core::error::Result;
use migrator_core::filter::{BatchFilter, RepositoryFilter, SourceFilter};

/// Fields a caller may update in a single `UpdateMigrationHistory` call
/// (spec.md §4.1).
#[derive(Debug, Clone, Default)]
pub struct MigrationHistoryUpdate {
    pub status: Option<migrator_core::entities::RepositoryStatus>,
    pub error_message: Option<String>,
    pub completed: bool,
}

/// Fields a caller may update in a single `UpdateBatchProgress` call
/// (spec.md §4.1).
#[derive(Debug, Clone, Default)]
pub struct BatchProgressUpdate {
    pub status: Option<migrator_core::entities::BatchStatus>,
    pub scheduled_at: Option<chrono::DateTime<chrono::Utc>>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Durable state for repositories, batches, migration history, logs, and
/// dependencies (C1, spec.md §4.1). Every mutation is atomic with respect
/// to concurrent readers; status transitions, batch membership changes,
/// and batch deletion each execute in one transaction.
///
/// Implementation-agnostic: identifiers are 64-bit, timestamps are UTC,
/// text is unbounded. A single `PostgresStore` backs production use; a
/// `MockStore` backs tests without a live database.
#[async_trait]
pub trait Store: Send + Sync {
    // ---- Repositories ----

    async fn get_repository(&self, full_name: &str) -> Result<Option<Repository>>;
    async fn get_repository_by_id(&self, id: i64) -> Result<Option<Repository>>;
    async fn get_repositories_by_ids(&self, ids: &[i64]) -> Result<Vec<Repository>>;
    async fn get_repositories_by_names(&self, names: &[String]) -> Result<Vec<Repository>>;
    async fn list_repositories(&self, filter: &RepositoryFilter) -> Result<Vec<Repository>>;
    async fn count_repositories(&self, filter: &RepositoryFilter) -> Result<u64>;

    /// Insert-or-update keyed by `full_name`.
    async fn save_repository(&self, repository: &Repository) -> Result<Repository>;
    /// Full update keyed by `id`.
    async fn update_repository(&self, repository: &Repository) -> Result<()>;
    async fn update_repository_status(
        &self,
        full_name: &str,
        status: migrator_core::entities::RepositoryStatus,
    ) -> Result<()>;

    /// CAS-style claim used by the dispatcher: succeeds only if the row's
    /// current status equals `from`, then atomically sets it to `to`.
    /// Returns whether the claim was won (spec.md §5, invariant 1).
    async fn claim_repository(
        &self,
        id: i64,
        from: migrator_core::entities::RepositoryStatus,
        to: migrator_core::entities::RepositoryStatus,
    ) -> Result<bool>;

    async fn rollback_repository(&self, full_name: &str, reason: &str) -> Result<()>;
    async fn get_completed_migrations(&self, since_id: Option<i64>) -> Result<Vec<Repository>>;

    // ---- Batches ----

    async fn get_batch(&self, id: i64) -> Result<Option<Batch>>;
    async fn list_batches(&self, filter: &BatchFilter) -> Result<Vec<Batch>>;
    async fn create_batch(&self, batch: &Batch) -> Result<Batch>;
    async fn update_batch(&self, batch: &Batch) -> Result<()>;
    /// Deletes the batch and nulls `batch_id` on every member repository,
    /// atomically (spec.md §4.1, §4.4).
    async fn delete_batch(&self, id: i64) -> Result<()>;
    async fn update_batch_progress(&self, id: i64, update: &BatchProgressUpdate) -> Result<()>;

    /// Sets `batch_id = Some(batch_id)` on the given repositories,
    /// atomically.
    async fn add_repositories_to_batch(&self, batch_id: i64, repo_ids: &[i64]) -> Result<()>;
    /// Clears `batch_id` on the given repositories that currently belong
    /// to `batch_id`. Returns the count actually cleared.
    async fn remove_repositories_from_batch(
        &self,
        batch_id: i64,
        repo_ids: &[i64],
    ) -> Result<u64>;

    // ---- History & logs ----

    async fn create_migration_history(&self, entry: &MigrationHistory) -> Result<MigrationHistory>;
    async fn update_migration_history(
        &self,
        id: i64,
        update: &MigrationHistoryUpdate,
    ) -> Result<()>;
    async fn get_migration_history(&self, repository_id: i64) -> Result<Vec<MigrationHistory>>;

    async fn create_migration_log(&self, entry: &MigrationLog) -> Result<MigrationLog>;
    async fn get_migration_logs(
        &self,
        repository_id: i64,
        level: Option<migrator_core::entities::LogLevel>,
        phase: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MigrationLog>>;

    // ---- Dependencies ----

    async fn get_repository_dependencies(&self, repository_id: i64)
        -> Result<Vec<RepositoryDependency>>;
    async fn get_repository_dependencies_by_full_name(
        &self,
        full_name: &str,
    ) -> Result<Vec<RepositoryDependency>>;
    async fn get_dependent_repositories(&self, dependency_full_name: &str) -> Result<Vec<Repository>>;
    /// Recomputes `is_local` on every dependency edge by checking whether
    /// `dependency_full_name` resolves to a known repository.
    async fn update_local_dependency_flags(&self) -> Result<u64>;
    async fn get_all_local_dependency_pairs(
        &self,
        names: &[String],
        batch_id: Option<i64>,
    ) -> Result<Vec<(String, String)>>;

    // ---- Sources ----

    async fn get_source(&self, id: i64) -> Result<Option<Source>>;
    async fn list_sources(&self, filter: &SourceFilter) -> Result<Vec<Source>>;

    // ---- Supporting tables (SPEC_FULL.md §3 supplement) ----

    async fn get_setup_status(&self) -> Result<SetupStatus>;
    async fn mark_setup_complete(&self) -> Result<()>;
    async fn get_discovery_progress(&self) -> Result<DiscoveryProgress>;
    async fn record_discovery_progress(&self, progress: &DiscoveryProgress) -> Result<()>;
}
