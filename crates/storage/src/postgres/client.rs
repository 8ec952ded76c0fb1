//! `sqlx`-backed `Store` implementation (C1, spec.md §4.1) against the
//! schema in `migrations/0001_initial.sql`. Every transition that touches
//! more than one row (batch deletion, membership changes) runs inside a
//! single transaction.

use crate::error::StorageError;
use crate::postgres::rows::{
    log_level_str, migration_api_str, validation_status_str, visibility_policy_str, BatchRow,
    MigrationHistoryRow, MigrationLogRow, RepositoryDependencyRow, RepositoryRow, SourceRow,
};
use crate::{BatchProgressUpdate, MigrationHistoryUpdate, Store};
use async_trait::async_trait;
use migrator_core::entities::{
    Batch, DiscoveryProgress, MigrationHistory, MigrationLog, Repository, RepositoryDependency,
    RepositoryStatus, SetupStatus, SizeCategory, Source,
};
use migrator_core::error::{Error, Result};
use migrator_core::filter::{BatchFilter, RepositoryFilter, RepositorySortKey, SourceFilter};
use sqlx::PgPool;

const GIBIBYTE: i64 = 1024 * 1024 * 1024;

/// Matches `RepositoryProfile::size_category`'s bucket boundaries, as a
/// `(min, max_exclusive)` byte range for the `size_category` filter key.
fn size_category_range(category: SizeCategory) -> (i64, Option<i64>) {
    match category {
        SizeCategory::Small => (0, Some(GIBIBYTE)),
        SizeCategory::Medium => (GIBIBYTE, Some(10 * GIBIBYTE)),
        SizeCategory::Large => (10 * GIBIBYTE, Some(40 * GIBIBYTE)),
        SizeCategory::Oversized => (40 * GIBIBYTE, None),
    }
}

fn storage_err(e: sqlx::Error) -> Error {
    StorageError::from(e).into()
}

/// `PgPool`-backed store. Cloning is cheap: `PgPool` is a handle around a
/// connection pool shared behind an `Arc`.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects to `dsn` and runs pending migrations before returning.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPool::connect(dsn).await.map_err(storage_err)?;
        let store = Self::new(pool);
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations")
            .run(&self.pool)
            .await
            .map_err(|e| Error::storage(format!("failed to run migrations: {e}")))
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn get_repository(&self, full_name: &str) -> Result<Option<Repository>> {
        let row = sqlx::query_as::<_, RepositoryRow>(
            "SELECT * FROM repositories WHERE full_name = $1",
        )
        .bind(full_name)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;
        row.map(RepositoryRow::into_entity).transpose()
    }

    async fn get_repository_by_id(&self, id: i64) -> Result<Option<Repository>> {
        let row = sqlx::query_as::<_, RepositoryRow>("SELECT * FROM repositories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(RepositoryRow::into_entity).transpose()
    }

    async fn get_repositories_by_ids(&self, ids: &[i64]) -> Result<Vec<Repository>> {
        let rows = sqlx::query_as::<_, RepositoryRow>(
            "SELECT * FROM repositories WHERE id = ANY($1) ORDER BY id",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.into_iter().map(RepositoryRow::into_entity).collect()
    }

    async fn get_repositories_by_names(&self, names: &[String]) -> Result<Vec<Repository>> {
        let rows = sqlx::query_as::<_, RepositoryRow>(
            "SELECT * FROM repositories WHERE full_name = ANY($1) ORDER BY id",
        )
        .bind(names)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.into_iter().map(RepositoryRow::into_entity).collect()
    }

    async fn list_repositories(&self, filter: &RepositoryFilter) -> Result<Vec<Repository>> {
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM repositories WHERE 1 = 1");
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(statuses) = &filter.statuses {
            let strs: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
            qb.push(" AND status = ANY(").push_bind(strs).push(")");
        }
        if let Some(source_id) = filter.source_id {
            qb.push(" AND source_id = ").push_bind(source_id);
        }
        if let Some(batch_id) = filter.batch_id {
            qb.push(" AND batch_id = ").push_bind(batch_id);
        }
        if filter.unbatched_only {
            qb.push(" AND batch_id IS NULL");
        }
        if let Some(validation_status) = filter.validation_status {
            qb.push(" AND validation_status = ")
                .push_bind(validation_status_str(validation_status));
        }
        if let Some(needle) = &filter.full_name_contains {
            qb.push(" AND full_name LIKE ")
                .push_bind(format!("%{needle}%"));
        }
        if let Some(has_blocking) = filter.has_blocking_findings {
            qb.push(" AND has_blocking_files = ").push_bind(has_blocking);
        }
        if let Some(organization) = &filter.organization {
            qb.push(" AND organization = ").push_bind(organization.clone());
        }
        if let Some(min_size) = filter.min_size_bytes {
            qb.push(" AND total_size_bytes >= ").push_bind(min_size as i64);
        }
        if let Some(max_size) = filter.max_size_bytes {
            qb.push(" AND total_size_bytes <= ").push_bind(max_size as i64);
        }
        if let Some(has_lfs) = filter.has_lfs {
            qb.push(" AND has_lfs = ").push_bind(has_lfs);
        }
        if let Some(has_submodules) = filter.has_submodules {
            qb.push(" AND has_submodules = ").push_bind(has_submodules);
        }
        if let Some(has_oversized) = filter.has_oversized_repository {
            qb.push(" AND has_oversized_repository = ").push_bind(has_oversized);
        }
        if let Some(has_large_files) = filter.has_large_files {
            qb.push(" AND has_large_file_warnings = ").push_bind(has_large_files);
        }
        if let Some(visibility) = filter.visibility {
            qb.push(" AND visibility = ").push_bind(visibility_policy_str(visibility));
        }
        if let Some(is_archived) = filter.is_archived {
            qb.push(" AND is_archived = ").push_bind(is_archived);
        }
        if let Some(is_fork) = filter.is_fork {
            qb.push(" AND is_fork = ").push_bind(is_fork);
        }
        if let Some(min_complexity) = filter.min_complexity {
            qb.push(" AND complexity_score >= ").push_bind(min_complexity);
        }
        if let Some(size_category) = filter.size_category {
            let (min, max) = size_category_range(size_category);
            qb.push(" AND total_size_bytes >= ").push_bind(min);
            if let Some(max) = max {
                qb.push(" AND total_size_bytes < ").push_bind(max);
            }
        }
        if filter.available_for_batch == Some(true) {
            // Mirrors `migrator_eligibility::is_eligible_for_batch`'s three
            // structural checks; keep in sync with its `BATCHABLE_STATUSES`.
            qb.push(
                " AND batch_id IS NULL AND has_oversized_repository = FALSE \
                  AND status = ANY(",
            )
            .push_bind(vec![
                "pending".to_string(),
                "dry_run_complete".to_string(),
                "dry_run_failed".to_string(),
                "migration_failed".to_string(),
                "rolled_back".to_string(),
            ])
            .push(")");
        }
        qb.push(" ORDER BY ");
        qb.push(match filter.sort_by {
            Some(RepositorySortKey::DiscoveredAt) => "discovered_at",
            Some(RepositorySortKey::UpdatedAt) => "updated_at",
            Some(RepositorySortKey::TotalSizeBytes) => "total_size_bytes",
            Some(RepositorySortKey::Priority) => "priority",
            None => "id",
        });
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            qb.push(" OFFSET ").push_bind(offset as i64);
        }

        let rows = qb
            .build_query_as::<RepositoryRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(RepositoryRow::into_entity).collect()
    }

    async fn count_repositories(&self, filter: &RepositoryFilter) -> Result<u64> {
        let mut qb = sqlx::QueryBuilder::new("SELECT COUNT(*) FROM repositories WHERE 1 = 1");
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(statuses) = &filter.statuses {
            let strs: Vec<String> = statuses.iter().map(|s| s.to_string()).collect();
            qb.push(" AND status = ANY(").push_bind(strs).push(")");
        }
        if let Some(source_id) = filter.source_id {
            qb.push(" AND source_id = ").push_bind(source_id);
        }
        if let Some(batch_id) = filter.batch_id {
            qb.push(" AND batch_id = ").push_bind(batch_id);
        }
        if filter.unbatched_only {
            qb.push(" AND batch_id IS NULL");
        }
        if let Some(validation_status) = filter.validation_status {
            qb.push(" AND validation_status = ")
                .push_bind(validation_status_str(validation_status));
        }
        if let Some(needle) = &filter.full_name_contains {
            qb.push(" AND full_name LIKE ")
                .push_bind(format!("%{needle}%"));
        }
        if let Some(has_blocking) = filter.has_blocking_findings {
            qb.push(" AND has_blocking_files = ").push_bind(has_blocking);
        }
        if let Some(organization) = &filter.organization {
            qb.push(" AND organization = ").push_bind(organization.clone());
        }
        if let Some(min_size) = filter.min_size_bytes {
            qb.push(" AND total_size_bytes >= ").push_bind(min_size as i64);
        }
        if let Some(max_size) = filter.max_size_bytes {
            qb.push(" AND total_size_bytes <= ").push_bind(max_size as i64);
        }
        if let Some(has_lfs) = filter.has_lfs {
            qb.push(" AND has_lfs = ").push_bind(has_lfs);
        }
        if let Some(has_submodules) = filter.has_submodules {
            qb.push(" AND has_submodules = ").push_bind(has_submodules);
        }
        if let Some(has_oversized) = filter.has_oversized_repository {
            qb.push(" AND has_oversized_repository = ").push_bind(has_oversized);
        }
        if let Some(has_large_files) = filter.has_large_files {
            qb.push(" AND has_large_file_warnings = ").push_bind(has_large_files);
        }
        if let Some(visibility) = filter.visibility {
            qb.push(" AND visibility = ").push_bind(visibility_policy_str(visibility));
        }
        if let Some(is_archived) = filter.is_archived {
            qb.push(" AND is_archived = ").push_bind(is_archived);
        }
        if let Some(is_fork) = filter.is_fork {
            qb.push(" AND is_fork = ").push_bind(is_fork);
        }
        if let Some(min_complexity) = filter.min_complexity {
            qb.push(" AND complexity_score >= ").push_bind(min_complexity);
        }
        if let Some(size_category) = filter.size_category {
            let (min, max) = size_category_range(size_category);
            qb.push(" AND total_size_bytes >= ").push_bind(min);
            if let Some(max) = max {
                qb.push(" AND total_size_bytes < ").push_bind(max);
            }
        }
        if filter.available_for_batch == Some(true) {
            qb.push(
                " AND batch_id IS NULL AND has_oversized_repository = FALSE \
                  AND status = ANY(",
            )
            .push_bind(vec![
                "pending".to_string(),
                "dry_run_complete".to_string(),
                "dry_run_failed".to_string(),
                "migration_failed".to_string(),
                "rolled_back".to_string(),
            ])
            .push(")");
        }

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(count as u64)
    }

    async fn save_repository(&self, repository: &Repository) -> Result<Repository> {
        let row = sqlx::query_as::<_, RepositoryRow>(
            r#"
            INSERT INTO repositories (
                full_name, source_id, source_url,
                total_size_bytes, commit_count, branch_count, tag_count,
                has_lfs, has_submodules, ghas_secret_scanning, ghas_code_scanning,
                ghas_dependabot, collaborator_count, contributor_count,
                azure_devops_counters, codeowners_content, complexity_score,
                has_oversized_repository, has_oversized_repository_detail,
                has_oversized_commits, has_oversized_commits_detail,
                has_long_refs, has_long_refs_detail,
                has_blocking_files, has_blocking_files_detail,
                has_large_file_warnings, has_large_file_warnings_detail,
                estimated_metadata_size_exceeded, estimated_metadata_size_detail,
                status, batch_id, priority, destination_full_name, destination_url,
                source_migration_id, is_source_locked,
                exclude_releases, exclude_attachments, exclude_metadata,
                exclude_git_data, exclude_owner_projects,
                validation_status, validation_details, destination_data, error_message,
                discovered_at, updated_at, migrated_at, last_discovery_at, last_dry_run_at,
                organization, visibility, is_archived, is_fork
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17,
                $18, $19, $20, $21, $22, $23, $24, $25, $26, $27, $28, $29,
                $30, $31, $32, $33, $34, $35, $36, $37, $38, $39, $40, $41,
                $42, $43, $44, $45, $46, $47, $48, $49, $50, $51, $52, $53
            )
            ON CONFLICT (full_name) DO UPDATE SET
                source_id = EXCLUDED.source_id,
                source_url = EXCLUDED.source_url,
                total_size_bytes = EXCLUDED.total_size_bytes,
                commit_count = EXCLUDED.commit_count,
                branch_count = EXCLUDED.branch_count,
                tag_count = EXCLUDED.tag_count,
                has_lfs = EXCLUDED.has_lfs,
                has_submodules = EXCLUDED.has_submodules,
                ghas_secret_scanning = EXCLUDED.ghas_secret_scanning,
                ghas_code_scanning = EXCLUDED.ghas_code_scanning,
                ghas_dependabot = EXCLUDED.ghas_dependabot,
                collaborator_count = EXCLUDED.collaborator_count,
                contributor_count = EXCLUDED.contributor_count,
                azure_devops_counters = EXCLUDED.azure_devops_counters,
                codeowners_content = EXCLUDED.codeowners_content,
                complexity_score = EXCLUDED.complexity_score,
                has_oversized_repository = EXCLUDED.has_oversized_repository,
                has_oversized_repository_detail = EXCLUDED.has_oversized_repository_detail,
                has_oversized_commits = EXCLUDED.has_oversized_commits,
                has_oversized_commits_detail = EXCLUDED.has_oversized_commits_detail,
                has_long_refs = EXCLUDED.has_long_refs,
                has_long_refs_detail = EXCLUDED.has_long_refs_detail,
                has_blocking_files = EXCLUDED.has_blocking_files,
                has_blocking_files_detail = EXCLUDED.has_blocking_files_detail,
                has_large_file_warnings = EXCLUDED.has_large_file_warnings,
                has_large_file_warnings_detail = EXCLUDED.has_large_file_warnings_detail,
                estimated_metadata_size_exceeded = EXCLUDED.estimated_metadata_size_exceeded,
                estimated_metadata_size_detail = EXCLUDED.estimated_metadata_size_detail,
                status = EXCLUDED.status,
                batch_id = EXCLUDED.batch_id,
                priority = EXCLUDED.priority,
                destination_full_name = EXCLUDED.destination_full_name,
                destination_url = EXCLUDED.destination_url,
                source_migration_id = EXCLUDED.source_migration_id,
                is_source_locked = EXCLUDED.is_source_locked,
                exclude_releases = EXCLUDED.exclude_releases,
                exclude_attachments = EXCLUDED.exclude_attachments,
                exclude_metadata = EXCLUDED.exclude_metadata,
                exclude_git_data = EXCLUDED.exclude_git_data,
                exclude_owner_projects = EXCLUDED.exclude_owner_projects,
                validation_status = EXCLUDED.validation_status,
                validation_details = EXCLUDED.validation_details,
                destination_data = EXCLUDED.destination_data,
                error_message = EXCLUDED.error_message,
                updated_at = EXCLUDED.updated_at,
                migrated_at = EXCLUDED.migrated_at,
                last_discovery_at = EXCLUDED.last_discovery_at,
                last_dry_run_at = EXCLUDED.last_dry_run_at,
                organization = EXCLUDED.organization,
                visibility = EXCLUDED.visibility,
                is_archived = EXCLUDED.is_archived,
                is_fork = EXCLUDED.is_fork
            RETURNING *
            "#,
        )
        .bind(&repository.full_name)
        .bind(repository.source_id)
        .bind(&repository.source_url)
        .bind(repository.profile.total_size_bytes as i64)
        .bind(repository.profile.commit_count as i64)
        .bind(repository.profile.branch_count as i64)
        .bind(repository.profile.tag_count as i64)
        .bind(repository.profile.has_lfs)
        .bind(repository.profile.has_submodules)
        .bind(repository.profile.ghas_secret_scanning)
        .bind(repository.profile.ghas_code_scanning)
        .bind(repository.profile.ghas_dependabot)
        .bind(repository.profile.collaborator_count as i64)
        .bind(repository.profile.contributor_count as i64)
        .bind(&repository.profile.azure_devops_counters)
        .bind(&repository.profile.codeowners_content)
        .bind(repository.profile.complexity_score)
        .bind(repository.validation.has_oversized_repository)
        .bind(&repository.validation.has_oversized_repository_detail)
        .bind(repository.validation.has_oversized_commits)
        .bind(&repository.validation.has_oversized_commits_detail)
        .bind(repository.validation.has_long_refs)
        .bind(&repository.validation.has_long_refs_detail)
        .bind(repository.validation.has_blocking_files)
        .bind(&repository.validation.has_blocking_files_detail)
        .bind(repository.validation.has_large_file_warnings)
        .bind(&repository.validation.has_large_file_warnings_detail)
        .bind(repository.validation.estimated_metadata_size_exceeded)
        .bind(&repository.validation.estimated_metadata_size_detail)
        .bind(repository.status.to_string())
        .bind(repository.batch_id)
        .bind(repository.priority)
        .bind(&repository.destination_full_name)
        .bind(&repository.destination_url)
        .bind(&repository.source_migration_id)
        .bind(repository.is_source_locked)
        .bind(repository.exclusions.exclude_releases)
        .bind(repository.exclusions.exclude_attachments)
        .bind(repository.exclusions.exclude_metadata)
        .bind(repository.exclusions.exclude_git_data)
        .bind(repository.exclusions.exclude_owner_projects)
        .bind(repository.validation_status.map(validation_status_str))
        .bind(&repository.validation_details)
        .bind(&repository.destination_data)
        .bind(&repository.error_message)
        .bind(repository.discovered_at)
        .bind(repository.updated_at)
        .bind(repository.migrated_at)
        .bind(repository.last_discovery_at)
        .bind(repository.last_dry_run_at)
        .bind(&repository.organization)
        .bind(visibility_policy_str(repository.profile.visibility))
        .bind(repository.profile.is_archived)
        .bind(repository.profile.is_fork)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        row.into_entity()
    }

    async fn update_repository(&self, repository: &Repository) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE repositories SET
                full_name = $2, source_id = $3, source_url = $4,
                total_size_bytes = $5, commit_count = $6, branch_count = $7, tag_count = $8,
                has_lfs = $9, has_submodules = $10, ghas_secret_scanning = $11,
                ghas_code_scanning = $12, ghas_dependabot = $13, collaborator_count = $14,
                contributor_count = $15, azure_devops_counters = $16, codeowners_content = $17,
                complexity_score = $18,
                has_oversized_repository = $19, has_oversized_repository_detail = $20,
                has_oversized_commits = $21, has_oversized_commits_detail = $22,
                has_long_refs = $23, has_long_refs_detail = $24,
                has_blocking_files = $25, has_blocking_files_detail = $26,
                has_large_file_warnings = $27, has_large_file_warnings_detail = $28,
                estimated_metadata_size_exceeded = $29, estimated_metadata_size_detail = $30,
                status = $31, batch_id = $32, priority = $33,
                destination_full_name = $34, destination_url = $35,
                source_migration_id = $36, is_source_locked = $37,
                exclude_releases = $38, exclude_attachments = $39, exclude_metadata = $40,
                exclude_git_data = $41, exclude_owner_projects = $42,
                validation_status = $43, validation_details = $44, destination_data = $45,
                error_message = $46, updated_at = $47, migrated_at = $48,
                last_discovery_at = $49, last_dry_run_at = $50,
                organization = $51, visibility = $52, is_archived = $53, is_fork = $54
            WHERE id = $1
            "#,
        )
        .bind(repository.id)
        .bind(&repository.full_name)
        .bind(repository.source_id)
        .bind(&repository.source_url)
        .bind(repository.profile.total_size_bytes as i64)
        .bind(repository.profile.commit_count as i64)
        .bind(repository.profile.branch_count as i64)
        .bind(repository.profile.tag_count as i64)
        .bind(repository.profile.has_lfs)
        .bind(repository.profile.has_submodules)
        .bind(repository.profile.ghas_secret_scanning)
        .bind(repository.profile.ghas_code_scanning)
        .bind(repository.profile.ghas_dependabot)
        .bind(repository.profile.collaborator_count as i64)
        .bind(repository.profile.contributor_count as i64)
        .bind(&repository.profile.azure_devops_counters)
        .bind(&repository.profile.codeowners_content)
        .bind(repository.profile.complexity_score)
        .bind(repository.validation.has_oversized_repository)
        .bind(&repository.validation.has_oversized_repository_detail)
        .bind(repository.validation.has_oversized_commits)
        .bind(&repository.validation.has_oversized_commits_detail)
        .bind(repository.validation.has_long_refs)
        .bind(&repository.validation.has_long_refs_detail)
        .bind(repository.validation.has_blocking_files)
        .bind(&repository.validation.has_blocking_files_detail)
        .bind(repository.validation.has_large_file_warnings)
        .bind(&repository.validation.has_large_file_warnings_detail)
        .bind(repository.validation.estimated_metadata_size_exceeded)
        .bind(&repository.validation.estimated_metadata_size_detail)
        .bind(repository.status.to_string())
        .bind(repository.batch_id)
        .bind(repository.priority)
        .bind(&repository.destination_full_name)
        .bind(&repository.destination_url)
        .bind(&repository.source_migration_id)
        .bind(repository.is_source_locked)
        .bind(repository.exclusions.exclude_releases)
        .bind(repository.exclusions.exclude_attachments)
        .bind(repository.exclusions.exclude_metadata)
        .bind(repository.exclusions.exclude_git_data)
        .bind(repository.exclusions.exclude_owner_projects)
        .bind(repository.validation_status.map(validation_status_str))
        .bind(&repository.validation_details)
        .bind(&repository.destination_data)
        .bind(&repository.error_message)
        .bind(repository.updated_at)
        .bind(repository.migrated_at)
        .bind(repository.last_discovery_at)
        .bind(repository.last_dry_run_at)
        .bind(&repository.organization)
        .bind(visibility_policy_str(repository.profile.visibility))
        .bind(repository.profile.is_archived)
        .bind(repository.profile.is_fork)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!(
                "repository {} not found",
                repository.id
            )));
        }
        Ok(())
    }

    async fn update_repository_status(
        &self,
        full_name: &str,
        status: RepositoryStatus,
    ) -> Result<()> {
        let result = sqlx::query(
            "UPDATE repositories SET status = $1, updated_at = now() WHERE full_name = $2",
        )
        .bind(status.to_string())
        .bind(full_name)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!(
                "repository '{full_name}' not found"
            )));
        }
        Ok(())
    }

    async fn claim_repository(
        &self,
        id: i64,
        from: RepositoryStatus,
        to: RepositoryStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE repositories SET status = $1, updated_at = now() WHERE id = $2 AND status = $3",
        )
        .bind(to.to_string())
        .bind(id)
        .bind(from.to_string())
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn rollback_repository(&self, full_name: &str, reason: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE repositories SET status = $1, error_message = $2, updated_at = now() WHERE full_name = $3",
        )
        .bind(RepositoryStatus::RolledBack.to_string())
        .bind(reason)
        .bind(full_name)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!(
                "repository '{full_name}' not found"
            )));
        }
        Ok(())
    }

    async fn get_completed_migrations(&self, since_id: Option<i64>) -> Result<Vec<Repository>> {
        let rows = sqlx::query_as::<_, RepositoryRow>(
            "SELECT * FROM repositories WHERE status = $1 AND id > $2 ORDER BY id",
        )
        .bind(RepositoryStatus::Complete.to_string())
        .bind(since_id.unwrap_or(0))
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.into_iter().map(RepositoryRow::into_entity).collect()
    }

    async fn get_batch(&self, id: i64) -> Result<Option<Batch>> {
        let row = sqlx::query_as::<_, BatchRow>("SELECT * FROM batches WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(BatchRow::into_entity).transpose()
    }

    async fn list_batches(&self, filter: &BatchFilter) -> Result<Vec<Batch>> {
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM batches WHERE 1 = 1");
        if let Some(status) = filter.status {
            qb.push(" AND status = ").push_bind(status.to_string());
        }
        if let Some(needle) = &filter.name_contains {
            qb.push(" AND name LIKE ").push_bind(format!("%{needle}%"));
        }
        qb.push(" ORDER BY id");
        if let Some(limit) = filter.limit {
            qb.push(" LIMIT ").push_bind(limit as i64);
        }
        if let Some(offset) = filter.offset {
            qb.push(" OFFSET ").push_bind(offset as i64);
        }

        let rows = qb
            .build_query_as::<BatchRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(BatchRow::into_entity).collect()
    }

    async fn create_batch(&self, batch: &Batch) -> Result<Batch> {
        let row = sqlx::query_as::<_, BatchRow>(
            r#"
            INSERT INTO batches (
                name, description, batch_type, status, migration_api,
                default_destination_org, default_exclude_releases, default_exclude_attachments,
                scheduled_at, started_at, completed_at, dry_run_started_at, dry_run_completed_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING *
            "#,
        )
        .bind(&batch.name)
        .bind(&batch.description)
        .bind(&batch.batch_type)
        .bind(batch.status.to_string())
        .bind(migration_api_str(batch.migration_api))
        .bind(&batch.defaults.destination_org)
        .bind(batch.defaults.exclude_releases)
        .bind(batch.defaults.exclude_attachments)
        .bind(batch.scheduled_at)
        .bind(batch.started_at)
        .bind(batch.completed_at)
        .bind(batch.dry_run_started_at)
        .bind(batch.dry_run_completed_at)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        row.into_entity()
    }

    async fn update_batch(&self, batch: &Batch) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE batches SET
                name = $2, description = $3, batch_type = $4, status = $5, migration_api = $6,
                default_destination_org = $7, default_exclude_releases = $8,
                default_exclude_attachments = $9, scheduled_at = $10, started_at = $11,
                completed_at = $12, dry_run_started_at = $13, dry_run_completed_at = $14
            WHERE id = $1
            "#,
        )
        .bind(batch.id)
        .bind(&batch.name)
        .bind(&batch.description)
        .bind(&batch.batch_type)
        .bind(batch.status.to_string())
        .bind(migration_api_str(batch.migration_api))
        .bind(&batch.defaults.destination_org)
        .bind(batch.defaults.exclude_releases)
        .bind(batch.defaults.exclude_attachments)
        .bind(batch.scheduled_at)
        .bind(batch.started_at)
        .bind(batch.completed_at)
        .bind(batch.dry_run_started_at)
        .bind(batch.dry_run_completed_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("batch {} not found", batch.id)));
        }
        Ok(())
    }

    async fn delete_batch(&self, id: i64) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(storage_err)?;

        sqlx::query("UPDATE repositories SET batch_id = NULL WHERE batch_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;

        let result = sqlx::query("DELETE FROM batches WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("batch {id} not found")));
        }

        tx.commit().await.map_err(storage_err)?;
        Ok(())
    }

    async fn update_batch_progress(&self, id: i64, update: &BatchProgressUpdate) -> Result<()> {
        let mut qb = sqlx::QueryBuilder::new("UPDATE batches SET ");
        let mut first = true;
        macro_rules! set_field {
            ($sql:expr, $value:expr) => {{
                if !first {
                    qb.push(", ");
                }
                first = false;
                qb.push($sql).push_bind($value);
            }};
        }
        if let Some(status) = update.status {
            set_field!("status = ", status.to_string());
        }
        if let Some(scheduled_at) = update.scheduled_at {
            set_field!("scheduled_at = ", scheduled_at);
        }
        if let Some(started_at) = update.started_at {
            set_field!("started_at = ", started_at);
        }
        if let Some(completed_at) = update.completed_at {
            set_field!("completed_at = ", completed_at);
        }
        if first {
            return Ok(());
        }
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(&self.pool).await.map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!("batch {id} not found")));
        }
        Ok(())
    }

    async fn add_repositories_to_batch(&self, batch_id: i64, repo_ids: &[i64]) -> Result<()> {
        sqlx::query("UPDATE repositories SET batch_id = $1 WHERE id = ANY($2)")
            .bind(batch_id)
            .bind(repo_ids)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(())
    }

    async fn remove_repositories_from_batch(
        &self,
        batch_id: i64,
        repo_ids: &[i64],
    ) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE repositories SET batch_id = NULL WHERE batch_id = $1 AND id = ANY($2)",
        )
        .bind(batch_id)
        .bind(repo_ids)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected())
    }

    async fn create_migration_history(
        &self,
        entry: &MigrationHistory,
    ) -> Result<MigrationHistory> {
        let row = sqlx::query_as::<_, MigrationHistoryRow>(
            r#"
            INSERT INTO migration_history (
                repository_id, status, phase, message, error_message,
                started_at, completed_at, duration_seconds
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(entry.repository_id)
        .bind(entry.status.to_string())
        .bind(&entry.phase)
        .bind(&entry.message)
        .bind(&entry.error_message)
        .bind(entry.started_at)
        .bind(entry.completed_at)
        .bind(entry.duration_seconds)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        row.into_entity()
    }

    async fn update_migration_history(
        &self,
        id: i64,
        update: &MigrationHistoryUpdate,
    ) -> Result<()> {
        let mut qb = sqlx::QueryBuilder::new("UPDATE migration_history SET ");
        let mut first = true;
        macro_rules! set_field {
            ($sql:expr, $value:expr) => {{
                if !first {
                    qb.push(", ");
                }
                first = false;
                qb.push($sql).push_bind($value);
            }};
        }
        if let Some(status) = update.status {
            set_field!("status = ", status.to_string());
        }
        if update.error_message.is_some() {
            set_field!("error_message = ", update.error_message.clone());
        }
        if update.completed {
            set_field!("completed_at = ", chrono::Utc::now());
        }
        if first {
            return Ok(());
        }
        qb.push(" WHERE id = ").push_bind(id);

        let result = qb.build().execute(&self.pool).await.map_err(storage_err)?;
        if result.rows_affected() == 0 {
            return Err(Error::not_found(format!(
                "migration history {id} not found"
            )));
        }
        Ok(())
    }

    async fn get_migration_history(&self, repository_id: i64) -> Result<Vec<MigrationHistory>> {
        let rows = sqlx::query_as::<_, MigrationHistoryRow>(
            "SELECT * FROM migration_history WHERE repository_id = $1 ORDER BY started_at",
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.into_iter()
            .map(MigrationHistoryRow::into_entity)
            .collect()
    }

    async fn create_migration_log(&self, entry: &MigrationLog) -> Result<MigrationLog> {
        let row = sqlx::query_as::<_, MigrationLogRow>(
            r#"
            INSERT INTO migration_logs (
                repository_id, history_id, level, phase, operation, message,
                detail, initiated_by, logged_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(entry.repository_id)
        .bind(entry.history_id)
        .bind(log_level_str(entry.level))
        .bind(&entry.phase)
        .bind(&entry.operation)
        .bind(&entry.message)
        .bind(&entry.detail)
        .bind(&entry.initiated_by)
        .bind(entry.logged_at)
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        row.into_entity()
    }

    async fn get_migration_logs(
        &self,
        repository_id: i64,
        level: Option<migrator_core::entities::LogLevel>,
        phase: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MigrationLog>> {
        let mut qb =
            sqlx::QueryBuilder::new("SELECT * FROM migration_logs WHERE repository_id = ");
        qb.push_bind(repository_id);
        if let Some(level) = level {
            qb.push(" AND level = ").push_bind(log_level_str(level));
        }
        if let Some(phase) = phase {
            qb.push(" AND phase = ").push_bind(phase.to_string());
        }
        qb.push(" ORDER BY logged_at LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset as i64);

        let rows = qb
            .build_query_as::<MigrationLogRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(MigrationLogRow::into_entity).collect()
    }

    async fn get_repository_dependencies(
        &self,
        repository_id: i64,
    ) -> Result<Vec<RepositoryDependency>> {
        let rows = sqlx::query_as::<_, RepositoryDependencyRow>(
            "SELECT * FROM repository_dependencies WHERE repository_id = $1 ORDER BY id",
        )
        .bind(repository_id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.into_iter()
            .map(RepositoryDependencyRow::into_entity)
            .collect()
    }

    async fn get_repository_dependencies_by_full_name(
        &self,
        full_name: &str,
    ) -> Result<Vec<RepositoryDependency>> {
        let rows = sqlx::query_as::<_, RepositoryDependencyRow>(
            r#"
            SELECT rd.* FROM repository_dependencies rd
            JOIN repositories r ON r.id = rd.repository_id
            WHERE r.full_name = $1
            ORDER BY rd.id
            "#,
        )
        .bind(full_name)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.into_iter()
            .map(RepositoryDependencyRow::into_entity)
            .collect()
    }

    async fn get_dependent_repositories(
        &self,
        dependency_full_name: &str,
    ) -> Result<Vec<Repository>> {
        let rows = sqlx::query_as::<_, RepositoryRow>(
            r#"
            SELECT DISTINCT r.* FROM repositories r
            JOIN repository_dependencies rd ON rd.repository_id = r.id
            WHERE rd.dependency_full_name = $1
            ORDER BY r.id
            "#,
        )
        .bind(dependency_full_name)
        .fetch_all(&self.pool)
        .await
        .map_err(storage_err)?;
        rows.into_iter().map(RepositoryRow::into_entity).collect()
    }

    async fn update_local_dependency_flags(&self) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE repository_dependencies rd
            SET is_local = EXISTS (
                SELECT 1 FROM repositories r WHERE r.full_name = rd.dependency_full_name
            )
            WHERE rd.is_local IS DISTINCT FROM EXISTS (
                SELECT 1 FROM repositories r WHERE r.full_name = rd.dependency_full_name
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(result.rows_affected())
    }

    async fn get_all_local_dependency_pairs(
        &self,
        names: &[String],
        batch_id: Option<i64>,
    ) -> Result<Vec<(String, String)>> {
        let mut qb = sqlx::QueryBuilder::new(
            r#"
            SELECT r.full_name, rd.dependency_full_name
            FROM repository_dependencies rd
            JOIN repositories r ON r.id = rd.repository_id
            WHERE rd.is_local = TRUE
            "#,
        );
        if !names.is_empty() {
            qb.push(" AND rd.dependency_full_name = ANY(")
                .push_bind(names.to_vec())
                .push(")");
        }
        if let Some(batch_id) = batch_id {
            qb.push(" AND r.batch_id = ").push_bind(batch_id);
        }

        let rows: Vec<(String, String)> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        Ok(rows)
    }

    async fn get_source(&self, id: i64) -> Result<Option<Source>> {
        let row = sqlx::query_as::<_, SourceRow>("SELECT * FROM sources WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;
        row.map(SourceRow::into_entity).transpose()
    }

    async fn list_sources(&self, filter: &SourceFilter) -> Result<Vec<Source>> {
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM sources WHERE 1 = 1");
        if let Some(source_type) = filter.source_type {
            qb.push(" AND source_type = ")
                .push_bind(source_type.to_string());
        }
        qb.push(" ORDER BY id");

        let rows = qb
            .build_query_as::<SourceRow>()
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;
        rows.into_iter().map(SourceRow::into_entity).collect()
    }

    async fn get_setup_status(&self) -> Result<SetupStatus> {
        let row: (bool, Option<chrono::DateTime<chrono::Utc>>) =
            sqlx::query_as("SELECT completed, completed_at FROM setup_status WHERE id = TRUE")
                .fetch_one(&self.pool)
                .await
                .map_err(storage_err)?;
        Ok(SetupStatus {
            completed: row.0,
            completed_at: row.1,
        })
    }

    async fn mark_setup_complete(&self) -> Result<()> {
        sqlx::query(
            "UPDATE setup_status SET completed = TRUE, completed_at = now() WHERE id = TRUE",
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }

    async fn get_discovery_progress(&self) -> Result<DiscoveryProgress> {
        let row: (i64, i64) = sqlx::query_as(
            "SELECT repositories_discovered, repositories_profiled FROM discovery_progress WHERE id = TRUE",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(DiscoveryProgress {
            repositories_discovered: row.0 as u64,
            repositories_profiled: row.1 as u64,
        })
    }

    async fn record_discovery_progress(&self, progress: &DiscoveryProgress) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE discovery_progress
            SET repositories_discovered = $1, repositories_profiled = $2
            WHERE id = TRUE
            "#,
        )
        .bind(progress.repositories_discovered as i64)
        .bind(progress.repositories_profiled as i64)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;
        Ok(())
    }
}
