//! Row <-> entity mapping for the Postgres backend. Kept separate from
//! `client.rs` so the query code stays readable.

use migrator_core::config::VisibilityPolicy;
use migrator_core::entities::{
    Batch, BatchDefaults, BatchStatus, DependencyType, LogLevel, MigrationApi, MigrationExclusions,
    MigrationHistory, MigrationLog, Repository, RepositoryDependency, RepositoryProfile,
    RepositoryStatus, Source, SourceType, ValidationFindings, ValidationStatus,
};
use migrator_core::error::{Error, Result};
use std::str::FromStr;

#[derive(sqlx::FromRow)]
pub(super) struct RepositoryRow {
    pub id: i64,
    pub full_name: String,
    pub source_id: i64,
    pub source_url: String,
    pub organization: Option<String>,

    pub total_size_bytes: i64,
    pub commit_count: i64,
    pub branch_count: i64,
    pub tag_count: i64,
    pub has_lfs: bool,
    pub has_submodules: bool,
    pub ghas_secret_scanning: bool,
    pub ghas_code_scanning: bool,
    pub ghas_dependabot: bool,
    pub collaborator_count: i64,
    pub contributor_count: i64,
    pub azure_devops_counters: serde_json::Value,
    pub codeowners_content: Option<String>,
    pub complexity_score: f64,
    pub visibility: String,
    pub is_archived: bool,
    pub is_fork: bool,

    pub has_oversized_repository: bool,
    pub has_oversized_repository_detail: Option<serde_json::Value>,
    pub has_oversized_commits: bool,
    pub has_oversized_commits_detail: Option<serde_json::Value>,
    pub has_long_refs: bool,
    pub has_long_refs_detail: Option<serde_json::Value>,
    pub has_blocking_files: bool,
    pub has_blocking_files_detail: Option<serde_json::Value>,
    pub has_large_file_warnings: bool,
    pub has_large_file_warnings_detail: Option<serde_json::Value>,
    pub estimated_metadata_size_exceeded: bool,
    pub estimated_metadata_size_detail: Option<serde_json::Value>,

    pub status: String,
    pub batch_id: Option<i64>,
    pub priority: i32,
    pub destination_full_name: Option<String>,
    pub destination_url: Option<String>,
    pub source_migration_id: Option<String>,
    pub is_source_locked: bool,
    pub exclude_releases: bool,
    pub exclude_attachments: bool,
    pub exclude_metadata: bool,
    pub exclude_git_data: bool,
    pub exclude_owner_projects: bool,
    pub validation_status: Option<String>,
    pub validation_details: Option<serde_json::Value>,
    pub destination_data: Option<serde_json::Value>,
    pub error_message: Option<String>,

    pub discovered_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
    pub migrated_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_discovery_at: Option<chrono::DateTime<chrono::Utc>>,
    pub last_dry_run_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl RepositoryRow {
    pub(super) fn into_entity(self) -> Result<Repository> {
        let validation_status = self
            .validation_status
            .map(|s| parse_validation_status(&s))
            .transpose()?;
        let visibility = VisibilityPolicy::from_str(&self.visibility)?;

        Ok(Repository {
            id: self.id,
            full_name: self.full_name,
            source_id: self.source_id,
            source_url: self.source_url,
            organization: self.organization,
            profile: RepositoryProfile {
                total_size_bytes: self.total_size_bytes as u64,
                commit_count: self.commit_count as u64,
                branch_count: self.branch_count as u64,
                tag_count: self.tag_count as u64,
                has_lfs: self.has_lfs,
                has_submodules: self.has_submodules,
                ghas_secret_scanning: self.ghas_secret_scanning,
                ghas_code_scanning: self.ghas_code_scanning,
                ghas_dependabot: self.ghas_dependabot,
                collaborator_count: self.collaborator_count as u64,
                contributor_count: self.contributor_count as u64,
                azure_devops_counters: self.azure_devops_counters,
                codeowners_content: self.codeowners_content,
                complexity_score: self.complexity_score,
                visibility,
                is_archived: self.is_archived,
                is_fork: self.is_fork,
            },
            validation: ValidationFindings {
                has_oversized_repository: self.has_oversized_repository,
                has_oversized_repository_detail: self.has_oversized_repository_detail,
                has_oversized_commits: self.has_oversized_commits,
                has_oversized_commits_detail: self.has_oversized_commits_detail,
                has_long_refs: self.has_long_refs,
                has_long_refs_detail: self.has_long_refs_detail,
                has_blocking_files: self.has_blocking_files,
                has_blocking_files_detail: self.has_blocking_files_detail,
                has_large_file_warnings: self.has_large_file_warnings,
                has_large_file_warnings_detail: self.has_large_file_warnings_detail,
                estimated_metadata_size_exceeded: self.estimated_metadata_size_exceeded,
                estimated_metadata_size_detail: self.estimated_metadata_size_detail,
            },
            status: RepositoryStatus::from_str(&self.status)?,
            batch_id: self.batch_id,
            priority: self.priority,
            destination_full_name: self.destination_full_name,
            destination_url: self.destination_url,
            source_migration_id: self.source_migration_id,
            is_source_locked: self.is_source_locked,
            exclusions: MigrationExclusions {
                exclude_releases: self.exclude_releases,
                exclude_attachments: self.exclude_attachments,
                exclude_metadata: self.exclude_metadata,
                exclude_git_data: self.exclude_git_data,
                exclude_owner_projects: self.exclude_owner_projects,
            },
            validation_status,
            validation_details: self.validation_details,
            destination_data: self.destination_data,
            error_message: self.error_message,
            discovered_at: self.discovered_at,
            updated_at: self.updated_at,
            migrated_at: self.migrated_at,
            last_discovery_at: self.last_discovery_at,
            last_dry_run_at: self.last_dry_run_at,
        })
    }
}

fn parse_validation_status(raw: &str) -> Result<ValidationStatus> {
    Ok(match raw {
        "passed" => ValidationStatus::Passed,
        "warning" => ValidationStatus::Warning,
        "mismatch" => ValidationStatus::Mismatch,
        "failed" => ValidationStatus::Failed,
        other => return Err(Error::storage(format!("unrecognized validation_status '{other}'"))),
    })
}

pub(super) fn validation_status_str(status: ValidationStatus) -> &'static str {
    match status {
        ValidationStatus::Passed => "passed",
        ValidationStatus::Warning => "warning",
        ValidationStatus::Mismatch => "mismatch",
        ValidationStatus::Failed => "failed",
    }
}

pub(super) fn visibility_policy_str(policy: VisibilityPolicy) -> &'static str {
    match policy {
        VisibilityPolicy::Public => "public",
        VisibilityPolicy::Private => "private",
        VisibilityPolicy::Internal => "internal",
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct BatchRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub batch_type: String,
    pub status: String,
    pub migration_api: String,
    pub default_destination_org: Option<String>,
    pub default_exclude_releases: bool,
    pub default_exclude_attachments: bool,
    pub scheduled_at: Option<chrono::DateTime<chrono::Utc>>,
    pub started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub dry_run_started_at: Option<chrono::DateTime<chrono::Utc>>,
    pub dry_run_completed_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl BatchRow {
    pub(super) fn into_entity(self) -> Result<Batch> {
        Ok(Batch {
            id: self.id,
            name: self.name,
            description: self.description,
            batch_type: self.batch_type,
            status: BatchStatus::from_str(&self.status)?,
            migration_api: match self.migration_api.as_str() {
                "gei" => MigrationApi::Gei,
                "elm" => MigrationApi::Elm,
                other => {
                    return Err(Error::storage(format!("unrecognized migration_api '{other}'")))
                }
            },
            defaults: BatchDefaults {
                destination_org: self.default_destination_org,
                exclude_releases: self.default_exclude_releases,
                exclude_attachments: self.default_exclude_attachments,
            },
            scheduled_at: self.scheduled_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
            dry_run_started_at: self.dry_run_started_at,
            dry_run_completed_at: self.dry_run_completed_at,
        })
    }
}

pub(super) fn migration_api_str(api: MigrationApi) -> &'static str {
    match api {
        MigrationApi::Gei => "gei",
        MigrationApi::Elm => "elm",
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct MigrationHistoryRow {
    pub id: i64,
    pub repository_id: i64,
    pub status: String,
    pub phase: String,
    pub message: Option<String>,
    pub error_message: Option<String>,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub completed_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_seconds: Option<f64>,
}

impl MigrationHistoryRow {
    pub(super) fn into_entity(self) -> Result<MigrationHistory> {
        Ok(MigrationHistory {
            id: self.id,
            repository_id: self.repository_id,
            status: RepositoryStatus::from_str(&self.status)?,
            phase: self.phase,
            message: self.message,
            error_message: self.error_message,
            started_at: self.started_at,
            completed_at: self.completed_at,
            duration_seconds: self.duration_seconds,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct MigrationLogRow {
    pub id: i64,
    pub repository_id: i64,
    pub history_id: Option<i64>,
    pub level: String,
    pub phase: String,
    pub operation: String,
    pub message: String,
    pub detail: Option<serde_json::Value>,
    pub initiated_by: Option<String>,
    pub logged_at: chrono::DateTime<chrono::Utc>,
}

impl MigrationLogRow {
    pub(super) fn into_entity(self) -> Result<MigrationLog> {
        Ok(MigrationLog {
            id: self.id,
            repository_id: self.repository_id,
            history_id: self.history_id,
            level: parse_log_level(&self.level)?,
            phase: self.phase,
            operation: self.operation,
            message: self.message,
            detail: self.detail,
            initiated_by: self.initiated_by,
            logged_at: self.logged_at,
        })
    }
}

fn parse_log_level(raw: &str) -> Result<LogLevel> {
    Ok(match raw {
        "debug" => LogLevel::Debug,
        "info" => LogLevel::Info,
        "warn" => LogLevel::Warn,
        "error" => LogLevel::Error,
        other => return Err(Error::storage(format!("unrecognized log level '{other}'"))),
    })
}

pub(super) fn log_level_str(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Debug => "debug",
        LogLevel::Info => "info",
        LogLevel::Warn => "warn",
        LogLevel::Error => "error",
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct RepositoryDependencyRow {
    pub id: i64,
    pub repository_id: i64,
    pub dependency_full_name: String,
    pub dependency_type: String,
    pub dependency_url: Option<String>,
    pub is_local: bool,
}

impl RepositoryDependencyRow {
    pub(super) fn into_entity(self) -> Result<RepositoryDependency> {
        Ok(RepositoryDependency {
            id: self.id,
            repository_id: self.repository_id,
            dependency_full_name: self.dependency_full_name,
            dependency_type: match self.dependency_type.as_str() {
                "submodule" => DependencyType::Submodule,
                "workflow" => DependencyType::Workflow,
                "dependency_graph" => DependencyType::DependencyGraph,
                "package" => DependencyType::Package,
                other => {
                    return Err(Error::storage(format!(
                        "unrecognized dependency_type '{other}'"
                    )))
                }
            },
            dependency_url: self.dependency_url,
            is_local: self.is_local,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(super) struct SourceRow {
    pub id: i64,
    pub name: String,
    pub source_type: String,
    pub base_url: String,
    pub credentials_ref: String,
    pub organization: Option<String>,
    pub enterprise_slug: Option<String>,
}

impl SourceRow {
    pub(super) fn into_entity(self) -> Result<Source> {
        Ok(Source {
            id: self.id,
            name: self.name,
            source_type: match self.source_type.as_str() {
                "github" => SourceType::GitHub,
                "azuredevops" => SourceType::AzureDevOps,
                other => return Err(Error::storage(format!("unrecognized source_type '{other}'"))),
            },
            base_url: self.base_url,
            credentials_ref: self.credentials_ref,
            organization: self.organization,
            enterprise_slug: self.enterprise_slug,
        })
    }
}
