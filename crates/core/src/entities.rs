//! Core entity types shared across the migration orchestration kernel.
//!
//! These mirror the semantic attributes and invariants of spec.md §3
//! without committing to a physical column layout — the storage crate maps
//! them onto whichever SQL dialect backs the store.

use crate::config::VisibilityPolicy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The closed set of statuses a repository can occupy (spec.md §4.6).
///
/// The "happy path" runs left to right; `DryRunInProgress` and its
/// terminals are an off-path branch; `MigrationFailed`, `RolledBack`, and
/// `WontMigrate` are reachable from most non-terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepositoryStatus {
    Pending,
    PreMigration,
    ArchiveGenerating,
    ArchiveUploading,
    MigrationInProgress,
    MigrationComplete,
    Complete,
    DryRunInProgress,
    DryRunComplete,
    DryRunFailed,
    MigrationFailed,
    RolledBack,
    WontMigrate,
}

impl RepositoryStatus {
    /// Terminal states: the scheduler performs no further transitions from
    /// here (spec.md glossary, "Terminal state").
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Complete
                | Self::WontMigrate
                | Self::MigrationFailed
                | Self::RolledBack
                | Self::DryRunComplete
                | Self::DryRunFailed
        )
    }

    /// States in which the source repository may legitimately be locked
    /// (spec.md §3, Repository invariants).
    pub fn allows_source_lock(self) -> bool {
        matches!(
            self,
            Self::PreMigration
                | Self::ArchiveGenerating
                | Self::ArchiveUploading
                | Self::MigrationInProgress
        )
    }

    /// Non-running statuses a repository with `batch_id = NULL` must be in
    /// (spec.md §3, Repository invariants).
    pub fn is_unbatched_eligible(self) -> bool {
        matches!(
            self,
            Self::Pending
                | Self::DryRunComplete
                | Self::DryRunFailed
                | Self::MigrationFailed
                | Self::RolledBack
                | Self::WontMigrate
                | Self::Complete
        )
    }
}

impl std::fmt::Display for RepositoryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::PreMigration => "pre_migration",
            Self::ArchiveGenerating => "archive_generating",
            Self::ArchiveUploading => "archive_uploading",
            Self::MigrationInProgress => "migration_in_progress",
            Self::MigrationComplete => "migration_complete",
            Self::Complete => "complete",
            Self::DryRunInProgress => "dry_run_in_progress",
            Self::DryRunComplete => "dry_run_complete",
            Self::DryRunFailed => "dry_run_failed",
            Self::MigrationFailed => "migration_failed",
            Self::RolledBack => "rolled_back",
            Self::WontMigrate => "wont_migrate",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for RepositoryStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "pre_migration" => Self::PreMigration,
            "archive_generating" => Self::ArchiveGenerating,
            "archive_uploading" => Self::ArchiveUploading,
            "migration_in_progress" => Self::MigrationInProgress,
            "migration_complete" => Self::MigrationComplete,
            "complete" => Self::Complete,
            "dry_run_in_progress" => Self::DryRunInProgress,
            "dry_run_complete" => Self::DryRunComplete,
            "dry_run_failed" => Self::DryRunFailed,
            "migration_failed" => Self::MigrationFailed,
            "rolled_back" => Self::RolledBack,
            "wont_migrate" => Self::WontMigrate,
            other => {
                return Err(crate::error::Error::validation(format!(
                    "unrecognized repository status '{other}'"
                )))
            }
        })
    }
}

/// `validation_status` for a post-migration comparison (spec.md §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    Passed,
    Warning,
    Mismatch,
    Failed,
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Passed => "passed",
            Self::Warning => "warning",
            Self::Mismatch => "mismatch",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// The profile attributes populated by discovery, immutable to the core
/// (spec.md §3, Repository > Profile).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryProfile {
    pub total_size_bytes: u64,
    pub commit_count: u64,
    pub branch_count: u64,
    pub tag_count: u64,
    pub has_lfs: bool,
    pub has_submodules: bool,
    pub ghas_secret_scanning: bool,
    pub ghas_code_scanning: bool,
    pub ghas_dependabot: bool,
    pub collaborator_count: u64,
    pub contributor_count: u64,
    /// Azure DevOps specific counters (pipeline, work item, wiki counts).
    /// Empty for GitHub/GHES sources.
    pub azure_devops_counters: serde_json::Value,
    pub codeowners_content: Option<String>,
    pub complexity_score: f64,
    /// The repository's visibility at the source, as reported by discovery.
    /// Reuses `VisibilityPolicy` since it's already the closed
    /// public/private/internal set the destination side maps onto
    /// (`migration.visibility_handling`, spec.md §4.6).
    pub visibility: VisibilityPolicy,
    pub is_archived: bool,
    pub is_fork: bool,
}

/// A coarse bucket over `RepositoryProfile::total_size_bytes`, used by the
/// `size_category` filter key (spec.md §4.1). Boundaries are independent of
/// the oversized-repository hard threshold in
/// `migrator_eligibility::validation` — this is a listing convenience, not a
/// validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCategory {
    Small,
    Medium,
    Large,
    Oversized,
}

const GIBIBYTE: u64 = 1024 * 1024 * 1024;

impl RepositoryProfile {
    /// Buckets `total_size_bytes` into a `SizeCategory` (spec.md §4.1's
    /// `size_category` filter key): <1 GiB small, <10 GiB medium, <40 GiB
    /// large, otherwise oversized.
    pub fn size_category(&self) -> SizeCategory {
        match self.total_size_bytes {
            n if n < GIBIBYTE => SizeCategory::Small,
            n if n < 10 * GIBIBYTE => SizeCategory::Medium,
            n if n < 40 * GIBIBYTE => SizeCategory::Large,
            _ => SizeCategory::Oversized,
        }
    }
}

impl std::str::FromStr for SizeCategory {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "small" => Self::Small,
            "medium" => Self::Medium,
            "large" => Self::Large,
            "oversized" => Self::Oversized,
            other => {
                return Err(crate::error::Error::config(format!(
                    "invalid size category '{other}'"
                )))
            }
        })
    }
}

impl std::fmt::Display for SizeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Small => "small",
            Self::Medium => "medium",
            Self::Large => "large",
            Self::Oversized => "oversized",
        };
        write!(f, "{s}")
    }
}

/// Validation findings attached to a repository (spec.md §3, Repository >
/// Validation findings). Each boolean flag has an associated JSON detail
/// blob explaining the finding.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationFindings {
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
}

/// The five `exclude_*` booleans passed through to `StartMigration` options
/// (spec.md §3 and §4.2).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct MigrationExclusions {
    pub exclude_releases: bool,
    pub exclude_attachments: bool,
    pub exclude_metadata: bool,
    pub exclude_git_data: bool,
    pub exclude_owner_projects: bool,
}

/// A source-control repository under migration (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    /// Globally-unique `«owner»/«name»` (or flattened ADO convention).
    pub full_name: String,
    pub source_id: i64,
    pub source_url: String,
    /// The owning org/project at the source, denormalized from the source
    /// scan at discovery time so `organization` (spec.md §4.1) can be
    /// filtered without a join against `sources` on every listing query.
    pub organization: Option<String>,

    pub profile: RepositoryProfile,
    pub validation: ValidationFindings,

    pub status: RepositoryStatus,
    pub batch_id: Option<i64>,
    pub priority: i32,
    pub destination_full_name: Option<String>,
    pub destination_url: Option<String>,
    pub source_migration_id: Option<String>,
    pub is_source_locked: bool,
    pub exclusions: MigrationExclusions,
    pub validation_status: Option<ValidationStatus>,
    pub validation_details: Option<serde_json::Value>,
    pub destination_data: Option<serde_json::Value>,
    pub error_message: Option<String>,

    pub discovered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub migrated_at: Option<DateTime<Utc>>,
    pub last_discovery_at: Option<DateTime<Utc>>,
    pub last_dry_run_at: Option<DateTime<Utc>>,
}

impl Repository {
    /// Invariant from spec.md §3: a repository with `batch_id = NULL` must
    /// be in a non-running status.
    pub fn satisfies_unbatched_invariant(&self) -> bool {
        self.batch_id.is_some() || self.status.is_unbatched_eligible()
    }
}

/// Migration API selection for a batch (spec.md §3, Batch). `Elm` is
/// reserved: no adapter exists yet and batch-start must reject it
/// (spec.md §9, Open question).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MigrationApi {
    Gei,
    Elm,
}

impl std::fmt::Display for MigrationApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Gei => write!(f, "GEI"),
            Self::Elm => write!(f, "ELM"),
        }
    }
}

/// The closed set of statuses a batch can occupy (spec.md §3, Batch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Ready,
    InProgress,
    Completed,
    Failed,
    Paused,
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Paused => "paused",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BatchStatus {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "pending" => Self::Pending,
            "ready" => Self::Ready,
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            "failed" => Self::Failed,
            "paused" => Self::Paused,
            other => {
                return Err(crate::error::Error::validation(format!(
                    "unrecognized batch status '{other}'"
                )))
            }
        })
    }
}

/// Batch-level defaults that act as overrides when a member repository does
/// not set its own (spec.md §3, Batch).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchDefaults {
    pub destination_org: Option<String>,
    pub exclude_releases: bool,
    pub exclude_attachments: bool,
}

/// A user-defined group of repositories migrated together (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub batch_type: String,
    pub status: BatchStatus,
    pub migration_api: MigrationApi,
    pub defaults: BatchDefaults,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub dry_run_started_at: Option<DateTime<Utc>>,
    pub dry_run_completed_at: Option<DateTime<Utc>>,
}

/// Per-batch member-status bucket counts (spec.md §4.4,
/// `GetBatchWithStats`).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct BatchStatCounts {
    pub completed: u64,
    pub in_progress: u64,
    pub pending: u64,
    pub failed: u64,
}

impl BatchStatCounts {
    pub fn total(&self) -> u64 {
        self.completed + self.in_progress + self.pending + self.failed
    }

    /// Buckets a repository status into one of the four counters (spec.md
    /// §4.4 bucketing table).
    pub fn bucket_for(status: RepositoryStatus) -> Bucket {
        match status {
            RepositoryStatus::Complete | RepositoryStatus::MigrationComplete => Bucket::Completed,
            RepositoryStatus::PreMigration
            | RepositoryStatus::ArchiveGenerating
            | RepositoryStatus::ArchiveUploading
            | RepositoryStatus::MigrationInProgress => Bucket::InProgress,
            RepositoryStatus::Pending
            | RepositoryStatus::DryRunInProgress
            | RepositoryStatus::DryRunComplete
            | RepositoryStatus::DryRunFailed => Bucket::Pending,
            RepositoryStatus::MigrationFailed | RepositoryStatus::RolledBack => Bucket::Failed,
            // wont_migrate is a terminal off-ramp, not tallied into any of
            // the four buckets defined by spec.md §4.4.
            RepositoryStatus::WontMigrate => Bucket::None,
        }
    }
}

/// Which of the four `BatchStatCounts` buckets a status falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Completed,
    InProgress,
    Pending,
    Failed,
    None,
}

/// One phase of a repository's migration attempt (spec.md §3,
/// MigrationHistory). Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationHistory {
    pub id: i64,
    pub repository_id: i64,
    pub status: RepositoryStatus,
    pub phase: String,
    pub message: Option<String>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
}

/// Structured log level for `MigrationLog` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// A structured event attached to a repository (spec.md §3, MigrationLog).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationLog {
    pub id: i64,
    pub repository_id: i64,
    pub history_id: Option<i64>,
    pub level: LogLevel,
    pub phase: String,
    pub operation: String,
    pub message: String,
    pub detail: Option<serde_json::Value>,
    pub initiated_by: Option<String>,
    pub logged_at: DateTime<Utc>,
}

/// The kind of a repository dependency edge (spec.md §3,
/// RepositoryDependency).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyType {
    Submodule,
    Workflow,
    DependencyGraph,
    Package,
}

impl std::fmt::Display for DependencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Submodule => "submodule",
            Self::Workflow => "workflow",
            Self::DependencyGraph => "dependency_graph",
            Self::Package => "package",
        };
        write!(f, "{s}")
    }
}

/// `(repository_id, dependency_full_name, ...)` edge used for ordering
/// hints and dependency-chain queries (spec.md §3). `is_local` is derived:
/// true iff `dependency_full_name` resolves to a known repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryDependency {
    pub id: i64,
    pub repository_id: i64,
    pub dependency_full_name: String,
    pub dependency_type: DependencyType,
    pub dependency_url: Option<String>,
    pub is_local: bool,
}

/// The type of an inbound source system (spec.md §3, Source).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    GitHub,
    AzureDevOps,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GitHub => write!(f, "github"),
            Self::AzureDevOps => write!(f, "azuredevops"),
        }
    }
}

/// A configured inbound system (spec.md §3, Source). Immutable from the
/// core's view within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub source_type: SourceType,
    pub base_url: String,
    /// Credential reference (not the secret itself — resolved by the
    /// provider adapter at call time).
    pub credentials_ref: String,
    pub organization: Option<String>,
    pub enterprise_slug: Option<String>,
}

/// One-row record of whether the operator has completed initial setup
/// (SPEC_FULL.md §3 supplement).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupStatus {
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

/// A discovery progress counter, written by the (out-of-scope) discovery
/// pipeline and read by UI progress bars (SPEC_FULL.md §3 supplement).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DiscoveryProgress {
    pub repositories_discovered: u64,
    pub repositories_profiled: u64,
}

/// Newtype wrapper for repository/batch UUID-based external handles, used
/// where a caller needs an opaque correlation id (e.g. outbox-style
/// cross-service references) distinct from the 64-bit primary key.
pub type ExternalRef = Uuid;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_category_boundaries_are_exclusive() {
        let profile = |total_size_bytes| RepositoryProfile {
            total_size_bytes,
            ..RepositoryProfile::default()
        };
        assert_eq!(profile(GIBIBYTE - 1).size_category(), SizeCategory::Small);
        assert_eq!(profile(GIBIBYTE).size_category(), SizeCategory::Medium);
        assert_eq!(profile(10 * GIBIBYTE - 1).size_category(), SizeCategory::Medium);
        assert_eq!(profile(10 * GIBIBYTE).size_category(), SizeCategory::Large);
        assert_eq!(profile(40 * GIBIBYTE - 1).size_category(), SizeCategory::Large);
        assert_eq!(profile(40 * GIBIBYTE).size_category(), SizeCategory::Oversized);
    }

    #[test]
    fn size_category_round_trips_through_display_and_from_str() {
        use std::str::FromStr;
        for category in [
            SizeCategory::Small,
            SizeCategory::Medium,
            SizeCategory::Large,
            SizeCategory::Oversized,
        ] {
            let parsed = SizeCategory::from_str(&category.to_string()).unwrap();
            assert_eq!(parsed, category);
        }
    }
}
