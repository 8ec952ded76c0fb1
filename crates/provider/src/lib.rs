//! The provider adapter boundary (C2, spec.md §4.2): the single trait the
//! scheduler drives to start, poll, and unlock a migration against a
//! destination import API, independent of which source/destination pair is
//! behind it.
//!
//! The wire protocols themselves (GitHub GraphQL, Azure DevOps REST) are out
//! of scope per spec.md §1 — `github_gei` and `azure_devops` below show the
//! shape of a real adapter without importing a full SDK for either.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod azure_devops;
pub mod github_gei;
pub mod mock;

use async_trait::async_trait;
use migrator_core::entities::Repository;
use thiserror::Error;

pub use mock::MockProviderAdapter;

/// Errors an adapter call can fail with (spec.md §4.2). Kept distinct from
/// [`migrator_core::Error`] because the scheduler must branch on
/// `AlreadyExists` specifically (the `dest_repo_exists_action` policy,
/// spec.md §4.6) before falling back to the generic taxonomy.
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// The destination already has a repository at the requested name.
    #[error("destination repository already exists: {0}")]
    AlreadyExists(String),

    /// The call is not valid given the migration's current state (e.g.
    /// polling a migration id the destination has never heard of outside
    /// the expected `not_found` phase).
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Retryable: destination rate limiting.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Retryable: transient network/5xx/timeout failure.
    #[error("transient error: {0}")]
    Transient(String),

    /// Terminal: authentication/authorization failure.
    #[error("authentication error: {0}")]
    AuthError(String),

    /// Terminal: any other unrecoverable failure.
    #[error("permanent error: {0}")]
    Permanent(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited(_) | Self::Transient(_))
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::AuthError(_) | Self::Permanent(_))
    }
}

/// Converts an adapter failure into the kernel-wide taxonomy for call sites
/// that don't need to special-case `AlreadyExists`/`InvalidState`.
impl From<ProviderError> for migrator_core::Error {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::AlreadyExists(m) => migrator_core::Error::permanent(m),
            ProviderError::InvalidState(m) => migrator_core::Error::validation(m),
            ProviderError::RateLimited(m) => migrator_core::Error::rate_limited(m),
            ProviderError::Transient(m) => migrator_core::Error::transient(m),
            ProviderError::AuthError(m) => migrator_core::Error::auth(m),
            ProviderError::Permanent(m) => migrator_core::Error::permanent(m),
        }
    }
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Options passed through to `StartMigration` (spec.md §4.2), built from a
/// repository's `MigrationExclusions` plus batch/repo destination overrides.
#[derive(Debug, Clone, Default)]
pub struct MigrationOptions {
    pub destination_org: String,
    pub destination_repo_name: String,
    pub exclude_releases: bool,
    pub exclude_attachments: bool,
    pub exclude_metadata: bool,
    pub exclude_git_data: bool,
    pub exclude_owner_projects: bool,
    /// Visibility the scheduler has already resolved via
    /// `migration.visibility_handling` (spec.md §4.6); `None` leaves the
    /// adapter's own default behavior.
    pub target_visibility: Option<TargetVisibility>,
    /// `true` for a dry run: the adapter must exercise the import pipeline
    /// without completing the destination cutover (glossary, "Dry run").
    pub dry_run: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetVisibility {
    Public,
    Private,
    Internal,
}

/// Result of a successful `StartMigration` call.
#[derive(Debug, Clone)]
pub struct StartMigrationResult {
    pub source_migration_id: String,
    /// Whether the adapter reports the source was made read-only as a side
    /// effect of starting the import (glossary, "Source locked").
    pub lock_acquired: bool,
}

/// Canonical migration phases a `GetMigrationState` poll can report
/// (spec.md §4.2). Adapter-specific phase names must map onto this set
/// monotonically (spec.md §4.6, transition 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationPhase {
    Queued,
    InProgress,
    Succeeded,
    Failed,
    NotFound,
}

/// A single poll's report of a migration's destination-side state.
#[derive(Debug, Clone)]
pub struct MigrationStateReport {
    pub phase: MigrationPhase,
    pub progress_percent: Option<f64>,
    pub error_message: Option<String>,
}

/// Post-migration comparison counters from `ValidateDestinationRepo`
/// (spec.md §4.2), fed into `migrator_eligibility::classify_validation`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DestinationSnapshot {
    pub size_bytes: u64,
    pub commit_count: u64,
    pub issue_count: u64,
    pub pr_count: u64,
    pub branch_count: u64,
    pub release_count: u64,
}

/// The contract the scheduler drives (C2, spec.md §4.2). One implementation
/// per source/destination pair; the scheduler never branches on which.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Initiates the destination import for one repository.
    async fn start_migration(
        &self,
        repository: &Repository,
        options: &MigrationOptions,
    ) -> ProviderResult<StartMigrationResult>;

    /// Polls the destination-side state of a previously started migration.
    async fn get_migration_state(
        &self,
        source_migration_id: &str,
    ) -> ProviderResult<MigrationStateReport>;

    /// Idempotent: a no-op if the source is not currently locked.
    async fn unlock_source(&self, source_migration_id: &str) -> ProviderResult<()>;

    /// Whether a repository already exists at the destination location.
    async fn destination_repo_exists(
        &self,
        destination_org: &str,
        name: &str,
    ) -> ProviderResult<bool>;

    /// Reads back destination counters for post-migration validation.
    async fn validate_destination_repo(
        &self,
        destination_org: &str,
        name: &str,
    ) -> ProviderResult<DestinationSnapshot>;
}
