//! Typed query filters for repository listing.
//!
//! spec.md §9 flags untyped `HashMap<String, String>` filter maps as a
//! design smell inherited from the original implementation: unknown keys
//! silently match nothing instead of failing loudly. `RepositoryFilter` is a
//! closed struct of optional, strongly-typed predicates instead — passing an
//! unsupported filter is a compile error, not a silent no-op.

use crate::config::VisibilityPolicy;
use crate::entities::{BatchStatus, RepositoryStatus, SizeCategory, SourceType, ValidationStatus};

/// Ordering for `ListRepositories` (spec.md §4.1 `sort_by` key). Always
/// ascending; callers that need descending reverse the returned `Vec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositorySortKey {
    DiscoveredAt,
    UpdatedAt,
    TotalSizeBytes,
    Priority,
}

/// A composable set of predicates for listing repositories. Every field is
/// optional; `None` means "don't filter on this dimension". All set fields
/// are ANDed together.
#[derive(Debug, Clone, Default)]
pub struct RepositoryFilter {
    pub status: Option<RepositoryStatus>,
    pub statuses: Option<Vec<RepositoryStatus>>,
    pub source_id: Option<i64>,
    pub batch_id: Option<i64>,
    /// `Some(None)` means "unbatched only"; `None` means "don't filter on
    /// batch membership"; `Some(Some(id))` is equivalent to `batch_id`.
    pub unbatched_only: bool,
    pub validation_status: Option<ValidationStatus>,
    pub full_name_contains: Option<String>,
    pub has_blocking_findings: Option<bool>,
    pub organization: Option<String>,
    pub min_size_bytes: Option<u64>,
    pub max_size_bytes: Option<u64>,
    pub has_lfs: Option<bool>,
    pub has_submodules: Option<bool>,
    pub has_oversized_repository: Option<bool>,
    pub has_large_files: Option<bool>,
    pub visibility: Option<VisibilityPolicy>,
    pub is_archived: Option<bool>,
    pub is_fork: Option<bool>,
    pub min_complexity: Option<f64>,
    pub size_category: Option<SizeCategory>,
    /// `available_for_batch` (spec.md §4.1): the same three predicates
    /// `migrator_eligibility::is_eligible_for_batch` checks (unbatched, not
    /// oversized, status in the batchable set), expressed here as a
    /// listing-side shortcut rather than a stored column.
    pub available_for_batch: Option<bool>,
    pub sort_by: Option<RepositorySortKey>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl RepositoryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: RepositoryStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_statuses(mut self, statuses: Vec<RepositoryStatus>) -> Self {
        self.statuses = Some(statuses);
        self
    }

    pub fn with_source(mut self, source_id: i64) -> Self {
        self.source_id = Some(source_id);
        self
    }

    pub fn with_batch(mut self, batch_id: i64) -> Self {
        self.batch_id = Some(batch_id);
        self
    }

    pub fn unbatched(mut self) -> Self {
        self.unbatched_only = true;
        self.batch_id = None;
        self
    }

    pub fn with_validation_status(mut self, status: ValidationStatus) -> Self {
        self.validation_status = Some(status);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    pub fn with_organization(mut self, organization: impl Into<String>) -> Self {
        self.organization = Some(organization.into());
        self
    }

    pub fn with_size_range(mut self, min_bytes: Option<u64>, max_bytes: Option<u64>) -> Self {
        self.min_size_bytes = min_bytes;
        self.max_size_bytes = max_bytes;
        self
    }

    pub fn with_has_lfs(mut self, has_lfs: bool) -> Self {
        self.has_lfs = Some(has_lfs);
        self
    }

    pub fn with_has_submodules(mut self, has_submodules: bool) -> Self {
        self.has_submodules = Some(has_submodules);
        self
    }

    pub fn with_has_oversized_repository(mut self, has_oversized_repository: bool) -> Self {
        self.has_oversized_repository = Some(has_oversized_repository);
        self
    }

    pub fn with_has_large_files(mut self, has_large_files: bool) -> Self {
        self.has_large_files = Some(has_large_files);
        self
    }

    pub fn with_visibility(mut self, visibility: VisibilityPolicy) -> Self {
        self.visibility = Some(visibility);
        self
    }

    pub fn with_is_archived(mut self, is_archived: bool) -> Self {
        self.is_archived = Some(is_archived);
        self
    }

    pub fn with_is_fork(mut self, is_fork: bool) -> Self {
        self.is_fork = Some(is_fork);
        self
    }

    pub fn with_min_complexity(mut self, min_complexity: f64) -> Self {
        self.min_complexity = Some(min_complexity);
        self
    }

    pub fn with_size_category(mut self, size_category: SizeCategory) -> Self {
        self.size_category = Some(size_category);
        self
    }

    pub fn with_available_for_batch(mut self, available: bool) -> Self {
        self.available_for_batch = Some(available);
        self
    }

    pub fn with_sort_by(mut self, sort_by: RepositorySortKey) -> Self {
        self.sort_by = Some(sort_by);
        self
    }
}

/// Typed filter for batch listing, mirroring `RepositoryFilter`'s rationale.
#[derive(Debug, Clone, Default)]
pub struct BatchFilter {
    pub status: Option<BatchStatus>,
    pub name_contains: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl BatchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, status: BatchStatus) -> Self {
        self.status = Some(status);
        self
    }
}

/// Typed filter for source listing.
#[derive(Debug, Clone, Default)]
pub struct SourceFilter {
    pub source_type: Option<SourceType>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_only_requested_fields() {
        let f = RepositoryFilter::new()
            .with_status(RepositoryStatus::Pending)
            .with_limit(50);
        assert_eq!(f.status, Some(RepositoryStatus::Pending));
        assert_eq!(f.limit, Some(50));
        assert!(f.source_id.is_none());
        assert!(!f.unbatched_only);
    }

    #[test]
    fn unbatched_clears_batch_id() {
        let f = RepositoryFilter::new().with_batch(5).unbatched();
        assert!(f.unbatched_only);
        assert!(f.batch_id.is_none());
    }

    #[test]
    fn size_and_visibility_builders_set_only_requested_fields() {
        let f = RepositoryFilter::new()
            .with_organization("acme")
            .with_size_range(Some(100), Some(200))
            .with_visibility(VisibilityPolicy::Internal)
            .with_size_category(crate::entities::SizeCategory::Large);
        assert_eq!(f.organization.as_deref(), Some("acme"));
        assert_eq!(f.min_size_bytes, Some(100));
        assert_eq!(f.max_size_bytes, Some(200));
        assert_eq!(f.visibility, Some(VisibilityPolicy::Internal));
        assert_eq!(f.size_category, Some(crate::entities::SizeCategory::Large));
        assert!(f.is_archived.is_none());
    }

    #[test]
    fn available_for_batch_builder_sets_the_flag() {
        let f = RepositoryFilter::new().with_available_for_batch(true);
        assert_eq!(f.available_for_batch, Some(true));
    }
}
