//! Pure decision-table rules for batch eligibility and status-transition
//! guards (spec.md §4.3). No I/O, no hidden state: every function here is
//! a total function of its arguments.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

use migrator_core::entities::{Repository, RepositoryStatus, ValidationStatus};

pub mod validation;

/// The statuses from which a repository may be assigned to a batch
/// (spec.md §4.3, rule 3).
const BATCHABLE_STATUSES: &[RepositoryStatus] = &[
    RepositoryStatus::Pending,
    RepositoryStatus::DryRunComplete,
    RepositoryStatus::DryRunFailed,
    RepositoryStatus::MigrationFailed,
    RepositoryStatus::RolledBack,
];

/// The statuses from which `ResetToDiscovered` may run (spec.md §4.3).
const RESETTABLE_STATUSES: &[RepositoryStatus] = &[
    RepositoryStatus::WontMigrate,
    RepositoryStatus::MigrationFailed,
    RepositoryStatus::RolledBack,
];

/// The statuses from which `MarkAsWontMigrate` is forbidden (spec.md §4.3).
const WONT_MIGRATE_BLOCKED_STATUSES: &[RepositoryStatus] =
    &[RepositoryStatus::Complete, RepositoryStatus::MigrationComplete];

/// Decides whether a repository may be assigned to a batch right now.
///
/// Decision table (first match wins, spec.md §4.3):
/// 1. Already batched → not eligible.
/// 2. Oversized (>40 GiB) → not eligible.
/// 3. Status outside the batchable set → not eligible.
/// 4. Otherwise eligible.
pub fn is_eligible_for_batch(repo: &Repository) -> (bool, Option<String>) {
    if repo.batch_id.is_some() {
        return (
            false,
            Some("repository is already assigned to a batch".to_string()),
        );
    }
    if repo.validation.has_oversized_repository {
        return (
            false,
            Some(
                "repository exceeds GitHub's 40 GiB size limit and requires remediation"
                    .to_string(),
            ),
        );
    }
    if !BATCHABLE_STATUSES.contains(&repo.status) {
        return (
            false,
            Some(format!(
                "repository status '{}' is not eligible for batch assignment",
                repo.status
            )),
        );
    }
    (true, None)
}

/// Whether `MarkAsWontMigrate` is permitted for a repository in the given
/// status (spec.md §4.3).
pub fn can_mark_as_wont_migrate(status: RepositoryStatus) -> bool {
    !WONT_MIGRATE_BLOCKED_STATUSES.contains(&status)
}

/// Whether `ResetToDiscovered` is permitted for a repository in the given
/// status (spec.md §4.3).
pub fn can_reset_to_discovered(status: RepositoryStatus) -> bool {
    RESETTABLE_STATUSES.contains(&status)
}

/// The deltas between a source repository profile and a post-migration
/// destination snapshot, used to compute `validation_status` (spec.md
/// §4.3). Ratios are `destination / source`; `None` when the source count
/// was zero (nothing to compare).
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidationDeltas {
    pub size_ratio: Option<f64>,
    pub commit_count_ratio: Option<f64>,
    pub issue_count_ratio: Option<f64>,
    pub pr_count_ratio: Option<f64>,
    pub branch_count_ratio: Option<f64>,
}

/// Maps raw post-migration deltas to a `validation_status` (spec.md §4.3).
///
/// A ratio exactly `1.0` (or absent, nothing to compare) never downgrades
/// the verdict. A ratio below `0.98` is a mismatch; between `0.98` and
/// `1.0` is a warning (rounding/async replication slop); above `1.0` (the
/// destination reports more than the source, e.g. because a retry created
/// duplicate objects) is also a warning, never a pass.
pub fn classify_validation(deltas: &ValidationDeltas) -> ValidationStatus {
    let ratios = [
        deltas.size_ratio,
        deltas.commit_count_ratio,
        deltas.issue_count_ratio,
        deltas.pr_count_ratio,
        deltas.branch_count_ratio,
    ];

    let mut worst = ValidationStatus::Passed;
    for ratio in ratios.into_iter().flatten() {
        let verdict = if ratio < 0.0 {
            ValidationStatus::Failed
        } else if ratio < 0.98 {
            ValidationStatus::Mismatch
        } else if ratio < 1.0 || ratio > 1.0 {
            ValidationStatus::Warning
        } else {
            ValidationStatus::Passed
        };
        worst = worse_of(worst, verdict);
    }
    worst
}

fn severity(status: ValidationStatus) -> u8 {
    match status {
        ValidationStatus::Passed => 0,
        ValidationStatus::Warning => 1,
        ValidationStatus::Mismatch => 2,
        ValidationStatus::Failed => 3,
    }
}

fn worse_of(a: ValidationStatus, b: ValidationStatus) -> ValidationStatus {
    if severity(b) > severity(a) {
        b
    } else {
        a
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migrator_core::entities::{
        MigrationExclusions, RepositoryProfile, ValidationFindings,
    };
    use pretty_assertions::assert_eq;

    fn base_repo() -> Repository {
        Repository {
            id: 1,
            full_name: "acme/alpha".to_string(),
            source_id: 1,
            source_url: "https://github.com/acme/alpha".to_string(),
            organization: None,
            profile: RepositoryProfile::default(),
            validation: ValidationFindings::default(),
            status: RepositoryStatus::Pending,
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
            discovered_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            migrated_at: None,
            last_discovery_at: None,
            last_dry_run_at: None,
        }
    }

    #[test]
    fn pending_unbatched_repo_is_eligible() {
        let repo = base_repo();
        assert_eq!(is_eligible_for_batch(&repo), (true, None));
    }

    #[test]
    fn already_batched_repo_is_not_eligible() {
        let mut repo = base_repo();
        repo.batch_id = Some(7);
        let (eligible, reason) = is_eligible_for_batch(&repo);
        assert!(!eligible);
        assert_eq!(
            reason.as_deref(),
            Some("repository is already assigned to a batch")
        );
    }

    #[test]
    fn oversized_repo_is_never_eligible_even_when_pending() {
        let mut repo = base_repo();
        repo.validation.has_oversized_repository = true;
        let (eligible, reason) = is_eligible_for_batch(&repo);
        assert!(!eligible);
        assert!(reason.unwrap().contains("40 GiB"));
    }

    #[test]
    fn running_status_is_not_eligible() {
        let mut repo = base_repo();
        repo.status = RepositoryStatus::MigrationInProgress;
        let (eligible, reason) = is_eligible_for_batch(&repo);
        assert!(!eligible);
        assert!(reason.unwrap().contains("migration_in_progress"));
    }

    #[test]
    fn oversized_check_precedes_status_check() {
        // Rule 2 (oversized) must fire before rule 3 (status) even when the
        // status is also non-batchable, per the "first match wins" table.
        let mut repo = base_repo();
        repo.status = RepositoryStatus::MigrationInProgress;
        repo.validation.has_oversized_repository = true;
        let (_, reason) = is_eligible_for_batch(&repo);
        assert!(reason.unwrap().contains("40 GiB"));
    }

    #[test]
    fn wont_migrate_blocked_only_for_complete_states() {
        assert!(!can_mark_as_wont_migrate(RepositoryStatus::Complete));
        assert!(!can_mark_as_wont_migrate(
            RepositoryStatus::MigrationComplete
        ));
        assert!(can_mark_as_wont_migrate(RepositoryStatus::Pending));
        assert!(can_mark_as_wont_migrate(RepositoryStatus::MigrationFailed));
    }

    #[test]
    fn reset_to_discovered_allowed_only_from_terminal_failure_states() {
        assert!(can_reset_to_discovered(RepositoryStatus::WontMigrate));
        assert!(can_reset_to_discovered(RepositoryStatus::MigrationFailed));
        assert!(can_reset_to_discovered(RepositoryStatus::RolledBack));
        assert!(!can_reset_to_discovered(RepositoryStatus::Pending));
        assert!(!can_reset_to_discovered(RepositoryStatus::Complete));
    }

    #[test]
    fn classify_validation_passes_on_exact_match() {
        let deltas = ValidationDeltas {
            size_ratio: Some(1.0),
            commit_count_ratio: Some(1.0),
            ..Default::default()
        };
        assert_eq!(classify_validation(&deltas), ValidationStatus::Passed);
    }

    #[test]
    fn classify_validation_warns_on_small_shortfall() {
        let deltas = ValidationDeltas {
            commit_count_ratio: Some(0.99),
            ..Default::default()
        };
        assert_eq!(classify_validation(&deltas), ValidationStatus::Warning);
    }

    #[test]
    fn classify_validation_mismatches_on_large_shortfall() {
        let deltas = ValidationDeltas {
            pr_count_ratio: Some(0.5),
            ..Default::default()
        };
        assert_eq!(classify_validation(&deltas), ValidationStatus::Mismatch);
    }

    #[test]
    fn classify_validation_takes_the_worst_of_several_ratios() {
        let deltas = ValidationDeltas {
            size_ratio: Some(1.0),
            commit_count_ratio: Some(0.99),
            pr_count_ratio: Some(0.5),
            ..Default::default()
        };
        assert_eq!(classify_validation(&deltas), ValidationStatus::Mismatch);
    }
}
