//! Builds a provider `MigrationOptions` from a repository's own exclusions,
//! its batch's defaults (batch settings act as overrides when the
//! repository doesn't set its own, spec.md §3 Batch), and the configured
//! visibility-handling policy (spec.md §4.6).

use migrator_core::config::{MigrationConfig, VisibilityPolicy};
use migrator_core::entities::{Batch, Repository};
use migrator_provider::{MigrationOptions, TargetVisibility};

fn visibility_policy_to_target(policy: VisibilityPolicy) -> TargetVisibility {
    match policy {
        VisibilityPolicy::Public => TargetVisibility::Public,
        VisibilityPolicy::Private => TargetVisibility::Private,
        VisibilityPolicy::Internal => TargetVisibility::Internal,
    }
}

/// Resolves the destination org: the repository's own destination, if
/// already known, otherwise the batch's default.
fn resolve_destination_org(repository: &Repository, batch: Option<&Batch>) -> String {
    if let Some(full_name) = &repository.destination_full_name {
        if let Some((org, _)) = full_name.split_once('/') {
            return org.to_string();
        }
    }
    batch
        .and_then(|b| b.defaults.destination_org.clone())
        .unwrap_or_default()
}

fn resolve_destination_repo_name(repository: &Repository) -> String {
    if let Some(full_name) = &repository.destination_full_name {
        if let Some((_, name)) = full_name.split_once('/') {
            return name.to_string();
        }
    }
    repository
        .full_name
        .rsplit_once('/')
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| repository.full_name.clone())
}

/// Builds the options for `StartMigration`, applying batch-level defaults
/// for any `exclude_*` setting the repository itself leaves at its default
/// (`false`), and the configured visibility policy (spec.md §4.6:
/// "the scheduler adjusts StartMigration options accordingly before the
/// call").
pub fn build_migration_options(
    repository: &Repository,
    batch: Option<&Batch>,
    config: &MigrationConfig,
    source_visibility: Option<VisibilityPolicy>,
    dry_run: bool,
) -> MigrationOptions {
    let exclude_releases =
        repository.exclusions.exclude_releases || batch.map(|b| b.defaults.exclude_releases).unwrap_or(false);
    let exclude_attachments = repository.exclusions.exclude_attachments
        || batch.map(|b| b.defaults.exclude_attachments).unwrap_or(false);

    let target_visibility = source_visibility.map(|visibility| match visibility {
        VisibilityPolicy::Public => visibility_policy_to_target(config.visibility_handling.public_repos),
        VisibilityPolicy::Internal => {
            visibility_policy_to_target(config.visibility_handling.internal_repos)
        }
        VisibilityPolicy::Private => TargetVisibility::Private,
    });

    MigrationOptions {
        destination_org: resolve_destination_org(repository, batch),
        destination_repo_name: resolve_destination_repo_name(repository),
        exclude_releases,
        exclude_attachments,
        exclude_metadata: repository.exclusions.exclude_metadata,
        exclude_git_data: repository.exclusions.exclude_git_data,
        exclude_owner_projects: repository.exclusions.exclude_owner_projects,
        target_visibility,
        dry_run,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migrator_core::config::MigrationConfig;
    use migrator_core::entities::{
        BatchDefaults, MigrationApi, MigrationExclusions, RepositoryProfile, RepositoryStatus,
        ValidationFindings,
    };
    use pretty_assertions::assert_eq;

    fn repo() -> Repository {
        Repository {
            id: 1,
            full_name: "acme/alpha".to_string(),
            source_id: 1,
            source_url: "https://github.com/acme/alpha".to_string(),
            organization: None,
            profile: RepositoryProfile::default(),
            validation: ValidationFindings::default(),
            status: RepositoryStatus::Pending,
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
            discovered_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            migrated_at: None,
            last_discovery_at: None,
            last_dry_run_at: None,
        }
    }

    fn batch() -> Batch {
        Batch {
            id: 1,
            name: "B1".to_string(),
            description: None,
            batch_type: "standard".to_string(),
            status: migrator_core::entities::BatchStatus::InProgress,
            migration_api: MigrationApi::Gei,
            defaults: BatchDefaults {
                destination_org: Some("acme-dest".to_string()),
                exclude_releases: true,
                exclude_attachments: false,
            },
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            dry_run_started_at: None,
            dry_run_completed_at: None,
        }
    }

    #[test]
    fn batch_default_destination_org_is_used_when_repo_has_none() {
        let opts = build_migration_options(&repo(), Some(&batch()), &MigrationConfig::default(), None, false);
        assert_eq!(opts.destination_org, "acme-dest");
        assert_eq!(opts.destination_repo_name, "alpha");
    }

    #[test]
    fn batch_exclude_releases_override_applies_when_repo_does_not_set_it() {
        let opts = build_migration_options(&repo(), Some(&batch()), &MigrationConfig::default(), None, false);
        assert!(opts.exclude_releases);
        assert!(!opts.exclude_attachments);
    }

    #[test]
    fn repo_own_destination_full_name_wins_over_batch_default() {
        let mut r = repo();
        r.destination_full_name = Some("other-org/renamed".to_string());
        let opts = build_migration_options(&r, Some(&batch()), &MigrationConfig::default(), None, false);
        assert_eq!(opts.destination_org, "other-org");
        assert_eq!(opts.destination_repo_name, "renamed");
    }
}
