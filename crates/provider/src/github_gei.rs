//! Skeleton adapter for GitHub Enterprise Importer (GEI), the async import
//! API spec.md's glossary names as the "GEI" migration API. Shows the shape
//! of a real adapter — the `startRepositoryMigration` GraphQL mutation and
//! polling `RepositoryMigration.state` — without importing a full GitHub
//! GraphQL client, which spec.md §1 scopes out as a provider SDK concern.

use crate::{
    DestinationSnapshot, MigrationOptions, MigrationPhase, MigrationStateReport, ProviderAdapter,
    ProviderError, ProviderResult, StartMigrationResult,
};
use async_trait::async_trait;
use migrator_core::entities::Repository;
use serde_json::json;

/// Credentials and endpoint for one GEI-backed destination.
#[derive(Debug, Clone)]
pub struct GitHubGeiConfig {
    pub graphql_url: String,
    pub token: String,
}

pub struct GitHubGeiAdapter {
    config: GitHubGeiConfig,
    client: reqwest::Client,
}

impl GitHubGeiAdapter {
    pub fn new(config: GitHubGeiConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    async fn graphql(&self, query: &str, variables: serde_json::Value) -> ProviderResult<serde_json::Value> {
        let response = self
            .client
            .post(&self.config.graphql_url)
            .bearer_auth(&self.config.token)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| classify_reqwest_error(&e))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(ProviderError::AuthError(format!(
                "GitHub GraphQL returned {status}"
            )));
        }
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited(
                "GitHub GraphQL secondary rate limit".to_string(),
            ));
        }
        if status.is_server_error() {
            return Err(ProviderError::Transient(format!(
                "GitHub GraphQL returned {status}"
            )));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| ProviderError::Transient(format!("invalid GraphQL response body: {e}")))
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> ProviderError {
    if err.is_timeout() || err.is_connect() {
        ProviderError::Transient(err.to_string())
    } else {
        ProviderError::Permanent(err.to_string())
    }
}

/// Maps the `RepositoryMigration.state` enum GEI reports onto the canonical
/// phase set (spec.md §4.6, transition 3: "mapping is the adapter's concern
/// but must be monotonic").
fn map_gei_state(state: &str) -> MigrationPhase {
    match state {
        "QUEUED" | "PENDING_VALIDATION" => MigrationPhase::Queued,
        "IN_PROGRESS" | "EXPORTING" | "IMPORTING" | "VALIDATING" => MigrationPhase::InProgress,
        "SUCCEEDED" => MigrationPhase::Succeeded,
        "FAILED" | "FAILED_VALIDATION" => MigrationPhase::Failed,
        _ => MigrationPhase::NotFound,
    }
}

#[async_trait]
impl ProviderAdapter for GitHubGeiAdapter {
    async fn start_migration(
        &self,
        repository: &Repository,
        options: &MigrationOptions,
    ) -> ProviderResult<StartMigrationResult> {
        let body = self
            .graphql(
                "mutation($input: StartRepositoryMigrationInput!) { \
                    startRepositoryMigration(input: $input) { \
                        repositoryMigration { id state } } }",
                json!({
                    "input": {
                        "sourceRepositoryUrl": repository.source_url,
                        "targetOrgName": options.destination_org,
                        "targetRepoName": options.destination_repo_name,
                        "skipReleases": options.exclude_releases,
                        "excludeAttachments": options.exclude_attachments,
                        "excludeMetadata": options.exclude_metadata,
                        "excludeGitData": options.exclude_git_data,
                        "excludeOwnerProjects": options.exclude_owner_projects,
                    }
                }),
            )
            .await?;

        if let Some(errors) = body.get("errors").and_then(|e| e.as_array()) {
            if let Some(first) = errors.first() {
                let message = first
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("unknown GraphQL error");
                if message.to_lowercase().contains("already exists") {
                    return Err(ProviderError::AlreadyExists(message.to_string()));
                }
                return Err(ProviderError::Permanent(message.to_string()));
            }
        }

        let migration = body
            .pointer("/data/startRepositoryMigration/repositoryMigration")
            .ok_or_else(|| {
                ProviderError::Transient("missing repositoryMigration in GEI response".to_string())
            })?;
        let id = migration
            .get("id")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::Transient("missing migration id".to_string()))?
            .to_string();

        Ok(StartMigrationResult {
            source_migration_id: id,
            lock_acquired: true,
        })
    }

    async fn get_migration_state(
        &self,
        source_migration_id: &str,
    ) -> ProviderResult<MigrationStateReport> {
        let body = self
            .graphql(
                "query($id: ID!) { node(id: $id) { ... on RepositoryMigration { \
                    state migrationLogUrl failureReason } } }",
                json!({ "id": source_migration_id }),
            )
            .await?;

        let node = body.pointer("/data/node");
        let Some(node) = node else {
            return Ok(MigrationStateReport {
                phase: MigrationPhase::NotFound,
                progress_percent: None,
                error_message: None,
            });
        };
        let state = node.get("state").and_then(|v| v.as_str()).unwrap_or("");
        let error_message = node
            .get("failureReason")
            .and_then(|v| v.as_str())
            .map(str::to_string);

        Ok(MigrationStateReport {
            phase: map_gei_state(state),
            progress_percent: None,
            error_message,
        })
    }

    async fn unlock_source(&self, source_migration_id: &str) -> ProviderResult<()> {
        self.graphql(
            "mutation($id: ID!) { unlockRepository(input: { repositoryMigrationId: $id }) { \
                success } }",
            json!({ "id": source_migration_id }),
        )
        .await?;
        Ok(())
    }

    async fn destination_repo_exists(
        &self,
        destination_org: &str,
        name: &str,
    ) -> ProviderResult<bool> {
        let body = self
            .graphql(
                "query($owner: String!, $name: String!) { repository(owner: $owner, name: $name) { id } }",
                json!({ "owner": destination_org, "name": name }),
            )
            .await?;
        Ok(body.pointer("/data/repository").is_some())
    }

    async fn validate_destination_repo(
        &self,
        destination_org: &str,
        name: &str,
    ) -> ProviderResult<DestinationSnapshot> {
        let body = self
            .graphql(
                "query($owner: String!, $name: String!) { repository(owner: $owner, name: $name) { \
                    diskUsage issues { totalCount } pullRequests { totalCount } refs(refPrefix: \"refs/heads/\") { totalCount } releases { totalCount } } }",
                json!({ "owner": destination_org, "name": name }),
            )
            .await?;
        let repo = body.pointer("/data/repository").ok_or_else(|| {
            ProviderError::Permanent(format!("{destination_org}/{name} not found at destination"))
        })?;
        let count_of = |pointer: &str| -> u64 {
            repo.pointer(pointer)
                .and_then(|v| v.as_u64())
                .unwrap_or_default()
        };
        Ok(DestinationSnapshot {
            size_bytes: count_of("/diskUsage") * 1024,
            commit_count: 0,
            issue_count: count_of("/issues/totalCount"),
            pr_count: count_of("/pullRequests/totalCount"),
            branch_count: count_of("/refs/totalCount"),
            release_count: count_of("/releases/totalCount"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_gei_states_monotonically() {
        assert_eq!(map_gei_state("QUEUED"), MigrationPhase::Queued);
        assert_eq!(map_gei_state("IMPORTING"), MigrationPhase::InProgress);
        assert_eq!(map_gei_state("SUCCEEDED"), MigrationPhase::Succeeded);
        assert_eq!(map_gei_state("FAILED"), MigrationPhase::Failed);
        assert_eq!(map_gei_state("SOMETHING_NEW"), MigrationPhase::NotFound);
    }
}
