//! Skeleton adapter for Azure DevOps as a migration *source* (spec.md §1
//! names it alongside GitHub/GHES). Primarily exercises the adapter trait
//! with a second, REST-shaped error mapping distinct from GEI's GraphQL one.
//!
//! Azure DevOps repositories are migrated into the destination via the same
//! GEI import pipeline once exported; this adapter models the
//! source-side operations (`start_migration` kicks off GEI's ADO importer,
//! `unlock_source` calls the ADO REST API to restore write access).

use crate::{
    DestinationSnapshot, MigrationOptions, MigrationPhase, MigrationStateReport, ProviderAdapter,
    ProviderError, ProviderResult, StartMigrationResult,
};
use async_trait::async_trait;
use migrator_core::entities::Repository;

#[derive(Debug, Clone)]
pub struct AzureDevOpsConfig {
    pub base_url: String,
    pub personal_access_token: String,
}

pub struct AzureDevOpsAdapter {
    config: AzureDevOpsConfig,
    client: reqwest::Client,
}

impl AzureDevOpsAdapter {
    pub fn new(config: AzureDevOpsConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn classify_status(status: reqwest::StatusCode) -> Option<ProviderError> {
        match status {
            s if s == reqwest::StatusCode::UNAUTHORIZED || s == reqwest::StatusCode::FORBIDDEN => {
                Some(ProviderError::AuthError(format!("ADO returned {s}")))
            }
            s if s == reqwest::StatusCode::TOO_MANY_REQUESTS => {
                Some(ProviderError::RateLimited("ADO rate limit".to_string()))
            }
            s if s == reqwest::StatusCode::CONFLICT => Some(ProviderError::AlreadyExists(
                "ADO reports the target already exists".to_string(),
            )),
            s if s.is_server_error() => {
                Some(ProviderError::Transient(format!("ADO returned {s}")))
            }
            _ => None,
        }
    }
}

/// Maps Azure DevOps' lock-state vocabulary onto the canonical phase set.
fn map_ado_phase(phase: &str) -> MigrationPhase {
    match phase {
        "queued" => MigrationPhase::Queued,
        "inProgress" | "exporting" => MigrationPhase::InProgress,
        "completed" => MigrationPhase::Succeeded,
        "failed" => MigrationPhase::Failed,
        _ => MigrationPhase::NotFound,
    }
}

#[async_trait]
impl ProviderAdapter for AzureDevOpsAdapter {
    async fn start_migration(
        &self,
        repository: &Repository,
        options: &MigrationOptions,
    ) -> ProviderResult<StartMigrationResult> {
        let url = format!("{}/_apis/git/repositories/export", self.config.base_url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.personal_access_token)
            .json(&serde_json::json!({
                "sourceUrl": repository.source_url,
                "targetOrg": options.destination_org,
                "targetRepo": options.destination_repo_name,
            }))
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        if let Some(err) = Self::classify_status(response.status()) {
            return Err(err);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Transient(format!("invalid ADO response body: {e}")))?;
        let id = body
            .get("migrationId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| ProviderError::Transient("missing migrationId".to_string()))?
            .to_string();
        let lock_acquired = body
            .get("sourceLocked")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);

        Ok(StartMigrationResult {
            source_migration_id: id,
            lock_acquired,
        })
    }

    async fn get_migration_state(
        &self,
        source_migration_id: &str,
    ) -> ProviderResult<MigrationStateReport> {
        let url = format!(
            "{}/_apis/git/repositories/export/{}",
            self.config.base_url, source_migration_id
        );
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.config.personal_access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(MigrationStateReport {
                phase: MigrationPhase::NotFound,
                progress_percent: None,
                error_message: None,
            });
        }
        if let Some(err) = Self::classify_status(response.status()) {
            return Err(err);
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Transient(format!("invalid ADO response body: {e}")))?;
        let phase = body.get("phase").and_then(|v| v.as_str()).unwrap_or("");
        Ok(MigrationStateReport {
            phase: map_ado_phase(phase),
            progress_percent: body.get("percentComplete").and_then(|v| v.as_f64()),
            error_message: body
                .get("errorMessage")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        })
    }

    async fn unlock_source(&self, source_migration_id: &str) -> ProviderResult<()> {
        let url = format!(
            "{}/_apis/git/repositories/export/{}/unlock",
            self.config.base_url, source_migration_id
        );
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.personal_access_token)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(e.to_string()))?;
        // Idempotent: a 404 means the export record is already gone/unlocked.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(());
        }
        if let Some(err) = Self::classify_status(response.status()) {
            return Err(err);
        }
        Ok(())
    }

    async fn destination_repo_exists(
        &self,
        _destination_org: &str,
        _name: &str,
    ) -> ProviderResult<bool> {
        // ADO is source-only in this topology; destination existence checks
        // always go through the GEI-family adapter that owns the
        // destination. Conservatively report "unknown" as "not present".
        Ok(false)
    }

    async fn validate_destination_repo(
        &self,
        destination_org: &str,
        name: &str,
    ) -> ProviderResult<DestinationSnapshot> {
        Err(ProviderError::Permanent(format!(
            "destination validation for {destination_org}/{name} is not an ADO-adapter concern"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_ado_phases() {
        assert_eq!(map_ado_phase("queued"), MigrationPhase::Queued);
        assert_eq!(map_ado_phase("exporting"), MigrationPhase::InProgress);
        assert_eq!(map_ado_phase("completed"), MigrationPhase::Succeeded);
        assert_eq!(map_ado_phase("failed"), MigrationPhase::Failed);
        assert_eq!(map_ado_phase("weird"), MigrationPhase::NotFound);
    }
}
