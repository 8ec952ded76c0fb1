//! Configurable canned-response adapter used by the scheduler's test suite
//! to drive spec.md §8 scenarios S1 (happy path), S2 (rate limiting), and S4
//! (destination-exists) without a live provider.

use crate::{
    DestinationSnapshot, MigrationOptions, MigrationPhase, MigrationStateReport, ProviderAdapter,
    ProviderError, ProviderResult, StartMigrationResult,
};
use async_trait::async_trait;
use migrator_core::entities::Repository;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    /// Per-`full_name` queue of canned `start_migration` outcomes, consumed
    /// front-to-back; once exhausted, defaults to a fresh success.
    start_responses: HashMap<String, VecDeque<ProviderResult<StartMigrationResult>>>,
    /// Per-`source_migration_id` queue of canned poll reports, consumed
    /// front-to-back; once exhausted, the last-seen report repeats.
    phase_sequences: HashMap<String, VecDeque<MigrationStateReport>>,
    last_phase: HashMap<String, MigrationStateReport>,
    unlocked: Vec<String>,
    existing_destinations: Vec<(String, String)>,
    validation_snapshots: HashMap<(String, String), DestinationSnapshot>,
    next_migration_id: u64,
}

/// In-memory `ProviderAdapter` whose responses are scripted ahead of time.
pub struct MockProviderAdapter {
    state: Mutex<State>,
}

impl Default for MockProviderAdapter {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                next_migration_id: 1,
                ..Default::default()
            }),
        }
    }
}

impl MockProviderAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queues a `start_migration` outcome for the given repository
    /// `full_name`, consumed in the order enqueued.
    pub fn enqueue_start_response(
        &self,
        full_name: impl Into<String>,
        response: ProviderResult<StartMigrationResult>,
    ) {
        self.lock()
            .start_responses
            .entry(full_name.into())
            .or_default()
            .push_back(response);
    }

    /// Convenience: queues `RateLimited` `count` times for `full_name`.
    pub fn enqueue_rate_limited(&self, full_name: impl Into<String>, count: usize) {
        let full_name = full_name.into();
        for _ in 0..count {
            self.enqueue_start_response(
                full_name.clone(),
                Err(ProviderError::RateLimited("mock rate limit".to_string())),
            );
        }
    }

    /// Queues a poll phase report for the given `source_migration_id`.
    pub fn enqueue_phase(
        &self,
        source_migration_id: impl Into<String>,
        phase: MigrationPhase,
        progress_percent: Option<f64>,
        error_message: Option<String>,
    ) {
        self.lock()
            .phase_sequences
            .entry(source_migration_id.into())
            .or_default()
            .push_back(MigrationStateReport {
                phase,
                progress_percent,
                error_message,
            });
    }

    /// Marks a destination location as already occupied, for
    /// `destination_repo_exists`.
    pub fn seed_existing_destination(&self, org: impl Into<String>, name: impl Into<String>) {
        self.lock()
            .existing_destinations
            .push((org.into(), name.into()));
    }

    pub fn seed_validation_snapshot(
        &self,
        org: impl Into<String>,
        name: impl Into<String>,
        snapshot: DestinationSnapshot,
    ) {
        self.lock()
            .validation_snapshots
            .insert((org.into(), name.into()), snapshot);
    }

    pub fn unlocked_migration_ids(&self) -> Vec<String> {
        self.lock().unlocked.clone()
    }
}

#[async_trait]
impl ProviderAdapter for MockProviderAdapter {
    async fn start_migration(
        &self,
        repository: &Repository,
        _options: &MigrationOptions,
    ) -> ProviderResult<StartMigrationResult> {
        let mut state = self.lock();
        if let Some(queue) = state.start_responses.get_mut(&repository.full_name) {
            if let Some(response) = queue.pop_front() {
                return response;
            }
        }
        let id = state.next_migration_id;
        state.next_migration_id += 1;
        Ok(StartMigrationResult {
            source_migration_id: id.to_string(),
            lock_acquired: true,
        })
    }

    async fn get_migration_state(
        &self,
        source_migration_id: &str,
    ) -> ProviderResult<MigrationStateReport> {
        let mut state = self.lock();
        if let Some(queue) = state.phase_sequences.get_mut(source_migration_id) {
            if let Some(report) = queue.pop_front() {
                state
                    .last_phase
                    .insert(source_migration_id.to_string(), report.clone());
                return Ok(report);
            }
        }
        if let Some(report) = state.last_phase.get(source_migration_id) {
            return Ok(report.clone());
        }
        Ok(MigrationStateReport {
            phase: MigrationPhase::NotFound,
            progress_percent: None,
            error_message: None,
        })
    }

    async fn unlock_source(&self, source_migration_id: &str) -> ProviderResult<()> {
        self.lock().unlocked.push(source_migration_id.to_string());
        Ok(())
    }

    async fn destination_repo_exists(
        &self,
        destination_org: &str,
        name: &str,
    ) -> ProviderResult<bool> {
        let state = self.lock();
        Ok(state
            .existing_destinations
            .iter()
            .any(|(org, n)| org == destination_org && n == name))
    }

    async fn validate_destination_repo(
        &self,
        destination_org: &str,
        name: &str,
    ) -> ProviderResult<DestinationSnapshot> {
        let state = self.lock();
        Ok(state
            .validation_snapshots
            .get(&(destination_org.to_string(), name.to_string()))
            .copied()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migrator_core::entities::{
        MigrationExclusions, RepositoryProfile, RepositoryStatus, ValidationFindings,
    };
    use pretty_assertions::assert_eq;

    fn repo(full_name: &str) -> Repository {
        Repository {
            id: 1,
            full_name: full_name.to_string(),
            source_id: 1,
            source_url: format!("https://github.com/{full_name}"),
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

    #[tokio::test]
    async fn enqueued_rate_limits_are_consumed_in_order_then_default_succeeds() {
        let adapter = MockProviderAdapter::new();
        adapter.enqueue_rate_limited("acme/alpha", 2);
        let opts = MigrationOptions::default();
        let r = repo("acme/alpha");

        assert!(matches!(
            adapter.start_migration(&r, &opts).await,
            Err(ProviderError::RateLimited(_))
        ));
        assert!(matches!(
            adapter.start_migration(&r, &opts).await,
            Err(ProviderError::RateLimited(_))
        ));
        assert!(adapter.start_migration(&r, &opts).await.is_ok());
    }

    #[tokio::test]
    async fn phase_sequence_repeats_last_value_once_exhausted() {
        let adapter = MockProviderAdapter::new();
        adapter.enqueue_phase("17", MigrationPhase::Queued, None, None);
        adapter.enqueue_phase("17", MigrationPhase::InProgress, Some(50.0), None);
        adapter.enqueue_phase("17", MigrationPhase::Succeeded, Some(100.0), None);

        assert_eq!(
            adapter.get_migration_state("17").await.unwrap().phase,
            MigrationPhase::Queued
        );
        assert_eq!(
            adapter.get_migration_state("17").await.unwrap().phase,
            MigrationPhase::InProgress
        );
        assert_eq!(
            adapter.get_migration_state("17").await.unwrap().phase,
            MigrationPhase::Succeeded
        );
        // Exhausted: repeats the last report rather than falling to NotFound.
        assert_eq!(
            adapter.get_migration_state("17").await.unwrap().phase,
            MigrationPhase::Succeeded
        );
    }

    #[tokio::test]
    async fn unlock_source_is_idempotent_and_logged() {
        let adapter = MockProviderAdapter::new();
        adapter.unlock_source("17").await.unwrap();
        adapter.unlock_source("17").await.unwrap();
        assert_eq!(adapter.unlocked_migration_ids(), vec!["17", "17"]);
    }

    #[tokio::test]
    async fn destination_existence_reflects_seeded_state() {
        let adapter = MockProviderAdapter::new();
        adapter.seed_existing_destination("acme", "alpha");
        assert!(adapter
            .destination_repo_exists("acme", "alpha")
            .await
            .unwrap());
        assert!(!adapter
            .destination_repo_exists("acme", "beta")
            .await
            .unwrap());
    }
}
