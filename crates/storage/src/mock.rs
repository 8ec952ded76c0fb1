//! In-memory `Store` implementation for tests, grounded in the teacher's
//! `MockStorageClient` pattern but stateful: the scheduler's dispatcher and
//! poll loop need real CAS semantics to exercise spec.md §8's scenarios.

use crate::{BatchProgressUpdate, MigrationHistoryUpdate, Store};
use async_trait::async_trait;
use migrator_core::entities::{
    Batch, DiscoveryProgress, LogLevel, MigrationHistory, MigrationLog, Repository,
    RepositoryDependency, RepositoryStatus, SetupStatus, Source,
};
use migrator_core::error::{Error, Result};
use migrator_core::filter::{BatchFilter, RepositoryFilter, RepositorySortKey, SourceFilter};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
struct State {
    repositories: HashMap<i64, Repository>,
    batches: HashMap<i64, Batch>,
    sources: HashMap<i64, Source>,
    history: Vec<MigrationHistory>,
    logs: Vec<MigrationLog>,
    dependencies: Vec<RepositoryDependency>,
    setup_status: SetupStatus,
    discovery_progress: DiscoveryProgress,
    next_repository_id: i64,
    next_batch_id: i64,
    next_history_id: i64,
    next_log_id: i64,
}

/// Thread-safe in-memory store. Intended for tests only — a `Mutex` around
/// all state is fine at test scale, never at production concurrency.
pub struct MockStore {
    state: Mutex<State>,
}

impl Default for MockStore {
    fn default() -> Self {
        Self {
            state: Mutex::new(State {
                setup_status: SetupStatus {
                    completed: false,
                    completed_at: None,
                },
                next_repository_id: 1,
                next_batch_id: 1,
                next_history_id: 1,
                next_log_id: 1,
                ..Default::default()
            }),
        }
    }
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a repository, assigning it an id if it has none. Returns the
    /// assigned id. Test-only helper.
    pub fn seed_repository(&self, mut repository: Repository) -> i64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if repository.id == 0 {
            repository.id = state.next_repository_id;
            state.next_repository_id += 1;
        }
        let id = repository.id;
        state.repositories.insert(id, repository);
        id
    }

    /// Seeds a batch, assigning it an id if it has none. Returns the
    /// assigned id. Test-only helper.
    pub fn seed_batch(&self, mut batch: Batch) -> i64 {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if batch.id == 0 {
            batch.id = state.next_batch_id;
            state.next_batch_id += 1;
        }
        let id = batch.id;
        state.batches.insert(id, batch);
        id
    }

    pub fn seed_source(&self, source: Source) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sources.insert(source.id, source);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn matches_filter(repo: &Repository, filter: &RepositoryFilter) -> bool {
    if let Some(status) = filter.status {
        if repo.status != status {
            return false;
        }
    }
    if let Some(statuses) = &filter.statuses {
        if !statuses.contains(&repo.status) {
            return false;
        }
    }
    if let Some(source_id) = filter.source_id {
        if repo.source_id != source_id {
            return false;
        }
    }
    if let Some(batch_id) = filter.batch_id {
        if repo.batch_id != Some(batch_id) {
            return false;
        }
    }
    if filter.unbatched_only && repo.batch_id.is_some() {
        return false;
    }
    if let Some(validation_status) = filter.validation_status {
        if repo.validation_status != Some(validation_status) {
            return false;
        }
    }
    if let Some(needle) = &filter.full_name_contains {
        if !repo.full_name.contains(needle.as_str()) {
            return false;
        }
    }
    if let Some(has_blocking) = filter.has_blocking_findings {
        if repo.validation.has_blocking_files != has_blocking {
            return false;
        }
    }
    if let Some(organization) = &filter.organization {
        if repo.organization.as_deref() != Some(organization.as_str()) {
            return false;
        }
    }
    if let Some(min_size) = filter.min_size_bytes {
        if repo.profile.total_size_bytes < min_size {
            return false;
        }
    }
    if let Some(max_size) = filter.max_size_bytes {
        if repo.profile.total_size_bytes > max_size {
            return false;
        }
    }
    if let Some(has_lfs) = filter.has_lfs {
        if repo.profile.has_lfs != has_lfs {
            return false;
        }
    }
    if let Some(has_submodules) = filter.has_submodules {
        if repo.profile.has_submodules != has_submodules {
            return false;
        }
    }
    if let Some(has_oversized) = filter.has_oversized_repository {
        if repo.validation.has_oversized_repository != has_oversized {
            return false;
        }
    }
    if let Some(has_large_files) = filter.has_large_files {
        if repo.validation.has_large_file_warnings != has_large_files {
            return false;
        }
    }
    if let Some(visibility) = filter.visibility {
        if repo.profile.visibility != visibility {
            return false;
        }
    }
    if let Some(is_archived) = filter.is_archived {
        if repo.profile.is_archived != is_archived {
            return false;
        }
    }
    if let Some(is_fork) = filter.is_fork {
        if repo.profile.is_fork != is_fork {
            return false;
        }
    }
    if let Some(min_complexity) = filter.min_complexity {
        if repo.profile.complexity_score < min_complexity {
            return false;
        }
    }
    if let Some(size_category) = filter.size_category {
        if repo.profile.size_category() != size_category {
            return false;
        }
    }
    if filter.available_for_batch == Some(true) {
        let batchable = matches!(
            repo.status,
            RepositoryStatus::Pending
                | RepositoryStatus::DryRunComplete
                | RepositoryStatus::DryRunFailed
                | RepositoryStatus::MigrationFailed
                | RepositoryStatus::RolledBack
        );
        if repo.batch_id.is_some() || repo.validation.has_oversized_repository || !batchable {
            return false;
        }
    }
    true
}

fn apply_paging<T>(mut items: Vec<T>, filter_limit: Option<u32>, filter_offset: Option<u32>) -> Vec<T> {
    let offset = filter_offset.unwrap_or(0) as usize;
    if offset >= items.len() {
        return Vec::new();
    }
    items.drain(0..offset);
    if let Some(limit) = filter_limit {
        items.truncate(limit as usize);
    }
    items
}

#[async_trait]
impl Store for MockStore {
    async fn get_repository(&self, full_name: &str) -> Result<Option<Repository>> {
        Ok(self
            .lock()
            .repositories
            .values()
            .find(|r| r.full_name == full_name)
            .cloned())
    }

    async fn get_repository_by_id(&self, id: i64) -> Result<Option<Repository>> {
        Ok(self.lock().repositories.get(&id).cloned())
    }

    async fn get_repositories_by_ids(&self, ids: &[i64]) -> Result<Vec<Repository>> {
        let state = self.lock();
        Ok(ids.iter().filter_map(|id| state.repositories.get(id).cloned()).collect())
    }

    async fn get_repositories_by_names(&self, names: &[String]) -> Result<Vec<Repository>> {
        let state = self.lock();
        Ok(state
            .repositories
            .values()
            .filter(|r| names.contains(&r.full_name))
            .cloned()
            .collect())
    }

    async fn list_repositories(&self, filter: &RepositoryFilter) -> Result<Vec<Repository>> {
        let state = self.lock();
        let mut matched: Vec<Repository> = state
            .repositories
            .values()
            .filter(|r| matches_filter(r, filter))
            .cloned()
            .collect();
        match filter.sort_by {
            Some(RepositorySortKey::DiscoveredAt) => matched.sort_by_key(|r| r.discovered_at),
            Some(RepositorySortKey::UpdatedAt) => matched.sort_by_key(|r| r.updated_at),
            Some(RepositorySortKey::TotalSizeBytes) => {
                matched.sort_by_key(|r| r.profile.total_size_bytes)
            }
            Some(RepositorySortKey::Priority) => matched.sort_by_key(|r| r.priority),
            None => matched.sort_by_key(|r| r.id),
        }
        Ok(apply_paging(matched, filter.limit, filter.offset))
    }

    async fn count_repositories(&self, filter: &RepositoryFilter) -> Result<u64> {
        let state = self.lock();
        Ok(state
            .repositories
            .values()
            .filter(|r| matches_filter(r, filter))
            .count() as u64)
    }

    async fn save_repository(&self, repository: &Repository) -> Result<Repository> {
        let mut state = self.lock();
        let existing_id = state
            .repositories
            .values()
            .find(|r| r.full_name == repository.full_name)
            .map(|r| r.id);

        let mut repo = repository.clone();
        match existing_id {
            Some(id) => repo.id = id,
            None => {
                repo.id = state.next_repository_id;
                state.next_repository_id += 1;
            }
        }
        state.repositories.insert(repo.id, repo.clone());
        Ok(repo)
    }

    async fn update_repository(&self, repository: &Repository) -> Result<()> {
        let mut state = self.lock();
        if !state.repositories.contains_key(&repository.id) {
            return Err(Error::not_found(format!(
                "repository {} not found",
                repository.id
            )));
        }
        state.repositories.insert(repository.id, repository.clone());
        Ok(())
    }

    async fn update_repository_status(&self, full_name: &str, status: RepositoryStatus) -> Result<()> {
        let mut state = self.lock();
        let repo = state
            .repositories
            .values_mut()
            .find(|r| r.full_name == full_name)
            .ok_or_else(|| Error::not_found(format!("repository '{full_name}' not found")))?;
        repo.status = status;
        repo.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn claim_repository(&self, id: i64, from: RepositoryStatus, to: RepositoryStatus) -> Result<bool> {
        let mut state = self.lock();
        match state.repositories.get_mut(&id) {
            Some(repo) if repo.status == from => {
                repo.status = to;
                repo.updated_at = chrono::Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rollback_repository(&self, full_name: &str, reason: &str) -> Result<()> {
        let mut state = self.lock();
        let repo = state
            .repositories
            .values_mut()
            .find(|r| r.full_name == full_name)
            .ok_or_else(|| Error::not_found(format!("repository '{full_name}' not found")))?;
        repo.status = RepositoryStatus::RolledBack;
        repo.error_message = Some(reason.to_string());
        repo.updated_at = chrono::Utc::now();
        Ok(())
    }

    async fn get_completed_migrations(&self, since_id: Option<i64>) -> Result<Vec<Repository>> {
        let state = self.lock();
        let mut completed: Vec<Repository> = state
            .repositories
            .values()
            .filter(|r| r.status == RepositoryStatus::Complete)
            .filter(|r| since_id.is_none_or(|since| r.id > since))
            .cloned()
            .collect();
        completed.sort_by_key(|r| r.id);
        Ok(completed)
    }

    async fn get_batch(&self, id: i64) -> Result<Option<Batch>> {
        Ok(self.lock().batches.get(&id).cloned())
    }

    async fn list_batches(&self, filter: &BatchFilter) -> Result<Vec<Batch>> {
        let state = self.lock();
        let mut matched: Vec<Batch> = state
            .batches
            .values()
            .filter(|b| filter.status.is_none_or(|s| b.status == s))
            .filter(|b| {
                filter
                    .name_contains
                    .as_ref()
                    .is_none_or(|needle| b.name.contains(needle.as_str()))
            })
            .cloned()
            .collect();
        matched.sort_by_key(|b| b.id);
        Ok(apply_paging(matched, filter.limit, filter.offset))
    }

    async fn create_batch(&self, batch: &Batch) -> Result<Batch> {
        let mut state = self.lock();
        let mut created = batch.clone();
        created.id = state.next_batch_id;
        state.next_batch_id += 1;
        state.batches.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update_batch(&self, batch: &Batch) -> Result<()> {
        let mut state = self.lock();
        if !state.batches.contains_key(&batch.id) {
            return Err(Error::not_found(format!("batch {} not found", batch.id)));
        }
        state.batches.insert(batch.id, batch.clone());
        Ok(())
    }

    async fn delete_batch(&self, id: i64) -> Result<()> {
        let mut state = self.lock();
        if state.batches.remove(&id).is_none() {
            return Err(Error::not_found(format!("batch {id} not found")));
        }
        for repo in state.repositories.values_mut() {
            if repo.batch_id == Some(id) {
                repo.batch_id = None;
            }
        }
        Ok(())
    }

    async fn update_batch_progress(&self, id: i64, update: &BatchProgressUpdate) -> Result<()> {
        let mut state = self.lock();
        let batch = state
            .batches
            .get_mut(&id)
            .ok_or_else(|| Error::not_found(format!("batch {id} not found")))?;
        if let Some(status) = update.status {
            batch.status = status;
        }
        if let Some(scheduled_at) = update.scheduled_at {
            batch.scheduled_at = Some(scheduled_at);
        }
        if let Some(started_at) = update.started_at {
            batch.started_at = Some(started_at);
        }
        if let Some(completed_at) = update.completed_at {
            batch.completed_at = Some(completed_at);
        }
        Ok(())
    }

    async fn add_repositories_to_batch(&self, batch_id: i64, repo_ids: &[i64]) -> Result<()> {
        let mut state = self.lock();
        for id in repo_ids {
            if let Some(repo) = state.repositories.get_mut(id) {
                repo.batch_id = Some(batch_id);
            }
        }
        Ok(())
    }

    async fn remove_repositories_from_batch(&self, batch_id: i64, repo_ids: &[i64]) -> Result<u64> {
        let mut state = self.lock();
        let mut removed = 0;
        for id in repo_ids {
            if let Some(repo) = state.repositories.get_mut(id) {
                if repo.batch_id == Some(batch_id) {
                    repo.batch_id = None;
                    removed += 1;
                }
            }
        }
        Ok(removed)
    }

    async fn create_migration_history(&self, entry: &MigrationHistory) -> Result<MigrationHistory> {
        let mut state = self.lock();
        let mut created = entry.clone();
        created.id = state.next_history_id;
        state.next_history_id += 1;
        state.history.push(created.clone());
        Ok(created)
    }

    async fn update_migration_history(&self, id: i64, update: &MigrationHistoryUpdate) -> Result<()> {
        let mut state = self.lock();
        let entry = state
            .history
            .iter_mut()
            .find(|h| h.id == id)
            .ok_or_else(|| Error::not_found(format!("migration history {id} not found")))?;
        if let Some(status) = update.status {
            entry.status = status;
        }
        if update.error_message.is_some() {
            entry.error_message = update.error_message.clone();
        }
        if update.completed {
            entry.completed_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    async fn get_migration_history(&self, repository_id: i64) -> Result<Vec<MigrationHistory>> {
        let state = self.lock();
        let mut rows: Vec<MigrationHistory> = state
            .history
            .iter()
            .filter(|h| h.repository_id == repository_id)
            .cloned()
            .collect();
        rows.sort_by_key(|h| h.started_at);
        Ok(rows)
    }

    async fn create_migration_log(&self, entry: &MigrationLog) -> Result<MigrationLog> {
        let mut state = self.lock();
        let mut created = entry.clone();
        created.id = state.next_log_id;
        state.next_log_id += 1;
        state.logs.push(created.clone());
        Ok(created)
    }

    async fn get_migration_logs(
        &self,
        repository_id: i64,
        level: Option<LogLevel>,
        phase: Option<&str>,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<MigrationLog>> {
        let state = self.lock();
        let mut rows: Vec<MigrationLog> = state
            .logs
            .iter()
            .filter(|l| l.repository_id == repository_id)
            .filter(|l| level.is_none_or(|lv| l.level == lv))
            .filter(|l| phase.is_none_or(|p| l.phase == p))
            .cloned()
            .collect();
        rows.sort_by_key(|l| l.logged_at);
        Ok(apply_paging(rows, Some(limit), Some(offset)))
    }

    async fn get_repository_dependencies(&self, repository_id: i64) -> Result<Vec<RepositoryDependency>> {
        let state = self.lock();
        Ok(state
            .dependencies
            .iter()
            .filter(|d| d.repository_id == repository_id)
            .cloned()
            .collect())
    }

    async fn get_repository_dependencies_by_full_name(
        &self,
        full_name: &str,
    ) -> Result<Vec<RepositoryDependency>> {
        let state = self.lock();
        let Some(repo) = state.repositories.values().find(|r| r.full_name == full_name) else {
            return Ok(Vec::new());
        };
        Ok(state
            .dependencies
            .iter()
            .filter(|d| d.repository_id == repo.id)
            .cloned()
            .collect())
    }

    async fn get_dependent_repositories(&self, dependency_full_name: &str) -> Result<Vec<Repository>> {
        let state = self.lock();
        let dependent_ids: Vec<i64> = state
            .dependencies
            .iter()
            .filter(|d| d.dependency_full_name == dependency_full_name)
            .map(|d| d.repository_id)
            .collect();
        Ok(state
            .repositories
            .values()
            .filter(|r| dependent_ids.contains(&r.id))
            .cloned()
            .collect())
    }

    async fn update_local_dependency_flags(&self) -> Result<u64> {
        let mut state = self.lock();
        let known_names: std::collections::HashSet<String> =
            state.repositories.values().map(|r| r.full_name.clone()).collect();
        let mut changed = 0;
        for dep in state.dependencies.iter_mut() {
            let is_local = known_names.contains(&dep.dependency_full_name);
            if dep.is_local != is_local {
                dep.is_local = is_local;
                changed += 1;
            }
        }
        Ok(changed)
    }

    async fn get_all_local_dependency_pairs(
        &self,
        names: &[String],
        batch_id: Option<i64>,
    ) -> Result<Vec<(String, String)>> {
        let state = self.lock();
        let name_set: std::collections::HashSet<&String> = names.iter().collect();
        Ok(state
            .dependencies
            .iter()
            .filter(|d| d.is_local)
            .filter(|d| name_set.is_empty() || name_set.contains(&d.dependency_full_name))
            .filter(|d| {
                batch_id.is_none_or(|b| {
                    state
                        .repositories
                        .get(&d.repository_id)
                        .is_some_and(|r| r.batch_id == Some(b))
                })
            })
            .filter_map(|d| {
                state
                    .repositories
                    .get(&d.repository_id)
                    .map(|r| (r.full_name.clone(), d.dependency_full_name.clone()))
            })
            .collect())
    }

    async fn get_source(&self, id: i64) -> Result<Option<Source>> {
        Ok(self.lock().sources.get(&id).cloned())
    }

    async fn list_sources(&self, filter: &SourceFilter) -> Result<Vec<Source>> {
        let state = self.lock();
        Ok(state
            .sources
            .values()
            .filter(|s| filter.source_type.is_none_or(|t| s.source_type == t))
            .cloned()
            .collect())
    }

    async fn get_setup_status(&self) -> Result<SetupStatus> {
        Ok(self.lock().setup_status.clone())
    }

    async fn mark_setup_complete(&self) -> Result<()> {
        let mut state = self.lock();
        state.setup_status = SetupStatus {
            completed: true,
            completed_at: Some(chrono::Utc::now()),
        };
        Ok(())
    }

    async fn get_discovery_progress(&self) -> Result<DiscoveryProgress> {
        Ok(self.lock().discovery_progress)
    }

    async fn record_discovery_progress(&self, progress: &DiscoveryProgress) -> Result<()> {
        self.lock().discovery_progress = *progress;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migrator_core::entities::{
        MigrationApi, MigrationExclusions, RepositoryProfile, ValidationFindings,
    };

    fn repo(full_name: &str, status: RepositoryStatus) -> Repository {
        Repository {
            id: 0,
            full_name: full_name.to_string(),
            source_id: 1,
            source_url: format!("https://github.com/{full_name}"),
            organization: None,
            profile: RepositoryProfile::default(),
            validation: ValidationFindings::default(),
            status,
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

    fn batch(name: &str) -> Batch {
        Batch {
            id: 0,
            name: name.to_string(),
            description: None,
            batch_type: "standard".to_string(),
            status: migrator_core::entities::BatchStatus::Pending,
            migration_api: MigrationApi::Gei,
            defaults: Default::default(),
            scheduled_at: None,
            started_at: None,
            completed_at: None,
            dry_run_started_at: None,
            dry_run_completed_at: None,
        }
    }

    #[tokio::test]
    async fn save_repository_assigns_id_and_is_retrievable_by_full_name() {
        let store = MockStore::new();
        let saved = store
            .save_repository(&repo("acme/alpha", RepositoryStatus::Pending))
            .await
            .unwrap();
        assert_eq!(saved.id, 1);
        let fetched = store.get_repository("acme/alpha").await.unwrap().unwrap();
        assert_eq!(fetched.id, 1);
    }

    #[tokio::test]
    async fn claim_repository_only_succeeds_from_expected_status() {
        let store = MockStore::new();
        let id = store.seed_repository(repo("acme/alpha", RepositoryStatus::Pending));

        let won = store
            .claim_repository(id, RepositoryStatus::Pending, RepositoryStatus::PreMigration)
            .await
            .unwrap();
        assert!(won);

        let lost = store
            .claim_repository(id, RepositoryStatus::Pending, RepositoryStatus::PreMigration)
            .await
            .unwrap();
        assert!(!lost);
    }

    #[tokio::test]
    async fn delete_batch_nulls_member_batch_ids() {
        let store = MockStore::new();
        let batch_id = store.seed_batch(batch("B1"));
        let mut r = repo("acme/alpha", RepositoryStatus::Pending);
        r.batch_id = Some(batch_id);
        let repo_id = store.seed_repository(r);

        store.delete_batch(batch_id).await.unwrap();

        assert!(store.get_batch(batch_id).await.unwrap().is_none());
        let repo = store.get_repository_by_id(repo_id).await.unwrap().unwrap();
        assert_eq!(repo.batch_id, None);
    }

    #[tokio::test]
    async fn remove_repositories_from_batch_only_clears_matching_batch_id() {
        let store = MockStore::new();
        let batch_a = store.seed_batch(batch("A"));
        let batch_b = store.seed_batch(batch("B"));
        let mut r = repo("acme/alpha", RepositoryStatus::Pending);
        r.batch_id = Some(batch_a);
        let repo_id = store.seed_repository(r);

        let removed = store
            .remove_repositories_from_batch(batch_b, &[repo_id])
            .await
            .unwrap();
        assert_eq!(removed, 0);

        let removed = store
            .remove_repositories_from_batch(batch_a, &[repo_id])
            .await
            .unwrap();
        assert_eq!(removed, 1);
    }
}
