//! Shared state threaded through the dispatcher, poll loop, and supervisor
//! tasks (spec.md §4.6, §5).

use crate::provider_registry::ProviderRegistry;
use crate::rate_limiter::RateLimiterRegistry;
use dashmap::DashSet;
use migrator_core::config::MigrationConfig;
use migrator_storage::Store;
use std::sync::Arc;

/// Everything the three long-lived scheduler tasks need, grouped so each
/// task can hold one `Arc<SchedulerContext>` clone.
pub struct SchedulerContext {
    pub store: Arc<dyn Store>,
    pub providers: ProviderRegistry,
    pub config: MigrationConfig,
    pub rate_limiter: RateLimiterRegistry,
    /// Repository ids currently claimed by a dispatcher worker, between the
    /// CAS claim and the worker releasing its slot (spec.md §5, "an
    /// in-memory `active_migrations` set owned by the dispatcher"). Bounds
    /// the cardinality invariant in spec.md §8, property 5.
    pub active_migrations: DashSet<i64>,
    /// Whether real-jitter backoff is used; disabled only by the test
    /// harness so cumulative-backoff assertions are deterministic.
    pub jitter: bool,
}
