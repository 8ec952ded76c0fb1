//! The migration scheduler (C6, spec.md §4.6): the dispatcher, poll loop,
//! and batch-completion supervisor, wired together behind a single handle
//! that implements `migrator_services::BatchScheduler`.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

mod backoff;
mod context;
mod dispatcher;
mod options;
mod poll_loop;
mod provider_registry;
mod rate_limiter;
mod supervisor;
mod transitions;

pub use context::SchedulerContext;
pub use provider_registry::ProviderRegistry;
pub use rate_limiter::RateLimiterRegistry;

use async_trait::async_trait;
use dashmap::DashSet;
use dispatcher::Dispatcher;
use migrator_core::config::MigrationConfig;
use migrator_core::error::Result;
use migrator_storage::Store;
use poll_loop::PollLoop;
use std::sync::Arc;
use supervisor::Supervisor;
use tokio::sync::{watch, Notify};

/// Handle returned by [`Scheduler::spawn`]: implements
/// `migrator_services::BatchScheduler` so `BatchService::start_batch`/
/// `start_dry_run` can wake the dispatcher directly, and owns the shutdown
/// signal for graceful stop (spec.md §4.6 supplement).
pub struct Scheduler {
    notify: Arc<Notify>,
    shutdown_tx: watch::Sender<bool>,
}

impl Scheduler {
    /// Builds the shared context and spawns the dispatcher, poll loop, and
    /// supervisor as independent long-lived tasks.
    pub fn spawn(store: Arc<dyn Store>, providers: ProviderRegistry, config: MigrationConfig) -> Self {
        Self::spawn_with_jitter(store, providers, config, true)
    }

    /// Like [`Scheduler::spawn`], but lets callers disable retry jitter.
    /// Production always wants jitter; the test harness disables it so
    /// cumulative-backoff assertions can be exact (spec.md §8, scenario
    /// S2).
    pub fn spawn_with_jitter(
        store: Arc<dyn Store>,
        providers: ProviderRegistry,
        config: MigrationConfig,
        jitter: bool,
    ) -> Self {
        let rate_limiter = RateLimiterRegistry::new(10, std::time::Duration::from_secs(1));
        let ctx = Arc::new(SchedulerContext {
            store,
            providers,
            config,
            rate_limiter,
            active_migrations: DashSet::new(),
            jitter,
        });
        let notify = Arc::new(Notify::new());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let dispatcher = Dispatcher::new(ctx.clone(), notify.clone());
        tokio::spawn(dispatcher.run(shutdown_rx.clone()));

        let poll_loop = PollLoop::new(ctx.clone());
        tokio::spawn(poll_loop.run(shutdown_rx.clone()));

        let supervisor = Supervisor::new(ctx);
        tokio::spawn(supervisor.run(shutdown_rx));

        Self { notify, shutdown_tx }
    }

    /// Signals every spawned task to stop pulling new work and exit once
    /// their current iteration finishes.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }
}

#[async_trait]
impl migrator_services::BatchScheduler for Scheduler {
    async fn enqueue_batch(&self, _batch_id: i64) -> Result<()> {
        self.notify.notify_waiters();
        Ok(())
    }
}
