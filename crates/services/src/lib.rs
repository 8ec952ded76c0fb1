//! Batch and repository services (C4/C5, spec.md §4.4–§4.5): the
//! operations the HTTP layer (out of scope) calls directly, outside the
//! scheduler's own dispatcher/poll loop.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

pub mod batch_service;
pub mod repository_service;

pub use batch_service::{BatchAddOutcome, BatchScheduler, BatchService, DeletionEligibility, NullBatchScheduler};
pub use repository_service::{DependencyChain, RepositoryDetails, RepositoryService};
