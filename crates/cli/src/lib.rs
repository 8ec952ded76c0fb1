//! Library interface for the migration kernel CLI.
//!
//! Keeps command bodies out of `main.rs` so they can be exercised directly
//! in integration tests without going through `clap`'s argument parser.

pub mod commands;

pub use anyhow::Result;
pub use migrator_core::config::Config;

use migrator_provider::azure_devops::{AzureDevOpsAdapter, AzureDevOpsConfig};
use migrator_provider::github_gei::{GitHubGeiAdapter, GitHubGeiConfig};
use migrator_provider::{MockProviderAdapter, ProviderAdapter};
use migrator_scheduler::ProviderRegistry;
use std::sync::Arc;

/// Builds the default adapter a freshly-loaded [`Config`] resolves to.
///
/// `destination.type`/`destination.token` select a real adapter; an empty
/// destination block (the common case before a destination is configured)
/// falls back to the mock adapter so `serve` can still come up and exercise
/// the rest of the pipeline against seeded test data.
pub fn build_default_provider(config: &Config) -> Arc<dyn ProviderAdapter> {
    match (
        config.destination.r#type.as_deref(),
        config.destination.base_url.as_deref(),
        config.destination.token.as_deref(),
    ) {
        (Some(t), Some(base_url), Some(token)) if t.eq_ignore_ascii_case("github") => {
            Arc::new(GitHubGeiAdapter::new(GitHubGeiConfig {
                graphql_url: base_url.to_string(),
                token: token.to_string(),
            }))
        }
        (Some(t), Some(base_url), Some(token)) if t.eq_ignore_ascii_case("azure_devops") => {
            Arc::new(AzureDevOpsAdapter::new(AzureDevOpsConfig {
                base_url: base_url.to_string(),
                personal_access_token: token.to_string(),
            }))
        }
        _ => Arc::new(MockProviderAdapter::new()),
    }
}

pub fn build_provider_registry(config: &Config) -> ProviderRegistry {
    ProviderRegistry::new(build_default_provider(config))
}
