//! Configuration module for the migration orchestration kernel.
//!
//! Configuration is loaded from a TOML file and/or environment variables,
//! with defaults applied for anything unset (spec.md §6).

mod defaults;
mod loading;

#[cfg(test)]
mod tests;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use defaults::*;

/// Returns the path to the global configuration file, `~/.ghmigrator/config.toml`.
pub fn global_config_path() -> Result<PathBuf> {
    let home_dir =
        dirs::home_dir().ok_or_else(|| Error::config("Unable to determine home directory"))?;
    Ok(home_dir.join(".ghmigrator").join("config.toml"))
}

/// When post-migration validation runs (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostMigrationMode {
    Always,
    ProductionOnly,
    Off,
}

impl Default for PostMigrationMode {
    fn default() -> Self {
        Self::ProductionOnly
    }
}

impl std::str::FromStr for PostMigrationMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "always" => Self::Always,
            "production_only" => Self::ProductionOnly,
            "off" => Self::Off,
            other => {
                return Err(Error::config(format!(
                    "invalid migration.post_migration_mode '{other}'"
                )))
            }
        })
    }
}

/// What to do when the destination repository already exists (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestRepoExistsAction {
    Fail,
    Skip,
    Overwrite,
}

impl Default for DestRepoExistsAction {
    fn default() -> Self {
        Self::Fail
    }
}

impl std::str::FromStr for DestRepoExistsAction {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "fail" => Self::Fail,
            "skip" => Self::Skip,
            "overwrite" => Self::Overwrite,
            other => {
                return Err(Error::config(format!(
                    "invalid migration.dest_repo_exists_action '{other}'"
                )))
            }
        })
    }
}

/// Destination visibility a source visibility class is mapped onto
/// (spec.md §4.6, Visibility handling).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisibilityPolicy {
    Public,
    Private,
    Internal,
}

impl Default for VisibilityPolicy {
    fn default() -> Self {
        Self::Private
    }
}

impl std::str::FromStr for VisibilityPolicy {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "public" => Self::Public,
            "private" => Self::Private,
            "internal" => Self::Internal,
            other => return Err(Error::config(format!("invalid visibility policy '{other}'"))),
        })
    }
}

impl std::fmt::Display for VisibilityPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Public => "public",
            Self::Private => "private",
            Self::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

/// Source→destination visibility remapping (spec.md §6,
/// `migration.visibility_handling.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityHandlingConfig {
    #[serde(default = "default_visibility_policy_public")]
    pub public_repos: VisibilityPolicy,
    #[serde(default = "default_visibility_policy_internal")]
    pub internal_repos: VisibilityPolicy,
}

fn default_visibility_policy_public() -> VisibilityPolicy {
    VisibilityPolicy::Private
}

fn default_visibility_policy_internal() -> VisibilityPolicy {
    VisibilityPolicy::Private
}

impl Default for VisibilityHandlingConfig {
    fn default() -> Self {
        Self {
            public_repos: default_visibility_policy_public(),
            internal_repos: default_visibility_policy_internal(),
        }
    }
}

/// HTTP server bind configuration, consumed only by the (out-of-scope) HTTP
/// layer; carried here so `GHMIG_SERVER__PORT` has somewhere to land.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
        }
    }
}

/// Persistent store backend selection (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_type")]
    pub r#type: String,
    #[serde(default = "default_database_dsn")]
    pub dsn: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            r#type: default_database_type(),
            dsn: default_database_dsn(),
        }
    }
}

/// Legacy default-source credentials block (spec.md §6, §9 legacy
/// migration). Superseded by per-row `Source` entities once configured, but
/// retained for the deprecated `github.source`/`source` top-level keys.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct SourceConfig {
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub organization: Option<String>,
}

impl std::fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceConfig")
            .field("type", &self.r#type)
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "***REDACTED***"))
            .field("organization", &self.organization)
            .finish()
    }
}

impl SourceConfig {
    fn is_empty(&self) -> bool {
        self.r#type.is_none()
            && self.base_url.is_none()
            && self.token.is_none()
            && self.organization.is_none()
    }
}

/// Destination credentials (spec.md §6, `destination.*`).
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct DestinationConfig {
    #[serde(default)]
    pub r#type: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
}

impl std::fmt::Debug for DestinationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationConfig")
            .field("type", &self.r#type)
            .field("base_url", &self.base_url)
            .field("token", &self.token.as_ref().map(|_| "***REDACTED***"))
            .finish()
    }
}

impl DestinationConfig {
    fn is_empty(&self) -> bool {
        self.r#type.is_none() && self.base_url.is_none() && self.token.is_none()
    }
}

/// Scheduler tuning (spec.md §4.6/§5/§6, `migration.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    #[serde(default = "default_migration_workers")]
    pub workers: usize,
    #[serde(default = "default_poll_interval_seconds")]
    pub poll_interval_seconds: u64,
    #[serde(default)]
    pub post_migration_mode: PostMigrationMode,
    #[serde(default)]
    pub dest_repo_exists_action: DestRepoExistsAction,
    #[serde(default)]
    pub visibility_handling: VisibilityHandlingConfig,
    #[serde(default = "default_max_retry_attempts")]
    pub max_retry_attempts: u32,
    #[serde(default = "default_backoff_base_seconds")]
    pub backoff_base_seconds: u64,
    #[serde(default = "default_backoff_cap_seconds")]
    pub backoff_cap_seconds: u64,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            workers: default_migration_workers(),
            poll_interval_seconds: default_poll_interval_seconds(),
            post_migration_mode: PostMigrationMode::default(),
            dest_repo_exists_action: DestRepoExistsAction::default(),
            visibility_handling: VisibilityHandlingConfig::default(),
            max_retry_attempts: default_max_retry_attempts(),
            backoff_base_seconds: default_backoff_base_seconds(),
            backoff_cap_seconds: default_backoff_cap_seconds(),
        }
    }
}

/// Authorization tiering, out of scope for the kernel itself but still a
/// recognized config surface the HTTP layer reads (spec.md §6).
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default = "default_auth_enabled")]
    pub enabled: bool,
    #[serde(default = "default_session_duration_hours")]
    pub session_duration_hours: u64,
    #[serde(default)]
    pub authorization_rules: serde_json::Value,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("enabled", &self.enabled)
            .field("session_duration_hours", &self.session_duration_hours)
            .finish()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: default_auth_enabled(),
            session_duration_hours: default_session_duration_hours(),
            authorization_rules: serde_json::Value::Null,
        }
    }
}

/// Top-level configuration structure (spec.md §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub destination: DestinationConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    /// Legacy deprecated block, migrated into `source`/`destination` at
    /// load time when those are empty (spec.md §9).
    #[serde(default, rename = "github")]
    pub legacy_github: Option<LegacyGithubConfig>,
}

/// The deprecated `github.{source,destination}` block (spec.md §9).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LegacyGithubConfig {
    #[serde(default)]
    pub source: Option<SourceConfig>,
    #[serde(default)]
    pub destination: Option<DestinationConfig>,
}

impl Config {
    /// Migrates the deprecated `github.source`/`github.destination` block
    /// into the current `source`/`destination` blocks when those are empty,
    /// per spec.md §9 ("Legacy configuration migration"). Deterministic,
    /// idempotent, runs once at load time.
    fn apply_legacy_migration(mut self) -> Self {
        if let Some(legacy) = self.legacy_github.take() {
            if self.source.is_empty() {
                if let Some(legacy_source) = legacy.source {
                    self.source = legacy_source;
                }
            }
            if self.destination.is_empty() {
                if let Some(legacy_destination) = legacy.destination {
                    self.destination = legacy_destination;
                }
            }
        }
        self
    }
}
