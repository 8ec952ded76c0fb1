//! Configuration loading from files and environment variables.

use crate::error::{Error, Result};
use config::{Config as ConfigLib, ConfigBuilder as LibConfigBuilder, Environment, File};
use std::path::Path;

use super::defaults::*;
use super::{global_config_path, Config};

/// Helper to set a config default with consistent error mapping.
fn set_config_default<T: Into<config::Value>>(
    builder: LibConfigBuilder<config::builder::DefaultState>,
    key: &str,
    value: T,
) -> Result<LibConfigBuilder<config::builder::DefaultState>> {
    builder
        .set_default(key, value)
        .map_err(|e| Error::config(format!("failed to set {key} default: {e}")))
}

/// Parses an array-typed environment variable value in one of the three
/// forms spec.md §9 recognizes: JSON (`["a","b"]`), comma-separated
/// (`a,b`), or a single bare value (`a`).
pub fn parse_array_env_value(raw: &str) -> Vec<String> {
    let trimmed = raw.trim();
    if trimmed.starts_with('[') {
        if let Ok(values) = serde_json::from_str::<Vec<String>>(trimmed) {
            return values;
        }
    }
    if trimmed.contains(',') {
        return trimmed
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if trimmed.is_empty() {
        Vec::new()
    } else {
        vec![trimmed.to_string()]
    }
}

impl Config {
    /// Loads configuration from a TOML file with environment variable
    /// overrides.
    ///
    /// Environment variables are prefixed with `GHMIG_` and use double
    /// underscores for nested values, e.g. `GHMIG_MIGRATION__WORKERS=10`
    /// (spec.md §6).
    pub fn from_file(path: &Path) -> Result<Self> {
        let builder = ConfigLib::builder();

        let builder = set_config_default(builder, "server.port", default_server_port() as i64)?;
        let builder = set_config_default(builder, "database.type", default_database_type())?;
        let builder = set_config_default(builder, "database.dsn", default_database_dsn())?;
        let builder = set_config_default(
            builder,
            "migration.workers",
            default_migration_workers() as i64,
        )?;
        let builder = set_config_default(
            builder,
            "migration.poll_interval_seconds",
            default_poll_interval_seconds() as i64,
        )?;
        let builder = set_config_default(
            builder,
            "migration.post_migration_mode",
            default_post_migration_mode(),
        )?;
        let builder = set_config_default(
            builder,
            "migration.dest_repo_exists_action",
            default_dest_repo_exists_action(),
        )?;
        let builder = set_config_default(
            builder,
            "migration.visibility_handling.public_repos",
            default_visibility_policy(),
        )?;
        let builder = set_config_default(
            builder,
            "migration.visibility_handling.internal_repos",
            default_visibility_policy(),
        )?;
        let builder = set_config_default(builder, "auth.enabled", default_auth_enabled())?;
        let mut builder = set_config_default(
            builder,
            "auth.session_duration_hours",
            default_session_duration_hours() as i64,
        )?;

        if path.exists() {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("GHMIG")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| Error::config(format!("failed to build config: {e}")))?;

        let config: Config = config
            .try_deserialize()
            .map_err(|e| Error::config(format!("failed to deserialize config: {e}")))?;

        Ok(config.apply_legacy_migration())
    }

    /// Creates a config from a TOML string (useful for testing).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(content).map_err(|e| Error::config(format!("failed to parse TOML: {e}")))?;
        Ok(config.apply_legacy_migration())
    }

    /// Loads configuration from a single file.
    ///
    /// Precedence (lowest to highest):
    /// 1. Hardcoded defaults
    /// 2. Config file (`~/.ghmigrator/config.toml` or a custom `--config` path)
    /// 3. Environment variables (`GHMIG_*`)
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => global_config_path()?,
        };
        Self::from_file(&path)
    }
}
