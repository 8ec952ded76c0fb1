//! Hardcoded default values for the configuration structure.
//!
//! Each function here backs a `#[serde(default = "...")]` attribute so that
//! a partially-specified TOML file (or none at all) still deserializes into
//! a complete `Config`.

pub fn default_server_port() -> u16 {
    8080
}

pub fn default_database_type() -> String {
    "sqlite".to_string()
}

pub fn default_database_dsn() -> String {
    "./data/migrator.db".to_string()
}

pub fn default_migration_workers() -> usize {
    5
}

pub fn default_poll_interval_seconds() -> u64 {
    30
}

pub fn default_post_migration_mode() -> String {
    "production_only".to_string()
}

pub fn default_dest_repo_exists_action() -> String {
    "fail".to_string()
}

pub fn default_visibility_policy() -> String {
    "private".to_string()
}

pub fn default_auth_enabled() -> bool {
    false
}

pub fn default_session_duration_hours() -> u64 {
    24
}

pub fn default_max_retry_attempts() -> u32 {
    8
}

pub fn default_backoff_base_seconds() -> u64 {
    2
}

pub fn default_backoff_cap_seconds() -> u64 {
    600
}
