use super::*;
use crate::config::loading::parse_array_env_value;
use std::path::Path;

#[test]
fn defaults_apply_when_file_is_absent() {
    let config = Config::from_file(Path::new("/nonexistent/path/config.toml")).unwrap();
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.migration.workers, 5);
    assert_eq!(config.migration.poll_interval_seconds, 30);
    assert_eq!(
        config.migration.post_migration_mode,
        PostMigrationMode::ProductionOnly
    );
    assert_eq!(
        config.migration.dest_repo_exists_action,
        DestRepoExistsAction::Fail
    );
}

#[test]
fn toml_str_overrides_defaults() {
    let toml = r#"
        [migration]
        workers = 20
        dest_repo_exists_action = "skip"
    "#;
    let config = Config::from_toml_str(toml).unwrap();
    assert_eq!(config.migration.workers, 20);
    assert_eq!(
        config.migration.dest_repo_exists_action,
        DestRepoExistsAction::Skip
    );
}

#[test]
fn legacy_github_block_migrates_into_source_and_destination_when_empty() {
    let toml = r#"
        [github.source]
        type = "github"
        base_url = "https://github.com"
        token = "secret"
        organization = "acme"

        [github.destination]
        type = "github"
        base_url = "https://github.com"
        token = "dest-secret"
    "#;
    let config = Config::from_toml_str(toml).unwrap();
    assert_eq!(config.source.organization.as_deref(), Some("acme"));
    assert_eq!(config.destination.token.as_deref(), Some("dest-secret"));
    assert!(config.legacy_github.is_none());
}

#[test]
fn legacy_github_block_does_not_override_explicit_current_blocks() {
    let toml = r#"
        [source]
        organization = "current-org"

        [github.source]
        organization = "legacy-org"
    "#;
    let config = Config::from_toml_str(toml).unwrap();
    assert_eq!(config.source.organization.as_deref(), Some("current-org"));
}

#[test]
fn parses_json_array_env_value() {
    assert_eq!(
        parse_array_env_value(r#"["a","b","c"]"#),
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    );
}

#[test]
fn parses_comma_separated_env_value() {
    assert_eq!(
        parse_array_env_value("a, b,c"),
        vec!["a".to_string(), "b".to_string(), "c".to_string()]
    );
}

#[test]
fn parses_single_bare_env_value() {
    assert_eq!(parse_array_env_value("a"), vec!["a".to_string()]);
}

#[test]
fn parses_empty_env_value_as_empty_vec() {
    assert!(parse_array_env_value("").is_empty());
}

#[test]
fn visibility_policy_parses_from_str() {
    use std::str::FromStr;
    assert_eq!(
        VisibilityPolicy::from_str("internal").unwrap(),
        VisibilityPolicy::Internal
    );
    assert!(VisibilityPolicy::from_str("bogus").is_err());
}
