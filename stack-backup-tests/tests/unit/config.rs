//! Unit tests for configuration loading and resolution

use stack_backup::config::{load_backup_config, load_config, ConfigError, SweepPhase};
use stack_backup::Service;
use std::fs;
use std::time::Duration;
use test_utils::{full_config_toml, minimal_config_toml, render_config, ConfigBuilder, ResultAssertions};

#[test]
fn test_load_minimal_toml() {
    let builder = ConfigBuilder::new();
    let path = builder.temp_path().join("minimal.toml");
    fs::write(
        &path,
        render_config(minimal_config_toml(), &builder.backup_dir(), builder.temp_path()),
    )
    .unwrap();

    let config = load_backup_config(&path).unwrap();

    assert_eq!(config.backup_dir, builder.backup_dir());
    assert_eq!(config.database_password.expose(), "secret");
    assert_eq!(config.retention_days, 7);
    assert_eq!(config.services().len(), 1);
    assert_eq!(config.services()[0].container, "astack_jira_1");
}

#[test]
fn test_load_full_toml() {
    let builder = ConfigBuilder::new();
    let path = builder.temp_path().join("full.toml");
    fs::write(
        &path,
        render_config(full_config_toml(), &builder.backup_dir(), builder.temp_path()),
    )
    .unwrap();

    let config = load_backup_config(&path).unwrap();

    assert_eq!(config.retention_days, 3);
    assert_eq!(config.network_name.as_deref(), Some("astack_default"));
    assert_eq!(config.identity_service_version.as_deref(), Some("2.10.1"));
    assert_eq!(config.job_timeout, Duration::from_secs(600));
    assert_eq!(config.sweep_phase, SweepPhase::After);
    assert_eq!(config.logging.level, "debug");
    assert_eq!(config.markers.database.len(), 2);
    // Filesystem markers keep their defaults
    assert_eq!(config.markers.filesystem.len(), 5);

    let services: Vec<Service> = config.services().iter().map(|s| s.service).collect();
    assert_eq!(services, Service::ALL);
}

#[test]
fn test_unknown_key_is_a_parse_error() {
    let builder = ConfigBuilder::new();
    let path = builder.temp_path().join("typo.toml");
    fs::write(&path, "backup_directory = \"/srv\"\n").unwrap();

    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_unknown_service_is_a_parse_error() {
    let builder = ConfigBuilder::new();
    let path = builder.temp_path().join("service.toml");
    fs::write(&path, "[containers]\njira = \"astack_jira_1\"\n").unwrap();

    assert!(matches!(load_config(&path), Err(ConfigError::ParseError(_))));
}

#[test]
fn test_missing_file_is_a_read_error() {
    let builder = ConfigBuilder::new();
    let result = load_config(builder.temp_path().join("absent.toml"));
    assert!(matches!(result, Err(ConfigError::ReadError(_))));
}

#[test]
fn test_missing_password() {
    ConfigBuilder::minimal()
        .without_password()
        .raw()
        .resolve()
        .assert_err_contains("database_password");
}

#[test]
fn test_no_services() {
    ConfigBuilder::new()
        .raw()
        .resolve()
        .assert_err_contains("No service containers configured");
}

#[test]
fn test_zero_retention() {
    ConfigBuilder::minimal()
        .with_retention_days(0)
        .raw()
        .resolve()
        .assert_err_contains("retention_days");
}

#[test]
fn test_zero_timeout() {
    ConfigBuilder::minimal()
        .with_timeout(0)
        .raw()
        .resolve()
        .assert_err_contains("job_timeout_seconds");
}

#[test]
fn test_database_host_is_restricted() {
    ConfigBuilder::minimal()
        .with_database_host("postgres -c 'drop'")
        .raw()
        .resolve()
        .assert_err_contains("database_host");
}

#[test]
fn test_empty_network_means_default() {
    let config = ConfigBuilder::minimal().with_network("").build();
    assert_eq!(config.network_name, None);
}

#[test]
fn test_password_is_redacted_in_debug_output() {
    let config = ConfigBuilder::minimal().with_password("hunter2").build();
    let debug = format!("{:?}", config);
    assert!(!debug.contains("hunter2"));
    assert_eq!(config.database_password.expose(), "hunter2");
}

#[test]
fn test_builder_toml_is_loadable() {
    let builder = ConfigBuilder::all_services().with_sweep_phase(SweepPhase::After);
    let path = builder.write_config_file();

    let config = load_backup_config(&path).assert_ok();
    assert_eq!(config.sweep_phase, SweepPhase::After);
    assert_eq!(config.services().len(), 4);
}
