//! Tests for config functionality.

use crate::config::{Config, CONFIG_TEMPLATE};
use crate::error::GrantError;
use chrono::Duration;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.default_resource, "default");
    assert!(config.max_duration.is_none());
    assert_eq!(config.lock_timeout_ms, 2000);
    assert_eq!(config.lock_retry_ms, 20);
    assert_eq!(config.lock_stale_minutes, 10);
    assert!(config.audit_log);
}

#[test]
fn test_parse_empty_yaml() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config.default_resource, "default");
    assert_eq!(config.lock_timeout_ms, 2000);
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
default_resource: build-farm
lock_timeout_ms: 500
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.default_resource, "build-farm");
    assert_eq!(config.lock_timeout_ms, 500);
    // Unspecified values use defaults
    assert_eq!(config.lock_retry_ms, 20);
    assert!(config.audit_log);
}

#[test]
fn test_parse_full_yaml() {
    let yaml = r#"
default_resource: db
max_duration: 7d
lock_timeout_ms: 100
lock_retry_ms: 5
lock_stale_minutes: 30
audit_log: false
"#;
    let config = Config::from_yaml(yaml).unwrap();

    assert_eq!(config.default_resource, "db");
    assert_eq!(config.max_duration.as_deref(), Some("7d"));
    assert_eq!(config.lock_timeout_ms, 100);
    assert_eq!(config.lock_retry_ms, 5);
    assert_eq!(config.lock_stale_minutes, 30);
    assert!(!config.audit_log);
    assert_eq!(config.max_ttl().unwrap(), Some(Duration::days(7)));
}

#[test]
fn test_unknown_fields_are_ignored() {
    let yaml = r#"
default_resource: db
some_future_setting: true
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.default_resource, "db");
}

#[test]
fn test_template_parses_to_defaults() {
    let config = Config::from_yaml(CONFIG_TEMPLATE).unwrap();
    let defaults = Config::default();

    assert_eq!(config.default_resource, defaults.default_resource);
    assert_eq!(config.max_duration, defaults.max_duration);
    assert_eq!(config.lock_timeout_ms, defaults.lock_timeout_ms);
    assert_eq!(config.lock_retry_ms, defaults.lock_retry_ms);
    assert_eq!(config.lock_stale_minutes, defaults.lock_stale_minutes);
    assert_eq!(config.audit_log, defaults.audit_log);
}

#[test]
fn test_validation_rejects_zero_timings() {
    for yaml in [
        "lock_timeout_ms: 0",
        "lock_retry_ms: 0",
        "lock_stale_minutes: 0",
    ] {
        let err = Config::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, GrantError::UserError(_)));
        assert!(err.to_string().contains("must be greater than 0"), "{}", yaml);
    }
}

#[test]
fn test_validation_rejects_bad_resource_name() {
    let err = Config::from_yaml("default_resource: ../etc").unwrap_err();
    assert!(err.to_string().contains("default_resource"));
}

#[test]
fn test_validation_rejects_bad_max_duration() {
    let err = Config::from_yaml("max_duration: forever").unwrap_err();
    assert!(err.to_string().contains("max_duration"));
}

#[test]
fn test_invalid_yaml_is_an_error() {
    let err = Config::from_yaml("lock_timeout_ms: [not, a, number]").unwrap_err();
    assert!(err.to_string().contains("failed to parse config YAML"));
}

#[test]
fn test_load_or_default_without_file() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let config = Config::load_or_default(temp_dir.path().join("config.yaml")).unwrap();
    assert_eq!(config.default_resource, "default");
}

#[test]
fn test_load_from_file() {
    let temp_dir = tempfile::TempDir::new().unwrap();
    let path = temp_dir.path().join("config.yaml");
    std::fs::write(&path, "default_resource: gpu\n").unwrap();

    let config = Config::load_or_default(&path).unwrap();
    assert_eq!(config.default_resource, "gpu");
}

#[test]
fn test_lock_wait_from_config() {
    let config = Config::from_yaml("lock_timeout_ms: 150\nlock_retry_ms: 10").unwrap();
    let wait = config.lock_wait();

    assert_eq!(wait.timeout, std::time::Duration::from_millis(150));
    assert_eq!(wait.retry, std::time::Duration::from_millis(10));
    assert_eq!(wait.stale_minutes, 10);
}

#[test]
fn test_resource_name_prefers_request() {
    let config = Config::default();

    assert_eq!(config.resource_name(None).unwrap(), "default");
    assert_eq!(config.resource_name(Some("db")).unwrap(), "db");
    assert!(config.resource_name(Some("a/b")).is_err());
}
