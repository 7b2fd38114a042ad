//! Tests for config functionality.

use crate::config::Config;

#[test]
fn test_default_config() {
    let config = Config::default();

    assert_eq!(config.rate_limit_max_requests, 60);
    assert_eq!(config.rate_limit_window_secs, 60);
    assert_eq!(config.hash_memory_kib, 19456);
    assert_eq!(config.hash_iterations, 2);
    assert_eq!(config.hash_parallelism, 1);
    assert_eq!(config.store_timeout_ms, 2000);
    assert_eq!(config.store_lock_stale_secs, 30);
    assert!(config.audit_log);
    assert!(config.validate().is_ok());
}

#[test]
fn test_parse_minimal_yaml() {
    let config = Config::from_yaml("").unwrap();

    // Should use all defaults
    assert_eq!(config, Config::default());
}

#[test]
fn test_parse_partial_yaml() {
    let yaml = r#"
rate_limit_max_requests: 10
audit_log: false
"#;
    let config = Config::from_yaml(yaml).unwrap();

    // Specified values should be used
    assert_eq!(config.rate_limit_max_requests, 10);
    assert!(!config.audit_log);

    // Unspecified values should use defaults
    assert_eq!(config.rate_limit_window_secs, 60);
    assert_eq!(config.hash_iterations, 2);
}

#[test]
fn test_unknown_fields_are_ignored() {
    let yaml = r#"
rate_limit_window_secs: 30
listen_address: "0.0.0.0:3000"
"#;
    let config = Config::from_yaml(yaml).unwrap();
    assert_eq!(config.rate_limit_window_secs, 30);
}

#[test]
fn test_zero_values_are_rejected() {
    let err = Config::from_yaml("rate_limit_max_requests: 0").unwrap_err();
    assert!(err.to_string().contains("rate_limit_max_requests"));

    let err = Config::from_yaml("store_timeout_ms: 0").unwrap_err();
    assert!(err.to_string().contains("store_timeout_ms"));
}

#[test]
fn test_oversized_durations_are_rejected() {
    let err = Config::from_yaml("store_lock_stale_secs: 18446744073709551615").unwrap_err();
    assert!(err.to_string().contains("store_lock_stale_secs is too large"));

    let err = Config::from_yaml("rate_limit_window_secs: 9223372036854775807").unwrap_err();
    assert!(err.to_string().contains("rate_limit_window_secs is too large"));

    let config = Config {
        store_lock_stale_secs: u64::MAX,
        ..Config::default()
    };
    assert!(config.store_lock_stale().is_err());
    assert_eq!(
        Config::default().store_lock_stale().unwrap(),
        chrono::Duration::seconds(30)
    );
}

#[test]
fn test_argon2_memory_floor() {
    let yaml = r#"
hash_memory_kib: 8
hash_parallelism: 2
"#;
    let err = Config::from_yaml(yaml).unwrap_err();
    assert!(err.to_string().contains("at least 16"));
}

#[test]
fn test_yaml_roundtrip_preserves_values() {
    let mut config = Config::default();
    config.rate_limit_max_requests = 5;
    config.hash_memory_kib = 64;

    let yaml = config.to_yaml().unwrap();
    let parsed = Config::from_yaml(&yaml).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_component_settings() {
    let config = Config::from_yaml("rate_limit_window_secs: 15").unwrap();

    let limits = config.rate_limit();
    assert_eq!(limits.max_requests, 60);
    assert_eq!(limits.window, chrono::Duration::seconds(15));

    let cost = config.hash_cost();
    assert_eq!(cost.memory_kib, 19456);
    assert_eq!(cost.iterations, 2);
}

#[test]
fn test_load_from_file() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "hash_iterations: 3\n").unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.hash_iterations, 3);

    let missing = Config::load(dir.path().join("missing.yaml"));
    assert!(missing.is_err());
}
