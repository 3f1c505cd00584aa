use std::io::Write;

use serial_test::serial;

use super::*;

#[test]
fn test_config_defaults() {
    let config = CopiumConfig::default();

    assert_eq!(config.bus.publish_timeout(), Duration::from_secs(10));
    assert_eq!(config.bus.publish_retries, 3);
    assert_eq!(config.bus.max_delivery_attempts, 5);
    assert_eq!(config.pool.workers, 4);
    assert_eq!(config.pool.queue_capacity, 256);
    assert_eq!(config.dashboard.min_hits, 10);
    assert_eq!(config.dashboard.max_hits, 18);
    assert!(config.auth.tokens.is_empty());
}

#[test]
#[serial]
fn test_config_load_from_yaml_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("copium.yaml");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(
        file,
        "pool:\n  workers: 2\ndashboard:\n  max_hits: 12\nauth:\n  tokens:\n    token-kim: kim@example.com"
    )
    .unwrap();

    let config = CopiumConfig::load(path.to_str()).unwrap();

    assert_eq!(config.pool.workers, 2);
    assert_eq!(config.pool.queue_capacity, 256);
    assert_eq!(config.dashboard.max_hits, 12);
    assert_eq!(config.dashboard.min_hits, 10);
    assert_eq!(
        config.auth.tokens.get("token-kim").map(String::as_str),
        Some("kim@example.com")
    );
}

#[test]
#[serial]
fn test_config_env_overrides_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("copium.yaml");
    std::fs::write(&path, "pool:\n  workers: 2\n").unwrap();

    std::env::set_var("COPIUM__POOL__WORKERS", "7");
    std::env::set_var("COPIUM__BUS__PUBLISH_TIMEOUT_SECS", "3");
    let result = CopiumConfig::load(path.to_str());
    std::env::remove_var("COPIUM__POOL__WORKERS");
    std::env::remove_var("COPIUM__BUS__PUBLISH_TIMEOUT_SECS");

    let config = result.unwrap();
    assert_eq!(config.pool.workers, 7);
    assert_eq!(config.bus.publish_timeout_secs, 3);
}

#[test]
#[serial]
fn test_config_missing_required_file_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");

    assert!(CopiumConfig::load(path.to_str()).is_err());
}
