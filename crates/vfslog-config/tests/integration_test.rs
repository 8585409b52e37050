//! Integration tests for vfslog-config
//!
//! These tests verify config loading with real file system operations.

use tempfile::tempdir;
use vfslog_config::Config;

/// Test config loading from a real config file
#[test]
fn test_load_config_from_file() {
    let temp = tempdir().unwrap();
    let dir = temp.path().join(".vfslog");
    std::fs::create_dir_all(&dir).unwrap();

    let config_content = r#"
[time_machine]
sweep_interval = 16

[chronicle]
strict_invalid_records = true

[oracle]
enabled = false
max_distance_bytes = 65536
"#;
    std::fs::write(dir.join("config.toml"), config_content).unwrap();

    let config = Config::load_from(&dir.join("config.toml")).unwrap();

    assert_eq!(config.time_machine.sweep_interval, 16);
    assert!(config.chronicle.strict_invalid_records);
    assert!(!config.oracle.enabled);
    assert_eq!(config.oracle.max_distance_bytes, 65536);
}

/// Missing sections fall back to defaults
#[test]
fn test_partial_file_uses_defaults() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[oracle]\nmax_distance_bytes = 1\n").unwrap();

    let config = Config::load_from(&path).unwrap();

    assert_eq!(config.oracle.max_distance_bytes, 1);
    assert!(config.oracle.enabled);
    assert_eq!(config.time_machine, Config::default().time_machine);
}

/// Project config overrides global config key by key
#[test]
fn test_config_hierarchy_project_overrides_global() {
    let temp = tempdir().unwrap();
    let global = temp.path().join("global.toml");
    std::fs::write(&global, "[oracle]\nenabled = false\nmax_distance_bytes = 100\n").unwrap();

    let mut config = Config::load_from(&global).unwrap();
    config
        .merge("[chronicle]\nstrict_invalid_records = true\n[oracle]\nmax_distance_bytes = 200\n")
        .unwrap();

    assert!(!config.oracle.enabled);
    assert_eq!(config.oracle.max_distance_bytes, 200);
    assert!(config.chronicle.strict_invalid_records);
}

/// Malformed files surface a TOML error
#[test]
fn test_malformed_file_is_an_error() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("config.toml");
    std::fs::write(&path, "[oracle\nmax_distance_bytes = ").unwrap();

    let err = Config::load_from(&path).unwrap_err();
    assert!(matches!(err, vfslog_config::ConfigError::Toml(_)));
}
