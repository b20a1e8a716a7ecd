//! Configuration load/save tests against real files.

use chainpulse_config::{ConfigError, MonitorConfig, DEFAULT_RPC_URL};

#[test]
fn save_then_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chainpulse.toml");

    let mut config = MonitorConfig::default();
    config.source.rpc_url = "http://localhost:20336".to_string();
    config.fixed_window.window_blocks = 50;
    config.time_window.window_secs = 120;
    config.save(&path).unwrap();

    let loaded = MonitorConfig::load(&path).unwrap();
    assert_eq!(loaded.source.rpc_url, "http://localhost:20336");
    assert_eq!(loaded.fixed_window.window_blocks, 50);
    assert_eq!(loaded.time_window.window_secs, 120);
    assert_eq!(loaded.retry.max_network_attempts, 3);
}

#[test]
fn load_or_create_writes_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chainpulse.toml");
    assert!(!path.exists());

    let config = MonitorConfig::load_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config.source.rpc_url, DEFAULT_RPC_URL);

    // Second call reads the file it just wrote.
    let reloaded = MonitorConfig::load_or_create(&path).unwrap();
    assert_eq!(reloaded.source.rpc_url, DEFAULT_RPC_URL);
}

#[test]
fn load_missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.toml");
    match MonitorConfig::load(&path) {
        Err(ConfigError::Read { path: p, .. }) => assert_eq!(p, path),
        other => panic!("expected read error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn load_malformed_file_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.toml");
    std::fs::write(&path, "fixed_window = \"not a table\"").unwrap();
    assert!(matches!(
        MonitorConfig::load(&path),
        Err(ConfigError::Parse { .. })
    ));
}
