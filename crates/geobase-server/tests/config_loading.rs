//! Tests for configuration loading from TOML files and env overrides.

use geobase_server::config::{apply_env_overrides, load_config, Config, ConfigError};
use std::collections::HashMap;
use std::io::Write;
use std::net::{IpAddr, Ipv4Addr};

fn write_config(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_match_documented_values() {
    let config = Config::default();
    assert_eq!(config.server.port, 3000);
    assert_eq!(config.logging.level, "info");
    assert!(!config.logging.json);
    assert_eq!(config.connection.ping_interval_ms, 1000);
    assert_eq!(config.connection.max_queued_frames, 65_536);
    assert_eq!(config.static_files.dir, "public");
}

#[test]
fn file_values_override_defaults_per_field() {
    let file = write_config(
        r#"
[server]
host = "127.0.0.1"
port = 4000

[connection]
ping_interval_ms = 250
max_queued_frames = 1024
"#,
    );

    let contents = std::fs::read_to_string(file.path()).unwrap();
    let mut config: Config = toml::from_str(&contents).unwrap();
    apply_env_overrides(&mut config, |_| None);

    assert_eq!(config.server.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
    assert_eq!(config.server.port, 4000);
    assert_eq!(config.connection.ping_interval_ms, 250);
    assert_eq!(config.connection.max_queued_frames, 1024);
    assert_eq!(config.static_files.dir, "public");
}

#[test]
fn missing_file_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");

    let config = load_config(Some(path.to_str().unwrap())).unwrap();
    assert_eq!(config.connection.max_queued_frames, 65_536);
}

#[test]
fn malformed_file_is_a_parse_error() {
    let file = write_config("[server\nport = ");
    let err = load_config(Some(file.path().to_str().unwrap())).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn env_overrides_apply_and_bad_values_are_ignored() {
    let env: HashMap<&str, &str> = HashMap::from([
        ("GEOBASE_HOST", "not-an-ip"),
        ("GEOBASE_PORT", "8080"),
        ("GEOBASE_LOG_LEVEL", "geobase_store=debug,info"),
        ("GEOBASE_LOG_JSON", "1"),
        ("GEOBASE_PUBLIC_DIR", "/srv/geobase"),
    ]);

    let mut config = Config::default();
    apply_env_overrides(&mut config, |key| env.get(key).map(|v| v.to_string()));

    assert_eq!(config.server.host, Config::default().server.host);
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.logging.level, "geobase_store=debug,info");
    assert!(config.logging.json);
    assert_eq!(config.static_files.dir, "/srv/geobase");
}
