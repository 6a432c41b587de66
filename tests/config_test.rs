/*!
 * Integration tests for settings files
 *
 * Loads TOML from disk the way the CLI does and checks the resulting pool
 * configuration.
 */

use shardpool::config::{LogLevel, Settings};
use shardpool::ShardpoolError;
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

const FULL_CONFIG: &str = r#"
[redis]
use = true

[redis.default]
name = "cache"
dsn = "10.0.0.1:6379;10.0.0.2:6379;10.0.0.3:6379"
max_idle = 20
max_active = 40
idle_timeout_secs = 300

[[redis.connection]]
name = "sessions"
dsn = "10.0.1.1:6379"
password = "secret"
db = 2
connect_timeout_ms = 25
read_timeout_ms = 250
write_timeout_ms = 250

[logging]
level = "debug"
file = "/var/log/shardpool.json"
"#;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// Test a complete settings file
#[test]
fn test_load_full_config() {
    let file = write_config(FULL_CONFIG);
    let settings = Settings::load(file.path()).unwrap();

    assert!(settings.redis.enabled);

    let default = settings.redis.default.as_ref().unwrap();
    assert_eq!(default.display_name(), "cache");
    assert_eq!(default.addresses().len(), 3);

    let config = default.pool_config();
    assert_eq!(config.max_idle, 20);
    assert_eq!(config.max_active, 40);
    assert_eq!(config.idle_timeout, Some(Duration::from_secs(300)));
    assert_eq!(config.max_fails, 5);

    let sessions = &settings.redis.connection[0];
    assert_eq!(sessions.name, "sessions");
    assert_eq!(sessions.password, "secret");
    assert_eq!(sessions.db, 2);
    assert_eq!(sessions.connect_timeout(), Duration::from_millis(25));

    assert_eq!(settings.logging.level, LogLevel::Debug);
    assert!(settings.logging.file.is_some());
}

/// Test that omitted fields take their defaults
#[test]
fn test_minimal_config_defaults() {
    let file = write_config(
        r#"
        [redis]
        use = true

        [redis.default]
        dsn = "127.0.0.1:6379"
        "#,
    );
    let settings = Settings::load(file.path()).unwrap();

    let default = settings.redis.default.unwrap();
    assert_eq!(default.display_name(), "default");
    assert_eq!(default.max_idle, 50);
    assert_eq!(default.max_active, 100);
    assert_eq!(default.pool_config().idle_timeout, None);
    assert_eq!(default.read_timeout(), Duration::from_millis(100));

    assert_eq!(settings.logging.level, LogLevel::Info);
    assert!(settings.logging.file.is_none());
}

/// Test that an empty file is a valid, disabled configuration
#[test]
fn test_empty_file() {
    let file = write_config("");
    let settings = Settings::load(file.path()).unwrap();

    assert!(!settings.redis.enabled);
    assert!(settings.redis.connection.is_empty());
}

/// Test malformed TOML
#[test]
fn test_parse_error() {
    let file = write_config("[redis\nuse = true");
    let result = Settings::load(file.path());

    assert!(matches!(result, Err(ShardpoolError::Parse(_))));
}

/// Test a missing file
#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = Settings::load(&dir.path().join("absent.toml"));

    assert!(matches!(result, Err(ShardpoolError::Io(_))));
}
