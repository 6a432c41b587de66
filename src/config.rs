/*!
 * Configuration file support
 *
 * Settings are read from a TOML file with a `[redis]` section describing the
 * default pool and any number of named pools, plus an optional `[logging]`
 * section:
 *
 * ```toml
 * [redis]
 * use = true
 *
 * [redis.default]
 * name = "cache"
 * dsn = "10.0.0.1:6379;10.0.0.2:6379;10.0.0.3:6379"
 * max_idle = 50
 * max_active = 100
 *
 * [[redis.connection]]
 * name = "sessions"
 * dsn = "10.0.1.1:6379"
 * password = "secret"
 * db = 2
 *
 * [logging]
 * level = "debug"
 * ```
 */

use crate::error::{Result, ShardpoolError};
use serde::{Deserialize, Serialize};
use shardpool_core::PoolConfig;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level settings file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub redis: RedisSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse and validate settings from TOML text
    pub fn parse(contents: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(contents)?;
        settings.redis.validate()?;
        Ok(settings)
    }
}

/// The `[redis]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RedisSettings {
    /// Whether Redis pools are built at all
    #[serde(rename = "use", default)]
    pub enabled: bool,

    /// Pool returned by the registry's `default_pool`
    #[serde(default)]
    pub default: Option<RedisPoolSettings>,

    /// Additional pools looked up by name
    #[serde(default)]
    pub connection: Vec<RedisPoolSettings>,
}

impl RedisSettings {
    /// Validate every pool definition; disabled sections are not checked
    pub fn validate(&self) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let default = self.default.as_ref().ok_or_else(|| {
            ShardpoolError::Config("[redis.default] is required when redis is enabled".to_string())
        })?;
        default.validate()?;

        let mut names = std::collections::HashSet::new();
        for pool in &self.connection {
            pool.validate()?;
            if pool.name.is_empty() {
                return Err(ShardpoolError::Config(
                    "named redis pools require a name".to_string(),
                ));
            }
            if !names.insert(pool.name.as_str()) {
                return Err(ShardpoolError::Config(format!(
                    "duplicate redis pool name: {}",
                    pool.name
                )));
            }
        }

        Ok(())
    }
}

/// One Redis pool definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisPoolSettings {
    #[serde(default)]
    pub name: String,

    /// Backend addresses separated by `;`
    pub dsn: String,

    #[serde(default)]
    pub password: String,

    /// Database selected after connecting
    #[serde(default)]
    pub db: i64,

    /// Idle connections kept per address
    #[serde(default = "default_max_idle")]
    pub max_idle: usize,

    /// Borrowed connections allowed per address (0 = unlimited)
    #[serde(default = "default_max_active")]
    pub max_active: usize,

    /// Idle connections older than this are not reused (0 = never expire)
    #[serde(default)]
    pub idle_timeout_secs: u64,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_ms: u64,

    #[serde(default = "default_io_timeout")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_io_timeout")]
    pub write_timeout_ms: u64,
}

impl Default for RedisPoolSettings {
    fn default() -> Self {
        Self {
            name: String::new(),
            dsn: String::new(),
            password: String::new(),
            db: 0,
            max_idle: default_max_idle(),
            max_active: default_max_active(),
            idle_timeout_secs: 0,
            connect_timeout_ms: default_connect_timeout(),
            read_timeout_ms: default_io_timeout(),
            write_timeout_ms: default_io_timeout(),
        }
    }
}

impl RedisPoolSettings {
    /// Addresses parsed from the DSN, in order
    pub fn addresses(&self) -> Vec<String> {
        self.dsn
            .split(';')
            .map(str::trim)
            .filter(|addr| !addr.is_empty())
            .map(String::from)
            .collect()
    }

    /// Pool configuration derived from these settings
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            max_idle: self.max_idle,
            max_active: self.max_active,
            idle_timeout: (self.idle_timeout_secs > 0)
                .then(|| Duration::from_secs(self.idle_timeout_secs)),
            max_fails: 5,
            ..Default::default()
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Name used in logs and registry lookups
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            "default"
        } else {
            &self.name
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.addresses().is_empty() {
            return Err(ShardpoolError::Config(format!(
                "redis pool '{}' has no addresses in dsn",
                self.display_name()
            )));
        }

        if self.db < 0 {
            return Err(ShardpoolError::Config(format!(
                "redis pool '{}' has a negative db index",
                self.display_name()
            )));
        }

        if self.connect_timeout_ms == 0 || self.read_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(ShardpoolError::Config(format!(
                "redis pool '{}' timeouts must be greater than 0",
                self.display_name()
            )));
        }

        Ok(())
    }
}

/// The `[logging]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingSettings {
    #[serde(default)]
    pub level: LogLevel,

    /// JSON log file; compact text on stderr when unset
    #[serde(default)]
    pub file: Option<PathBuf>,
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_max_idle() -> usize {
    50
}

fn default_max_active() -> usize {
    100
}

fn default_connect_timeout() -> u64 {
    50
}

fn default_io_timeout() -> u64 {
    100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dsn_splitting() {
        let pool = RedisPoolSettings {
            dsn: "10.0.0.1:6379; 10.0.0.2:6379;;10.0.0.3:6379;".to_string(),
            ..Default::default()
        };

        assert_eq!(
            pool.addresses(),
            vec!["10.0.0.1:6379", "10.0.0.2:6379", "10.0.0.3:6379"]
        );
    }

    #[test]
    fn test_pool_config_mapping() {
        let pool = RedisPoolSettings {
            dsn: "127.0.0.1:6379".to_string(),
            max_idle: 8,
            max_active: 16,
            idle_timeout_secs: 240,
            ..Default::default()
        };

        let config = pool.pool_config();
        assert_eq!(config.max_idle, 8);
        assert_eq!(config.max_active, 16);
        assert_eq!(config.idle_timeout, Some(Duration::from_secs(240)));
        assert_eq!(config.max_fails, 5);
        assert!(config.validate().is_ok());

        let never = RedisPoolSettings::default().pool_config();
        assert_eq!(never.idle_timeout, None);
    }

    #[test]
    fn test_default_timeouts() {
        let pool = RedisPoolSettings::default();
        assert_eq!(pool.connect_timeout(), Duration::from_millis(50));
        assert_eq!(pool.read_timeout(), Duration::from_millis(100));
        assert_eq!(pool.write_timeout(), Duration::from_millis(100));
    }

    #[test]
    fn test_disabled_section_skips_validation() {
        let settings = Settings::parse("[redis]\nuse = false\n").unwrap();
        assert!(!settings.redis.enabled);
        assert!(settings.redis.default.is_none());
    }

    #[test]
    fn test_enabled_requires_default() {
        let result = Settings::parse("[redis]\nuse = true\n");
        assert!(matches!(result, Err(ShardpoolError::Config(_))));
    }

    #[test]
    fn test_empty_dsn_rejected() {
        let result = Settings::parse(
            r#"
            [redis]
            use = true

            [redis.default]
            dsn = " ; "
            "#,
        );
        assert!(matches!(result, Err(ShardpoolError::Config(_))));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Settings::parse(
            r#"
            [redis]
            use = true

            [redis.default]
            dsn = "127.0.0.1:6379"

            [[redis.connection]]
            name = "sessions"
            dsn = "127.0.0.1:6380"

            [[redis.connection]]
            name = "sessions"
            dsn = "127.0.0.1:6381"
            "#,
        );
        assert!(matches!(result, Err(ShardpoolError::Config(_))));
    }

    #[test]
    fn test_log_level_conversion() {
        assert_eq!(LogLevel::Error.to_tracing_level(), tracing::Level::ERROR);
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::Info.to_tracing_level(), tracing::Level::INFO);
        assert_eq!(LogLevel::Debug.to_tracing_level(), tracing::Level::DEBUG);
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
    }
}
