/*!
 * Error types for Shardpool
 */

use shardpool_core::PoolError;
use std::io;
use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShardpoolError>;

/// Exit code constants for structured process exit
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_UNHEALTHY: i32 = 1;
pub const EXIT_FATAL: i32 = 2;

#[derive(Debug, Error)]
pub enum ShardpoolError {
    /// Pool or factory error
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Redis protocol error
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// No pool registered under the requested name
    #[error("Unknown pool: {0}")]
    UnknownPool(String),

    /// A Redis operation did not complete in time
    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),
}

impl ShardpoolError {
    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ShardpoolError::Config(_)
            | ShardpoolError::Parse(_)
            | ShardpoolError::Io(_)
            | ShardpoolError::UnknownPool(_) => EXIT_FATAL,
            ShardpoolError::Pool(e) if e.is_permanent() => EXIT_FATAL,
            _ => EXIT_UNHEALTHY,
        }
    }

    /// Check if this error is transient (temporary, worth retrying)
    pub fn is_transient(&self) -> bool {
        match self {
            ShardpoolError::Pool(e) => e.is_transient(),
            ShardpoolError::Timeout(_) => true,
            #[cfg(feature = "redis")]
            ShardpoolError::Redis(e) => {
                e.is_io_error() || e.is_timeout() || e.is_connection_dropped()
            }
            _ => false,
        }
    }
}
