/*!
 * Shardpool - sharded, health-checked Redis connection pools
 *
 * Builds on `shardpool-core` with:
 * - A Redis protocol adapter (AUTH, SELECT, PING) over multiplexed tokio connections
 * - TOML settings describing a default pool and named pools
 * - A registry owning every configured pool
 * - Structured logging setup
 */

pub mod config;
pub mod error;
pub mod logging;
#[cfg(feature = "redis")]
pub mod redis;
#[cfg(feature = "redis")]
pub mod registry;

// Re-export commonly used types
pub use config::{LogLevel, RedisPoolSettings, RedisSettings, Settings};
pub use error::{Result, ShardpoolError};
#[cfg(feature = "redis")]
pub use self::redis::{RedisConnFactory, RedisConnection, RedisPool};
#[cfg(feature = "redis")]
pub use registry::PoolRegistry;
pub use shardpool_core::{Pool, PoolConfig, PoolError, ShardStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert_eq!(VERSION, env!("CARGO_PKG_VERSION"));
    }
}
