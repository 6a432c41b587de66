/*!
 * Integration tests for the Redis pool registry
 *
 * Tests that need a live server are ignored by default; run them with
 * `SHARDPOOL_REDIS=127.0.0.1:6379 cargo test -- --ignored`.
 */

#![cfg(feature = "redis")]

use shardpool::config::{RedisPoolSettings, RedisSettings};
use shardpool::{PoolError, PoolRegistry, ShardpoolError};

fn pool_settings(name: &str, dsn: &str) -> RedisPoolSettings {
    RedisPoolSettings {
        name: name.to_string(),
        dsn: dsn.to_string(),
        ..Default::default()
    }
}

/// Test that a disabled section builds nothing
#[tokio::test]
async fn test_disabled_redis_builds_nothing() {
    let settings = RedisSettings {
        enabled: false,
        default: Some(pool_settings("cache", "127.0.0.1:1")),
        connection: Vec::new(),
    };

    let registry = PoolRegistry::init(&settings).await.unwrap();
    assert!(registry.is_empty());
}

/// Test that an unreachable address aborts initialization
#[tokio::test]
async fn test_unreachable_address_fails_init() {
    let settings = RedisSettings {
        enabled: true,
        default: Some(pool_settings("cache", "127.0.0.1:1")),
        connection: Vec::new(),
    };

    let result = PoolRegistry::init(&settings).await;
    assert!(matches!(
        result,
        Err(ShardpoolError::Pool(PoolError::Connect { .. }))
    ));
}

/// Test that validation runs before any dial
#[tokio::test]
async fn test_invalid_settings_fail_before_dialing() {
    let settings = RedisSettings {
        enabled: true,
        default: Some(pool_settings("cache", ";")),
        connection: Vec::new(),
    };

    let result = PoolRegistry::init(&settings).await;
    assert!(matches!(result, Err(ShardpoolError::Config(_))));
}

/// Test borrowing, querying and releasing against a live server
#[tokio::test]
#[ignore = "requires a Redis server in SHARDPOOL_REDIS"]
async fn test_live_round_trip() {
    let address = std::env::var("SHARDPOOL_REDIS").unwrap_or_else(|_| "127.0.0.1:6379".into());
    let settings = RedisSettings {
        enabled: true,
        default: Some(pool_settings("", &address)),
        connection: vec![pool_settings("sessions", &address)],
    };

    let registry = PoolRegistry::init(&settings).await.unwrap();
    assert_eq!(registry.len(), 2);

    let pool = registry.get("sessions").unwrap();
    let _: () = pool
        .query(redis::cmd("SET").arg("shardpool:test").arg("1"))
        .await
        .unwrap();
    let value: String = pool
        .query(redis::cmd("GET").arg("shardpool:test"))
        .await
        .unwrap();
    assert_eq!(value, "1");

    let conn = pool.get().await.unwrap();
    assert!(!conn.is_broken());
    pool.release(conn).await.unwrap();

    let stats = pool.stats();
    assert_eq!(stats[0].num_get, 3);
    assert_eq!(stats[0].num_dial, 1);

    registry.shutdown().await;
    assert!(registry.default_pool().unwrap().pool().is_closed());
}
