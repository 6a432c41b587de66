//! Pool behavior through the public API only

use shardpool_core::testing::{MockConnection, MockFactory};
use shardpool_core::{Pool, PoolConfig, PoolError, Quorum};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

fn addresses(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("cache-{i}.internal:6379")).collect()
}

fn build(factory: &Arc<MockFactory>, n: usize, config: PoolConfig) -> Pool<MockConnection> {
    assert_ok!(Pool::<MockConnection>::new(addresses(n), factory.clone(), config))
}

#[tokio::test]
async fn idle_connection_is_reused_before_dialing() {
    let factory = MockFactory::new();
    let pool = build(&factory, 1, PoolConfig::default());

    let conn = assert_ok!(pool.get().await);
    let id = conn.id();
    assert_ok!(pool.put(conn, false).await);

    let again = assert_ok!(pool.get().await);
    assert_eq!(again.id(), id);
    assert_eq!(factory.creates(), 1);

    // Reused exactly once: the next borrow while it is out dials
    let other = assert_ok!(pool.get().await);
    assert_ne!(other.id(), id);
    assert_eq!(factory.creates(), 2);

    pool.shutdown().await;
}

#[tokio::test]
async fn broken_connection_is_never_reused() {
    let factory = MockFactory::new();
    let pool = build(&factory, 1, PoolConfig::default());
    let shard = Arc::clone(pool.shard(0).unwrap());

    let keep = assert_ok!(pool.get().await);
    let broken = assert_ok!(pool.get().await);
    let broken_id = broken.id();
    assert_eq!(shard.active_count(), 2);

    assert_ok!(pool.put(broken.clone(), true).await);
    assert_eq!(shard.active_count(), 1);
    assert!(broken.is_closed());

    let mut seen = Vec::new();
    for _ in 0..5 {
        let conn = assert_ok!(pool.get().await);
        assert_ne!(conn.id(), broken_id);
        seen.push(conn);
    }

    for conn in seen {
        assert_ok!(pool.put(conn, false).await);
    }
    assert_ok!(pool.put(keep, false).await);
    assert_eq!(shard.active_count(), 0);
}

#[tokio::test]
async fn second_put_is_an_invalid_return() {
    let factory = MockFactory::new();
    let pool = build(&factory, 1, PoolConfig::default());
    let shard = Arc::clone(pool.shard(0).unwrap());

    let conn = assert_ok!(pool.get().await);
    let _other = assert_ok!(pool.get().await);

    assert_ok!(pool.put(conn.clone(), false).await);
    assert_eq!(shard.active_count(), 1);

    let err = assert_err!(pool.put(conn, false).await);
    assert!(matches!(err, PoolError::InvalidReturn));
    assert_eq!(shard.active_count(), 1);
}

#[tokio::test]
async fn active_ceiling_reports_exhaustion() {
    let factory = MockFactory::new();
    let pool = build(&factory, 1, PoolConfig::with_limits(10, 3));

    let mut held = Vec::new();
    for _ in 0..3 {
        held.push(assert_ok!(pool.get().await));
    }

    // With one shard every retry lands on the exhausted shard
    let err = assert_err!(pool.get().await);
    assert!(matches!(err, PoolError::RetriesExhausted { attempts: 5 }));
    assert_eq!(factory.creates(), 3);

    let shard = pool.shard(0).unwrap();
    assert_eq!(shard.active_count(), 3);
    assert_eq!(shard.stats().num_dial, 3);
}

#[tokio::test]
async fn quorum_blocks_second_demotion_of_three() {
    let factory = MockFactory::new();
    let pool = build(&factory, 3, PoolConfig::default());

    assert!(pool.mark_available(1, false).await);
    assert!(!pool.mark_available(2, false).await);

    assert!(!pool.shard(1).unwrap().is_available());
    assert!(pool.shard(2).unwrap().is_available());
    assert_eq!(pool.num_available(), 2);

    let available: Vec<bool> = pool.stats().iter().map(|s| s.available).collect();
    assert_eq!(available, vec![true, false, true]);
}

#[tokio::test]
async fn unavailable_shards_are_never_served() {
    let factory = MockFactory::new();
    let config = PoolConfig {
        quorum: Quorum::NONE,
        ..Default::default()
    };
    let pool = build(&factory, 5, config);
    for index in 0..3 {
        assert!(pool.mark_available(index, false).await);
    }

    let allowed: HashSet<&str> = pool.addresses()[3..].iter().map(String::as_str).collect();
    let mut served = HashSet::new();

    // Enough calls to cover every starting rotation offset several times
    for _ in 0..25 {
        let conn = assert_ok!(pool.get().await);
        assert!(allowed.contains(conn.address()));
        served.insert(conn.address().to_string());
        assert_ok!(pool.put(conn, false).await);
    }

    assert_eq!(served.len(), 2);
    for address in &pool.addresses()[..3] {
        assert_eq!(factory.creates_for(address), 0);
    }
}

#[tokio::test]
async fn connection_borrowed_before_demotion_is_closed_on_return() {
    let factory = MockFactory::new();
    let pool = build(&factory, 3, PoolConfig::default());

    let conn = assert_ok!(pool.get().await);
    let index = pool
        .addresses()
        .iter()
        .position(|a| a == conn.address())
        .unwrap();
    assert!(pool.mark_available(index, false).await);
    assert_ok!(pool.put(conn.clone(), false).await);

    assert!(conn.is_closed());
    let shard = pool.shard(index).unwrap();
    assert_eq!(shard.idle_count(), 0);
    assert_eq!(shard.active_count(), 0);

    assert!(pool.mark_available(index, true).await);
    let stats = shard.stats();
    assert_eq!(stats.num_close, 1);
    assert_eq!(stats.num_idle, 0);

    pool.shutdown().await;
}

#[tokio::test]
async fn end_to_end_two_addresses() {
    let factory = MockFactory::new();
    let pool = build(&factory, 2, PoolConfig::with_limits(1, 1));

    let conn = assert_ok!(pool.get().await);
    let first = pool
        .addresses()
        .iter()
        .position(|a| a == conn.address())
        .unwrap();
    let id = conn.id();
    assert_ok!(pool.put(conn, false).await);

    let shard = Arc::clone(pool.shard(first).unwrap());
    assert_eq!(shard.idle_count(), 1);
    assert_eq!(shard.active_count(), 0);

    // Rotation moves on to the other shard, then comes back to the idle one
    let other = assert_ok!(pool.get().await);
    assert_ne!(other.address(), pool.addresses()[first]);

    let reused = assert_ok!(pool.get().await);
    assert_eq!(reused.id(), id);
    assert_eq!(shard.idle_count(), 0);
    assert_eq!(shard.active_count(), 1);

    let stats = shard.stats();
    assert_eq!(stats.num_dial, 1);
    assert_eq!(stats.num_get, 2);

    assert_ok!(pool.put(reused, false).await);
    assert_ok!(pool.put(other, false).await);
    pool.shutdown().await;
}

#[tokio::test]
async fn shutdown_twice_is_harmless() {
    let factory = MockFactory::new();
    let pool = build(&factory, 2, PoolConfig::default());

    pool.shutdown().await;
    pool.shutdown().await;

    let err = assert_err!(pool.get().await);
    assert!(matches!(err, PoolError::PoolClosed));
    assert!(err.is_permanent());
}

#[tokio::test]
async fn stats_serialize_for_reporting() {
    let factory = MockFactory::new();
    let pool = build(&factory, 1, PoolConfig::default());

    let conn = assert_ok!(pool.get().await);
    assert_ok!(pool.put(conn, false).await);

    let stats = pool.stats();
    let json = serde_json::to_value(&stats).unwrap();
    assert_eq!(json[0]["shard"], "cache-0.internal:6379");
    assert_eq!(json[0]["num_get"], 1);
    assert_eq!(json[0]["num_idle"], 1);
    assert_eq!(json[0]["available"], true);
}
