//! Sharded connection pool
//!
//! The pool owns one [`PoolShard`] per backend address and spreads borrows over
//! them with a shared rotation counter. A `get` walks the shards round-robin,
//! skipping unavailable ones and moving on when a shard fails to produce a
//! connection, up to a retry budget of `max(shards, min_retry_attempts)`.
//!
//! A background health checker (see [`crate::health`]) promotes recovered
//! shards and demotes failing ones, but never lets availability drop to or
//! below the configured [`Quorum`](crate::Quorum): a flaky check must not be
//! able to take the whole backend set out of rotation.
//!
//! # Example
//!
//! ```no_run
//! use shardpool_core::testing::{MockConnection, MockFactory};
//! use shardpool_core::{Pool, PoolConfig, PoolError};
//!
//! # async fn example() -> Result<(), PoolError> {
//! let factory = MockFactory::new();
//! let pool = Pool::<MockConnection>::new(
//!     vec!["10.0.0.1:6379", "10.0.0.2:6379"],
//!     factory,
//!     PoolConfig::default(),
//! )?;
//!
//! let conn = pool.get().await?;
//! // Use connection...
//! pool.put(conn, false).await?;
//!
//! pool.shutdown().await;
//! # Ok(())
//! # }
//! ```

use crate::config::PoolConfig;
use crate::connection::Poolable;
use crate::error::{PoolError, Result};
use crate::factory::ConnectionFactory;
use crate::health;
use crate::shard::PoolShard;
use crate::stats::ShardStats;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// State shared between the pool handle and its health checker
pub(crate) struct PoolInner<C: Poolable> {
    shards: Vec<Arc<PoolShard<C>>>,
    factory: Arc<dyn ConnectionFactory<C>>,
    config: PoolConfig,
    rotation: AtomicUsize,
    num_available: AtomicUsize,
    max_retry: usize,
    /// Serializes promotion/demotion decisions against `num_available`
    transitions: Mutex<()>,
}

impl<C: Poolable> PoolInner<C> {
    pub(crate) fn config(&self) -> &PoolConfig {
        &self.config
    }

    async fn check(&self, shard: &PoolShard<C>) -> bool {
        health::check_address::<C, _>(
            self.factory.as_ref(),
            shard.address(),
            self.config.health_check_attempts,
        )
        .await
    }

    /// Check every shard that is unavailable or suspect
    pub(crate) async fn sweep(&self) {
        for shard in &self.shards {
            if shard.is_available() && !shard.is_suspect() {
                continue;
            }
            let healthy = self.check(shard).await;
            self.mark_available(shard, healthy).await;
        }
    }

    /// Check a single shard flagged by its failure counter
    pub(crate) async fn recheck(&self, index: usize) {
        if let Some(shard) = self.shards.get(index) {
            debug!(address = %shard.address(), "Checking suspect shard");
            let healthy = self.check(shard).await;
            self.mark_available(shard, healthy).await;
        }
    }

    /// Apply a health verdict; returns true when availability changed
    ///
    /// A demoted shard's idle queue is drained after the transition lock is
    /// released, so a slow factory `close` never stalls other verdicts.
    pub(crate) async fn mark_available(&self, shard: &PoolShard<C>, healthy: bool) -> bool {
        if healthy {
            return self.promote(shard).await;
        }
        if !self.demote(shard).await {
            return false;
        }

        let drained = shard.drain().await;
        debug!(address = %shard.address(), drained, "Drained demoted shard");
        true
    }

    async fn promote(&self, shard: &PoolShard<C>) -> bool {
        let _guard = self.transitions.lock().await;
        if !shard.set_available(true) {
            return false;
        }
        let available = self.num_available.fetch_add(1, Ordering::AcqRel) + 1;
        info!(address = %shard.address(), available, "Shard marked available");
        true
    }

    async fn demote(&self, shard: &PoolShard<C>) -> bool {
        let _guard = self.transitions.lock().await;
        if !shard.is_available() {
            return false;
        }

        let total = self.shards.len();
        let available = self.num_available.load(Ordering::Acquire);
        if !self.config.quorum.permits_demotion(available, total) {
            warn!(
                address = %shard.address(),
                available,
                total,
                "Refusing to mark shard unavailable: quorum would be lost"
            );
            return false;
        }

        if !shard.set_available(false) {
            return false;
        }
        let available = self.num_available.fetch_sub(1, Ordering::AcqRel) - 1;
        info!(address = %shard.address(), available, "Shard marked unavailable");
        true
    }
}

/// Health checker control handle
struct HealthTask {
    stop: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// A sharded, health-checked connection pool
///
/// Connections are handed out as `Arc<C>` and must be given back with
/// [`Pool::put`]. Dropping the pool without calling [`Pool::shutdown`] stops
/// the health checker but does not close idle connections through the factory.
pub struct Pool<C: Poolable> {
    inner: Arc<PoolInner<C>>,
    addresses: Vec<String>,
    closed: AtomicBool,
    health: Mutex<Option<HealthTask>>,
}

impl<C: Poolable> Pool<C> {
    /// Create a pool over `addresses` and start its health checker
    ///
    /// Must be called from within a tokio runtime.
    pub fn new<I, S>(
        addresses: I,
        factory: Arc<dyn ConnectionFactory<C>>,
        config: PoolConfig,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        config.validate()?;

        let addresses: Vec<String> = addresses.into_iter().map(Into::into).collect();
        if addresses.is_empty() {
            return Err(PoolError::InvalidConfig(
                "at least one address is required".to_string(),
            ));
        }

        let (suspect_tx, suspect_rx) = mpsc::channel(config.suspect_queue_capacity);
        let shards: Vec<_> = addresses
            .iter()
            .enumerate()
            .map(|(index, address)| {
                Arc::new(PoolShard::new(
                    index,
                    address.clone(),
                    Arc::clone(&factory),
                    &config,
                    suspect_tx.clone(),
                ))
            })
            .collect();

        let inner = Arc::new(PoolInner {
            num_available: AtomicUsize::new(shards.len()),
            max_retry: config.retry_budget(shards.len()),
            shards,
            factory,
            config,
            rotation: AtomicUsize::new(0),
            transitions: Mutex::new(()),
        });

        let (stop, stop_rx) = oneshot::channel();
        let task = tokio::spawn(health::run(Arc::clone(&inner), suspect_rx, stop_rx));

        info!(
            shards = addresses.len(),
            max_retry = inner.max_retry,
            "Connection pool started"
        );

        Ok(Self {
            inner,
            addresses,
            closed: AtomicBool::new(false),
            health: Mutex::new(Some(HealthTask { stop, task })),
        })
    }

    /// Borrow a connection from the next available shard
    pub async fn get(&self) -> Result<Arc<C>> {
        if self.is_closed() {
            return Err(PoolError::PoolClosed);
        }

        let inner = &self.inner;
        let shard_count = inner.shards.len();
        let start = inner.rotation.fetch_add(1, Ordering::Relaxed);

        for attempt in 0..inner.max_retry {
            let shard = &inner.shards[start.wrapping_add(attempt) % shard_count];

            if !shard.is_available() {
                inner.rotation.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            match shard.get().await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    inner.rotation.fetch_add(1, Ordering::Relaxed);
                    debug!(address = %shard.address(), attempt, error = %e, "Shard could not serve connection");
                }
            }
        }

        Err(PoolError::RetriesExhausted {
            attempts: inner.max_retry,
        })
    }

    /// Return a borrowed connection, flagging it broken if it must not be reused
    ///
    /// A connection that does not belong to any live shard is closed through the
    /// factory and reported as [`PoolError::InvalidReturn`].
    pub async fn put(&self, conn: Arc<C>, broken: bool) -> Result<()> {
        match conn.pooled().owner() {
            Some(shard) => shard.put(conn, broken).await,
            None => {
                if let Err(e) = self.inner.factory.close(&conn).await {
                    debug!(error = %e, "Error closing unattributed connection");
                }
                Err(PoolError::InvalidReturn)
            }
        }
    }

    /// Apply a health verdict to the shard at `index`
    ///
    /// Returns true when the shard's availability changed. Demotions that
    /// would break the quorum are refused.
    pub async fn mark_available(&self, index: usize, healthy: bool) -> bool {
        match self.inner.shards.get(index) {
            Some(shard) => self.inner.mark_available(shard, healthy).await,
            None => false,
        }
    }

    /// Actively check an address with the pool's factory and retry policy
    pub async fn check_address(&self, address: &str) -> bool {
        health::check_address::<C, _>(
            self.inner.factory.as_ref(),
            address,
            self.inner.config.health_check_attempts,
        )
        .await
    }

    /// Stop the health checker, wait for it, then close every shard
    ///
    /// Concurrent callers wait until the first one has finished; later calls
    /// are a no-op. Borrowed connections are closed when they are returned.
    pub async fn shutdown(&self) {
        // Held until every shard is closed
        let mut health = self.health.lock().await;
        if self.closed.swap(true, Ordering::AcqRel) {
            debug!("Connection pool already shut down");
            return;
        }

        if let Some(HealthTask { stop, task }) = health.take() {
            let _ = stop.send(());
            if let Err(e) = task.await {
                warn!(error = %e, "Health checker terminated abnormally");
            }
        }

        for shard in &self.inner.shards {
            if let Err(e) = shard.close().await {
                debug!(error = %e, "Shard close failed");
            }
        }

        info!(shards = self.inner.shards.len(), "Connection pool shut down");
    }

    /// Statistics for every shard, in address order (counters reset on read)
    pub fn stats(&self) -> Vec<ShardStats> {
        self.inner.shards.iter().map(|shard| shard.stats()).collect()
    }

    pub fn addresses(&self) -> &[String] {
        &self.addresses
    }

    pub fn shard(&self, index: usize) -> Option<&Arc<PoolShard<C>>> {
        self.inner.shards.get(index)
    }

    pub fn shards(&self) -> &[Arc<PoolShard<C>>] {
        &self.inner.shards
    }

    /// Number of shards currently marked available
    pub fn num_available(&self) -> usize {
        self.inner.num_available.load(Ordering::Acquire)
    }

    /// Shard attempts a single `get` may make
    pub fn max_retry_attempts(&self) -> usize {
        self.inner.max_retry
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl<C: Poolable> Drop for Pool<C> {
    fn drop(&mut self) {
        if let Ok(mut health) = self.health.try_lock() {
            if let Some(HealthTask { stop, .. }) = health.take() {
                let _ = stop.send(());
            }
        }
    }
}
