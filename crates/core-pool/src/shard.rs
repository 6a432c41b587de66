//! Pool shard: every connection to one backend address
//!
//! A shard keeps a bounded FIFO of idle connections, counts the connections
//! currently borrowed from it, and tracks consecutive failures. Reaching the
//! failure threshold pushes the shard onto the pool's suspect queue so the
//! health checker looks at it without waiting for the next sweep.
//!
//! `get` never waits: an empty idle queue at the active ceiling is reported as
//! [`PoolError::PoolExhausted`]. `put` never waits either: a full idle queue
//! evicts the returned connection.

use crate::config::PoolConfig;
use crate::connection::Poolable;
use crate::error::{PoolError, Result};
use crate::factory::ConnectionFactory;
use crate::stats::{ShardCounters, ShardStats};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// All connections to a single backend address
pub struct PoolShard<C> {
    index: usize,
    address: String,
    factory: Arc<dyn ConnectionFactory<C>>,

    idle_tx: Sender<Arc<C>>,
    idle_rx: Receiver<Arc<C>>,

    max_active: usize,
    max_fails: u32,
    test_on_borrow: bool,
    idle_timeout: Option<Duration>,

    /// Connections currently borrowed
    active: AtomicUsize,
    available: AtomicBool,
    fails: AtomicU32,
    closed: AtomicBool,

    suspects: mpsc::Sender<usize>,
    counters: ShardCounters,
}

impl<C: Poolable> PoolShard<C> {
    pub(crate) fn new(
        index: usize,
        address: String,
        factory: Arc<dyn ConnectionFactory<C>>,
        config: &PoolConfig,
        suspects: mpsc::Sender<usize>,
    ) -> Self {
        let (idle_tx, idle_rx) = crossbeam_channel::bounded(config.max_idle);
        Self {
            index,
            address,
            factory,
            idle_tx,
            idle_rx,
            max_active: config.max_active,
            max_fails: config.max_fails,
            test_on_borrow: config.test_on_borrow,
            idle_timeout: config.idle_timeout,
            active: AtomicUsize::new(0),
            available: AtomicBool::new(true),
            fails: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            suspects,
            counters: ShardCounters::default(),
        }
    }

    /// Position of the shard in the pool's address list
    pub fn index(&self) -> usize {
        self.index
    }

    /// Backend address served by this shard
    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Whether consecutive failures reached the threshold
    pub fn is_suspect(&self) -> bool {
        self.fails.load(Ordering::Acquire) >= self.max_fails
    }

    /// Current consecutive-failure count
    pub fn failure_count(&self) -> u32 {
        self.fails.load(Ordering::Acquire)
    }

    /// Connections currently borrowed from this shard
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    /// Connections waiting in the idle queue
    pub fn idle_count(&self) -> usize {
        self.idle_rx.len()
    }

    /// Borrow a connection, reusing an idle one or dialing a new one
    pub(crate) async fn get(self: &Arc<Self>) -> Result<Arc<C>> {
        if self.is_closed() {
            return Err(PoolError::ShardClosed {
                address: self.address.clone(),
            });
        }

        self.counters.record_get();

        while let Ok(conn) = self.idle_rx.try_recv() {
            if self.is_stale(&conn) {
                debug!(address = %self.address, "Evicting stale idle connection");
                self.counters.record_eviction();
                self.discard(&conn).await;
                continue;
            }

            if self.test_on_borrow {
                if let Err(e) = self.factory.validate(&conn).await {
                    warn!(address = %self.address, error = %e, "Idle connection failed validation");
                    self.discard(&conn).await;
                    continue;
                }
            }

            conn.pooled().mark_borrowed();
            self.active.fetch_add(1, Ordering::AcqRel);
            return Ok(conn);
        }

        let max_active = self.max_active;
        self.active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (max_active == 0 || n < max_active).then_some(n + 1)
            })
            .map_err(|_| PoolError::PoolExhausted)?;

        self.counters.record_dial();
        match self.factory.create(&self.address).await {
            Ok(conn) => {
                self.record_outcome(false);
                let conn = Arc::new(conn);
                conn.pooled().bind(self);
                conn.pooled().mark_borrowed();
                debug!(address = %self.address, active = self.active_count(), "Dialed new connection");
                Ok(conn)
            }
            Err(e) => {
                self.record_outcome(true);
                self.counters.record_dial_error();
                self.release_slot();
                warn!(address = %self.address, error = %e, "Failed to dial backend");
                Err(e)
            }
        }
    }

    /// Return a borrowed connection
    ///
    /// Broken connections, and any connection returned to a closed or
    /// unavailable shard, are closed through the factory. Healthy ones go back
    /// to the idle queue unless it is full.
    pub(crate) async fn put(&self, conn: Arc<C>, broken: bool) -> Result<()> {
        if !conn.pooled().release() {
            return Err(PoolError::InvalidReturn);
        }

        self.record_outcome(broken);
        self.counters.record_put(broken);

        if broken || !self.accepts_idle() {
            self.counters.record_close();
            self.release_slot();
            return self.factory.close(&conn).await;
        }

        match self.idle_tx.try_send(conn) {
            Ok(()) => {
                self.release_slot();
                // Lost a race with close() or a demotion; the drain already ran
                if !self.accepts_idle() {
                    self.drain().await;
                }
                Ok(())
            }
            Err(TrySendError::Full(conn)) | Err(TrySendError::Disconnected(conn)) => {
                debug!(address = %self.address, "Idle queue full, evicting connection");
                self.counters.record_eviction();
                self.counters.record_close();
                self.release_slot();
                self.factory.close(&conn).await
            }
        }
    }

    /// Flip availability; returns true when the state actually changed
    ///
    /// Only the flag moves here. After a demotion the caller drains the idle
    /// queue with [`PoolShard::drain`]; borrowed connections are closed when
    /// they come back.
    pub(crate) fn set_available(&self, available: bool) -> bool {
        self.available
            .compare_exchange(!available, available, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Shut the shard down, closing its idle connections
    pub(crate) async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Err(PoolError::ShardClosed {
                address: self.address.clone(),
            });
        }

        let drained = self.drain().await;
        debug!(address = %self.address, drained, "Shard closed");
        Ok(())
    }

    /// Snapshot statistics, resetting the counters
    pub fn stats(&self) -> ShardStats {
        let mut stats = ShardStats {
            shard: self.address.clone(),
            available: self.is_available(),
            num_active: self.active_count(),
            num_idle: self.idle_count(),
            ..Default::default()
        };
        self.counters.drain_into(&mut stats);
        stats
    }

    /// Feed a success or failure into the consecutive-failure counter
    fn record_outcome(&self, failed: bool) {
        if !failed {
            self.fails.store(0, Ordering::Release);
            return;
        }

        let fails = self.fails.fetch_add(1, Ordering::AcqRel) + 1;
        if fails == self.max_fails {
            // Best effort: a full queue is covered by the periodic sweep
            match self.suspects.try_send(self.index) {
                Ok(()) => debug!(address = %self.address, fails, "Shard marked suspect"),
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(address = %self.address, "Suspect queue full, signal dropped")
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {}
            }
        }
    }

    fn release_slot(&self) {
        let _ = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                Some(n.saturating_sub(1))
            });
    }

    fn is_stale(&self, conn: &C) -> bool {
        self.idle_timeout
            .is_some_and(|timeout| conn.pooled().last_used().elapsed() > timeout)
    }

    /// Close an idle connection that will not be lent out
    async fn discard(&self, conn: &C) {
        self.counters.record_close();
        if let Err(e) = self.factory.close(conn).await {
            debug!(address = %self.address, error = %e, "Error closing idle connection");
        }
    }

    fn accepts_idle(&self) -> bool {
        self.is_available() && !self.is_closed()
    }

    /// Close every idle connection; returns how many were closed
    pub(crate) async fn drain(&self) -> usize {
        let mut drained = 0;
        while let Ok(conn) = self.idle_rx.try_recv() {
            self.discard(&conn).await;
            drained += 1;
        }
        drained
    }
}
