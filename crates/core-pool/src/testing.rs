//! Test doubles for pool consumers
//!
//! [`MockFactory`] hands out [`MockConnection`]s and lets a test take
//! individual addresses down or make them fail validation, while counting
//! every factory call. It is used by this crate's own tests and is public so
//! adapters can exercise their pool wiring without a live backend.

use crate::connection::{Poolable, PooledObject};
use crate::error::{PoolError, Result};
use crate::factory::ConnectionFactory;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory connection produced by [`MockFactory`]
pub struct MockConnection {
    id: u64,
    address: String,
    closed: AtomicBool,
    pooled: PooledObject<MockConnection>,
}

impl MockConnection {
    /// A connection no pool knows about
    pub fn detached(id: u64, address: impl Into<String>) -> Self {
        Self {
            id,
            address: address.into(),
            closed: AtomicBool::new(false),
            pooled: PooledObject::new(),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether the factory has closed this connection
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl Poolable for MockConnection {
    fn pooled(&self) -> &PooledObject<Self> {
        &self.pooled
    }
}

impl fmt::Debug for MockConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockConnection")
            .field("id", &self.id)
            .field("address", &self.address)
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Scriptable factory with per-address failure injection
#[derive(Default)]
pub struct MockFactory {
    next_id: AtomicU64,
    creates: AtomicUsize,
    validates: AtomicUsize,
    closes: AtomicUsize,
    creates_by_address: Mutex<HashMap<String, usize>>,
    down: Mutex<HashSet<String>>,
    unhealthy: Mutex<HashSet<String>>,
    close_delay: Mutex<Option<Duration>>,
}

impl MockFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Make dials to `address` fail (or succeed again)
    pub fn set_down(&self, address: &str, down: bool) {
        let mut set = self.down.lock();
        if down {
            set.insert(address.to_string());
        } else {
            set.remove(address);
        }
    }

    /// Make validation of connections to `address` fail (or succeed again)
    pub fn set_unhealthy(&self, address: &str, unhealthy: bool) {
        let mut set = self.unhealthy.lock();
        if unhealthy {
            set.insert(address.to_string());
        } else {
            set.remove(address);
        }
    }

    /// Make every `close` take `delay` before it completes
    pub fn set_close_delay(&self, delay: Option<Duration>) {
        *self.close_delay.lock() = delay;
    }

    /// Dial attempts, failed ones included
    pub fn creates(&self) -> usize {
        self.creates.load(Ordering::Acquire)
    }

    /// Dial attempts against a single address
    pub fn creates_for(&self, address: &str) -> usize {
        self.creates_by_address
            .lock()
            .get(address)
            .copied()
            .unwrap_or(0)
    }

    pub fn validates(&self) -> usize {
        self.validates.load(Ordering::Acquire)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::Acquire)
    }
}

#[async_trait::async_trait]
impl ConnectionFactory<MockConnection> for MockFactory {
    async fn create(&self, address: &str) -> Result<MockConnection> {
        self.creates.fetch_add(1, Ordering::AcqRel);
        *self
            .creates_by_address
            .lock()
            .entry(address.to_string())
            .or_default() += 1;

        if self.down.lock().contains(address) {
            return Err(PoolError::Connect {
                address: address.to_string(),
                message: "connection refused".to_string(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::AcqRel) + 1;
        Ok(MockConnection::detached(id, address))
    }

    async fn validate(&self, conn: &MockConnection) -> Result<()> {
        self.validates.fetch_add(1, Ordering::AcqRel);

        if conn.is_closed() {
            return Err(PoolError::Unhealthy(format!(
                "connection {} is closed",
                conn.id
            )));
        }
        if self.unhealthy.lock().contains(conn.address()) {
            return Err(PoolError::Unhealthy(format!(
                "{} failed validation",
                conn.address()
            )));
        }
        Ok(())
    }

    async fn close(&self, conn: &MockConnection) -> Result<()> {
        let delay = *self.close_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.closes.fetch_add(1, Ordering::AcqRel);
        conn.closed.store(true, Ordering::Release);
        Ok(())
    }
}
