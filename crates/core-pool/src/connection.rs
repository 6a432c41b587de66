//! Pooled connection contract
//!
//! Every connection type managed by a [`Pool`](crate::Pool) embeds a
//! [`PooledObject`] and exposes it through [`Poolable`]. The pool uses it to
//! track whether the connection is currently lent out, when it was last
//! returned, and which shard it belongs to. Protocol adapters never touch this
//! state directly; they only hold the value.
//!
//! # Example
//!
//! ```
//! use shardpool_core::{Poolable, PooledObject};
//!
//! struct EchoConnection {
//!     pooled: PooledObject<EchoConnection>,
//! }
//!
//! impl Poolable for EchoConnection {
//!     fn pooled(&self) -> &PooledObject<Self> {
//!         &self.pooled
//!     }
//! }
//!
//! let conn = EchoConnection { pooled: PooledObject::new() };
//! assert!(!conn.pooled().is_borrowed());
//! assert!(!conn.pooled().is_attached());
//! ```

use crate::shard::PoolShard;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::time::Instant;

/// A connection type that can be managed by the pool
pub trait Poolable: Send + Sync + Sized + 'static {
    /// Pool bookkeeping embedded in the connection
    fn pooled(&self) -> &PooledObject<Self>;
}

/// Borrow state guarded by the per-connection lock
#[derive(Debug)]
struct BorrowState {
    borrowed: bool,
    last_used: Instant,
}

/// Pool bookkeeping carried by each connection
pub struct PooledObject<C> {
    state: Mutex<BorrowState>,
    owner: Mutex<Weak<PoolShard<C>>>,
}

impl<C> PooledObject<C> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(BorrowState {
                borrowed: false,
                last_used: Instant::now(),
            }),
            owner: Mutex::new(Weak::new()),
        }
    }

    /// Whether the connection is currently lent out
    pub fn is_borrowed(&self) -> bool {
        self.state.lock().borrowed
    }

    /// When the connection was created or last returned
    pub fn last_used(&self) -> Instant {
        self.state.lock().last_used
    }

    /// Whether the connection is bound to a live shard
    pub fn is_attached(&self) -> bool {
        self.owner.lock().strong_count() > 0
    }

    pub(crate) fn owner(&self) -> Option<Arc<PoolShard<C>>> {
        self.owner.lock().upgrade()
    }

    pub(crate) fn bind(&self, shard: &Arc<PoolShard<C>>) {
        *self.owner.lock() = Arc::downgrade(shard);
    }

    pub(crate) fn mark_borrowed(&self) {
        self.state.lock().borrowed = true;
    }

    /// Clear the borrowed flag; false if the connection was not borrowed
    pub(crate) fn release(&self) -> bool {
        let mut state = self.state.lock();
        if !state.borrowed {
            return false;
        }
        state.borrowed = false;
        state.last_used = Instant::now();
        true
    }
}

impl<C> Default for PooledObject<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for PooledObject<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("PooledObject")
            .field("borrowed", &state.borrowed)
            .field("last_used", &state.last_used)
            .field("attached", &self.is_attached())
            .finish()
    }
}
