//! Shardpool Core: protocol-agnostic sharded connection pool
//!
//! # Overview
//!
//! A [`Pool`] spreads connections over a fixed set of backend addresses, one
//! [`PoolShard`] per address. It is built for key-value caches and similar
//! services where any replica can serve any request:
//!
//! - **Round-robin borrowing**: `get` rotates across shards and transparently
//!   retries on the next one when a shard is unavailable or fails to dial
//! - **Bounded reuse**: each shard keeps a non-blocking FIFO of idle
//!   connections and a ceiling on borrowed ones
//! - **Failure detection**: consecutive failures flag a shard as suspect and
//!   trigger an immediate active check
//! - **Recovery**: a periodic sweep checks unavailable shards and promotes them
//!   back once they answer
//! - **Quorum guard**: demotions that would leave too few shards available
//!   are refused
//!
//! The crate knows nothing about wire protocols. Adapters plug in through
//! [`ConnectionFactory`] and embed a [`PooledObject`] in their connection type.
//!
//! # Architecture
//!
//! ```text
//!            get / put
//!                │
//!                ▼
//! ┌─────────────────────────────────────────┐
//! │       Pool                              │  ← Rotation + retry budget
//! │  (quorum-guarded availability)          │
//! └──────┬──────────────┬──────────────┬────┘
//!        ▼              ▼              ▼
//!   ┌─────────┐    ┌─────────┐    ┌─────────┐
//!   │ Shard 0 │    │ Shard 1 │    │ Shard 2 │  ← Idle FIFO, active ceiling,
//!   └────┬────┘    └────┬────┘    └────┬────┘    failure counter
//!        │   suspect    │              │
//!        └──────────────┼──────────────┘
//!                       ▼
//! ┌─────────────────────────────────────────┐
//! │       Health checker                    │  ← Suspect queue + periodic sweep
//! └─────────────────────────────────────────┘
//!                       │
//!                       ▼
//!              ConnectionFactory
//!           (create / validate / close)
//! ```
//!
//! # Usage Example
//!
//! ```no_run
//! use shardpool_core::{ConnectionFactory, Pool, PoolConfig, PoolError, Poolable, PooledObject};
//! use std::sync::Arc;
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
//! struct EchoFactory;
//!
//! #[async_trait::async_trait]
//! impl ConnectionFactory<EchoConnection> for EchoFactory {
//!     async fn create(&self, _address: &str) -> Result<EchoConnection, PoolError> {
//!         // Dial and authenticate...
//!         Ok(EchoConnection { pooled: PooledObject::new() })
//!     }
//!
//!     async fn validate(&self, _conn: &EchoConnection) -> Result<(), PoolError> {
//!         // Send a ping...
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> Result<(), PoolError> {
//! let pool = Pool::<EchoConnection>::new(
//!     vec!["10.0.0.1:6379", "10.0.0.2:6379", "10.0.0.3:6379"],
//!     Arc::new(EchoFactory),
//!     PoolConfig::default(),
//! )?;
//!
//! let conn = pool.get().await?;
//! // Use connection...
//! pool.put(conn, false).await?;
//!
//! for shard in pool.stats() {
//!     println!("{}: {} gets, {} dials", shard.shard, shard.num_get, shard.num_dial);
//! }
//!
//! pool.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod factory;
pub mod health;
pub mod pool;
pub mod shard;
pub mod stats;
pub mod testing;

// Re-export main types for convenience
pub use config::{PoolConfig, Quorum};
pub use connection::{Poolable, PooledObject};
pub use error::{BoxError, PoolError, Result};
pub use factory::ConnectionFactory;
pub use health::check_address;
pub use pool::Pool;
pub use shard::PoolShard;
pub use stats::ShardStats;

/// Prelude module for convenient imports
///
/// # Example
/// ```
/// use shardpool_core::prelude::*;
/// ```
pub mod prelude {
    pub use super::config::{PoolConfig, Quorum};
    pub use super::connection::{Poolable, PooledObject};
    pub use super::error::PoolError;
    pub use super::factory::ConnectionFactory;
    pub use super::pool::Pool;
    pub use super::stats::ShardStats;
}
