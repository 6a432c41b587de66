//! Connection factory contract
//!
//! The factory is the pool's only boundary with the outside world. Protocol
//! adapters implement it to dial, validate and release connections; the pool
//! itself never speaks a wire protocol.

use crate::connection::Poolable;
use crate::error::Result;

/// Factory trait for creating, validating and closing connections
#[async_trait::async_trait]
pub trait ConnectionFactory<C: Poolable>: Send + Sync {
    /// Dial and fully initialize a connection to `address`
    ///
    /// Post-connect handshakes such as authentication belong here.
    async fn create(&self, address: &str) -> Result<C>;

    /// Cheap liveness check; an error means the connection is unhealthy
    async fn validate(&self, conn: &C) -> Result<()>;

    /// Release the underlying resource unconditionally
    ///
    /// Connections that free their resources on drop can rely on the default.
    async fn close(&self, conn: &C) -> Result<()> {
        let _ = conn;
        Ok(())
    }
}
