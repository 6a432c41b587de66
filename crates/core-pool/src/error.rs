//! Error types for pool operations

use std::error::Error as StdError;
use std::io;

/// Boxed error produced by a protocol adapter
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

pub type Result<T> = std::result::Result<T, PoolError>;

/// Errors surfaced by the pool, its shards and connection factories
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    /// The shard reached its active-connection ceiling and had no idle connection
    #[error("pool: connection pool exhausted")]
    PoolExhausted,

    /// Every shard tried within the retry budget failed or was unavailable
    #[error("pool: failed to get connection after {attempts} retries")]
    RetriesExhausted { attempts: usize },

    /// Operation attempted after the pool was shut down
    #[error("pool: connection pool closed")]
    PoolClosed,

    /// Operation attempted on a shard that was shut down
    #[error("pool: shard {address} is closed")]
    ShardClosed { address: String },

    /// The connection was already returned, or was never borrowed from this pool
    #[error("pool: object has already been returned to this pool or is invalid")]
    InvalidReturn,

    /// Pool construction parameters were rejected
    #[error("pool: invalid configuration: {0}")]
    InvalidConfig(String),

    /// A factory could not establish a connection
    #[error("failed to connect to {address}: {message}")]
    Connect { address: String, message: String },

    /// A liveness check failed
    #[error("connection is unhealthy: {0}")]
    Unhealthy(String),

    /// I/O error raised by a factory
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Protocol-specific error raised by a factory
    #[error("backend error: {0}")]
    Backend(#[source] BoxError),
}

impl PoolError {
    /// Wrap an adapter error
    pub fn backend<E>(err: E) -> Self
    where
        E: Into<BoxError>,
    {
        PoolError::Backend(err.into())
    }

    /// Whether retrying the same operation later may succeed
    pub fn is_transient(&self) -> bool {
        match self {
            PoolError::PoolExhausted
            | PoolError::Connect { .. }
            | PoolError::Unhealthy(_)
            | PoolError::Backend(_) => true,
            PoolError::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::ConnectionRefused
                    | io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::NotConnected
                    | io::ErrorKind::BrokenPipe
                    | io::ErrorKind::TimedOut
                    | io::ErrorKind::Interrupted
            ),
            PoolError::RetriesExhausted { .. }
            | PoolError::PoolClosed
            | PoolError::ShardClosed { .. }
            | PoolError::InvalidReturn
            | PoolError::InvalidConfig(_) => false,
        }
    }

    /// Errors that indicate a caller bug or a dead pool; never retried internally
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            PoolError::PoolClosed
                | PoolError::ShardClosed { .. }
                | PoolError::InvalidReturn
                | PoolError::InvalidConfig(_)
        )
    }
}
