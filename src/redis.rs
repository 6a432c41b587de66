/*!
 * Redis protocol adapter
 *
 * Plugs the `redis` client into the sharded pool: [`RedisConnFactory`] dials
 * and authenticates multiplexed tokio connections, [`RedisConnection`] carries
 * the pool bookkeeping, and [`RedisPool`] ties both to a [`Pool`].
 */

use crate::config::RedisPoolSettings;
use crate::error::{Result, ShardpoolError};
use parking_lot::Mutex;
use redis::aio::MultiplexedConnection;
use redis::{Cmd, FromRedisValue, RedisError};
use shardpool_core::{
    ConnectionFactory, Pool, PoolConfig, PoolError, Poolable, PooledObject, ShardStats,
};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A pooled Redis connection
pub struct RedisConnection {
    address: String,
    conn: Mutex<Option<MultiplexedConnection>>,
    response_timeout: Duration,
    broken: AtomicBool,
    pooled: PooledObject<RedisConnection>,
}

impl RedisConnection {
    fn new(address: &str, conn: MultiplexedConnection, response_timeout: Duration) -> Self {
        Self {
            address: address.to_string(),
            conn: Mutex::new(Some(conn)),
            response_timeout,
            broken: AtomicBool::new(false),
            pooled: PooledObject::new(),
        }
    }

    /// Backend address this connection is bound to
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Whether an I/O failure or timeout was observed on this connection
    ///
    /// Broken connections must not be reused; [`RedisPool::release`] returns
    /// them to the pool flagged accordingly.
    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::Acquire)
    }

    /// Run a command, bounded by the read and write timeouts
    pub async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T> {
        let mut conn = self.conn.lock().clone().ok_or_else(|| {
            ShardpoolError::Pool(PoolError::Unhealthy(format!(
                "connection to {} is closed",
                self.address
            )))
        })?;

        match tokio::time::timeout(self.response_timeout, cmd.query_async(&mut conn)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                if is_fatal(&e) {
                    self.broken.store(true, Ordering::Release);
                }
                Err(e.into())
            }
            Err(_) => {
                self.broken.store(true, Ordering::Release);
                Err(ShardpoolError::Timeout(self.response_timeout))
            }
        }
    }

    /// Drop the underlying handle; later queries fail
    fn shutdown(&self) {
        self.conn.lock().take();
    }
}

impl Poolable for RedisConnection {
    fn pooled(&self) -> &PooledObject<Self> {
        &self.pooled
    }
}

impl fmt::Debug for RedisConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConnection")
            .field("address", &self.address)
            .field("broken", &self.is_broken())
            .field("pooled", &self.pooled)
            .finish()
    }
}

/// Errors after which the connection cannot be trusted
fn is_fatal(e: &RedisError) -> bool {
    e.is_io_error() || e.is_timeout() || e.is_connection_dropped()
}

/// Factory dialing authenticated Redis connections
#[derive(Clone)]
pub struct RedisConnFactory {
    pub password: String,
    pub db: i64,
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for RedisConnFactory {
    fn default() -> Self {
        Self {
            password: String::new(),
            db: 0,
            connect_timeout: Duration::from_millis(50),
            read_timeout: Duration::from_millis(100),
            write_timeout: Duration::from_millis(100),
        }
    }
}

impl fmt::Debug for RedisConnFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisConnFactory")
            .field("password", &if self.password.is_empty() { "" } else { "***" })
            .field("db", &self.db)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .field("write_timeout", &self.write_timeout)
            .finish()
    }
}

impl RedisConnFactory {
    pub fn from_settings(settings: &RedisPoolSettings) -> Self {
        Self {
            password: settings.password.clone(),
            db: settings.db,
            connect_timeout: settings.connect_timeout(),
            read_timeout: settings.read_timeout(),
            write_timeout: settings.write_timeout(),
        }
    }

    /// Budget for one request/response exchange
    pub fn response_timeout(&self) -> Duration {
        self.read_timeout + self.write_timeout
    }

    async fn dial(&self, address: &str) -> Result<RedisConnection> {
        let client = redis::Client::open(format!("redis://{}/", address))?;
        let conn = tokio::time::timeout(
            self.connect_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| ShardpoolError::Timeout(self.connect_timeout))??;

        let conn = RedisConnection::new(address, conn, self.response_timeout());

        if !self.password.is_empty() {
            let _: () = conn.query(redis::cmd("AUTH").arg(&self.password)).await?;
        }
        if self.db != 0 {
            let _: () = conn.query(redis::cmd("SELECT").arg(self.db)).await?;
        }

        Ok(conn)
    }
}

#[async_trait::async_trait]
impl ConnectionFactory<RedisConnection> for RedisConnFactory {
    async fn create(&self, address: &str) -> shardpool_core::Result<RedisConnection> {
        self.dial(address).await.map_err(|e| PoolError::Connect {
            address: address.to_string(),
            message: e.to_string(),
        })
    }

    async fn validate(&self, conn: &RedisConnection) -> shardpool_core::Result<()> {
        let reply: String = conn
            .query(&redis::cmd("PING"))
            .await
            .map_err(|e| PoolError::Unhealthy(format!("{}: {}", conn.address(), e)))?;

        if reply != "PONG" {
            return Err(PoolError::Unhealthy(format!(
                "{}: unexpected PING reply {:?}",
                conn.address(),
                reply
            )));
        }
        Ok(())
    }

    async fn close(&self, conn: &RedisConnection) -> shardpool_core::Result<()> {
        conn.shutdown();
        Ok(())
    }
}

/// A named sharded pool of Redis connections
pub struct RedisPool {
    name: String,
    pool: Pool<RedisConnection>,
}

impl RedisPool {
    /// Build a pool without probing the addresses first
    pub fn new(
        name: impl Into<String>,
        addresses: Vec<String>,
        factory: RedisConnFactory,
        config: PoolConfig,
    ) -> Result<Self> {
        let pool = Pool::<RedisConnection>::new(addresses, Arc::new(factory), config)?;
        Ok(Self {
            name: name.into(),
            pool,
        })
    }

    /// Build a pool from settings, verifying every address first
    ///
    /// Any address that cannot be dialed or fails its ping aborts construction.
    pub async fn from_settings(settings: &RedisPoolSettings) -> Result<Self> {
        settings.validate()?;

        let factory = RedisConnFactory::from_settings(settings);
        let addresses = settings.addresses();

        for address in &addresses {
            verify_address(&factory, address).await?;
        }

        info!(
            pool = settings.display_name(),
            addresses = addresses.len(),
            "Redis addresses verified"
        );
        Self::new(
            settings.display_name(),
            addresses,
            factory,
            settings.pool_config(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Borrow a connection
    pub async fn get(&self) -> Result<Arc<RedisConnection>> {
        Ok(self.pool.get().await?)
    }

    /// Return a connection, discarding it if it saw a fatal error
    pub async fn release(&self, conn: Arc<RedisConnection>) -> Result<()> {
        let broken = conn.is_broken();
        if broken {
            debug!(pool = %self.name, address = %conn.address(), "Releasing broken connection");
        }
        Ok(self.pool.put(conn, broken).await?)
    }

    /// Borrow a connection, run one command and release it
    pub async fn query<T: FromRedisValue>(&self, cmd: &Cmd) -> Result<T> {
        let conn = self.get().await?;
        let result = conn.query(cmd).await;
        if let Err(e) = self.release(conn).await {
            warn!(pool = %self.name, error = %e, "Failed to release connection");
        }
        result
    }

    /// Per-shard statistics (counters reset on read)
    pub fn stats(&self) -> Vec<ShardStats> {
        self.pool.stats()
    }

    /// Underlying sharded pool
    pub fn pool(&self) -> &Pool<RedisConnection> {
        &self.pool
    }

    /// Shut the pool down; idempotent
    pub async fn close(&self) {
        self.pool.shutdown().await;
    }
}

/// Dial, ping and close one address
pub async fn verify_address(factory: &RedisConnFactory, address: &str) -> Result<()> {
    let conn = factory.create(address).await?;
    let outcome = factory.validate(&conn).await;
    factory.close(&conn).await?;
    outcome?;
    debug!(address, "Redis address verified");
    Ok(())
}
