//! Background health checking
//!
//! One task per pool runs [`run`]. It wakes on two sources:
//!
//! - the sweep ticker, which checks every shard that is unavailable or suspect
//! - the suspect queue, fed by shards whose failure counter hits the threshold,
//!   which is checked immediately instead of waiting for the next tick
//!
//! Check results are fed into the pool's promotion/demotion policy. The task
//! exits only when the pool signals shutdown.

use crate::connection::Poolable;
use crate::factory::ConnectionFactory;
use crate::pool::PoolInner;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, trace};

/// Actively check `address`: dial, validate, close
///
/// Success on any of `attempts` tries counts as healthy. Factory errors are
/// logged and discarded.
pub async fn check_address<C, F>(factory: &F, address: &str, attempts: usize) -> bool
where
    C: Poolable,
    F: ConnectionFactory<C> + ?Sized,
{
    for attempt in 1..=attempts {
        let conn = match factory.create(address).await {
            Ok(conn) => conn,
            Err(e) => {
                debug!(address, attempt, error = %e, "Health check dial failed");
                continue;
            }
        };

        let outcome = factory.validate(&conn).await;
        if let Err(e) = factory.close(&conn).await {
            trace!(address, error = %e, "Error closing health check connection");
        }

        match outcome {
            Ok(()) => return true,
            Err(e) => debug!(address, attempt, error = %e, "Health check validation failed"),
        }
    }

    false
}

/// Health checker loop; returns when `stop` fires or its sender is dropped
pub(crate) async fn run<C: Poolable>(
    pool: Arc<PoolInner<C>>,
    mut suspects: mpsc::Receiver<usize>,
    mut stop: oneshot::Receiver<()>,
) {
    let period = pool.config().health_check_interval;
    let mut ticker = time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    debug!(interval = ?period, "Health checker started");

    loop {
        tokio::select! {
            biased;

            _ = &mut stop => break,
            Some(index) = suspects.recv() => pool.recheck(index).await,
            _ = ticker.tick() => pool.sweep().await,
        }
    }

    debug!("Health checker stopped");
}
