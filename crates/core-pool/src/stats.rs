//! Per-shard statistics
//!
//! Counters are cumulative between reads: taking a snapshot resets them, so a
//! reporter polling at a fixed interval observes per-interval rates.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by a shard
#[derive(Debug, Default)]
pub(crate) struct ShardCounters {
    gets: AtomicU64,
    puts: AtomicU64,
    broken: AtomicU64,
    dials: AtomicU64,
    dial_errors: AtomicU64,
    evictions: AtomicU64,
    closes: AtomicU64,
}

impl ShardCounters {
    pub(crate) fn record_get(&self) {
        self.gets.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_put(&self, broken: bool) {
        self.puts.fetch_add(1, Ordering::Relaxed);
        if broken {
            self.broken.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_dial(&self) {
        self.dials.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dial_error(&self) {
        self.dial_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_eviction(&self) {
        self.evictions.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_close(&self) {
        self.closes.fetch_add(1, Ordering::Relaxed);
    }

    /// Swap every counter to zero, filling the counter fields of `stats`
    pub(crate) fn drain_into(&self, stats: &mut ShardStats) {
        stats.num_get = self.gets.swap(0, Ordering::Relaxed);
        stats.num_put = self.puts.swap(0, Ordering::Relaxed);
        stats.num_broken = self.broken.swap(0, Ordering::Relaxed);
        stats.num_dial = self.dials.swap(0, Ordering::Relaxed);
        stats.num_dial_error = self.dial_errors.swap(0, Ordering::Relaxed);
        stats.num_evict = self.evictions.swap(0, Ordering::Relaxed);
        stats.num_close = self.closes.swap(0, Ordering::Relaxed);
    }
}

/// Snapshot of one shard, suitable for periodic external reporting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShardStats {
    /// Backend address served by the shard
    pub shard: String,
    /// Whether the shard currently receives traffic
    pub available: bool,
    /// Connections currently borrowed
    pub num_active: usize,
    /// Connections waiting in the idle queue
    pub num_idle: usize,
    /// Borrow attempts that reached the shard
    pub num_get: u64,
    /// Connections returned
    pub num_put: u64,
    /// Connections returned as broken
    pub num_broken: u64,
    /// Dial attempts
    pub num_dial: u64,
    /// Failed dial attempts
    pub num_dial_error: u64,
    /// Connections evicted from a full or stale idle queue
    pub num_evict: u64,
    /// Connections closed for any reason
    pub num_close: u64,
}

impl ShardStats {
    /// Fraction of gets in the window served without dialing
    pub fn reuse_ratio(&self) -> f64 {
        if self.num_get == 0 {
            0.0
        } else {
            self.num_get.saturating_sub(self.num_dial) as f64 / self.num_get as f64
        }
    }
}
