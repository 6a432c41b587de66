//! Pool configuration

use crate::error::{PoolError, Result};
use std::time::Duration;

/// Availability floor that demotions may not cross
///
/// A demotion is permitted only while `available / total` stays strictly above
/// `numerator / denominator`. The comparison is done in integers so that
/// fractions such as 2/3 are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quorum {
    pub numerator: usize,
    pub denominator: usize,
}

impl Quorum {
    /// At most one-third of the shards may be demoted
    pub const TWO_THIRDS: Quorum = Quorum {
        numerator: 2,
        denominator: 3,
    };

    /// Demotion is always permitted while at least one shard is available
    pub const NONE: Quorum = Quorum {
        numerator: 0,
        denominator: 1,
    };

    pub const fn new(numerator: usize, denominator: usize) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Whether a shard may be demoted given the current availability
    pub fn permits_demotion(&self, available: usize, total: usize) -> bool {
        available * self.denominator > total * self.numerator
    }
}

impl Default for Quorum {
    fn default() -> Self {
        Quorum::TWO_THIRDS
    }
}

/// Configuration for pool and shard behavior
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Idle queue capacity per shard; returns beyond it are evicted
    pub max_idle: usize,

    /// Maximum number of borrowed connections per shard (0 = unlimited)
    pub max_active: usize,

    /// Idle connections older than this are closed instead of lent (None = never)
    pub idle_timeout: Option<Duration>,

    /// Consecutive failures before a shard becomes suspect
    pub max_fails: u32,

    /// Validate idle connections through the factory before lending them
    pub test_on_borrow: bool,

    /// Availability floor protecting against cascading demotions
    pub quorum: Quorum,

    /// Lower bound of the `get` retry budget
    pub min_retry_attempts: usize,

    /// Period of the background health sweep
    pub health_check_interval: Duration,

    /// Dial + validate attempts per active health check
    pub health_check_attempts: usize,

    /// Capacity of the suspect-shard queue; signals beyond it are dropped
    pub suspect_queue_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_idle: 50,
            max_active: 100,
            idle_timeout: None,
            max_fails: 5,
            test_on_borrow: false,
            quorum: Quorum::TWO_THIRDS,
            min_retry_attempts: 5,
            health_check_interval: Duration::from_secs(3),
            health_check_attempts: 2,
            suspect_queue_capacity: 100,
        }
    }
}

impl PoolConfig {
    /// Configuration with the given per-shard limits and defaults elsewhere
    pub fn with_limits(max_idle: usize, max_active: usize) -> Self {
        Self {
            max_idle,
            max_active,
            ..Default::default()
        }
    }

    /// Number of shard attempts a single `get` may make
    pub fn retry_budget(&self, shards: usize) -> usize {
        shards.max(self.min_retry_attempts)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_fails == 0 {
            return Err(PoolError::InvalidConfig(
                "max_fails must be at least 1".to_string(),
            ));
        }

        if self.quorum.denominator == 0 {
            return Err(PoolError::InvalidConfig(
                "quorum denominator must be greater than 0".to_string(),
            ));
        }

        if self.quorum.numerator > self.quorum.denominator {
            return Err(PoolError::InvalidConfig(
                "quorum must not exceed 1".to_string(),
            ));
        }

        if self.health_check_interval.is_zero() {
            return Err(PoolError::InvalidConfig(
                "health_check_interval must be greater than 0".to_string(),
            ));
        }

        if self.health_check_attempts == 0 {
            return Err(PoolError::InvalidConfig(
                "health_check_attempts must be at least 1".to_string(),
            ));
        }

        if self.suspect_queue_capacity == 0 {
            return Err(PoolError::InvalidConfig(
                "suspect_queue_capacity must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PoolConfig::default();

        assert_eq!(config.max_idle, 50);
        assert_eq!(config.max_active, 100);
        assert_eq!(config.idle_timeout, None);
        assert_eq!(config.max_fails, 5);
        assert_eq!(config.quorum, Quorum::TWO_THIRDS);
        assert_eq!(config.health_check_interval, Duration::from_secs(3));
        assert_eq!(config.health_check_attempts, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_budget_floor() {
        let config = PoolConfig::default();

        assert_eq!(config.retry_budget(1), 5);
        assert_eq!(config.retry_budget(2), 5);
        assert_eq!(config.retry_budget(5), 5);
        assert_eq!(config.retry_budget(12), 12);
    }

    #[test]
    fn test_two_thirds_quorum() {
        let quorum = Quorum::TWO_THIRDS;

        // 3 of 3 available: one demotion allowed
        assert!(quorum.permits_demotion(3, 3));
        // 2 of 3 available: exactly at two-thirds, refused
        assert!(!quorum.permits_demotion(2, 3));

        assert!(quorum.permits_demotion(9, 12));
        assert!(!quorum.permits_demotion(8, 12));
    }

    #[test]
    fn test_no_quorum() {
        assert!(Quorum::NONE.permits_demotion(1, 5));
        assert!(!Quorum::NONE.permits_demotion(0, 5));
    }

    #[test]
    fn test_validation_failures() {
        let mut config = PoolConfig::default();

        config.max_fails = 0;
        assert!(config.validate().is_err());
        config.max_fails = 5;

        config.quorum = Quorum::new(1, 0);
        assert!(config.validate().is_err());
        config.quorum = Quorum::new(4, 3);
        assert!(config.validate().is_err());
        config.quorum = Quorum::TWO_THIRDS;

        config.health_check_interval = Duration::ZERO;
        assert!(config.validate().is_err());
        config.health_check_interval = Duration::from_secs(3);

        config.health_check_attempts = 0;
        assert!(config.validate().is_err());
        config.health_check_attempts = 2;

        config.suspect_queue_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(PoolError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_with_limits() {
        let config = PoolConfig::with_limits(1, 1);

        assert_eq!(config.max_idle, 1);
        assert_eq!(config.max_active, 1);
        assert_eq!(config.max_fails, 5); // Default
    }
}
