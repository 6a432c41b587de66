/*!
 * Named Redis pool registry
 *
 * Builds every pool described by the `[redis]` section once at startup and
 * hands out shared references to them. Callers own the registry explicitly;
 * there is no process-wide instance.
 */

use crate::config::RedisSettings;
use crate::error::{Result, ShardpoolError};
use crate::redis::RedisPool;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Name under which the `[redis.default]` pool is registered
pub const DEFAULT_POOL: &str = "default";

#[derive(Default)]
pub struct PoolRegistry {
    default: Option<Arc<RedisPool>>,
    named: BTreeMap<String, Arc<RedisPool>>,
}

impl PoolRegistry {
    /// Build the default pool and every named pool
    ///
    /// A disabled section yields an empty registry. If any pool fails to build,
    /// the pools built so far are shut down and the error is returned.
    pub async fn init(settings: &RedisSettings) -> Result<Self> {
        let mut registry = PoolRegistry::default();
        if !settings.enabled {
            info!("Redis disabled, registry left empty");
            return Ok(registry);
        }
        settings.validate()?;

        if let Err(e) = registry.build(settings).await {
            registry.shutdown().await;
            return Err(e);
        }

        info!(pools = registry.len(), "Redis pool registry initialized");
        Ok(registry)
    }

    async fn build(&mut self, settings: &RedisSettings) -> Result<()> {
        if let Some(default) = &settings.default {
            self.default = Some(Arc::new(RedisPool::from_settings(default).await?));
        }

        for pool_settings in &settings.connection {
            let pool = RedisPool::from_settings(pool_settings).await?;
            self.named.insert(pool_settings.name.clone(), Arc::new(pool));
        }

        Ok(())
    }

    /// The `[redis.default]` pool
    pub fn default_pool(&self) -> Result<Arc<RedisPool>> {
        self.default
            .clone()
            .ok_or_else(|| ShardpoolError::UnknownPool(DEFAULT_POOL.to_string()))
    }

    /// A named pool; `"default"` resolves to the default pool unless a named
    /// pool shadows it
    pub fn get(&self, name: &str) -> Result<Arc<RedisPool>> {
        if let Some(pool) = self.named.get(name) {
            return Ok(Arc::clone(pool));
        }
        if name == DEFAULT_POOL {
            return self.default_pool();
        }
        Err(ShardpoolError::UnknownPool(name.to_string()))
    }

    /// Every registered pool, default first, then named pools by name
    pub fn pools(&self) -> impl Iterator<Item = &Arc<RedisPool>> {
        self.default.iter().chain(self.named.values())
    }

    pub fn len(&self) -> usize {
        self.pools().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Shut every pool down
    pub async fn shutdown(&self) {
        for pool in self.pools() {
            pool.close().await;
        }
        if !self.is_empty() {
            info!(pools = self.len(), "Redis pools shut down");
        }
    }
}

impl Drop for PoolRegistry {
    fn drop(&mut self) {
        let open = self.pools().filter(|p| !p.pool().is_closed()).count();
        if open > 0 {
            warn!(open, "Pool registry dropped without shutdown");
        }
    }
}
