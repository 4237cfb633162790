//! Cache layer
//!
//! Process-local caching for derived read models. The tag listing is the
//! main tenant: it is rebuilt from aggregates on a miss and dropped
//! whenever a post is created.

pub mod memory;

use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheConfig;

pub use memory::MemoryCache;

/// Create the shared cache described by `config`
pub fn create_cache(config: &CacheConfig) -> Arc<MemoryCache> {
    tracing::debug!(
        ttl_seconds = config.ttl_seconds,
        max_capacity = config.max_capacity,
        "Creating in-memory cache"
    );
    Arc::new(MemoryCache::new(
        config.max_capacity,
        Duration::from_secs(config.ttl_seconds),
    ))
}
