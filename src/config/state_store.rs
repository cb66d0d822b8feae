use std::sync::Arc;

use crate::services::polling::{InMemoryStateStore, StateStore};
use crate::services::redis_cache::RedisService;

/// Connect the polling state store.
///
/// An unreachable Redis is not fatal: the controller treats failed loads as
/// "nothing persisted" and failed saves are retried on the next transition.
/// Only an unusable URL falls back to a process-local store.
pub async fn init_state_store(redis_url: &str) -> Arc<dyn StateStore> {
    let redis = match RedisService::new(redis_url) {
        Ok(redis) => redis,
        Err(e) => {
            tracing::warn!("Invalid REDIS_URL, polling state will not persist: {}", e);
            return Arc::new(InMemoryStateStore::new());
        }
    };

    match redis.ping().await {
        Ok(()) => {
            tracing::info!("Connected to Redis");
            Arc::new(redis)
        }
        Err(e) => {
            tracing::warn!("Redis unavailable at startup, will retry on next save: {}", e);
            Arc::new(redis)
        }
    }
}
