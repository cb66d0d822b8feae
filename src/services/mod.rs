pub mod metrics;
pub mod polling;
pub mod redis_cache;
pub mod search;
