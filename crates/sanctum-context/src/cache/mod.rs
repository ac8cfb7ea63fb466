//! Cache store abstraction and backends
//!
//! Summaries are cached per session under `context:<session id>`. The store
//! is the only durable owner of that state; the manager keeps nothing
//! between calls.

mod memory;
#[cfg(feature = "redis")]
mod redis_store;
mod rest;

use std::env;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::error::{CacheError, ContextResult};

pub use memory::InMemoryCache;
#[cfg(feature = "redis")]
pub use redis_store::RedisCache;
pub use rest::RestCache;

/// Minimal key-value capability the context manager needs
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// `false` means no backend is wired up and callers should skip caching.
    fn is_configured(&self) -> bool {
        true
    }
}

/// Stand-in used when no cache backend is configured
#[derive(Debug, Default, Clone, Copy)]
pub struct NoCache;

#[async_trait]
impl CacheStore for NoCache {
    async fn get(&self, _key: &str) -> Result<Option<String>, CacheError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &str, _ttl: Duration) -> Result<(), CacheError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheError> {
        Ok(())
    }

    fn is_configured(&self) -> bool {
        false
    }
}

/// Pick a backend from the environment.
///
/// `UPSTASH_REDIS_REST_URL` + `UPSTASH_REDIS_REST_TOKEN` select the REST
/// backend, then `REDIS_URL` (with the `redis` feature), else [`NoCache`].
pub async fn cache_from_env() -> ContextResult<Arc<dyn CacheStore>> {
    if let (Ok(url), Ok(token)) = (
        env::var("UPSTASH_REDIS_REST_URL"),
        env::var("UPSTASH_REDIS_REST_TOKEN"),
    ) {
        info!(backend = "rest", "context cache configured");
        return Ok(Arc::new(RestCache::new(url, token)?));
    }

    #[cfg(feature = "redis")]
    {
        if let Ok(url) = env::var("REDIS_URL") {
            info!(backend = "redis", "context cache configured");
            return Ok(Arc::new(RedisCache::connect(&url).await?));
        }
    }

    info!("no context cache configured, summaries will not be cached");
    Ok(Arc::new(NoCache))
}
