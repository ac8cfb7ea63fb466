use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use super::CacheStore;
use crate::error::{CacheError, ContextError, ContextResult};

/// Native Redis backend over a reconnecting multiplexed connection
#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
}

impl RedisCache {
    /// Connect using `redis://[user:pass@]host[:port][/db]` (or `rediss://`)
    pub async fn connect(url: &str) -> ContextResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| ContextError::InvalidConfig(format!("redis url: {e}")))?;
        let connection = ConnectionManager::new(client)
            .await
            .map_err(|e| CacheError::Transport(e.to_string()))?;
        Ok(Self { connection })
    }
}

impl From<redis::RedisError> for CacheError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error() || err.is_timeout() || err.is_connection_dropped() {
            CacheError::Transport(err.to_string())
        } else {
            CacheError::Backend(err.to_string())
        }
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.connection.clone();
        let value: Option<String> = conn.get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: () = conn.set_ex(key, value, ttl.as_secs().max(1)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.connection.clone();
        let _: () = conn.del(key).await?;
        Ok(())
    }
}
