//! Redis over HTTPS, as exposed by Upstash-style REST gateways.
//!
//! Each command is a JSON array posted to the base URL; replies are
//! `{"result": ...}` or `{"error": "..."}`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::CacheStore;
use crate::error::{CacheError, ContextError, ContextResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RestCache {
    client: Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    result: Value,
    error: Option<String>,
}

impl RestCache {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> ContextResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ContextError::InvalidConfig(format!("cache HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    async fn command(&self, args: &[&str]) -> Result<Value, CacheError> {
        debug!(command = args.first().copied().unwrap_or_default(), "cache rest command");
        let response = self
            .client
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(args)
            .send()
            .await
            .map_err(|e| CacheError::Transport(e.to_string()))?;

        let status = response.status();
        let reply: Reply = response
            .json()
            .await
            .map_err(|e| CacheError::UnexpectedReply(format!("status {status}: {e}")))?;

        if let Some(error) = reply.error {
            return Err(CacheError::Backend(error));
        }
        if !status.is_success() {
            return Err(CacheError::Backend(format!("status {status}")));
        }
        Ok(reply.result)
    }
}

#[async_trait]
impl CacheStore for RestCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        match self.command(&["GET", key]).await? {
            Value::Null => Ok(None),
            Value::String(value) => Ok(Some(value)),
            other => Err(CacheError::UnexpectedReply(other.to_string())),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        let seconds = ttl.as_secs().max(1).to_string();
        self.command(&["SET", key, value, "EX", &seconds]).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        self.command(&["DEL", key]).await?;
        Ok(())
    }
}
