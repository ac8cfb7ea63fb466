//! Context window policy

use std::env;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, ContextResult};

pub const DEFAULT_WINDOW_SIZE: usize = 20;
pub const DEFAULT_SUMMARY_THRESHOLD: usize = 20;
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);
pub const DEFAULT_COLLABORATOR_TIMEOUT: Duration = Duration::from_secs(10);

/// Context window configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextWindow {
    /// Trailing messages always sent verbatim
    pub window_size: usize,
    /// Summarize once a history is longer than this
    pub summary_threshold: usize,
    /// Lifetime of a cached summary
    pub ttl: Duration,
    /// Upper bound on each cache or summarizer call
    pub collaborator_timeout: Duration,
}

impl Default for ContextWindow {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            summary_threshold: DEFAULT_SUMMARY_THRESHOLD,
            ttl: DEFAULT_TTL,
            collaborator_timeout: DEFAULT_COLLABORATOR_TIMEOUT,
        }
    }
}

impl ContextWindow {
    pub fn new(window_size: usize, summary_threshold: usize) -> ContextResult<Self> {
        Self {
            window_size,
            summary_threshold,
            ..Default::default()
        }
        .validated()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_collaborator_timeout(mut self, timeout: Duration) -> Self {
        self.collaborator_timeout = timeout;
        self
    }

    /// Read overrides from `SANCTUM_*` variables, defaulting the rest
    pub fn from_env() -> ContextResult<Self> {
        let defaults = Self::default();
        Self {
            window_size: env_or("SANCTUM_CONTEXT_WINDOW", defaults.window_size)?,
            summary_threshold: env_or("SANCTUM_SUMMARY_THRESHOLD", defaults.summary_threshold)?,
            ttl: Duration::from_secs(env_or("SANCTUM_CONTEXT_TTL_SECS", defaults.ttl.as_secs())?),
            collaborator_timeout: Duration::from_millis(env_or(
                "SANCTUM_COLLABORATOR_TIMEOUT_MS",
                defaults.collaborator_timeout.as_millis() as u64,
            )?),
        }
        .validated()
    }

    fn validated(self) -> ContextResult<Self> {
        if self.window_size == 0 {
            return Err(ContextError::InvalidConfig(
                "window size must be at least 1".to_string(),
            ));
        }
        // Below the window size the summarized prefix would be empty.
        if self.summary_threshold < self.window_size {
            return Err(ContextError::InvalidConfig(format!(
                "summary threshold {} is smaller than window size {}",
                self.summary_threshold, self.window_size
            )));
        }
        Ok(self)
    }

    /// The last `window_size` messages
    pub fn trailing<'a, T>(&self, messages: &'a [T]) -> &'a [T] {
        let start = messages.len().saturating_sub(self.window_size);
        &messages[start..]
    }

    /// Split into (older prefix, trailing window)
    pub fn split<'a, T>(&self, messages: &'a [T]) -> (&'a [T], &'a [T]) {
        messages.split_at(messages.len().saturating_sub(self.window_size))
    }

    pub fn needs_summary(&self, message_count: usize) -> bool {
        message_count > self.summary_threshold
    }
}

fn env_or<T>(var: &str, default: T) -> ContextResult<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| ContextError::InvalidConfig(format!("{var}={raw:?}: {e}"))),
        Err(_) => Ok(default),
    }
}
