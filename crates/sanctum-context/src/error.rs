//! Error types for context management

use std::time::Duration;

use sanctum_runtime::ProviderError;
use thiserror::Error;

/// Context management error type
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Summarization failed: {0}")]
    Provider(#[from] ProviderError),

    #[error("Summary was empty")]
    EmptySummary,

    #[error("Unsupported cache record version {found} (newest known is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("Collaborator panicked: {0}")]
    Panicked(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Failures reported by a cache backend
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache transport error: {0}")]
    Transport(String),

    #[error("cache backend returned an error: {0}")]
    Backend(String),

    #[error("unexpected cache reply: {0}")]
    UnexpectedReply(String),
}

/// Result type for context operations
pub type ContextResult<T> = Result<T, ContextError>;
