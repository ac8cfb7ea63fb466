//! Sanctum Context Management - what the companion sends to the model
//!
//! This crate provides:
//! - Sliding-window selection over a session's chat history
//! - Summarization of turns that fall out of the window
//! - Per-session summary caching with pluggable backends
//! - Fail-open fallbacks when a cache or model is unavailable

pub mod cache;
pub mod context;
pub mod error;
pub mod manager;
#[cfg(feature = "metrics")]
pub mod metrics;
pub mod message;
pub mod summarizer;
pub mod window;

pub use cache::{cache_from_env, CacheStore, InMemoryCache, NoCache, RestCache};
pub use context::{cache_key, ConversationContext};
pub use error::{CacheError, ContextError, ContextResult};
pub use manager::{ContextManager, ContextSource, OptimizedContext};
pub use message::{Message, Role};
pub use summarizer::{ProviderSummarizer, Summarizer, FALLBACK_SUMMARY};
pub use window::ContextWindow;

#[cfg(feature = "redis")]
pub use cache::RedisCache;

/// Prelude for common imports
pub mod prelude {
    pub use crate::cache::CacheStore;
    pub use crate::context::ConversationContext;
    pub use crate::error::{ContextError, ContextResult};
    pub use crate::manager::{ContextManager, ContextSource, OptimizedContext};
    pub use crate::message::{Message, Role};
    pub use crate::summarizer::Summarizer;
    pub use crate::window::ContextWindow;
}
