//! Context manager implementation
//!
//! Decides which messages go to the model on each turn. The manager is
//! stateless between calls: the cache store owns the per-session summary,
//! and every failure degrades to the trailing window instead of surfacing.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use serde::Serialize;
use tracing::{debug, debug_span, error, info, warn, Instrument};

use crate::cache::CacheStore;
use crate::context::{cache_key, ConversationContext};
use crate::error::{ContextError, ContextResult};
use crate::message::Message;
use crate::summarizer::{Summarizer, FALLBACK_SUMMARY};
use crate::window::ContextWindow;

/// Leads the synthetic message that carries a summary
pub const SUMMARY_PREFIX: &str = "[Previous conversation summary]: ";

/// Which path produced an [`OptimizedContext`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextSource {
    /// No cache backend; trailing window only
    Uncached,
    /// Short history returned unchanged
    Passthrough,
    /// Cached summary plus the current trailing window
    FromCache,
    /// Summary computed on this call
    Summarized,
    /// A collaborator failed; trailing window only
    Fallback,
}

impl ContextSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ContextSource::Uncached => "uncached",
            ContextSource::Passthrough => "passthrough",
            ContextSource::FromCache => "from_cache",
            ContextSource::Summarized => "summarized",
            ContextSource::Fallback => "fallback",
        }
    }
}

/// Messages to send to the model, oldest first, tagged with their origin
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptimizedContext {
    pub messages: Vec<Message>,
    pub source: ContextSource,
}

impl OptimizedContext {
    /// The summary text, when the first message is a summary
    pub fn summary(&self) -> Option<&str> {
        match self.source {
            ContextSource::FromCache | ContextSource::Summarized => self
                .messages
                .first()
                .and_then(|m| m.content.strip_prefix(SUMMARY_PREFIX)),
            _ => None,
        }
    }
}

/// Build the synthetic summary message
pub fn summary_message(summary: &str) -> Message {
    Message::assistant(format!("{SUMMARY_PREFIX}{summary}"))
}

/// Context manager for assembling model input
pub struct ContextManager {
    cache: Arc<dyn CacheStore>,
    summarizer: Arc<dyn Summarizer>,
    window: ContextWindow,
}

impl ContextManager {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        summarizer: Arc<dyn Summarizer>,
        window: ContextWindow,
    ) -> Self {
        Self {
            cache,
            summarizer,
            window,
        }
    }

    pub fn window(&self) -> &ContextWindow {
        &self.window
    }

    /// Messages to send for this turn. Never fails.
    pub async fn get_optimized_context(
        &self,
        session_id: &str,
        recent_messages: &[Message],
    ) -> Vec<Message> {
        self.resolve_context(session_id, recent_messages)
            .await
            .messages
    }

    /// Like [`get_optimized_context`](Self::get_optimized_context), also
    /// reporting which path was taken.
    pub async fn resolve_context(
        &self,
        session_id: &str,
        recent_messages: &[Message],
    ) -> OptimizedContext {
        let resolved = if self.cache.is_configured() {
            let attempt = AssertUnwindSafe(self.try_resolve(session_id, recent_messages))
                .catch_unwind()
                .await;
            match attempt {
                Ok(Ok(resolved)) => resolved,
                Ok(Err(err)) => {
                    warn!(
                        session_id,
                        phase = "resolve",
                        error = %err,
                        "context resolution failed, sending trailing window"
                    );
                    note_collaborator_error("resolve");
                    self.trailing(recent_messages, ContextSource::Fallback)
                }
                Err(panic) => {
                    let err = ContextError::Panicked(panic_message(panic.as_ref()));
                    error!(
                        session_id,
                        phase = "resolve",
                        error = %err,
                        "context resolution panicked, sending trailing window"
                    );
                    note_collaborator_error("resolve");
                    self.trailing(recent_messages, ContextSource::Fallback)
                }
            }
        } else {
            self.trailing(recent_messages, ContextSource::Uncached)
        };

        debug!(
            session_id,
            source = resolved.source.as_str(),
            input = recent_messages.len(),
            output = resolved.messages.len(),
            "resolved conversation context"
        );
        #[cfg(feature = "metrics")]
        crate::metrics::record_resolution(resolved.source);

        resolved
    }

    /// Drop the session's cached summary. Never fails.
    pub async fn clear_context(&self, session_id: &str) {
        if !self.cache.is_configured() {
            return;
        }
        let key = cache_key(session_id);
        match self.bounded("cache delete", self.cache.delete(&key)).await {
            Ok(Ok(())) => info!(session_id, "cleared cached conversation context"),
            Ok(Err(err)) => {
                warn!(
                    session_id,
                    phase = "clear",
                    error = %err,
                    "failed to clear cached context"
                );
                note_collaborator_error("clear");
            }
            Err(err) => {
                warn!(
                    session_id,
                    phase = "clear",
                    error = %err,
                    "failed to clear cached context"
                );
                note_collaborator_error("clear");
            }
        }
    }

    async fn try_resolve(
        &self,
        session_id: &str,
        recent_messages: &[Message],
    ) -> ContextResult<OptimizedContext> {
        let key = cache_key(session_id);

        // The cached window is not reused; only the summary is.
        if let Some(cached) = self.read_cached(session_id, &key).await? {
            if let Some(summary) = cached.usable_summary() {
                return Ok(self.with_summary(summary, recent_messages, ContextSource::FromCache));
            }
        }

        if !self.window.needs_summary(recent_messages.len()) {
            return Ok(OptimizedContext {
                messages: recent_messages.to_vec(),
                source: ContextSource::Passthrough,
            });
        }

        let (older, trailing) = self.window.split(recent_messages);
        let summary = self.summary_for(session_id, older).await;
        let record = ConversationContext::new(
            trailing.to_vec(),
            Some(summary.clone()),
            recent_messages.len(),
        );
        self.write_cached(session_id, &key, &record).await;

        Ok(self.with_summary(&summary, recent_messages, ContextSource::Summarized))
    }

    async fn read_cached(
        &self,
        session_id: &str,
        key: &str,
    ) -> ContextResult<Option<ConversationContext>> {
        let Some(raw) = self.bounded("cache read", self.cache.get(key)).await?? else {
            return Ok(None);
        };
        match ConversationContext::decode(&raw) {
            Ok(record) => Ok(Some(record)),
            Err(err) => {
                // Treated as a miss so the next write replaces it.
                warn!(
                    session_id,
                    phase = "read",
                    error = %err,
                    "ignoring undecodable cached context"
                );
                note_collaborator_error("decode");
                Ok(None)
            }
        }
    }

    async fn summary_for(&self, session_id: &str, older: &[Message]) -> String {
        let call = self
            .summarizer
            .summarize_or_fallback(older)
            .instrument(debug_span!("summarize", session_id));
        match self.bounded("summarize", call).await {
            Ok(summary) => summary,
            Err(err) => {
                warn!(
                    session_id,
                    phase = "summarize",
                    error = %err,
                    "summarization timed out, using fallback summary"
                );
                note_collaborator_error("summarize");
                FALLBACK_SUMMARY.to_string()
            }
        }
    }

    async fn write_cached(&self, session_id: &str, key: &str, record: &ConversationContext) {
        let written = match record.encode() {
            Ok(value) => self
                .bounded("cache write", self.cache.set(key, &value, self.window.ttl))
                .await
                .and_then(|result| result.map_err(ContextError::from)),
            Err(err) => Err(err),
        };
        match written {
            Ok(()) => debug!(
                session_id,
                message_count = record.message_count,
                "cached conversation summary"
            ),
            Err(err) => {
                warn!(
                    session_id,
                    phase = "write",
                    error = %err,
                    "failed to cache conversation summary"
                );
                note_collaborator_error("write");
            }
        }
    }

    async fn bounded<F, T>(&self, operation: &'static str, call: F) -> ContextResult<T>
    where
        F: Future<Output = T>,
    {
        let limit = self.window.collaborator_timeout;
        tokio::time::timeout(limit, call)
            .await
            .map_err(|_| ContextError::Timeout {
                operation,
                elapsed: limit,
            })
    }

    fn trailing(&self, recent_messages: &[Message], source: ContextSource) -> OptimizedContext {
        OptimizedContext {
            messages: self.window.trailing(recent_messages).to_vec(),
            source,
        }
    }

    fn with_summary(
        &self,
        summary: &str,
        recent_messages: &[Message],
        source: ContextSource,
    ) -> OptimizedContext {
        let trailing = self.window.trailing(recent_messages);
        let mut messages = Vec::with_capacity(trailing.len() + 1);
        messages.push(summary_message(summary));
        messages.extend_from_slice(trailing);
        OptimizedContext { messages, source }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(feature = "metrics")]
fn note_collaborator_error(phase: &str) {
    crate::metrics::record_collaborator_error(phase);
}

#[cfg(not(feature = "metrics"))]
fn note_collaborator_error(_phase: &str) {}
