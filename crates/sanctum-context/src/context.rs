//! Cached conversation context record

use serde::{Deserialize, Serialize};

use crate::error::{ContextError, ContextResult};
use crate::message::Message;

const KEY_PREFIX: &str = "context:";

/// Cache key holding a session's record
pub fn cache_key(session_id: &str) -> String {
    format!("{KEY_PREFIX}{session_id}")
}

/// Compressed state of one session at the time it was cached.
///
/// `summary` covers everything before `messages` begins. `message_count` is
/// the history length seen at write time and is diagnostic only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationContext {
    /// Records written before versioning carry no tag and read as 0.
    #[serde(default)]
    pub version: u32,
    pub messages: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub message_count: usize,
}

impl ConversationContext {
    pub const CURRENT_VERSION: u32 = 1;

    pub fn new(messages: Vec<Message>, summary: Option<String>, message_count: usize) -> Self {
        Self {
            version: Self::CURRENT_VERSION,
            messages,
            summary,
            message_count,
        }
    }

    /// The summary, if present and non-blank
    pub fn usable_summary(&self) -> Option<&str> {
        self.summary
            .as_deref()
            .filter(|summary| !summary.trim().is_empty())
    }

    pub fn encode(&self) -> ContextResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a cache value, migrating older layouts to the current one
    pub fn decode(raw: &str) -> ContextResult<Self> {
        let record: Self = serde_json::from_str(raw)?;
        record.migrate()
    }

    fn migrate(mut self) -> ContextResult<Self> {
        match self.version {
            // v0 has the v1 layout minus the tag
            0 => {
                self.version = Self::CURRENT_VERSION;
                Ok(self)
            }
            Self::CURRENT_VERSION => Ok(self),
            found => Err(ContextError::UnsupportedVersion {
                found,
                supported: Self::CURRENT_VERSION,
            }),
        }
    }
}
