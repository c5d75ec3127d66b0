use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorKind {
    User,
    Agent,
    System,
}

/// Model/provider attribution and the streaming-placeholder flag. A message
/// with `streaming = true` is a placeholder that must eventually be
/// replaced by a non-streaming version carrying the same id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub model: Option<String>,
    pub provider: Option<String>,
    #[serde(default)]
    pub streaming: bool,
    #[serde(default)]
    pub truncated: bool,
    #[serde(default)]
    pub cancelled: bool,
    /// Machine-readable error class when an LLM provider error occurred
    /// during this message's generation.
    pub error: Option<String>,
}

/// A single chunk of conversation, ordered within a channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Id,
    pub channel_id: Id,
    pub author_id: Option<Id>,
    pub author_kind: AuthorKind,
    pub author_name: String,
    pub content: String,
    pub reply_to: Option<Id>,
    pub metadata: MessageMetadata,
    pub created_at: DateTime<Utc>,
}

/// Maximum accepted content length: exactly 10 000 characters is accepted,
/// one more is rejected.
pub const MAX_CONTENT_CHARS: usize = 10_000;

impl Message {
    pub fn new(
        channel_id: Id,
        author_id: Option<Id>,
        author_kind: AuthorKind,
        author_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            id: Id::new(),
            channel_id,
            author_id,
            author_kind,
            author_name: author_name.into(),
            content: content.into(),
            reply_to: None,
            metadata: MessageMetadata::default(),
            created_at: Utc::now(),
        }
    }

    pub fn is_within_length_limit(&self) -> bool {
        self.content.chars().count() <= MAX_CONTENT_CHARS
    }
}
