use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One turn of chat history handed to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum ChatMessage {
    System(String),
    User(String),
    Assistant(String),
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage::System(content.into())
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage::User(content.into())
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage::Assistant(content.into())
    }

    pub fn content(&self) -> &str {
        match self {
            ChatMessage::System(c) | ChatMessage::User(c) | ChatMessage::Assistant(c) => c,
        }
    }
}

/// {name, JSON schema of inputs}.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// temperature in [0, 2], max_tokens in N+, model name, provider.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateParams {
    pub provider: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Whether a provider accepts `tools` natively or needs the text-only XML
/// tag convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallCapability {
    Native,
    TextOnly,
}

/// One-shot result: the full assistant turn plus any structured tool-call
/// requests.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerateResult {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

/// One element of the streamed sequence. The terminal element carries
/// `is_final = true` and the (possibly empty) tool-call list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StreamChunk {
    pub text: String,
    pub is_final: bool,
    pub tool_calls: Vec<ToolCall>,
}
