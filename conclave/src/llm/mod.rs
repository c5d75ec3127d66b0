//! Uniform synchronous and streaming interface over model providers:
//! Anthropic, OpenAI-compatible, and local Ollama.

mod anthropic;
mod error;
mod gateway;
mod mock;
mod openai_compatible;
mod resolver;
mod stats;
mod text_tool_protocol;
mod types;

pub use anthropic::AnthropicClient;
pub use error::LlmError;
pub use gateway::LlmGateway;
pub use mock::MockLlmGateway;
pub use openai_compatible::OpenAiCompatibleClient;
pub use resolver::{FixedLlmResolver, LlmResolver};
pub use stats::{TtfcSnapshot, TtfcStats};
pub use text_tool_protocol::{build_tool_instructions, parse_tool_calls_from_text};
pub use types::{
    ChatMessage, GenerateParams, GenerateResult, StreamChunk, ToolCall, ToolCallCapability, ToolSpec, Usage,
};

use std::str::FromStr;

/// The provider classes the gateway is polymorphic over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderClass {
    AnthropicClass,
    OpenaiClass,
    LocalOllamaClass,
}

impl ProviderClass {
    /// Whether this provider class accepts `tools` natively or needs the
    /// text-only XML tag convention.
    pub fn tool_call_capability(&self) -> ToolCallCapability {
        match self {
            ProviderClass::AnthropicClass | ProviderClass::OpenaiClass => ToolCallCapability::Native,
            ProviderClass::LocalOllamaClass => ToolCallCapability::TextOnly,
        }
    }
}

impl FromStr for ProviderClass {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "anthropic-class" => Ok(ProviderClass::AnthropicClass),
            "openai-class" => Ok(ProviderClass::OpenaiClass),
            "local-ollama-class" => Ok(ProviderClass::LocalOllamaClass),
            other => Err(format!("unknown provider class: {other}")),
        }
    }
}

impl std::fmt::Display for ProviderClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProviderClass::AnthropicClass => "anthropic-class",
            ProviderClass::OpenaiClass => "openai-class",
            ProviderClass::LocalOllamaClass => "local-ollama-class",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_provider_classes() {
        assert_eq!(ProviderClass::from_str("openai-class").unwrap(), ProviderClass::OpenaiClass);
        assert!(ProviderClass::from_str("made-up").is_err());
    }

    #[test]
    fn local_ollama_is_text_only() {
        assert_eq!(ProviderClass::LocalOllamaClass.tool_call_capability(), ToolCallCapability::TextOnly);
        assert_eq!(ProviderClass::AnthropicClass.tool_call_capability(), ToolCallCapability::Native);
    }
}
