//! Covers both the `openai-class` and `local-ollama-class` provider classes:
//! Ollama and LM Studio both speak the OpenAI chat-completions wire shape,
//! so one client handles them by pointing `api_base` at the right host.

use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs, ChatCompletionToolArgs,
    ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionObjectArgs,
};
use async_openai::Client;
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::sync::mpsc;

use super::{
    ChatMessage, GenerateParams, GenerateResult, LlmError, LlmGateway, StreamChunk, ToolCall, ToolCallCapability,
    ToolSpec, TtfcStats, Usage,
};

pub struct OpenAiCompatibleClient {
    client: Client<OpenAIConfig>,
    capability: ToolCallCapability,
    ttfc: TtfcStats,
}

impl OpenAiCompatibleClient {
    pub fn new(api_key: Option<String>, api_base: Option<String>, capability: ToolCallCapability) -> Self {
        let mut config = OpenAIConfig::new();
        if let Some(key) = api_key {
            config = config.with_api_key(key);
        }
        if let Some(base) = api_base {
            config = config.with_api_base(base);
        }
        Self { client: Client::with_config(config), capability, ttfc: TtfcStats::default() }
    }

    pub fn ttfc(&self) -> &TtfcStats {
        &self.ttfc
    }

    fn build_messages(
        messages: &[ChatMessage],
        system: Option<&str>,
    ) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
        let mut out = Vec::with_capacity(messages.len() + 1);
        if let Some(system) = system {
            out.push(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(system)
                    .build()
                    .map_err(|e| LlmError::ProviderError(e.to_string()))?
                    .into(),
            );
        }
        for message in messages {
            let request_message = match message {
                ChatMessage::System(content) => ChatCompletionRequestSystemMessageArgs::default()
                    .content(content.as_str())
                    .build()
                    .map_err(|e| LlmError::ProviderError(e.to_string()))?
                    .into(),
                ChatMessage::User(content) => ChatCompletionRequestUserMessageArgs::default()
                    .content(content.as_str())
                    .build()
                    .map_err(|e| LlmError::ProviderError(e.to_string()))?
                    .into(),
                ChatMessage::Assistant(content) => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(content.as_str())
                    .build()
                    .map_err(|e| LlmError::ProviderError(e.to_string()))?
                    .into(),
            };
            out.push(request_message);
        }
        Ok(out)
    }

    fn build_tools(tools: &[ToolSpec]) -> Result<Vec<async_openai::types::ChatCompletionTool>, LlmError> {
        tools
            .iter()
            .map(|tool| {
                let function = FunctionObjectArgs::default()
                    .name(tool.name.clone())
                    .description(tool.description.clone())
                    .parameters(tool.parameters.clone())
                    .build()
                    .map_err(|e| LlmError::ProviderError(e.to_string()))?;
                ChatCompletionToolArgs::default()
                    .r#type(ChatCompletionToolType::Function)
                    .function(function)
                    .build()
                    .map_err(|e| LlmError::ProviderError(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl LlmGateway for OpenAiCompatibleClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
        params: &GenerateParams,
        tools: &[ToolSpec],
    ) -> Result<GenerateResult, LlmError> {
        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(params.model.clone())
            .temperature(params.temperature)
            .max_tokens(params.max_tokens)
            .messages(Self::build_messages(messages, system)?);
        if !tools.is_empty() && self.capability == ToolCallCapability::Native {
            request.tools(Self::build_tools(tools)?);
        }
        let request = request.build().map_err(|e| LlmError::ProviderError(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(classify_error)?;
        let choice = response.choices.into_iter().next().ok_or_else(|| LlmError::ProviderError("no choices returned".to_string()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|call| ToolCall {
                id: call.id,
                name: call.function.name,
                arguments: serde_json::from_str(&call.function.arguments).unwrap_or(serde_json::Value::Null),
            })
            .collect();

        Ok(GenerateResult {
            text: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage: response.usage.map(|u| Usage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
        })
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
        params: &GenerateParams,
        tools: &[ToolSpec],
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<GenerateResult, LlmError> {
        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(params.model.clone())
            .temperature(params.temperature)
            .max_tokens(params.max_tokens)
            .messages(Self::build_messages(messages, system)?);
        if !tools.is_empty() && self.capability == ToolCallCapability::Native {
            request.tools(Self::build_tools(tools)?);
        }
        let request = request.build().map_err(|e| LlmError::ProviderError(e.to_string()))?;

        let dispatched_at = std::time::Instant::now();
        let mut stream = self.client.chat().create_stream(request).await.map_err(classify_error)?;
        let mut first_chunk_recorded = false;
        let mut accumulated = String::new();
        let mut tool_calls = Vec::new();

        while let Some(event) = stream.next().await {
            let response = event.map_err(|e| LlmError::StreamError(e.to_string()))?;
            let Some(choice) = response.choices.into_iter().next() else { continue };
            if let Some(content) = choice.delta.content {
                if !first_chunk_recorded {
                    self.ttfc.record(dispatched_at.elapsed());
                    first_chunk_recorded = true;
                }
                accumulated.push_str(&content);
                let _ = chunk_tx.send(StreamChunk { text: content, is_final: false, tool_calls: vec![] }).await;
            }
            if let Some(deltas) = choice.delta.tool_calls {
                for delta in deltas {
                    if let Some(function) = delta.function {
                        tool_calls.push(ToolCall {
                            id: delta.id.unwrap_or_default(),
                            name: function.name.unwrap_or_default(),
                            arguments: function
                                .arguments
                                .and_then(|raw| serde_json::from_str(&raw).ok())
                                .unwrap_or(serde_json::Value::Null),
                        });
                    }
                }
            }
        }

        let result = GenerateResult { text: accumulated, tool_calls, usage: None };
        let _ = chunk_tx
            .send(StreamChunk { text: String::new(), is_final: true, tool_calls: result.tool_calls.clone() })
            .await;
        Ok(result)
    }

    fn tool_call_capability(&self) -> ToolCallCapability {
        self.capability
    }
}

fn classify_error(err: async_openai::error::OpenAIError) -> LlmError {
    match &err {
        async_openai::error::OpenAIError::ApiError(api_err) => {
            if api_err.code.as_deref() == Some("rate_limit_exceeded") {
                LlmError::RateLimited
            } else {
                LlmError::ProviderError(api_err.message.clone())
            }
        }
        other => LlmError::ProviderError(other.to_string()),
    }
}
