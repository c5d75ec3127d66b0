use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ChatMessage, GenerateParams, GenerateResult, LlmError, StreamChunk, ToolCallCapability, ToolSpec};

/// Two primitives: one-shot `generate` and lazy streaming `stream`. A
/// provider only has to implement `generate`; `stream` falls back to
/// calling it once and emitting the whole response as a single final
/// chunk.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
        params: &GenerateParams,
        tools: &[ToolSpec],
    ) -> Result<GenerateResult, LlmError>;

    async fn stream(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
        params: &GenerateParams,
        tools: &[ToolSpec],
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<GenerateResult, LlmError> {
        let result = self.generate(messages, system, params, tools).await?;
        let _ = chunk_tx
            .send(StreamChunk {
                text: result.text.clone(),
                is_final: true,
                tool_calls: result.tool_calls.clone(),
            })
            .await;
        Ok(result)
    }

    /// Whether this provider accepts `tools` natively.
    fn tool_call_capability(&self) -> ToolCallCapability;
}
