use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{ChatMessage, GenerateParams, GenerateResult, LlmError, LlmGateway, StreamChunk, ToolCallCapability, ToolSpec};

/// A scripted gateway for tests: queue up responses, then each
/// `generate`/`stream` call pops the next one. `stream` additionally
/// splits the response text on whitespace and
/// forwards one non-final chunk per word before the final chunk, so
/// callers that accumulate streamed text are exercised the same way a real
/// provider would exercise them.
pub struct MockLlmGateway {
    capability: ToolCallCapability,
    responses: Mutex<VecDeque<GenerateResult>>,
}

impl MockLlmGateway {
    pub fn new(capability: ToolCallCapability) -> Self {
        Self { capability, responses: Mutex::new(VecDeque::new()) }
    }

    pub fn with_responses(capability: ToolCallCapability, responses: Vec<GenerateResult>) -> Self {
        Self { capability, responses: Mutex::new(responses.into()) }
    }

    pub fn with_text(capability: ToolCallCapability, text: impl Into<String>) -> Self {
        Self::with_responses(capability, vec![GenerateResult { text: text.into(), tool_calls: vec![], usage: None }])
    }

    pub fn push_response(&self, response: GenerateResult) {
        self.responses.lock().unwrap().push_back(response);
    }

    fn next_response(&self) -> Result<GenerateResult, LlmError> {
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LlmError::ProviderError("mock gateway has no scripted responses left".to_string()))
    }
}

#[async_trait]
impl LlmGateway for MockLlmGateway {
    async fn generate(
        &self,
        _messages: &[ChatMessage],
        _system: Option<&str>,
        _params: &GenerateParams,
        _tools: &[ToolSpec],
    ) -> Result<GenerateResult, LlmError> {
        self.next_response()
    }

    async fn stream(
        &self,
        _messages: &[ChatMessage],
        _system: Option<&str>,
        _params: &GenerateParams,
        _tools: &[ToolSpec],
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<GenerateResult, LlmError> {
        let result = self.next_response()?;
        let words: Vec<&str> = result.text.split_whitespace().collect();
        for (i, word) in words.iter().enumerate() {
            let mut text = word.to_string();
            if i + 1 < words.len() {
                text.push(' ');
            }
            let _ = chunk_tx.send(StreamChunk { text, is_final: false, tool_calls: vec![] }).await;
        }
        let _ = chunk_tx
            .send(StreamChunk { text: String::new(), is_final: true, tool_calls: result.tool_calls.clone() })
            .await;
        Ok(result)
    }

    fn tool_call_capability(&self) -> ToolCallCapability {
        self.capability
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn generate_returns_scripted_response() {
        let gateway = MockLlmGateway::with_text(ToolCallCapability::Native, "hello there");
        let result = gateway.generate(&[], None, &dummy_params(), &[]).await.unwrap();
        assert_eq!(result.text, "hello there");
    }

    #[tokio::test]
    async fn generate_fails_once_responses_are_exhausted() {
        let gateway = MockLlmGateway::new(ToolCallCapability::Native);
        let result = gateway.generate(&[], None, &dummy_params(), &[]).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn stream_forwards_one_chunk_per_word_then_a_final_chunk() {
        let gateway = MockLlmGateway::with_text(ToolCallCapability::Native, "hello there friend");
        let (tx, mut rx) = mpsc::channel(16);
        gateway.stream(&[], None, &dummy_params(), &[], tx).await.unwrap();
        let mut chunks = Vec::new();
        while let Some(chunk) = rx.recv().await {
            chunks.push(chunk);
        }
        assert_eq!(chunks.len(), 4);
        assert!(!chunks[0].is_final);
        assert!(chunks.last().unwrap().is_final);
    }

    fn dummy_params() -> GenerateParams {
        GenerateParams { provider: "openai-class".into(), model: "gpt-4".into(), temperature: 0.7, max_tokens: 256 }
    }
}
