//! Thin `reqwest` client for the `anthropic-class` provider. No official
//! Rust SDK is in the dependency tree, so this speaks the Messages API
//! directly: build the request body by hand, `reqwest::Client` for
//! transport, `serde_json` for the wire shapes.

use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use super::{
    ChatMessage, GenerateParams, GenerateResult, LlmError, LlmGateway, StreamChunk, ToolCall, ToolCallCapability,
    ToolSpec, TtfcStats, Usage,
};

const API_BASE: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    ttfc: TtfcStats,
}

impl AnthropicClient {
    pub fn new(api_key: String) -> Self {
        Self { http: reqwest::Client::new(), api_key, ttfc: TtfcStats::default() }
    }

    pub fn ttfc(&self) -> &TtfcStats {
        &self.ttfc
    }

    fn request_body(
        messages: &[ChatMessage],
        system: Option<&str>,
        params: &GenerateParams,
        tools: &[ToolSpec],
        stream: bool,
    ) -> Value {
        let wire_messages: Vec<Value> = messages
            .iter()
            .filter_map(|m| match m {
                ChatMessage::System(_) => None,
                ChatMessage::User(content) => Some(json!({"role": "user", "content": content})),
                ChatMessage::Assistant(content) => Some(json!({"role": "assistant", "content": content})),
            })
            .collect();

        let mut body = json!({
            "model": params.model,
            "max_tokens": params.max_tokens,
            "temperature": params.temperature,
            "messages": wire_messages,
            "stream": stream,
        });
        if let Some(system) = system {
            body["system"] = Value::String(system.to_string());
        }
        if !tools.is_empty() {
            let wire_tools: Vec<Value> = tools
                .iter()
                .map(|tool| json!({"name": tool.name, "description": tool.description, "input_schema": tool.parameters}))
                .collect();
            body["tools"] = Value::Array(wire_tools);
        }
        body
    }

    fn parse_response(body: &Value) -> GenerateResult {
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        if let Some(blocks) = body["content"].as_array() {
            for block in blocks {
                match block["type"].as_str() {
                    Some("text") => text.push_str(block["text"].as_str().unwrap_or_default()),
                    Some("tool_use") => tool_calls.push(ToolCall {
                        id: block["id"].as_str().unwrap_or_default().to_string(),
                        name: block["name"].as_str().unwrap_or_default().to_string(),
                        arguments: block["input"].clone(),
                    }),
                    _ => {}
                }
            }
        }
        let usage = body.get("usage").map(|u| {
            let prompt_tokens = u["input_tokens"].as_u64().unwrap_or(0) as u32;
            let completion_tokens = u["output_tokens"].as_u64().unwrap_or(0) as u32;
            Usage { prompt_tokens, completion_tokens, total_tokens: prompt_tokens + completion_tokens }
        });
        GenerateResult { text, tool_calls, usage }
    }

    async fn send(&self, body: Value) -> Result<reqwest::Response, LlmError> {
        let response = self
            .http
            .post(API_BASE)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::ProviderError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }
        if response.status() == reqwest::StatusCode::REQUEST_TIMEOUT {
            return Err(LlmError::Timeout);
        }
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::ProviderError(format!("anthropic returned {status}: {text}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmGateway for AnthropicClient {
    async fn generate(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
        params: &GenerateParams,
        tools: &[ToolSpec],
    ) -> Result<GenerateResult, LlmError> {
        let body = Self::request_body(messages, system, params, tools, false);
        let response = self.send(body).await?;
        let parsed: Value = response.json().await.map_err(|e| LlmError::ProviderError(e.to_string()))?;
        Ok(Self::parse_response(&parsed))
    }

    async fn stream(
        &self,
        messages: &[ChatMessage],
        system: Option<&str>,
        params: &GenerateParams,
        tools: &[ToolSpec],
        chunk_tx: mpsc::Sender<StreamChunk>,
    ) -> Result<GenerateResult, LlmError> {
        let body = Self::request_body(messages, system, params, tools, true);
        let dispatched_at = std::time::Instant::now();
        let response = self.send(body).await?;

        let mut byte_stream = response.bytes_stream();
        let mut buffer = String::new();
        let mut accumulated = String::new();
        let mut tool_calls = Vec::new();
        let mut usage = None;
        let mut first_chunk_recorded = false;

        while let Some(next) = byte_stream.next().await {
            let bytes = next.map_err(|e| LlmError::StreamError(e.to_string()))?;
            buffer.push_str(&String::from_utf8_lossy(&bytes));

            while let Some(newline) = buffer.find('\n') {
                let line = buffer[..newline].trim_end_matches('\r').to_string();
                buffer.drain(..=newline);
                let Some(data) = line.strip_prefix("data: ") else { continue };
                let Ok(event) = serde_json::from_str::<Value>(data) else { continue };

                match event["type"].as_str() {
                    Some("content_block_delta") => {
                        if let Some(text) = event["delta"]["text"].as_str() {
                            if !first_chunk_recorded {
                                self.ttfc.record(dispatched_at.elapsed());
                                first_chunk_recorded = true;
                            }
                            accumulated.push_str(text);
                            let _ = chunk_tx
                                .send(StreamChunk { text: text.to_string(), is_final: false, tool_calls: vec![] })
                                .await;
                        }
                    }
                    Some("content_block_start") => {
                        if event["content_block"]["type"].as_str() == Some("tool_use") {
                            tool_calls.push(ToolCall {
                                id: event["content_block"]["id"].as_str().unwrap_or_default().to_string(),
                                name: event["content_block"]["name"].as_str().unwrap_or_default().to_string(),
                                arguments: Value::Null,
                            });
                        }
                    }
                    Some("message_delta") => {
                        if let Some(output_tokens) = event["usage"]["output_tokens"].as_u64() {
                            usage = Some(Usage {
                                prompt_tokens: 0,
                                completion_tokens: output_tokens as u32,
                                total_tokens: output_tokens as u32,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        let result = GenerateResult { text: accumulated, tool_calls, usage };
        let _ = chunk_tx
            .send(StreamChunk { text: String::new(), is_final: true, tool_calls: result.tool_calls.clone() })
            .await;
        Ok(result)
    }

    fn tool_call_capability(&self) -> ToolCallCapability {
        ToolCallCapability::Native
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_omits_system_role_message_and_sets_system_field() {
        let messages = vec![ChatMessage::user("hi")];
        let params = GenerateParams { provider: "anthropic-class".into(), model: "claude".into(), temperature: 0.5, max_tokens: 100 };
        let body = AnthropicClient::request_body(&messages, Some("be helpful"), &params, &[], false);
        assert_eq!(body["system"], "be helpful");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn parse_response_collects_text_and_tool_use_blocks() {
        let body = json!({
            "content": [
                {"type": "text", "text": "hello "},
                {"type": "tool_use", "id": "call_1", "name": "read_file", "input": {"path": "a.rs"}}
            ],
            "usage": {"input_tokens": 10, "output_tokens": 5}
        });
        let result = AnthropicClient::parse_response(&body);
        assert_eq!(result.text, "hello ");
        assert_eq!(result.tool_calls.len(), 1);
        assert_eq!(result.tool_calls[0].name, "read_file");
        assert_eq!(result.usage.unwrap().total_tokens, 15);
    }
}
