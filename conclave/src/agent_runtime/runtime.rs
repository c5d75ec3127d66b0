use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;

use crate::domain::{Agent, AuthorKind, Id, Message, MemoryKind};
use crate::error::ConclaveError;
use crate::events::EventHub;
use crate::llm::{ChatMessage, GenerateParams, GenerateResult, LlmGateway, StreamChunk, ToolCallCapability};
use crate::memory::{MemoryStore, RetrieveOptions};
use crate::store::Store;
use crate::tools::ToolExecutor;

use super::context::RunContext;
use super::dispatch::execute_and_format;
use super::prompt::{assemble_system_prompt, tool_specs_for_allow_list};

/// Drives one agent through one turn: prompt assembly, the streaming
/// provider call, tool-call extraction/execution, persistence of the
/// placeholder message, and a best-effort memory write-back. A
/// think-act-observe loop generalized from a fixed state graph to one
/// pipeline parameterized by the `Agent` record.
pub struct AgentRuntime {
    store: Arc<dyn Store>,
    memory: Arc<dyn MemoryStore>,
    tools: Arc<ToolExecutor>,
    events: Arc<EventHub>,
}

impl AgentRuntime {
    pub fn new(store: Arc<dyn Store>, memory: Arc<dyn MemoryStore>, tools: Arc<ToolExecutor>, events: Arc<EventHub>) -> Self {
        Self { store, memory, tools, events }
    }

    async fn set_status(&self, handle: &str, status: &str) {
        let _ = self.events.broadcast("agent_status", json!({"handle": handle, "status": status}), true, true).await;
    }

    /// Drives `process_streaming` to exhaustion and returns the
    /// concatenated result, for callers (workflow tasks) that don't need
    /// per-chunk delivery.
    pub async fn process(
        &self,
        agent: &Agent,
        message_text: &str,
        context: RunContext,
        llm: Arc<dyn LlmGateway>,
        params: GenerateParams,
        cancel: Arc<AtomicBool>,
    ) -> Result<GenerateResult, ConclaveError> {
        let (tx, mut rx) = mpsc::channel(32);
        let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
        let result = self.process_streaming(agent, message_text, context, llm, params, tx, cancel).await;
        let _ = drain.await;
        result
    }

    /// Streams `(chunk, is_final, metadata)` tuples to the caller over a
    /// plain channel rather than a framework event type.
    pub async fn process_streaming(
        &self,
        agent: &Agent,
        message_text: &str,
        context: RunContext,
        llm: Arc<dyn LlmGateway>,
        params: GenerateParams,
        chunk_tx: mpsc::Sender<StreamChunk>,
        cancel: Arc<AtomicBool>,
    ) -> Result<GenerateResult, ConclaveError> {
        self.set_status(&agent.handle, "thinking").await;

        let mut placeholder = Message::new(context.channel_id, Some(agent.id), AuthorKind::Agent, agent.handle.clone(), "");
        placeholder.metadata.streaming = true;
        self.store.insert_message(placeholder.clone()).await?;
        self.events.broadcast("message_new", serde_json::to_value(&placeholder).unwrap_or(json!({})), true, false).await?;

        let outcome = self.run_turn(agent, message_text, &context, llm, &params, &chunk_tx, &cancel).await;

        match outcome {
            Ok((result, cancelled)) => {
                placeholder.content = result.text.clone();
                placeholder.metadata.streaming = false;
                placeholder.metadata.cancelled = cancelled;
                placeholder.metadata.model = Some(params.model.clone());
                placeholder.metadata.provider = Some(params.provider.clone());
                self.store.replace_message(placeholder.clone()).await?;
                self.events.broadcast("message_update", serde_json::to_value(&placeholder).unwrap_or(json!({})), true, false).await?;
                self.set_status(&agent.handle, "online").await;

                self.spawn_memory_write_back(agent.id, context.channel_id, message_text.to_string(), result.text.clone());

                if cancelled {
                    return Err(ConclaveError::Cancelled);
                }
                Ok(result)
            }
            Err((partial_text, class)) => {
                placeholder.content = partial_text;
                placeholder.metadata.streaming = false;
                placeholder.metadata.truncated = true;
                placeholder.metadata.error = Some(class.clone());
                self.store.replace_message(placeholder.clone()).await?;
                self.events.broadcast("message_update", serde_json::to_value(&placeholder).unwrap_or(json!({})), true, false).await?;
                self.set_status(&agent.handle, "online").await;
                Err(ConclaveError::LlmStreamError(class))
            }
        }
    }

    /// The part of the pipeline that can fail mid-stream. The `bool` in the
    /// `Ok` case is whether a cooperative cancellation cut the stream short
    /// (yields an is_final=true chunk with metadata {cancelled:true} and
    /// returns); the `String` in the `Err` case is the accumulated partial
    /// text and the error class for the failure path.
    #[allow(clippy::too_many_arguments)]
    async fn run_turn(
        &self,
        agent: &Agent,
        message_text: &str,
        context: &RunContext,
        llm: Arc<dyn LlmGateway>,
        params: &GenerateParams,
        chunk_tx: &mpsc::Sender<StreamChunk>,
        cancel: &Arc<AtomicBool>,
    ) -> Result<(GenerateResult, bool), (String, String)> {
        let capability = llm.tool_call_capability();
        let tools_enabled = !agent.config.tool_allow_list.is_empty();
        let tool_specs = if tools_enabled { tool_specs_for_allow_list(&agent.config.tool_allow_list) } else { Vec::new() };

        let memories = if agent.config.enable_memory {
            self.memory
                .retrieve_relevant(agent.id, message_text, RetrieveOptions { channel_id: Some(context.channel_id), ..RetrieveOptions::new() })
                .await
                .unwrap_or_default()
        } else {
            Vec::new()
        };
        let running_summary = if agent.config.enable_memory {
            self.memory
                .retrieve_relevant(
                    agent.id,
                    message_text,
                    RetrieveOptions { channel_id: Some(context.channel_id), kinds: Some(vec![MemoryKind::Summary]), limit: 1, ..RetrieveOptions::new() },
                )
                .await
                .ok()
                .and_then(|mut hits| hits.pop())
                .map(|scored| scored.record.content)
        } else {
            None
        };

        let system_prompt = assemble_system_prompt(&agent.config.system_prompt, &memories, running_summary.as_deref(), &tool_specs, capability);
        let tools_for_call = if tools_enabled && capability == ToolCallCapability::Native { tool_specs } else { Vec::new() };

        let mut messages = context.conversation.clone();
        let combined_text = match &context.task_context {
            Some(task_context) => format!("Context from prior tasks:\n{task_context}\n\n{message_text}"),
            None => message_text.to_string(),
        };
        messages.push(ChatMessage::user(combined_text));

        let (internal_tx, mut internal_rx) = mpsc::channel::<StreamChunk>(32);
        let stream_handle = {
            let llm = Arc::clone(&llm);
            let messages = messages.clone();
            let system_prompt = system_prompt.clone();
            let params = params.clone();
            tokio::spawn(async move { llm.stream(&messages, Some(&system_prompt), &params, &tools_for_call, internal_tx).await })
        };

        let mut accumulated = String::new();
        let mut final_tool_calls = Vec::new();
        let mut cancelled = false;
        while let Some(chunk) = internal_rx.recv().await {
            if cancel.load(Ordering::Relaxed) {
                cancelled = true;
                let _ = chunk_tx.send(StreamChunk { text: String::new(), is_final: true, tool_calls: Vec::new() }).await;
                let _ = self
                    .events
                    .broadcast(
                        "message_stream",
                        json!({"chunk": "", "is_final": true, "metadata": {"cancelled": true}}),
                        true,
                        false,
                    )
                    .await;
                break;
            }
            accumulated.push_str(&chunk.text);
            if chunk.is_final {
                final_tool_calls = chunk.tool_calls.clone();
            }
            let _ = chunk_tx.send(chunk.clone()).await;
            let _ = self
                .events
                .broadcast("message_stream", json!({"chunk": chunk.text, "is_final": chunk.is_final}), true, false)
                .await;
        }

        if cancelled {
            return Ok((GenerateResult { text: accumulated, tool_calls: Vec::new(), usage: None }, true));
        }

        let stream_result = match stream_handle.await {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                let class = crate::error::ConclaveError::from(err).class().to_string();
                return Err((accumulated, class));
            }
            Err(join_err) => return Err((accumulated, format!("runtime join error: {join_err}"))),
        };

        let tool_calls = if capability == ToolCallCapability::Native {
            final_tool_calls
        } else {
            let (clean, calls) = crate::llm::parse_tool_calls_from_text(&accumulated);
            accumulated = clean;
            calls
        };

        for call in &tool_calls {
            let note = execute_and_format(&self.tools, call).await;
            accumulated.push_str("\n\n");
            accumulated.push_str(&note);
            let _ = chunk_tx.send(StreamChunk { text: format!("\n\n{note}"), is_final: false, tool_calls: Vec::new() }).await;
            let _ = self.events.broadcast("message_stream", json!({"chunk": note, "is_final": false}), true, false).await;
        }

        Ok((GenerateResult { text: accumulated, tool_calls, usage: stream_result.usage }, false))
    }

    /// Best-effort: the runtime never fails a turn because the memory
    /// write-back failed. Importance defaults to 5 (conversation); a
    /// dedicated decision/kind classifier is future work, so every
    /// exchange is recorded as `conversation` for now.
    fn spawn_memory_write_back(&self, agent_id: Id, channel_id: Id, question: String, answer: String) {
        let memory = Arc::clone(&self.memory);
        tokio::spawn(async move {
            let exchange = format!("Q: {question}\nA: {answer}");
            if let Err(err) = memory.store(agent_id, channel_id, &exchange, MemoryKind::Conversation, 5, json!({})).await {
                tracing::warn!(%err, "memory write-back failed");
            }
        });
    }
}
