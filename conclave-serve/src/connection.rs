//! WebSocket connection lifecycle: session registration, the outbound
//! forwarding task, and the inbound recv loop.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use conclave_protocol::{codec, Frame};
use tokio::sync::{mpsc, oneshot};

use super::app::AppState;
use super::dispatch::handle_event;

const SESSION_OUTBOX_CAPACITY: usize = 64;

pub(crate) async fn handle_socket(mut socket: WebSocket, state: Arc<AppState>, shutdown_tx: Option<oneshot::Sender<()>>) {
    let (tx, mut rx) = mpsc::channel::<Frame>(SESSION_OUTBOX_CAPACITY);
    let session_id = state.events.register_session(tx);

    loop {
        tokio::select! {
            outbound = rx.recv() => {
                let Some(frame) = outbound else { break };
                let message = match frame {
                    Frame::Text(text) => Message::Text(text),
                    Frame::Binary(bytes) => Message::Binary(bytes),
                };
                if socket.send(message).await.is_err() {
                    break;
                }
            }
            inbound = socket.recv() => {
                let Some(result) = inbound else { break };
                let message = match result {
                    Ok(m) => m,
                    Err(err) => {
                        tracing::warn!(%err, "read error, closing connection");
                        break;
                    }
                };
                let frame = match message {
                    Message::Text(text) => Frame::Text(text),
                    Message::Binary(bytes) => Frame::Binary(bytes),
                    Message::Close(_) => break,
                    _ => continue,
                };
                if let Err(err) = dispatch_frame(&state, session_id, frame).await {
                    tracing::warn!(%err, "failed to dispatch inbound frame");
                }
            }
        }
    }

    state.events.deregister_session(session_id);
    if let Some(tx) = shutdown_tx {
        let _ = tx.send(());
    }
}

async fn dispatch_frame(
    state: &Arc<AppState>,
    session_id: conclave::domain::Id,
    frame: Frame,
) -> Result<(), conclave::ConclaveError> {
    let (event_name, payload) = match codec::decode(&frame) {
        Ok(decoded) => decoded,
        Err(err) => {
            let _ = state.events.unicast(session_id, "error", serde_json::json!({"error": err.to_string()}), false).await;
            return Ok(());
        }
    };

    if let Err(err) = handle_event(state, session_id, &event_name, payload).await {
        let _ = state.events.unicast(session_id, "error", serde_json::json!({"error": err.to_string(), "class": err.class()}), false).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave::agent_runtime::AgentRuntime;
    use conclave::cache::{Cache, InMemoryCache};
    use conclave::domain::Channel;
    use conclave::events::EventHub;
    use conclave::llm::FixedLlmResolver;
    use conclave::llm::{GenerateParams, MockLlmGateway, ToolCallCapability};
    use conclave::memory::{InMemoryMemoryStore, MockEmbedder};
    use conclave::orchestrator::WorkflowOrchestrator;
    use conclave::store::{CachedStore, InMemoryStore, Store};
    use conclave::tools::ToolExecutor;

    async fn state() -> Arc<AppState> {
        let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
        let store: Arc<dyn Store> = Arc::new(CachedStore::new(Arc::new(InMemoryStore::new()), cache.clone()));
        let memory = Arc::new(InMemoryMemoryStore::new(Arc::new(MockEmbedder::new(16))));
        let dir = tempfile::tempdir().unwrap();
        let tools = Arc::new(ToolExecutor::new(dir.path().to_path_buf()));
        let events = Arc::new(EventHub::new());
        let runtime = Arc::new(AgentRuntime::new(store.clone(), memory, tools, events.clone()));
        let llm = Arc::new(MockLlmGateway::with_text(ToolCallCapability::Native, "ok"));
        let params = GenerateParams { provider: "openai-class".into(), model: "gpt-4".into(), temperature: 0.2, max_tokens: 256 };
        let resolver: Arc<dyn conclave::llm::LlmResolver> = Arc::new(FixedLlmResolver::new(llm, params));
        let orchestrator = Arc::new(WorkflowOrchestrator::new(store.clone(), events.clone(), runtime.clone(), resolver.clone()));
        Arc::new(AppState { store, cache, events, runtime, orchestrator, llm: resolver, shutdown_tx: std::sync::Mutex::new(None) })
    }

    #[tokio::test]
    async fn get_stats_unicasts_a_snapshot_to_the_requesting_session() {
        let state = state().await;
        let (tx, mut rx) = mpsc::channel::<Frame>(4);
        let session_id = state.events.register_session(tx);

        dispatch_frame(&state, session_id, Frame::Text(r#"{"e":"get_stats","d":{},"_v":1}"#.to_string())).await.unwrap();

        let frame = rx.recv().await.unwrap();
        let (event_name, _) = codec::decode(&frame).unwrap();
        assert_eq!(event_name, "stats");
    }

    #[tokio::test]
    async fn malformed_json_yields_an_error_frame_not_a_closed_connection() {
        let state = state().await;
        let (tx, mut rx) = mpsc::channel::<Frame>(4);
        let session_id = state.events.register_session(tx);

        dispatch_frame(&state, session_id, Frame::Text("not json".to_string())).await.unwrap();

        let frame = rx.recv().await.unwrap();
        let (event_name, _) = codec::decode(&frame).unwrap();
        assert_eq!(event_name, "error");
    }

    #[tokio::test]
    async fn message_send_to_unknown_channel_yields_an_error() {
        let state = state().await;
        let (tx, mut rx) = mpsc::channel::<Frame>(4);
        let session_id = state.events.register_session(tx);

        let payload = serde_json::json!({"e": "message_send", "d": {"channel_id": conclave::domain::Id::new(), "content": "hi", "author_name": "Dev"}, "_v": 1});
        dispatch_frame(&state, session_id, Frame::Text(payload.to_string())).await.unwrap();

        let frame = rx.recv().await.unwrap();
        let (event_name, _) = codec::decode(&frame).unwrap();
        assert_eq!(event_name, "error");
    }

    #[tokio::test]
    async fn message_send_persists_and_broadcasts() {
        let state = state().await;
        let channel = Channel::new("general");
        let channel_id = channel.id;
        state.store.create_channel(channel).await.unwrap();
        let (tx, mut rx) = mpsc::channel::<Frame>(4);
        let session_id = state.events.register_session(tx);

        let payload = serde_json::json!({"e": "message_send", "d": {"channel_id": channel_id, "content": "hello", "author_name": "Dev"}, "_v": 1});
        dispatch_frame(&state, session_id, Frame::Text(payload.to_string())).await.unwrap();

        let frame = rx.recv().await.unwrap();
        let (event_name, _) = codec::decode(&frame).unwrap();
        assert_eq!(event_name, "message_new");
        assert_eq!(state.store.list_messages(channel_id, 10).await.unwrap().len(), 1);
    }
}
