//! Axum app: shared state, router, and the WebSocket upgrade handler.

use std::sync::{Arc, Mutex};

use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
    routing::get,
    Router,
};
use conclave::agent_runtime::AgentRuntime;
use conclave::cache::Cache;
use conclave::events::EventHub;
use conclave::llm::LlmResolver;
use conclave::orchestrator::WorkflowOrchestrator;
use conclave::store::Store;
use tokio::sync::oneshot;

use super::connection::handle_socket;

/// Shared across every connection: the event hub every session registers
/// with, the runtime that drives individual agent turns, the orchestrator
/// that drives workflows, the store both read from (wrapped in the cache's
/// read-through layer), and the cache itself for stats reporting.
/// `shutdown_tx`, when present, is consumed by the first connection to close
/// (used by `once` mode, which tests rely on for a deterministic server
/// lifetime).
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub cache: Arc<dyn Cache>,
    pub events: Arc<EventHub>,
    pub runtime: Arc<AgentRuntime>,
    pub orchestrator: Arc<WorkflowOrchestrator>,
    pub llm: Arc<dyn LlmResolver>,
    pub shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new().route("/", get(ws_handler)).with_state(state)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    let shutdown_tx = state.shutdown_tx.lock().ok().and_then(|mut guard| guard.take());
    ws.on_upgrade(move |socket| handle_socket(socket, state, shutdown_tx))
}
