//! WebSocket frontend for conclave (axum + ws).
//!
//! Listens on ws://127.0.0.1:8080, one session per connection, multiplexing
//! `message_send`/`clear_context`/`workflow_plan`/`workflow_start`/
//! `workflow_cancel`/`get_stats` over the wire envelope defined in
//! `conclave_protocol`.
//!
//! **Public API**: [`run_serve`], [`run_serve_on_listener`].

mod app;
mod connection;
mod dispatch;
mod resolver;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use conclave::agent_runtime::AgentRuntime;
use conclave::cache::{Cache, InMemoryCache};
use conclave::events::EventHub;
use conclave::memory::{InMemoryMemoryStore, OpenAiEmbedder};
use conclave::orchestrator::WorkflowOrchestrator;
use conclave::store::{CachedStore, InMemoryStore, SqliteStore, Store};
use conclave::tools::ToolExecutor;
use conclave_config::Settings;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::info;

pub use resolver::ConfiguredLlmResolver;

use app::{router, AppState};

const DEFAULT_WS_ADDR: &str = "127.0.0.1:8080";

fn load_settings() -> Settings {
    let _ = conclave_config::load_and_apply("conclave", None);
    let path = std::env::var("CONCLAVE_CONFIG").unwrap_or_else(|_| "conclave.toml".to_string());
    Settings::load_from_path(std::path::Path::new(&path)).unwrap_or_default()
}

fn build_store(settings: &Settings) -> Result<Arc<dyn Store>, Box<dyn std::error::Error + Send + Sync>> {
    match std::env::var("CONCLAVE_DB") {
        Ok(path) => Ok(Arc::new(SqliteStore::new(&path)?)),
        Err(_) => {
            let _ = settings;
            Ok(Arc::new(InMemoryStore::new()))
        }
    }
}

fn build_app_state(shutdown_tx: Option<oneshot::Sender<()>>) -> Result<Arc<AppState>, Box<dyn std::error::Error + Send + Sync>> {
    let settings = load_settings();
    let cache: Arc<dyn Cache> = Arc::new(InMemoryCache::new());
    let store: Arc<dyn Store> = Arc::new(CachedStore::new(build_store(&settings)?, cache.clone()));

    let embedding_model = settings.memory.embedding_model.clone().unwrap_or_else(|| "text-embedding-3-small".to_string());
    let embedder = Arc::new(OpenAiEmbedder::new(embedding_model));
    let memory = Arc::new(InMemoryMemoryStore::new(embedder));

    let tools = Arc::new(ToolExecutor::new(settings.tools.workspace_root.clone()));
    let events = Arc::new(EventHub::new());
    let runtime = Arc::new(AgentRuntime::new(store.clone(), memory, tools, events.clone()));
    let llm = Arc::new(ConfiguredLlmResolver::from_settings(&settings));
    let orchestrator = Arc::new(WorkflowOrchestrator::new(store.clone(), events.clone(), runtime.clone(), llm.clone()));

    spawn_batch_ticker(events.clone(), settings.event_hub.batch_interval_ms);

    Ok(Arc::new(AppState { store, cache, events, runtime, orchestrator, llm, shutdown_tx: Mutex::new(shutdown_tx) }))
}

/// Drives the event hub's time-bounded batch window: one ticker per process
/// flushes every session's pending batch, rather than one timer task per
/// session.
fn spawn_batch_ticker(events: Arc<EventHub>, interval_ms: u64) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
        loop {
            ticker.tick().await;
            if let Err(err) = events.flush_all_batches().await {
                tracing::warn!(%err, "batch flush failed");
            }
        }
    });
}

/// Runs the WebSocket server on an existing listener. Used by tests (bind
/// to 127.0.0.1:0 then pass the listener in). When `once` is true, the
/// server exits once the first connection closes.
pub async fn run_serve_on_listener(listener: TcpListener, once: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("conclave WebSocket server listening on ws://{}", addr);
    if once {
        info!("will exit after the first connection closes (once mode, used by tests)");
    }

    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let state = build_app_state(if once { Some(shutdown_tx) } else { None })?;
    let app = router(state);

    if once {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            })
            .await?;
        info!("connection done, exiting (once mode)");
    } else {
        axum::serve(listener, app).await?;
    }
    Ok(())
}

/// Runs the WebSocket server. Listens on `addr` (default 127.0.0.1:8080).
pub async fn run_serve(addr: Option<&str>, once: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = addr.unwrap_or(DEFAULT_WS_ADDR);
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, once).await
}
