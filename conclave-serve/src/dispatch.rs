//! Inbound event handling: translates each wire event into the store,
//! orchestrator, and runtime calls that carry it out. Dispatches on event
//! name to a string-keyed match rather than a typed request enum, since
//! the wire envelope here is untyped (`{e, d, _v}`) by design.

use std::collections::HashSet;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use conclave::agent_runtime::{RunContext, DEFAULT_WINDOW};
use conclave::domain::{Agent, AgentKind, AuthorKind, Id, Message, MAX_CONTENT_CHARS};
use conclave::error::ConclaveError;
use conclave::llm::ChatMessage;
use conclave::store::Store;

use super::app::AppState;

#[derive(Deserialize)]
struct MessageSend {
    channel_id: Id,
    content: String,
    author_name: String,
}

#[derive(Deserialize)]
struct ClearContext {
    channel_id: Id,
}

#[derive(Deserialize)]
struct WorkflowPlan {
    request: String,
    channel_id: Id,
}

#[derive(Deserialize)]
struct WorkflowStart {
    workflow_id: Id,
}

#[derive(Deserialize)]
struct WorkflowCancel {
    workflow_id: Id,
}

pub(crate) async fn handle_event(
    state: &Arc<AppState>,
    session_id: Id,
    event_name: &str,
    payload: serde_json::Value,
) -> Result<(), ConclaveError> {
    match event_name {
        "message_send" => handle_message_send(state, session_id, payload).await,
        "clear_context" => handle_clear_context(state, payload).await,
        "workflow_plan" => handle_workflow_plan(state, payload).await,
        "workflow_start" => handle_workflow_start(state, payload).await,
        "workflow_cancel" => handle_workflow_cancel(state, payload).await,
        "get_stats" => handle_get_stats(state, session_id).await,
        other => Err(ConclaveError::Validation(format!("unknown event: {other}"))),
    }
}

fn parse<T: for<'de> Deserialize<'de>>(payload: serde_json::Value) -> Result<T, ConclaveError> {
    serde_json::from_value(payload).map_err(|err| ConclaveError::Validation(err.to_string()))
}

async fn handle_message_send(state: &Arc<AppState>, session_id: Id, payload: serde_json::Value) -> Result<(), ConclaveError> {
    let req: MessageSend = parse(payload)?;
    if req.content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ConclaveError::Validation(format!("content exceeds {MAX_CONTENT_CHARS} characters")));
    }

    let channel = state.store.get_channel(req.channel_id).await?.ok_or_else(|| ConclaveError::not_found_channel(req.channel_id))?;
    state.events.subscribe_channel(session_id, req.channel_id);

    let history = recent_context(&state.store, req.channel_id, channel.context_cleared_at, DEFAULT_WINDOW).await?;

    let message = Message::new(req.channel_id, None, AuthorKind::User, req.author_name.clone(), req.content.clone());
    state.store.insert_message(message.clone()).await?;
    state.events.broadcast("message_new", serde_json::to_value(&message).unwrap_or(json!({})), true, false).await?;

    for handle in mentioned_handles(&req.content) {
        let Some(agent) = state.store.get_agent_by_handle(&handle).await? else { continue };
        if !agent.active {
            continue;
        }
        spawn_agent_turn(state, agent, req.content.clone(), req.author_name.clone(), req.channel_id, history.clone());
    }
    Ok(())
}

fn spawn_agent_turn(state: &Arc<AppState>, agent: Agent, message_text: String, invoking_name: String, channel_id: Id, history: Vec<ChatMessage>) {
    let runtime = Arc::clone(&state.runtime);
    let llm_resolver = Arc::clone(&state.llm);
    tokio::spawn(async move {
        let (llm, params) = llm_resolver.resolve(&agent);
        let mut context = RunContext::new(invoking_name, channel_id);
        context.conversation = history;
        let cancel = Arc::new(AtomicBool::new(false));
        if let Err(err) = runtime.process(&agent, &message_text, context, llm, params, cancel).await {
            tracing::warn!(%err, handle = %agent.handle, "agent turn failed");
        }
    });
}

/// `@handle` tokens in `text`, deduplicated and in first-seen order. No
/// regex: handles are a closed alphabet (alnum, `_`, `-`) so a linear scan
/// is simpler than pulling in a pattern engine for one token shape.
fn mentioned_handles(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut handles = Vec::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '@' {
            let start = i;
            i += 1;
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '-') {
                i += 1;
            }
            if i > start + 1 {
                let handle: String = chars[start..i].iter().collect();
                if seen.insert(handle.clone()) {
                    handles.push(handle);
                }
            }
        } else {
            i += 1;
        }
    }
    handles
}

async fn recent_context(
    store: &Arc<dyn Store>,
    channel_id: Id,
    context_cleared_at: Option<DateTime<Utc>>,
    window: usize,
) -> Result<Vec<ChatMessage>, ConclaveError> {
    let messages = store.list_messages(channel_id, window).await?;
    let chat = messages
        .into_iter()
        .filter(|m| !m.metadata.streaming)
        .filter(|m| context_cleared_at.map(|cleared| m.created_at > cleared).unwrap_or(true))
        .map(|m| match m.author_kind {
            AuthorKind::User | AuthorKind::System => ChatMessage::user(m.content),
            AuthorKind::Agent => ChatMessage::assistant(m.content),
        })
        .collect();
    Ok(chat)
}

async fn handle_clear_context(state: &Arc<AppState>, payload: serde_json::Value) -> Result<(), ConclaveError> {
    let req: ClearContext = parse(payload)?;
    let mut channel = state.store.get_channel(req.channel_id).await?.ok_or_else(|| ConclaveError::not_found_channel(req.channel_id))?;
    channel.context_cleared_at = Some(Utc::now());
    channel.updated_at = Utc::now();
    state.store.update_channel(channel).await?;
    state.events.broadcast("context_cleared", json!({"channel_id": req.channel_id}), true, false).await?;
    Ok(())
}

async fn handle_workflow_plan(state: &Arc<AppState>, payload: serde_json::Value) -> Result<(), ConclaveError> {
    let req: WorkflowPlan = parse(payload)?;
    let agents = state.store.list_agents().await?;
    let orchestrator_agent = agents
        .iter()
        .find(|a| a.active && a.kind == AgentKind::Orchestrator)
        .cloned()
        .ok_or_else(|| ConclaveError::InvalidState("no active orchestrator agent is configured".to_string()))?;
    let participants: Vec<Agent> = agents.into_iter().filter(|a| a.active && a.id != orchestrator_agent.id).collect();

    state.orchestrator.plan(&orchestrator_agent, &participants, req.channel_id, &req.request).await?;
    Ok(())
}

async fn handle_workflow_start(state: &Arc<AppState>, payload: serde_json::Value) -> Result<(), ConclaveError> {
    let req: WorkflowStart = parse(payload)?;
    state.orchestrator.start(req.workflow_id).await
}

async fn handle_workflow_cancel(state: &Arc<AppState>, payload: serde_json::Value) -> Result<(), ConclaveError> {
    let req: WorkflowCancel = parse(payload)?;
    state.orchestrator.cancel(req.workflow_id).await
}

async fn handle_get_stats(state: &Arc<AppState>, session_id: Id) -> Result<(), ConclaveError> {
    let stats = state.events.get_stats();
    let cache_stats = state.cache.stats();
    let payload = json!({
        "total_messages": stats.total_messages,
        "original_bytes": stats.original_bytes,
        "optimized_bytes": stats.optimized_bytes,
        "compressed_count": stats.compressed_count,
        "reduction_percentage": stats.reduction_percentage,
        "dropped_events": stats.dropped,
        "cache": {
            "hits": cache_stats.hits,
            "misses": cache_stats.misses,
            "sets": cache_stats.sets,
            "deletes": cache_stats.deletes,
            "errors": cache_stats.errors,
            "hit_rate": cache_stats.hit_rate,
        },
    });
    state.events.unicast(session_id, "stats", payload, false).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_multiple_distinct_mentions_in_order() {
        let handles = mentioned_handles("@backend please loop in @qa-lead, thanks @backend");
        assert_eq!(handles, vec!["@backend".to_string(), "@qa-lead".to_string()]);
    }

    #[test]
    fn bare_at_sign_is_not_a_mention() {
        assert!(mentioned_handles("email me @ noon").is_empty());
    }

    #[test]
    fn mention_at_end_of_string_is_captured() {
        assert_eq!(mentioned_handles("ping @backend"), vec!["@backend".to_string()]);
    }
}
