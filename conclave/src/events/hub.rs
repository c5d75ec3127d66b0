use std::sync::Mutex;
use std::time::Duration;

use conclave_protocol::{codec, is_critical, Batcher, CodecStats, Frame};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::domain::Id;

use super::error::EventHubError;
use super::session::Session;

/// How long a critical-event send is allowed to block on a full outbox
/// before the session is dropped. Non-critical events never wait this long;
/// they're dropped immediately instead (see `deliver`).
const CRITICAL_SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Binds to a single bidirectional transport and fans events out to
/// connected sessions: a registry of many sessions so `broadcast`/`unicast`
/// have somewhere to fan out to; the codec, envelope, and batching types
/// come straight from `conclave_protocol`.
pub struct EventHub {
    sessions: DashMap<Id, Session>,
    stats: Mutex<CodecStats>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHub {
    pub fn new() -> Self {
        Self { sessions: DashMap::new(), stats: Mutex::new(CodecStats::new()) }
    }

    /// Registers a new session. Returns the assigned session id. The 50 ms
    /// batch window is driven externally by a single ticker calling
    /// [`EventHub::flush_all_batches`] — see that method's doc.
    pub fn register_session(&self, tx: mpsc::Sender<Frame>) -> Id {
        let session_id = Id::new();
        let session = Session { tx, batcher: Mutex::new(Batcher::new()), channel_ids: Mutex::new(std::collections::HashSet::new()) };
        self.sessions.insert(session_id, session);
        session_id
    }

    pub fn deregister_session(&self, session_id: Id) {
        self.sessions.remove(&session_id);
    }

    /// Implicit subscription: a session participating in a channel receives
    /// everything broadcast for it.
    pub fn subscribe_channel(&self, session_id: Id, channel_id: Id) {
        if let Some(session) = self.sessions.get(&session_id) {
            session.channel_ids.lock().unwrap().insert(channel_id);
        }
    }

    pub fn live_session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Deliver to every live session. Critical events are never batched
    /// regardless of `batch`.
    pub async fn broadcast(&self, event_name: &str, payload: Value, optimize: bool, batch: bool) -> Result<(), EventHubError> {
        let session_ids: Vec<Id> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for session_id in session_ids {
            self.deliver(session_id, event_name, payload.clone(), optimize, batch && !is_critical(event_name)).await?;
        }
        Ok(())
    }

    pub async fn unicast(&self, session_id: Id, event_name: &str, payload: Value, optimize: bool) -> Result<(), EventHubError> {
        self.deliver(session_id, event_name, payload, optimize, false).await
    }

    async fn deliver(&self, session_id: Id, event_name: &str, payload: Value, optimize: bool, batch: bool) -> Result<(), EventHubError> {
        let Some(session) = self.sessions.get(&session_id) else {
            return Err(EventHubError::SessionNotFound(session_id));
        };

        if batch {
            let should_flush = session.batcher.lock().unwrap().push(event_name, payload);
            drop(session);
            if should_flush {
                self.flush_session(session_id).await?;
            }
            return Ok(());
        }

        let tx = session.tx.clone();
        drop(session);

        let encoded = codec::encode(event_name, &payload, optimize)?;
        self.stats.lock().unwrap().record(encoded.original_bytes, encoded.optimized_bytes, encoded.compressed);
        self.send_or_drop(session_id, tx, encoded.frame, is_critical(event_name)).await;
        Ok(())
    }

    async fn flush_session(&self, session_id: Id) -> Result<(), EventHubError> {
        let Some(session) = self.sessions.get(&session_id) else {
            return Err(EventHubError::SessionNotFound(session_id));
        };
        let batch_payload = session.batcher.lock().unwrap().flush();
        let tx = session.tx.clone();
        drop(session);
        let Some(batch_payload) = batch_payload else { return Ok(()) };
        let encoded = codec::encode("batch", &batch_payload, false)?;
        self.stats.lock().unwrap().record(encoded.original_bytes, encoded.optimized_bytes, encoded.compressed);
        // Batched frames are never critical (critical events bypass batching
        // entirely in `broadcast`), so a full outbox just drops this batch.
        self.send_or_drop(session_id, tx, encoded.frame, false).await;
        Ok(())
    }

    /// Non-critical sends drop immediately (and count it) rather than block
    /// on a full outbox. Critical sends block up to `CRITICAL_SEND_TIMEOUT`;
    /// past that, the session is disconnected rather than stalling the hub.
    async fn send_or_drop(&self, session_id: Id, tx: mpsc::Sender<Frame>, frame: Frame, critical: bool) {
        if !critical {
            if tx.try_send(frame).is_err() {
                self.stats.lock().unwrap().record_dropped();
            }
            return;
        }

        match tokio::time::timeout(CRITICAL_SEND_TIMEOUT, tx.send(frame)).await {
            Ok(Ok(())) => {}
            _ => {
                tracing::warn!(%session_id, "critical send blocked past the bounded window, disconnecting session");
                self.sessions.remove(&session_id);
            }
        }
    }

    /// Flush every session's pending batch, regardless of whether the size
    /// cap has been hit (a 50 ms time window or a 10-message size cap,
    /// whichever fires first). Intended to be called by a single
    /// external 50 ms ticker owned by the frontend, so one timer drives every
    /// session's window instead of one task per session.
    pub async fn flush_all_batches(&self) -> Result<(), EventHubError> {
        let session_ids: Vec<Id> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for session_id in session_ids {
            self.flush_session(session_id).await?;
        }
        Ok(())
    }

    pub fn get_stats(&self) -> conclave_protocol::stats::StatsSnapshot {
        self.stats.lock().unwrap().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conclave_protocol::BATCH_MAX_SIZE;
    use serde_json::json;

    fn register(hub: &EventHub) -> (Id, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(32);
        (hub.register_session(tx), rx)
    }

    #[tokio::test]
    async fn broadcast_reaches_every_live_session() {
        let hub = EventHub::new();
        let (_id_a, mut rx_a) = register(&hub);
        let (_id_b, mut rx_b) = register(&hub);

        hub.broadcast("message_new", json!({"content": "hi"}), true, false).await.unwrap();

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn unicast_only_reaches_the_named_session() {
        let hub = EventHub::new();
        let (id_a, mut rx_a) = register(&hub);
        let (_id_b, mut rx_b) = register(&hub);

        hub.unicast(id_a, "clear_context", json!({}), false).await.unwrap();

        assert!(rx_a.recv().await.is_some());
        rx_b.close();
        assert!(rx_b.recv().await.is_none());
    }

    #[tokio::test]
    async fn unicast_to_unknown_session_errors() {
        let hub = EventHub::new();
        let result = hub.unicast(Id::new(), "clear_context", json!({}), false).await;
        assert!(matches!(result, Err(EventHubError::SessionNotFound(_))));
    }

    #[tokio::test]
    async fn batched_events_wait_for_an_explicit_flush() {
        let hub = EventHub::new();
        let (id, mut rx) = register(&hub);

        hub.unicast(id, "agent_status", json!({"i": 0}), false).await.unwrap();
        hub.broadcast("agent_status", json!({"i": 1}), false, true).await.unwrap();
        assert!(rx.try_recv().is_err());

        hub.flush_all_batches().await.unwrap();
        let frame = rx.recv().await.unwrap();
        let (event_name, payload) = codec::decode(&frame).unwrap();
        assert_eq!(event_name, "batch");
        assert_eq!(payload["messages"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn batch_flushes_automatically_once_the_size_cap_is_hit() {
        let hub = EventHub::new();
        let (_id, mut rx) = register(&hub);
        for i in 0..BATCH_MAX_SIZE {
            hub.broadcast("agent_status", json!({"i": i}), false, true).await.unwrap();
        }
        let frame = rx.recv().await.unwrap();
        let (event_name, payload) = codec::decode(&frame).unwrap();
        assert_eq!(event_name, "batch");
        assert_eq!(payload["messages"].as_array().unwrap().len(), BATCH_MAX_SIZE);
    }

    #[tokio::test]
    async fn critical_events_bypass_batching_even_when_requested() {
        let hub = EventHub::new();
        let (id, mut rx) = register(&hub);

        hub.broadcast("error", json!({"error": "boom"}), false, true).await.unwrap();
        let frame = rx.recv().await.unwrap();
        let (event_name, _) = codec::decode(&frame).unwrap();
        assert_eq!(event_name, "error");

        let _ = id;
    }

    #[tokio::test]
    async fn a_full_outbox_drops_non_critical_events_and_counts_them() {
        let hub = EventHub::new();
        let (tx, rx) = mpsc::channel(1);
        let session_id = hub.register_session(tx);

        // Fill the one outbox slot, then try to push a second non-critical
        // event with nothing draining the channel.
        hub.unicast(session_id, "agent_status", json!({"i": 0}), false).await.unwrap();
        hub.unicast(session_id, "agent_status", json!({"i": 1}), false).await.unwrap();

        assert_eq!(hub.get_stats().dropped, 1);
        assert_eq!(hub.live_session_count(), 1);
        let _ = rx;
    }

    #[tokio::test]
    async fn get_stats_reflects_sent_messages() {
        let hub = EventHub::new();
        let (id, _rx) = register(&hub);
        hub.unicast(id, "clear_context", json!({}), false).await.unwrap();
        assert_eq!(hub.get_stats().total_messages, 1);
    }

    #[tokio::test]
    async fn deregistering_a_session_stops_further_delivery() {
        let hub = EventHub::new();
        let (id, _rx) = register(&hub);
        assert_eq!(hub.live_session_count(), 1);
        hub.deregister_session(id);
        assert_eq!(hub.live_session_count(), 0);
        assert!(hub.unicast(id, "clear_context", json!({}), false).await.is_err());
    }
}
