//! Time/size-bounded batching of non-critical events. The time
//! window itself is driven by the caller's own timer (the event hub, in the
//! runtime crate); this type only tracks the pending queue and the size cap.

use serde_json::{json, Value};

/// Flush when either fires first.
pub const BATCH_WINDOW_MS: u64 = 50;
pub const BATCH_MAX_SIZE: usize = 10;

#[derive(Debug, Default)]
pub struct Batcher {
    pending: Vec<(String, Value)>,
}

impl Batcher {
    pub fn new() -> Self {
        Self { pending: Vec::with_capacity(BATCH_MAX_SIZE) }
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Queue one event. Returns `true` if the size cap was hit and the
    /// caller should flush immediately rather than wait for the time window.
    pub fn push(&mut self, event_name: impl Into<String>, payload: Value) -> bool {
        self.pending.push((event_name.into(), payload));
        self.pending.len() >= BATCH_MAX_SIZE
    }

    /// Drain the queue into `{batch:true, messages:[{e,d}, ...]}`. Returns
    /// `None` if nothing was pending.
    pub fn flush(&mut self) -> Option<Value> {
        if self.pending.is_empty() {
            return None;
        }
        let messages: Vec<Value> =
            self.pending.drain(..).map(|(e, d)| json!({"e": e, "d": d})).collect();
        Some(json!({"batch": true, "messages": messages}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flush_on_empty_batcher_returns_none() {
        let mut batcher = Batcher::new();
        assert!(batcher.flush().is_none());
    }

    #[test]
    fn push_signals_flush_at_size_cap() {
        let mut batcher = Batcher::new();
        for i in 0..BATCH_MAX_SIZE - 1 {
            assert!(!batcher.push("agent_status", json!({"i": i})));
        }
        assert!(batcher.push("agent_status", json!({"i": BATCH_MAX_SIZE - 1})));
    }

    #[test]
    fn flush_drains_pending_into_one_frame() {
        let mut batcher = Batcher::new();
        batcher.push("agent_status", json!({"handle": "@backend"}));
        batcher.push("user_typing", json!({"channel_id": "c-1"}));
        let frame = batcher.flush().unwrap();
        assert_eq!(frame["batch"], true);
        assert_eq!(frame["messages"].as_array().unwrap().len(), 2);
        assert!(batcher.is_empty());
    }
}
