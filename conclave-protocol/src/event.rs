//! Names of events the hub produces and whether they may be batched.

/// Events that must never be folded into a batch frame.
const CRITICAL_EVENTS: &[&str] = &[
    "connection_established",
    "message_new",
    "message_stream",
    "message_update",
    "context_cleared",
    "workflow:completed",
    "workflow:failed",
];

/// `true` for any event name the hub must deliver immediately rather than
/// queue into a batch. Anything starting with `error` is treated as
/// critical too, matching the "errors" entry in the critical-event table.
pub fn is_critical(event_name: &str) -> bool {
    CRITICAL_EVENTS.contains(&event_name) || event_name.starts_with("error")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_new_is_critical() {
        assert!(is_critical("message_new"));
    }

    #[test]
    fn agent_status_is_not_critical() {
        assert!(!is_critical("agent_status"));
    }

    #[test]
    fn workflow_progress_is_not_critical_but_completed_is() {
        assert!(!is_critical("workflow:progress"));
        assert!(is_critical("workflow:completed"));
        assert!(is_critical("workflow:failed"));
    }

    #[test]
    fn error_prefixed_events_are_critical() {
        assert!(is_critical("error_invalid_request"));
    }
}
