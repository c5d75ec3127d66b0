//! The small envelope every event is wrapped in before it reaches the wire:
//! `{e: event_name, d: payload, _v: codec_version}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bumped whenever the field-abbreviation table changes shape, so a client
/// built against an older mapping can detect the mismatch instead of
/// silently misreading fields.
pub const CODEC_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope {
    pub e: String,
    pub d: Value,
    #[serde(rename = "_v")]
    pub v: u32,
}

impl Envelope {
    pub fn new(event_name: impl Into<String>, payload: Value) -> Self {
        Self { e: event_name.into(), d: payload, v: CODEC_VERSION }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_abbreviated_keys() {
        let envelope = Envelope::new("message_new", json!({"content": "hi"}));
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["e"], "message_new");
        assert_eq!(value["_v"], CODEC_VERSION);
    }

    #[test]
    fn round_trips_through_json() {
        let envelope = Envelope::new("agent_status", json!({"handle": "@backend"}));
        let bytes = serde_json::to_vec(&envelope).unwrap();
        let decoded: Envelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, envelope);
    }
}
