//! The payload codec applied at the event hub boundary: field abbreviation,
//! timestamp compaction, and optional gzip.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::sync::OnceLock;

use chrono::{DateTime, TimeZone, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::{Map, Value};

use crate::envelope::Envelope;

/// Payloads larger than this (post-abbreviation, serialized) are considered
/// for gzip.
pub const COMPRESSION_THRESHOLD_BYTES: usize = 10 * 1024;
/// Compression is only applied if it shrinks the payload by at least this much.
pub const MIN_REDUCTION_RATIO: f64 = 0.10;
const GZIP_LEVEL: u32 = 6;

#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("serialize: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("compress: {0}")]
    Compress(std::io::Error),
    #[error("decompress: {0}")]
    Decompress(std::io::Error),
    #[error("frame did not contain a valid envelope")]
    MalformedFrame,
}

/// A fully-encoded event ready to hand to the transport. `Binary` carries a
/// gzip-compressed, UTF-8-free envelope; `Text` carries plain JSON.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Text(String),
    Binary(Vec<u8>),
}

/// Long field name <-> abbreviation. Applied recursively to object keys.
const FIELD_TABLE: &[(&str, &str)] = &[
    ("message_id", "mid"),
    ("channel_id", "cid"),
    ("workflow_id", "wid"),
    ("task_id", "tid"),
    ("agent_id", "agid"),
    ("session_id", "sid"),
    ("author_id", "aid"),
    ("author_name", "an"),
    ("author_kind", "ak"),
    ("content", "c"),
    ("created_at", "ts"),
    ("started_at", "sts"),
    ("completed_at", "cts"),
    ("updated_at", "uts"),
    ("metadata", "m"),
    ("status", "st"),
    ("description", "desc"),
    ("handle", "h"),
    ("capabilities", "caps"),
    ("is_final", "fin"),
    ("chunk", "ch"),
    ("reply_to", "rt"),
    ("streaming", "strm"),
    ("truncated", "trn"),
    ("provider", "p"),
    ("model", "mo"),
    ("percentage", "pct"),
    ("error", "err"),
    ("notice", "nt"),
    ("cancelled", "cxl"),
];

/// Keys whose string values are ISO-8601 timestamps, compacted to integer
/// milliseconds since the epoch by the codec.
const TIMESTAMP_KEYS: &[&str] = &["created_at", "started_at", "completed_at", "updated_at"];

fn forward_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| FIELD_TABLE.iter().copied().collect())
}

fn backward_table() -> &'static HashMap<&'static str, &'static str> {
    static TABLE: OnceLock<HashMap<&'static str, &'static str>> = OnceLock::new();
    TABLE.get_or_init(|| FIELD_TABLE.iter().map(|&(long, short)| (short, long)).collect())
}

fn timestamp_to_millis(value: &Value) -> Option<Value> {
    let s = value.as_str()?;
    let parsed: DateTime<Utc> = DateTime::parse_from_rfc3339(s).ok()?.with_timezone(&Utc);
    Some(Value::from(parsed.timestamp_millis()))
}

fn millis_to_timestamp(value: &Value) -> Option<Value> {
    let millis = value.as_i64()?;
    let dt = Utc.timestamp_millis_opt(millis).single()?;
    Some(Value::from(dt.to_rfc3339()))
}

/// Recursively rewrite object keys to their abbreviation and compact
/// recognized timestamp fields to integer milliseconds.
pub fn abbreviate(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, v) in map {
                let short = forward_table().get(key.as_str()).copied().unwrap_or(key.as_str());
                let v = if TIMESTAMP_KEYS.contains(&key.as_str()) {
                    timestamp_to_millis(v).unwrap_or_else(|| abbreviate(v))
                } else {
                    abbreviate(v)
                };
                out.insert(short.to_string(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(abbreviate).collect()),
        other => other.clone(),
    }
}

/// Inverse of [`abbreviate`]: expand short keys back to their long form and
/// restore millisecond timestamps to ISO-8601 strings.
pub fn expand(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut out = Map::with_capacity(map.len());
            for (key, v) in map {
                let long = backward_table().get(key.as_str()).copied().unwrap_or(key.as_str());
                let v = if TIMESTAMP_KEYS.contains(&long) {
                    millis_to_timestamp(v).unwrap_or_else(|| expand(v))
                } else {
                    expand(v)
                };
                out.insert(long.to_string(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(expand).collect()),
        other => other.clone(),
    }
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::new(GZIP_LEVEL));
    encoder.write_all(bytes).map_err(CodecError::Compress)?;
    encoder.finish().map_err(CodecError::Compress)
}

fn gunzip(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut decoder = GzDecoder::new(bytes);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(CodecError::Decompress)?;
    Ok(out)
}

/// Result of encoding one event, carrying the byte counts needed for
/// [`crate::CodecStats`].
pub struct Encoded {
    pub frame: Frame,
    pub original_bytes: usize,
    pub optimized_bytes: usize,
    pub compressed: bool,
}

/// Build the wire frame for `event_name`/`payload`. When `optimize` is
/// false the envelope is abbreviated but never compressed, matching events
/// sent to legacy decoders that asked for the raw shape.
pub fn encode(event_name: &str, payload: &Value, optimize: bool) -> Result<Encoded, CodecError> {
    let original = serde_json::to_vec(&Envelope::new(event_name, payload.clone()))?;
    let original_bytes = original.len();

    let d = if optimize { abbreviate(payload) } else { payload.clone() };
    let envelope = Envelope::new(event_name, d);
    let json_bytes = serde_json::to_vec(&envelope)?;

    if optimize && json_bytes.len() > COMPRESSION_THRESHOLD_BYTES {
        let compressed = gzip(&json_bytes)?;
        let reduction = 1.0 - (compressed.len() as f64 / json_bytes.len() as f64);
        if reduction >= MIN_REDUCTION_RATIO {
            return Ok(Encoded {
                original_bytes,
                optimized_bytes: compressed.len(),
                compressed: true,
                frame: Frame::Binary(compressed),
            });
        }
    }

    Ok(Encoded {
        original_bytes,
        optimized_bytes: json_bytes.len(),
        compressed: false,
        frame: Frame::Text(String::from_utf8(json_bytes).expect("serde_json emits valid UTF-8")),
    })
}

/// Recover `(event_name, payload)` from a frame produced by [`encode`].
pub fn decode(frame: &Frame) -> Result<(String, Value), CodecError> {
    let bytes = match frame {
        Frame::Text(s) => s.as_bytes().to_vec(),
        Frame::Binary(b) => gunzip(b)?,
    };
    let envelope: Envelope = serde_json::from_slice(&bytes).map_err(|_| CodecError::MalformedFrame)?;
    Ok((envelope.e, expand(&envelope.d)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn abbreviate_then_expand_round_trips() {
        let original = json!({
            "message_id": "m-1",
            "channel_id": "c-1",
            "content": "hello",
            "metadata": {"streaming": true},
        });
        let abbreviated = abbreviate(&original);
        assert_eq!(abbreviated["mid"], "m-1");
        assert_eq!(abbreviated["c"], "hello");
        assert_eq!(expand(&abbreviated), original);
    }

    #[test]
    fn timestamp_fields_compact_to_millis_and_back() {
        let original = json!({"created_at": "2024-01-01T00:00:00Z"});
        let abbreviated = abbreviate(&original);
        assert!(abbreviated["ts"].is_i64());
        let restored = expand(&abbreviated);
        assert_eq!(restored["created_at"], "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn unknown_fields_pass_through_unchanged() {
        let original = json!({"custom_field": 42});
        assert_eq!(abbreviate(&original), original);
    }

    #[test]
    fn small_payload_encodes_as_text() {
        let encoded = encode("message_new", &json!({"content": "hi"}), true).unwrap();
        assert!(matches!(encoded.frame, Frame::Text(_)));
        assert!(!encoded.compressed);
    }

    #[test]
    fn encode_decode_round_trips() {
        let payload = json!({"channel_id": "c-1", "content": "hello there"});
        let encoded = encode("message_new", &payload, true).unwrap();
        let (event_name, decoded_payload) = decode(&encoded.frame).unwrap();
        assert_eq!(event_name, "message_new");
        assert_eq!(decoded_payload, payload);
    }

    #[test]
    fn large_repetitive_payload_compresses_and_round_trips() {
        let content = "x".repeat(20_000);
        let payload = json!({"content": content});
        let encoded = encode("message_new", &payload, true).unwrap();
        assert!(encoded.compressed);
        assert!(matches!(encoded.frame, Frame::Binary(_)));
        let (_, decoded_payload) = decode(&encoded.frame).unwrap();
        assert_eq!(decoded_payload, payload);
    }

    #[test]
    fn unoptimized_encode_never_compresses() {
        let content = "x".repeat(20_000);
        let payload = json!({"content": content});
        let encoded = encode("message_new", &payload, false).unwrap();
        assert!(!encoded.compressed);
    }
}
