use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryKind {
    Conversation,
    Decision,
    Entity,
    Summary,
    ToolUse,
}

/// A retrievable fragment owned by (agent, channel). Never deleted while
/// `importance >= 9`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: Id,
    pub agent_id: Id,
    pub channel_id: Id,
    pub kind: MemoryKind,
    pub content: String,
    pub embedding: Vec<f32>,
    pub importance: u8,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub last_accessed_at: DateTime<Utc>,
    pub access_count: u64,
}

/// Records at or above this importance are pinned and never evicted.
pub const PINNED_IMPORTANCE: u8 = 9;

impl MemoryRecord {
    pub fn new(agent_id: Id, channel_id: Id, kind: MemoryKind, content: impl Into<String>, embedding: Vec<f32>, importance: u8) -> Self {
        let now = Utc::now();
        Self {
            id: Id::new(),
            agent_id,
            channel_id,
            kind,
            content: content.into(),
            embedding,
            importance: importance.clamp(1, 10),
            metadata: serde_json::Value::Null,
            created_at: now,
            last_accessed_at: now,
            access_count: 0,
        }
    }

    pub fn is_pinned(&self) -> bool {
        self.importance >= PINNED_IMPORTANCE
    }

    pub fn touch(&mut self) {
        self.last_accessed_at = Utc::now();
        self.access_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn importance_at_nine_is_pinned() {
        let record = MemoryRecord::new(Id::new(), Id::new(), MemoryKind::Decision, "chose postgres", vec![0.1], 9);
        assert!(record.is_pinned());
    }

    #[test]
    fn importance_below_nine_is_not_pinned() {
        let record = MemoryRecord::new(Id::new(), Id::new(), MemoryKind::Conversation, "said hi", vec![0.1], 3);
        assert!(!record.is_pinned());
    }

    #[test]
    fn touch_increments_access_count() {
        let mut record = MemoryRecord::new(Id::new(), Id::new(), MemoryKind::Entity, "JWT", vec![0.1], 5);
        record.touch();
        record.touch();
        assert_eq!(record.access_count, 2);
    }
}
