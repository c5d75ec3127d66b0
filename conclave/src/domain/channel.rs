use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Id;

/// Stable identity for an ordered conversation stream. Archived but never
/// deleted while referenced by messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    pub id: Id,
    pub name: String,
    pub topic: Option<String>,
    pub archived: bool,
    /// Set by `clear_context`; messages created before this instant are
    /// excluded from future context windows but not deleted.
    pub context_cleared_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Channel {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Id::new(),
            name: name.into(),
            topic: None,
            archived: false,
            context_cleared_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}
