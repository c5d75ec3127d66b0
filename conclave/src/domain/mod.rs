//! The data model: channels, agents, templates, messages, workflows,
//! workflow tasks, and agent memory records. Every type here is
//! plain data; behavior (persistence, scheduling, retrieval) lives in the
//! sibling modules that operate on it.

mod agent;
mod channel;
mod memory_record;
mod message;
mod workflow;

pub use agent::{Agent, AgentConfig, AgentKind, AgentPersona, AgentTemplate, TemplateType};
pub use channel::Channel;
pub use memory_record::{MemoryKind, MemoryRecord};
pub use message::{AuthorKind, Message, MessageMetadata, MAX_CONTENT_CHARS};
pub use workflow::{descendants_of, is_acyclic, ready_task_ids, Workflow, WorkflowStatus, WorkflowTask, WorkflowTaskStatus};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque 128-bit identifier shared by every entity in the data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Id {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl From<Uuid> for Id {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}
