//! Persistence for the entities in the data model, behind a trait object so
//! the runtime is agnostic to which backend is wired in: trait + in-memory
//! + sqlite implementations.

mod cached;
mod error;
mod in_memory;
mod sqlite;

pub use cached::CachedStore;
pub use error::StoreError;
pub use in_memory::InMemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::domain::{Agent, AgentTemplate, Channel, Id, Message, Workflow};

#[async_trait]
pub trait Store: Send + Sync {
    async fn create_channel(&self, channel: Channel) -> Result<(), StoreError>;
    async fn get_channel(&self, id: Id) -> Result<Option<Channel>, StoreError>;
    async fn list_channels(&self) -> Result<Vec<Channel>, StoreError>;
    async fn update_channel(&self, channel: Channel) -> Result<(), StoreError>;

    async fn create_agent(&self, agent: Agent) -> Result<(), StoreError>;
    async fn get_agent(&self, id: Id) -> Result<Option<Agent>, StoreError>;
    async fn get_agent_by_handle(&self, handle: &str) -> Result<Option<Agent>, StoreError>;
    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError>;
    async fn update_agent(&self, agent: Agent) -> Result<(), StoreError>;

    async fn create_template(&self, template: AgentTemplate) -> Result<(), StoreError>;
    async fn get_template(&self, id: Id) -> Result<Option<AgentTemplate>, StoreError>;
    async fn list_templates(&self) -> Result<Vec<AgentTemplate>, StoreError>;

    async fn insert_message(&self, message: Message) -> Result<(), StoreError>;
    async fn replace_message(&self, message: Message) -> Result<(), StoreError>;
    async fn get_message(&self, id: Id) -> Result<Option<Message>, StoreError>;
    async fn list_messages(&self, channel_id: Id, limit: usize) -> Result<Vec<Message>, StoreError>;
    async fn count_messages(&self, channel_id: Id) -> Result<usize, StoreError>;

    async fn create_workflow(&self, workflow: Workflow) -> Result<(), StoreError>;
    async fn get_workflow(&self, id: Id) -> Result<Option<Workflow>, StoreError>;
    async fn update_workflow(&self, workflow: Workflow) -> Result<(), StoreError>;
    async fn list_workflows(&self, channel_id: Id) -> Result<Vec<Workflow>, StoreError>;
}
