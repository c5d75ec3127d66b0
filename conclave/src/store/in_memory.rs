use async_trait::async_trait;
use dashmap::DashMap;

use crate::domain::{Agent, AgentTemplate, Channel, Id, Message, Workflow};

use super::{Store, StoreError};

/// Concurrent in-memory backend, used in tests and as the default for
/// local/dev runs (grounded on `memory::in_memory_vector_store`'s
/// `DashMap`-per-collection pattern).
#[derive(Default)]
pub struct InMemoryStore {
    channels: DashMap<Id, Channel>,
    agents: DashMap<Id, Agent>,
    templates: DashMap<Id, AgentTemplate>,
    messages: DashMap<Id, Message>,
    workflows: DashMap<Id, Workflow>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_channel(&self, channel: Channel) -> Result<(), StoreError> {
        self.channels.insert(channel.id, channel);
        Ok(())
    }

    async fn get_channel(&self, id: Id) -> Result<Option<Channel>, StoreError> {
        Ok(self.channels.get(&id).map(|c| c.clone()))
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, StoreError> {
        Ok(self.channels.iter().map(|c| c.clone()).collect())
    }

    async fn update_channel(&self, channel: Channel) -> Result<(), StoreError> {
        self.channels.insert(channel.id, channel);
        Ok(())
    }

    async fn create_agent(&self, agent: Agent) -> Result<(), StoreError> {
        self.agents.insert(agent.id, agent);
        Ok(())
    }

    async fn get_agent(&self, id: Id) -> Result<Option<Agent>, StoreError> {
        Ok(self.agents.get(&id).map(|a| a.clone()))
    }

    async fn get_agent_by_handle(&self, handle: &str) -> Result<Option<Agent>, StoreError> {
        Ok(self.agents.iter().find(|a| a.handle == handle).map(|a| a.clone()))
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        Ok(self.agents.iter().map(|a| a.clone()).collect())
    }

    async fn update_agent(&self, agent: Agent) -> Result<(), StoreError> {
        self.agents.insert(agent.id, agent);
        Ok(())
    }

    async fn create_template(&self, template: AgentTemplate) -> Result<(), StoreError> {
        self.templates.insert(template.id, template);
        Ok(())
    }

    async fn get_template(&self, id: Id) -> Result<Option<AgentTemplate>, StoreError> {
        Ok(self.templates.get(&id).map(|t| t.clone()))
    }

    async fn list_templates(&self) -> Result<Vec<AgentTemplate>, StoreError> {
        Ok(self.templates.iter().map(|t| t.clone()).collect())
    }

    async fn insert_message(&self, message: Message) -> Result<(), StoreError> {
        self.messages.insert(message.id, message);
        Ok(())
    }

    async fn replace_message(&self, message: Message) -> Result<(), StoreError> {
        self.messages.insert(message.id, message);
        Ok(())
    }

    async fn get_message(&self, id: Id) -> Result<Option<Message>, StoreError> {
        Ok(self.messages.get(&id).map(|m| m.clone()))
    }

    async fn list_messages(&self, channel_id: Id, limit: usize) -> Result<Vec<Message>, StoreError> {
        let mut messages: Vec<Message> =
            self.messages.iter().filter(|m| m.channel_id == channel_id).map(|m| m.clone()).collect();
        messages.sort_by_key(|m| m.created_at);
        if messages.len() > limit {
            let start = messages.len() - limit;
            messages = messages.split_off(start);
        }
        Ok(messages)
    }

    async fn count_messages(&self, channel_id: Id) -> Result<usize, StoreError> {
        Ok(self.messages.iter().filter(|m| m.channel_id == channel_id).count())
    }

    async fn create_workflow(&self, workflow: Workflow) -> Result<(), StoreError> {
        self.workflows.insert(workflow.id, workflow);
        Ok(())
    }

    async fn get_workflow(&self, id: Id) -> Result<Option<Workflow>, StoreError> {
        Ok(self.workflows.get(&id).map(|w| w.clone()))
    }

    async fn update_workflow(&self, workflow: Workflow) -> Result<(), StoreError> {
        self.workflows.insert(workflow.id, workflow);
        Ok(())
    }

    async fn list_workflows(&self, channel_id: Id) -> Result<Vec<Workflow>, StoreError> {
        Ok(self.workflows.iter().filter(|w| w.channel_id == channel_id).map(|w| w.clone()).collect())
    }
}
