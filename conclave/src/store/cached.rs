use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::Cache;
use crate::domain::{Agent, AgentTemplate, Channel, Id, Message, Workflow};

use super::{Store, StoreError};

const NS_AGENT_CONFIG: &str = "agent_config";
const NS_AGENT_LIST: &str = "agent_list";
const NS_CHANNEL_METADATA: &str = "channel_metadata";
const NS_WORKFLOW_STATUS: &str = "workflow_status";
const NS_MESSAGE_COUNTS: &str = "message_counts";

const AGENT_LIST_KEY: &str = "all";

/// Read-through cache wrapper over a `Store`: checks the cache first for the
/// namespaces that are actually hot (per-id agent/channel/workflow lookups,
/// the agent list, and per-channel message counts), falls through to the
/// inner store on a miss, and applies the invalidation discipline on every
/// write (commit to the store, then delete the specific key, then delete
/// enumerated dependent patterns). Cache failures are logged and otherwise
/// ignored — the inner store is always the source of truth.
pub struct CachedStore {
    inner: Arc<dyn Store>,
    cache: Arc<dyn Cache>,
}

impl CachedStore {
    pub fn new(inner: Arc<dyn Store>, cache: Arc<dyn Cache>) -> Self {
        Self { inner, cache }
    }

    async fn cached_get<T, F>(&self, namespace: &str, key: &str, fetch: F) -> Result<Option<T>, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: std::future::Future<Output = Result<Option<T>, StoreError>>,
    {
        match self.cache.get(namespace, key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(decoded) => return Ok(Some(decoded)),
                Err(err) => tracing::warn!(%err, namespace, key, "cached value failed to decode, falling through"),
            },
            Ok(None) => {}
            Err(err) => tracing::warn!(%err, namespace, key, "cache get failed, falling through to store"),
        }

        let fetched = fetch.await?;
        if let Some(value) = &fetched {
            if let Ok(encoded) = serde_json::to_value(value) {
                if let Err(err) = self.cache.set(namespace, key, encoded, None).await {
                    tracing::warn!(%err, namespace, key, "cache set failed");
                }
            }
        }
        Ok(fetched)
    }

    async fn cached_value<T, F>(&self, namespace: &str, key: &str, fetch: F) -> Result<T, StoreError>
    where
        T: Serialize + DeserializeOwned,
        F: std::future::Future<Output = Result<T, StoreError>>,
    {
        match self.cache.get(namespace, key).await {
            Ok(Some(value)) => match serde_json::from_value(value) {
                Ok(decoded) => return Ok(decoded),
                Err(err) => tracing::warn!(%err, namespace, key, "cached value failed to decode, falling through"),
            },
            Ok(None) => {}
            Err(err) => tracing::warn!(%err, namespace, key, "cache get failed, falling through to store"),
        }

        let fetched = fetch.await?;
        if let Ok(encoded) = serde_json::to_value(&fetched) {
            if let Err(err) = self.cache.set(namespace, key, encoded, None).await {
                tracing::warn!(%err, namespace, key, "cache set failed");
            }
        }
        Ok(fetched)
    }

    async fn invalidate(&self, namespace: &str, key: &str) {
        if let Err(err) = self.cache.delete(namespace, key).await {
            tracing::warn!(%err, namespace, key, "cache invalidation failed");
        }
    }

    async fn invalidate_pattern(&self, namespace: &str, glob: &str) {
        if let Err(err) = self.cache.delete_pattern(namespace, glob).await {
            tracing::warn!(%err, namespace, glob, "cache pattern invalidation failed");
        }
    }
}

#[async_trait]
impl Store for CachedStore {
    async fn create_channel(&self, channel: Channel) -> Result<(), StoreError> {
        let id = channel.id;
        self.inner.create_channel(channel).await?;
        self.invalidate(NS_CHANNEL_METADATA, &id.to_string()).await;
        Ok(())
    }

    async fn get_channel(&self, id: Id) -> Result<Option<Channel>, StoreError> {
        self.cached_get(NS_CHANNEL_METADATA, &id.to_string(), self.inner.get_channel(id)).await
    }

    async fn list_channels(&self) -> Result<Vec<Channel>, StoreError> {
        self.inner.list_channels().await
    }

    async fn update_channel(&self, channel: Channel) -> Result<(), StoreError> {
        let id = channel.id;
        self.inner.update_channel(channel).await?;
        self.invalidate(NS_CHANNEL_METADATA, &id.to_string()).await;
        Ok(())
    }

    async fn create_agent(&self, agent: Agent) -> Result<(), StoreError> {
        let id = agent.id;
        self.inner.create_agent(agent).await?;
        self.invalidate(NS_AGENT_CONFIG, &id.to_string()).await;
        self.invalidate_pattern(NS_AGENT_LIST, "*").await;
        Ok(())
    }

    async fn get_agent(&self, id: Id) -> Result<Option<Agent>, StoreError> {
        self.cached_get(NS_AGENT_CONFIG, &id.to_string(), self.inner.get_agent(id)).await
    }

    async fn get_agent_by_handle(&self, handle: &str) -> Result<Option<Agent>, StoreError> {
        self.inner.get_agent_by_handle(handle).await
    }

    async fn list_agents(&self) -> Result<Vec<Agent>, StoreError> {
        self.cached_value(NS_AGENT_LIST, AGENT_LIST_KEY, self.inner.list_agents()).await
    }

    async fn update_agent(&self, agent: Agent) -> Result<(), StoreError> {
        let id = agent.id;
        self.inner.update_agent(agent).await?;
        self.invalidate(NS_AGENT_CONFIG, &id.to_string()).await;
        self.invalidate_pattern(NS_AGENT_LIST, "*").await;
        Ok(())
    }

    async fn create_template(&self, template: AgentTemplate) -> Result<(), StoreError> {
        self.inner.create_template(template).await
    }

    async fn get_template(&self, id: Id) -> Result<Option<AgentTemplate>, StoreError> {
        self.inner.get_template(id).await
    }

    async fn list_templates(&self) -> Result<Vec<AgentTemplate>, StoreError> {
        self.inner.list_templates().await
    }

    async fn insert_message(&self, message: Message) -> Result<(), StoreError> {
        let channel_id = message.channel_id;
        self.inner.insert_message(message).await?;
        self.invalidate(NS_MESSAGE_COUNTS, &channel_id.to_string()).await;
        Ok(())
    }

    async fn replace_message(&self, message: Message) -> Result<(), StoreError> {
        self.inner.replace_message(message).await
    }

    async fn get_message(&self, id: Id) -> Result<Option<Message>, StoreError> {
        self.inner.get_message(id).await
    }

    async fn list_messages(&self, channel_id: Id, limit: usize) -> Result<Vec<Message>, StoreError> {
        self.inner.list_messages(channel_id, limit).await
    }

    async fn count_messages(&self, channel_id: Id) -> Result<usize, StoreError> {
        self.cached_value(NS_MESSAGE_COUNTS, &channel_id.to_string(), self.inner.count_messages(channel_id)).await
    }

    async fn create_workflow(&self, workflow: Workflow) -> Result<(), StoreError> {
        let id = workflow.id;
        self.inner.create_workflow(workflow).await?;
        self.invalidate(NS_WORKFLOW_STATUS, &id.to_string()).await;
        Ok(())
    }

    async fn get_workflow(&self, id: Id) -> Result<Option<Workflow>, StoreError> {
        self.cached_get(NS_WORKFLOW_STATUS, &id.to_string(), self.inner.get_workflow(id)).await
    }

    async fn update_workflow(&self, workflow: Workflow) -> Result<(), StoreError> {
        let id = workflow.id;
        self.inner.update_workflow(workflow).await?;
        self.invalidate(NS_WORKFLOW_STATUS, &id.to_string()).await;
        Ok(())
    }

    async fn list_workflows(&self, channel_id: Id) -> Result<Vec<Workflow>, StoreError> {
        self.inner.list_workflows(channel_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::InMemoryCache;
    use crate::domain::{AgentConfig, AgentKind, AgentPersona, AuthorKind};
    use crate::store::InMemoryStore;

    fn store() -> (CachedStore, Arc<InMemoryCache>) {
        let inner: Arc<dyn Store> = Arc::new(InMemoryStore::new());
        let cache = Arc::new(InMemoryCache::new());
        (CachedStore::new(inner, cache.clone()), cache)
    }

    #[tokio::test]
    async fn get_channel_populates_cache_on_miss_then_hits() {
        let (store, cache) = store();
        let channel = Channel::new("general");
        store.create_channel(channel.clone()).await.unwrap();

        let first = store.get_channel(channel.id).await.unwrap().unwrap();
        assert_eq!(first.name, "general");
        assert_eq!(cache.stats().misses, 1);

        let second = store.get_channel(channel.id).await.unwrap().unwrap();
        assert_eq!(second.name, "general");
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn update_agent_invalidates_its_cached_entry_and_the_list() {
        let (store, cache) = store();
        let agent = Agent::new("@backend", AgentKind::Backend, AgentPersona::default(), AgentConfig::default());
        store.create_agent(agent.clone()).await.unwrap();
        store.get_agent(agent.id).await.unwrap();
        store.list_agents().await.unwrap();
        assert_eq!(cache.stats().sets, 2);

        let mut updated = agent.clone();
        updated.active = false;
        store.update_agent(updated.clone()).await.unwrap();

        let refetched = store.get_agent(agent.id).await.unwrap().unwrap();
        assert!(!refetched.active);
        let relisted = store.list_agents().await.unwrap();
        assert_eq!(relisted.len(), 1);
        assert!(!relisted[0].active);
    }

    #[tokio::test]
    async fn inserting_a_message_invalidates_the_cached_count() {
        let (store, _cache) = store();
        let channel_id = Id::new();
        let first = Message::new(channel_id, None, AuthorKind::User, "Dev", "hi");
        store.insert_message(first).await.unwrap();
        assert_eq!(store.count_messages(channel_id).await.unwrap(), 1);

        let second = Message::new(channel_id, None, AuthorKind::User, "Dev", "again");
        store.insert_message(second).await.unwrap();
        assert_eq!(store.count_messages(channel_id).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn cache_miss_falls_through_correctly_for_a_missing_workflow() {
        let (store, _cache) = store();
        assert_eq!(store.get_workflow(Id::new()).await.unwrap(), None);
    }
}
