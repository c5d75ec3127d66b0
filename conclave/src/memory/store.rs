use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;

use crate::domain::{Id, MemoryKind, MemoryRecord};
use crate::llm::{ChatMessage, GenerateParams, LlmGateway};

use super::embedder::Embedder;
use super::error::MemoryError;

/// Non-summary records older than this, at or below importance 3, are
/// eligible for deletion once folded into a summary.
const SUMMARY_DELETE_AGE: chrono::Duration = chrono::Duration::days(30);
const LOW_IMPORTANCE_THRESHOLD: u8 = 3;
const SUMMARY_IMPORTANCE: u8 = 7;

#[derive(Debug, Clone, Default)]
pub struct RetrieveOptions {
    pub limit: usize,
    pub kinds: Option<Vec<MemoryKind>>,
    pub channel_id: Option<Id>,
    pub min_importance: u8,
    pub exclude_recent_n: usize,
}

impl RetrieveOptions {
    pub fn new() -> Self {
        Self { limit: 5, kinds: None, channel_id: None, min_importance: 0, exclude_recent_n: 0 }
    }
}

#[derive(Debug, Clone)]
pub struct ScoredRecord {
    pub record: MemoryRecord,
    pub score: f64,
}

/// Semantic memory over per-(agent, channel) retrievable fragments, narrowed
/// to the operations this system actually needs (`store`,
/// `retrieve_relevant`, `create_summary`, `extract_entities`) rather than a
/// general namespace/key-value surface.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    #[allow(clippy::too_many_arguments)]
    async fn store(
        &self,
        agent_id: Id,
        channel_id: Id,
        content: &str,
        kind: MemoryKind,
        importance: u8,
        metadata: serde_json::Value,
    ) -> Result<MemoryRecord, MemoryError>;

    async fn retrieve_relevant(&self, agent_id: Id, query_text: &str, options: RetrieveOptions) -> Result<Vec<ScoredRecord>, MemoryError>;

    async fn create_summary(
        &self,
        agent_id: Id,
        channel_id: Id,
        memory_count: usize,
        llm: &dyn LlmGateway,
        params: &GenerateParams,
    ) -> Result<MemoryRecord, MemoryError>;

    async fn extract_entities(
        &self,
        agent_id: Id,
        channel_id: Id,
        text: &str,
        llm: &dyn LlmGateway,
        params: &GenerateParams,
    ) -> Result<Vec<MemoryRecord>, MemoryError>;
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

/// Pure in-memory implementation: DashMap-backed, cosine-similarity search.
pub struct InMemoryMemoryStore {
    records: DashMap<Id, MemoryRecord>,
    embedder: Arc<dyn Embedder>,
}

impl InMemoryMemoryStore {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { records: DashMap::new(), embedder }
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn store(
        &self,
        agent_id: Id,
        channel_id: Id,
        content: &str,
        kind: MemoryKind,
        importance: u8,
        metadata: serde_json::Value,
    ) -> Result<MemoryRecord, MemoryError> {
        let embedding = self
            .embedder
            .embed(&[content])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Embedding("no vector returned".to_string()))?;
        let mut record = MemoryRecord::new(agent_id, channel_id, kind, content, embedding, importance);
        record.metadata = metadata;
        self.records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn retrieve_relevant(&self, agent_id: Id, query_text: &str, options: RetrieveOptions) -> Result<Vec<ScoredRecord>, MemoryError> {
        let limit = if options.limit == 0 { 5 } else { options.limit };
        let query_embedding = self
            .embedder
            .embed(&[query_text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| MemoryError::Embedding("no vector returned".to_string()))?;

        // Invariant: retrieve never returns records from other agents.
        let mut candidates: Vec<MemoryRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|record| record.agent_id == agent_id)
            .filter(|record| options.channel_id.map_or(true, |channel_id| record.channel_id == channel_id))
            .filter(|record| record.importance >= options.min_importance)
            .filter(|record| options.kinds.as_ref().map_or(true, |kinds| kinds.contains(&record.kind)))
            .collect();

        candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        if options.exclude_recent_n > 0 {
            candidates.drain(..options.exclude_recent_n.min(candidates.len()));
        }

        let now = Utc::now();
        let mut scored: Vec<ScoredRecord> = candidates
            .into_iter()
            .map(|record| {
                let similarity = cosine_similarity(&query_embedding, &record.embedding) as f64;
                let importance_boost = (record.importance as f64 / 10.0) * 0.2;
                let age_days = (now - record.created_at).num_seconds().max(0) as f64 / 86_400.0;
                let recency_bonus = 0.1 / (1.0 + age_days);
                let score = similarity + importance_boost + recency_bonus;
                ScoredRecord { record, score }
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal).then_with(|| b.record.created_at.cmp(&a.record.created_at)));
        scored.truncate(limit);

        for scored_record in &scored {
            if let Some(mut record) = self.records.get_mut(&scored_record.record.id) {
                record.touch();
            }
        }
        Ok(scored)
    }

    async fn create_summary(
        &self,
        agent_id: Id,
        channel_id: Id,
        memory_count: usize,
        llm: &dyn LlmGateway,
        params: &GenerateParams,
    ) -> Result<MemoryRecord, MemoryError> {
        let mut candidates: Vec<MemoryRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .filter(|record| record.agent_id == agent_id && record.channel_id == channel_id)
            .filter(|record| record.kind != MemoryKind::Summary)
            .collect();
        // Most-accessed first, ties broken by oldest first.
        candidates.sort_by(|a, b| b.access_count.cmp(&a.access_count).then_with(|| a.created_at.cmp(&b.created_at)));
        candidates.truncate(memory_count);

        if candidates.is_empty() {
            return Err(MemoryError::Summarization("nothing to summarize".to_string()));
        }

        let bullet_list = candidates.iter().map(|record| format!("- {}", record.content)).collect::<Vec<_>>().join("\n");
        let prompt = format!("Condense the following memory fragments into a short paragraph:\n{bullet_list}");
        let result = llm
            .generate(&[ChatMessage::user(prompt)], None, params, &[])
            .await
            .map_err(|e| MemoryError::Summarization(e.to_string()))?;

        let summary = self.store(agent_id, channel_id, &result.text, MemoryKind::Summary, SUMMARY_IMPORTANCE, serde_json::Value::Null).await?;

        let now = Utc::now();
        for record in &candidates {
            if record.importance <= LOW_IMPORTANCE_THRESHOLD && now - record.created_at > SUMMARY_DELETE_AGE {
                self.records.remove(&record.id);
            }
        }
        Ok(summary)
    }

    async fn extract_entities(
        &self,
        agent_id: Id,
        channel_id: Id,
        text: &str,
        llm: &dyn LlmGateway,
        params: &GenerateParams,
    ) -> Result<Vec<MemoryRecord>, MemoryError> {
        let prompt = format!("List named entities (people, systems, decisions) mentioned in this text, one per line, with no extra commentary:\n{text}");
        let result = llm.generate(&[ChatMessage::user(prompt)], None, params, &[]).await.map_err(|e| MemoryError::Summarization(e.to_string()))?;

        let mut records = Vec::new();
        for line in result.text.lines() {
            let entity = line.trim().trim_start_matches('-').trim();
            if entity.is_empty() {
                continue;
            }
            records.push(self.store(agent_id, channel_id, entity, MemoryKind::Entity, 5, serde_json::Value::Null).await?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{GenerateResult, MockLlmGateway, ToolCallCapability};

    fn embedder() -> Arc<dyn Embedder> {
        Arc::new(super::super::mock::MockEmbedder::new(32))
    }

    fn params() -> GenerateParams {
        GenerateParams { provider: "openai-class".into(), model: "gpt-4".into(), temperature: 0.7, max_tokens: 256 }
    }

    #[tokio::test]
    async fn retrieve_relevant_never_crosses_agents() {
        let store = InMemoryMemoryStore::new(embedder());
        let agent_a = Id::new();
        let agent_b = Id::new();
        let channel = Id::new();
        store.store(agent_a, channel, "agent a's secret", MemoryKind::Conversation, 5, serde_json::Value::Null).await.unwrap();
        store.store(agent_b, channel, "agent b's secret", MemoryKind::Conversation, 5, serde_json::Value::Null).await.unwrap();

        let hits = store.retrieve_relevant(agent_a, "secret", RetrieveOptions::new()).await.unwrap();
        assert!(hits.iter().all(|hit| hit.record.agent_id == agent_a));
    }

    #[tokio::test]
    async fn retrieve_relevant_excludes_recent_n() {
        let store = InMemoryMemoryStore::new(embedder());
        let agent = Id::new();
        let channel = Id::new();
        for i in 0..3 {
            store.store(agent, channel, &format!("message {i}"), MemoryKind::Conversation, 5, serde_json::Value::Null).await.unwrap();
        }
        let options = RetrieveOptions { exclude_recent_n: 1, ..RetrieveOptions::new() };
        let hits = store.retrieve_relevant(agent, "message", options).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn create_summary_writes_a_pinned_enough_summary_record() {
        let store = InMemoryMemoryStore::new(embedder());
        let agent = Id::new();
        let channel = Id::new();
        store.store(agent, channel, "decided to use postgres", MemoryKind::Decision, 5, serde_json::Value::Null).await.unwrap();
        store.store(agent, channel, "decided to use tokio", MemoryKind::Decision, 5, serde_json::Value::Null).await.unwrap();

        let llm = MockLlmGateway::with_text(ToolCallCapability::Native, "The agent chose postgres and tokio.");
        let summary = store.create_summary(agent, channel, 10, &llm, &params()).await.unwrap();
        assert_eq!(summary.kind, MemoryKind::Summary);
        assert!(summary.importance >= 7);
    }

    #[tokio::test]
    async fn create_summary_fails_when_nothing_to_summarize() {
        let store = InMemoryMemoryStore::new(embedder());
        let llm = MockLlmGateway::with_responses(ToolCallCapability::Native, vec![GenerateResult::default()]);
        let result = store.create_summary(Id::new(), Id::new(), 10, &llm, &params()).await;
        assert!(result.is_err());
    }
}
