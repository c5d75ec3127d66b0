use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use super::{default_ttl_for_namespace, glob_matches, Cache, CacheError, CacheStats, CacheStatsSnapshot};

struct CacheEntry {
    value: Value,
    expires_at: Option<Instant>,
}

impl CacheEntry {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|t| Instant::now() >= t)
    }
}

/// An in-process stand-in for a shared cache server: a `DashMap` keyed by
/// `(namespace, key)` so namespaces don't need their own map instance.
#[derive(Default)]
pub struct InMemoryCache {
    entries: DashMap<(String, String), CacheEntry>,
    stats: CacheStats,
}

impl InMemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve_ttl(namespace: &str, ttl: Option<Duration>) -> Option<Duration> {
        ttl.or_else(|| default_ttl_for_namespace(namespace))
    }
}

#[async_trait]
impl Cache for InMemoryCache {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, CacheError> {
        let map_key = (namespace.to_string(), key.to_string());
        let expired = self.entries.get(&map_key).map(|entry| entry.is_expired());
        let hit = match expired {
            Some(true) => {
                self.entries.remove(&map_key);
                None
            }
            Some(false) => self.entries.get(&map_key).map(|entry| entry.value.clone()),
            None => None,
        };
        match &hit {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        Ok(hit)
    }

    async fn set(&self, namespace: &str, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError> {
        let expires_at = Self::resolve_ttl(namespace, ttl).map(|d| Instant::now() + d);
        self.entries.insert((namespace.to_string(), key.to_string()), CacheEntry { value, expires_at });
        self.stats.record_set();
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> Result<(), CacheError> {
        self.entries.remove(&(namespace.to_string(), key.to_string()));
        self.stats.record_delete();
        Ok(())
    }

    async fn delete_pattern(&self, namespace: &str, glob: &str) -> Result<u64, CacheError> {
        let matching: Vec<(String, String)> = self
            .entries
            .iter()
            .filter(|entry| entry.key().0 == namespace && glob_matches(glob, &entry.key().1))
            .map(|entry| entry.key().clone())
            .collect();
        let count = matching.len() as u64;
        for key in matching {
            self.entries.remove(&key);
        }
        if count > 0 {
            self.stats.record_delete();
        }
        Ok(count)
    }

    async fn mget(&self, namespace: &str, keys: &[String]) -> Result<Vec<Option<Value>>, CacheError> {
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            out.push(self.get(namespace, key).await?);
        }
        Ok(out)
    }

    async fn mset(&self, namespace: &str, entries: Vec<(String, Value, Option<Duration>)>) -> Result<(), CacheError> {
        for (key, value, ttl) in entries {
            self.set(namespace, &key, value, ttl).await?;
        }
        Ok(())
    }

    fn stats(&self) -> CacheStatsSnapshot {
        self.stats.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_on_empty_cache_is_a_miss() {
        let cache = InMemoryCache::new();
        assert_eq!(cache.get("agent_config", "a-1").await.unwrap(), None);
        assert_eq!(cache.stats().misses, 1);
    }

    #[tokio::test]
    async fn set_then_get_is_a_hit() {
        let cache = InMemoryCache::new();
        cache.set("agent_config", "a-1", json!({"model": "gpt-4"}), None).await.unwrap();
        let value = cache.get("agent_config", "a-1").await.unwrap();
        assert_eq!(value, Some(json!({"model": "gpt-4"})));
        assert_eq!(cache.stats().hits, 1);
    }

    #[tokio::test]
    async fn entry_expires_after_explicit_ttl() {
        let cache = InMemoryCache::new();
        cache.set("workflow_status", "w-1", json!("executing"), Some(Duration::from_millis(1))).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("workflow_status", "w-1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_pattern_removes_matching_keys_only() {
        let cache = InMemoryCache::new();
        cache.set("agent_list", "all", json!([]), None).await.unwrap();
        cache.set("agent_list", "active", json!([]), None).await.unwrap();
        cache.set("agent_config", "a-1", json!({}), None).await.unwrap();

        let removed = cache.delete_pattern("agent_list", "*").await.unwrap();
        assert_eq!(removed, 2);
        assert_eq!(cache.get("agent_config", "a-1").await.unwrap(), Some(json!({})));
    }

    #[tokio::test]
    async fn mget_mset_round_trip() {
        let cache = InMemoryCache::new();
        cache
            .mset(
                "channel_metadata",
                vec![("c-1".to_string(), json!("general"), None), ("c-2".to_string(), json!("random"), None)],
            )
            .await
            .unwrap();
        let values = cache.mget("channel_metadata", &["c-1".to_string(), "c-3".to_string()]).await.unwrap();
        assert_eq!(values, vec![Some(json!("general")), None]);
    }
}
