//! Namespaced key-value cache with per-namespace TTL, pattern invalidation,
//! and hit/miss metrics.

mod error;
mod in_memory;
mod stats;

pub use error::CacheError;
pub use in_memory::InMemoryCache;
pub use stats::{CacheStats, CacheStatsSnapshot};

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

/// Shipped per-namespace default TTLs; callers may still pass an explicit
/// TTL to `set` to override.
pub fn default_ttl_for_namespace(namespace: &str) -> Option<Duration> {
    match namespace {
        "agent_config" => Some(Duration::from_secs(3600)),
        "agent_list" => Some(Duration::from_secs(1800)),
        "channel_metadata" => Some(Duration::from_secs(600)),
        "workflow_status" => Some(Duration::from_secs(60)),
        "message_counts" => Some(Duration::from_secs(300)),
        _ => None,
    }
}

#[async_trait]
pub trait Cache: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<Value>, CacheError>;
    async fn set(&self, namespace: &str, key: &str, value: Value, ttl: Option<Duration>) -> Result<(), CacheError>;
    async fn delete(&self, namespace: &str, key: &str) -> Result<(), CacheError>;
    /// Delete every key in `namespace` whose name matches `glob` (`*` wildcard
    /// only). Returns the number of keys removed.
    async fn delete_pattern(&self, namespace: &str, glob: &str) -> Result<u64, CacheError>;
    async fn mget(&self, namespace: &str, keys: &[String]) -> Result<Vec<Option<Value>>, CacheError>;
    async fn mset(&self, namespace: &str, entries: Vec<(String, Value, Option<Duration>)>) -> Result<(), CacheError>;

    fn stats(&self) -> CacheStatsSnapshot;
}

/// `*` matches any run of characters; everything else must match literally.
/// Sufficient for the list-index invalidation patterns this layer needs
/// (e.g. `agent_list:*`).
pub(crate) fn glob_matches(pattern: &str, candidate: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == candidate;
    }
    let mut rest = candidate;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            if !rest.starts_with(part) {
                return false;
            }
            rest = &rest[part.len()..];
        } else if i == parts.len() - 1 {
            return rest.ends_with(part);
        } else {
            match rest.find(part) {
                Some(idx) => rest = &rest[idx + part.len()..],
                None => return false,
            }
        }
    }
    true
}
