// Memory: an opaque recall/remember interface. Vector/embedding-backed
// memory is out of scope; this module specifies only the trait boundary an
// agent uses to store and retrieve free-text notes, plus an in-memory
// reference implementation for tests and examples.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::Result;

/// A single remembered note, with a free-text key for later recall.
#[derive(Debug, Clone)]
pub struct MemoryEntry {
    pub key: String,
    pub value: String,
}

/// The recall/remember boundary an agent uses for durable notes across runs.
/// A real implementation would typically be embedding/vector-backed; this
/// crate ships only an in-memory reference implementation, since retrieval
/// quality is an external concern.
#[async_trait]
pub trait MemoryStore: Send + Sync {
    async fn remember(&self, scope: &str, key: &str, value: &str) -> Result<()>;

    /// Best-effort substring recall over a scope's remembered keys/values.
    async fn recall(&self, scope: &str, query: &str) -> Result<Vec<MemoryEntry>>;

    async fn forget(&self, scope: &str, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemoryMemoryStore {
    scopes: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl InMemoryMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate counts for the `/api/stats` `memory` block: total entries
    /// and a per-scope breakdown. Memory itself is an opaque recall/remember
    /// boundary (see module docs); this is the one piece of introspection
    /// the stats endpoint needs.
    pub fn stats(&self) -> (usize, HashMap<String, usize>) {
        let scopes = self.scopes.lock().unwrap();
        let by_scope: HashMap<String, usize> = scopes.iter().map(|(k, v)| (k.clone(), v.len())).collect();
        let total = by_scope.values().sum();
        (total, by_scope)
    }
}

#[async_trait]
impl MemoryStore for InMemoryMemoryStore {
    async fn remember(&self, scope: &str, key: &str, value: &str) -> Result<()> {
        self.scopes
            .lock()
            .unwrap()
            .entry(scope.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn recall(&self, scope: &str, query: &str) -> Result<Vec<MemoryEntry>> {
        let scopes = self.scopes.lock().unwrap();
        let Some(entries) = scopes.get(scope) else {
            return Ok(Vec::new());
        };

        let query_lower = query.to_lowercase();
        Ok(entries
            .iter()
            .filter(|(k, v)| query.is_empty() || k.to_lowercase().contains(&query_lower) || v.to_lowercase().contains(&query_lower))
            .map(|(key, value)| MemoryEntry { key: key.clone(), value: value.clone() })
            .collect())
    }

    async fn forget(&self, scope: &str, key: &str) -> Result<()> {
        if let Some(entries) = self.scopes.lock().unwrap().get_mut(scope) {
            entries.remove(key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn remember_then_recall_finds_matching_entry() {
        let store = InMemoryMemoryStore::new();
        store.remember("task-1", "user_timezone", "America/New_York").await.unwrap();

        let found = store.recall("task-1", "timezone").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].value, "America/New_York");
    }

    #[tokio::test]
    async fn forget_removes_the_entry() {
        let store = InMemoryMemoryStore::new();
        store.remember("task-1", "k", "v").await.unwrap();
        store.forget("task-1", "k").await.unwrap();

        let found = store.recall("task-1", "").await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn recall_on_unknown_scope_returns_empty() {
        let store = InMemoryMemoryStore::new();
        let found = store.recall("nonexistent", "anything").await.unwrap();
        assert!(found.is_empty());
    }
}
