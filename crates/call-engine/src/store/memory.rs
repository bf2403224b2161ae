//! In-memory store

use std::collections::{BTreeSet, HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{CallCenterError, Result};

use super::Store;

#[derive(Debug, Clone)]
enum Entry {
    Hash(HashMap<String, String>),
    Set(BTreeSet<String>),
    List(VecDeque<String>),
    Text(String),
}

impl Entry {
    fn kind(&self) -> &'static str {
        match self {
            Entry::Hash(_) => "hash",
            Entry::Set(_) => "set",
            Entry::List(_) => "list",
            Entry::Text(_) => "string",
        }
    }
}

/// Process-local store implementation
///
/// Backs unit tests and degraded single-process operation. Semantics match
/// the Redis backend for every trait operation except `expire`, which is
/// accepted but not enforced (nothing here outlives the process anyway).
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn wrong_kind(key: &str, want: &str, got: &str) -> CallCenterError {
    CallCenterError::store(format!("key {} holds a {}, expected a {}", key, got, want))
}

#[async_trait]
impl Store for MemoryStore {
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(Entry::Hash(fields)) => Ok(fields.clone()),
            Some(other) => Err(wrong_kind(key, "hash", other.kind())),
            None => Ok(HashMap::new()),
        }
    }

    async fn hash_set_all(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Hash(HashMap::new()));
        match entry {
            Entry::Hash(existing) => {
                for (field, value) in fields {
                    existing.insert(field.clone(), value.clone());
                }
                Ok(())
            }
            other => Err(wrong_kind(key, "hash", other.kind())),
        }
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Set(BTreeSet::new()));
        match entry {
            Entry::Set(members) => {
                members.insert(member.to_string());
                Ok(())
            }
            other => Err(wrong_kind(key, "set", other.kind())),
        }
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(Entry::Set(members)) => {
                members.remove(member);
                Ok(())
            }
            Some(other) => Err(wrong_kind(key, "set", other.kind())),
            None => Ok(()),
        }
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(Entry::Set(members)) => Ok(members.iter().cloned().collect()),
            Some(other) => Err(wrong_kind(key, "set", other.kind())),
            None => Ok(Vec::new()),
        }
    }

    async fn list_push_tail(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::List(VecDeque::new()));
        match entry {
            Entry::List(values) => {
                values.push_back(value.to_string());
                Ok(())
            }
            other => Err(wrong_kind(key, "list", other.kind())),
        }
    }

    async fn list_pop_head(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(Entry::List(values)) => Ok(values.pop_front()),
            Some(other) => Err(wrong_kind(key, "list", other.kind())),
            None => Ok(None),
        }
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<usize> {
        let mut entries = self.entries.lock().await;
        match entries.get_mut(key) {
            Some(Entry::List(values)) => {
                let before = values.len();
                values.retain(|v| v != value);
                Ok(before - values.len())
            }
            Some(other) => Err(wrong_kind(key, "list", other.kind())),
            None => Ok(0),
        }
    }

    async fn string_get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().await;
        match entries.get(key) {
            Some(Entry::Text(value)) => Ok(Some(value.clone())),
            Some(other) => Err(wrong_kind(key, "string", other.kind())),
            None => Ok(None),
        }
    }

    async fn string_set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), Entry::Text(value.to_string()));
        Ok(())
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(key.to_string())
            .or_insert_with(|| Entry::Text("0".to_string()));
        match entry {
            Entry::Text(value) => {
                let current: i64 = value
                    .parse()
                    .map_err(|_| CallCenterError::store(format!("key {} is not a counter", key)))?;
                let next = current + 1;
                *value = next.to_string();
                Ok(next)
            }
            other => Err(wrong_kind(key, "string", other.kind())),
        }
    }

    async fn expire(&self, key: &str, _seconds: u64) -> Result<bool> {
        let entries = self.entries.lock().await;
        Ok(entries.contains_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn list_preserves_fifo_order() {
        let store = MemoryStore::new();
        store.list_push_tail("calls", "a").await.unwrap();
        store.list_push_tail("calls", "b").await.unwrap();
        store.list_push_tail("calls", "c").await.unwrap();

        assert_eq!(store.list_pop_head("calls").await.unwrap(), Some("a".to_string()));
        assert_eq!(store.list_pop_head("calls").await.unwrap(), Some("b".to_string()));
        assert_eq!(store.list_pop_head("calls").await.unwrap(), Some("c".to_string()));
        assert_eq!(store.list_pop_head("calls").await.unwrap(), None);
    }

    #[tokio::test]
    async fn list_remove_reports_count() {
        let store = MemoryStore::new();
        store.list_push_tail("calls", "x").await.unwrap();
        store.list_push_tail("calls", "y").await.unwrap();
        store.list_push_tail("calls", "x").await.unwrap();

        assert_eq!(store.list_remove("calls", "x").await.unwrap(), 2);
        assert_eq!(store.list_remove("calls", "x").await.unwrap(), 0);
        assert_eq!(store.list_pop_head("calls").await.unwrap(), Some("y".to_string()));
    }

    #[tokio::test]
    async fn hash_merge_and_read_back() {
        let store = MemoryStore::new();
        store
            .hash_set_all(
                "agent:a1",
                &[("name".to_string(), "Alice".to_string()), ("status".to_string(), "LOGGED_OUT".to_string())],
            )
            .await
            .unwrap();
        store
            .hash_set_all("agent:a1", &[("status".to_string(), "AVAILABLE".to_string())])
            .await
            .unwrap();

        let fields = store.hash_get_all("agent:a1").await.unwrap();
        assert_eq!(fields.get("name").map(String::as_str), Some("Alice"));
        assert_eq!(fields.get("status").map(String::as_str), Some("AVAILABLE"));
    }

    #[tokio::test]
    async fn missing_keys_read_as_empty() {
        let store = MemoryStore::new();
        assert!(store.hash_get_all("nope").await.unwrap().is_empty());
        assert!(store.set_members("nope").await.unwrap().is_empty());
        assert_eq!(store.string_get("nope").await.unwrap(), None);
        assert_eq!(store.list_remove("nope", "v").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn wrong_kind_access_is_a_store_error() {
        let store = MemoryStore::new();
        store.string_set("k", "v").await.unwrap();
        assert!(store.set_add("k", "m").await.is_err());
        assert!(store.hash_get_all("k").await.is_err());
    }

    #[tokio::test]
    async fn counters_increment() {
        let store = MemoryStore::new();
        assert_eq!(store.incr("seq").await.unwrap(), 1);
        assert_eq!(store.incr("seq").await.unwrap(), 2);
        assert!(store.expire("seq", 60).await.unwrap());
        assert!(!store.expire("missing", 60).await.unwrap());
    }
}
