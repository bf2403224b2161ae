//! Shared state store
//!
//! All cross-call state (queues, agents, waiting calls, rotation pointers)
//! lives in an external key/value store; this module is the only place that
//! talks to it. The [`Store`] trait names exactly the operations the
//! repository layer needs, so the backend can be swapped without touching
//! routing logic. Two backends ship: [`RedisStore`] for production and
//! [`MemoryStore`] for tests and degraded single-process operation.

mod memory;
mod redis;

pub use memory::MemoryStore;
pub use redis::RedisStore;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::Result;

/// Typed operations over the shared key/value store
///
/// Hash, set, list, and string keys plus counters and expiry. List
/// operations preserve insertion order: `list_push_tail` appends,
/// `list_pop_head` removes from the front, which carries the FIFO contract
/// for waiting calls.
#[async_trait]
pub trait Store: Send + Sync {
    /// Read all fields of a hash; empty map when the key is absent
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>>;

    /// Write the given fields of a hash, creating the key if needed
    async fn hash_set_all(&self, key: &str, fields: &[(String, String)]) -> Result<()>;

    /// Add a member to a set
    async fn set_add(&self, key: &str, member: &str) -> Result<()>;

    /// Remove a member from a set
    async fn set_remove(&self, key: &str, member: &str) -> Result<()>;

    /// All members of a set; empty when the key is absent
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Append a value to the tail of a list
    async fn list_push_tail(&self, key: &str, value: &str) -> Result<()>;

    /// Pop the head of a list; `None` when empty or absent
    async fn list_pop_head(&self, key: &str) -> Result<Option<String>>;

    /// Remove every occurrence of a value from a list, returning the count
    async fn list_remove(&self, key: &str, value: &str) -> Result<usize>;

    /// Read a string key
    async fn string_get(&self, key: &str) -> Result<Option<String>>;

    /// Write a string key
    async fn string_set(&self, key: &str, value: &str) -> Result<()>;

    /// Increment a counter key, returning the new value
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Set a time-to-live on a key; returns false when the key is absent
    async fn expire(&self, key: &str, seconds: u64) -> Result<bool>;
}
