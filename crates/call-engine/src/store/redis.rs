//! Redis-backed store

use std::collections::HashMap;

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tracing::info;

use crate::config::RedisConfig;
use crate::error::{CallCenterError, Result};

use super::Store;

/// Shared store over a Redis connection
///
/// Uses a multiplexed connection manager, so the store handle is cheap to
/// clone and safe to use from concurrently running call tasks. Reconnects
/// are handled by the manager; individual command failures surface as
/// [`CallCenterError::Store`].
#[derive(Clone)]
pub struct RedisStore {
    manager: ConnectionManager,
}

impl RedisStore {
    /// Connect to Redis using the given configuration
    pub async fn connect(config: &RedisConfig) -> Result<Self> {
        let url = config.url();
        info!("🗄️ Connecting to shared store at {}:{}", config.host, config.port);
        let client = Client::open(url).map_err(store_err)?;
        let manager = client.get_connection_manager().await.map_err(store_err)?;
        info!("✅ Shared store connection established");
        Ok(Self { manager })
    }
}

fn store_err(err: redis::RedisError) -> CallCenterError {
    CallCenterError::store(err.to_string())
}

#[async_trait]
impl Store for RedisStore {
    async fn hash_get_all(&self, key: &str) -> Result<HashMap<String, String>> {
        let mut conn = self.manager.clone();
        conn.hgetall(key).await.map_err(store_err)
    }

    async fn hash_set_all(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        if fields.is_empty() {
            return Ok(());
        }
        let mut conn = self.manager.clone();
        conn.hset_multiple::<_, _, _, ()>(key, fields)
            .await
            .map_err(store_err)
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.sadd::<_, _, ()>(key, member).await.map_err(store_err)
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.srem::<_, _, ()>(key, member).await.map_err(store_err)
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        let mut conn = self.manager.clone();
        conn.smembers(key).await.map_err(store_err)
    }

    async fn list_push_tail(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.rpush::<_, _, ()>(key, value).await.map_err(store_err)
    }

    async fn list_pop_head(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        conn.lpop(key, None).await.map_err(store_err)
    }

    async fn list_remove(&self, key: &str, value: &str) -> Result<usize> {
        let mut conn = self.manager.clone();
        let removed: i64 = conn.lrem(key, 0, value).await.map_err(store_err)?;
        Ok(removed.max(0) as usize)
    }

    async fn string_get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        conn.get(key).await.map_err(store_err)
    }

    async fn string_set(&self, key: &str, value: &str) -> Result<()> {
        let mut conn = self.manager.clone();
        conn.set::<_, _, ()>(key, value).await.map_err(store_err)
    }

    async fn incr(&self, key: &str) -> Result<i64> {
        let mut conn = self.manager.clone();
        conn.incr(key, 1).await.map_err(store_err)
    }

    async fn expire(&self, key: &str, seconds: u64) -> Result<bool> {
        let mut conn = self.manager.clone();
        conn.expire(key, seconds as i64).await.map_err(store_err)
    }
}
