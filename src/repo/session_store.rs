use crate::repo::SessionStore;
use anyhow::Result;
use redis::AsyncCommands;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Sessions live in Redis: `{prefix}:{user_id}` is a set of session keys,
/// each of which is a key of its own.
#[derive(Clone)]
pub struct RedisSessionStore {
    pub redis_client: redis::Client,
    pub prefix: String,
}

impl RedisSessionStore {
    fn index_key(&self, user_id: Uuid) -> String {
        format!("{}:{}", self.prefix, user_id)
    }
}

#[async_trait::async_trait]
impl SessionStore for RedisSessionStore {
    async fn revoke_all(&self, user_id: Uuid) -> Result<u64> {
        let mut conn = self.redis_client.get_multiplexed_async_connection().await?;
        let index = self.index_key(user_id);
        let sessions: Vec<String> = conn.smembers(&index).await?;

        let mut keys = sessions.clone();
        keys.push(index);
        let _: i64 = conn.del(keys).await?;

        tracing::debug!(%user_id, revoked = sessions.len(), "sessions revoked");
        Ok(sessions.len() as u64)
    }
}

#[derive(Clone, Default)]
pub struct MemorySessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, Vec<String>>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn open(&self, user_id: Uuid) -> String {
        let token = Uuid::new_v4().simple().to_string();
        self.sessions
            .lock()
            .await
            .entry(user_id)
            .or_default()
            .push(token.clone());
        token
    }

    pub async fn active(&self, user_id: Uuid) -> usize {
        self.sessions.lock().await.get(&user_id).map_or(0, Vec::len)
    }
}

#[async_trait::async_trait]
impl SessionStore for MemorySessionStore {
    async fn revoke_all(&self, user_id: Uuid) -> Result<u64> {
        let dropped = self.sessions.lock().await.remove(&user_id).unwrap_or_default();
        Ok(dropped.len() as u64)
    }
}
