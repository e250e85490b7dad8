//! Redis-backed production store.

use async_trait::async_trait;
use redis::{AsyncCommands, aio::ConnectionManager};
use tracing::{debug, info};

use super::StateStore;
use crate::errors::StoreError;

/// `StateStore` over a shared Redis connection.
///
/// The `ConnectionManager` multiplexes and reconnects under the hood, so
/// cloning the handle per command is cheap.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Connect to the metrics database at `redis_url`.
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        info!("connecting to redis at {}", redis_url);
        let client = redis::Client::open(redis_url).map_err(StoreError::Connect)?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(StoreError::Connect)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn get_field(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        debug!("HGET {} {}", key, field);
        let mut conn = self.conn.clone();
        Ok(conn.hget(key, field).await?)
    }

    async fn set_field(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        debug!("HSET {} {}", key, field);
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(key, field, value).await?;
        Ok(())
    }

    async fn delete_key(&self, key: &str) -> Result<(), StoreError> {
        debug!("DEL {}", key);
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut conn = self.conn.clone();
        Ok(conn.keys(format!("{prefix}*")).await?)
    }
}
