use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::services::polling::{StateStore, StoreError};

/// Thin Redis client shared across the service.
///
/// The multiplexed connection is opened on first use and dropped after an
/// error so the next call reconnects.
#[derive(Clone)]
pub struct RedisService {
    client: redis::Client,
    connection: Arc<Mutex<Option<MultiplexedConnection>>>,
}

impl RedisService {
    pub fn new(redis_url: &str) -> Result<Self, StoreError> {
        Ok(Self {
            client: redis::Client::open(redis_url)?,
            connection: Arc::new(Mutex::new(None)),
        })
    }

    async fn connection(&self) -> Result<MultiplexedConnection, StoreError> {
        let mut slot = self.connection.lock().await;
        if let Some(conn) = slot.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self.client.get_multiplexed_async_connection().await?;
        *slot = Some(conn.clone());
        Ok(conn)
    }

    async fn reset_connection(&self) {
        *self.connection.lock().await = None;
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let result: Result<String, redis::RedisError> = redis::cmd("PING").query_async(&mut conn).await;
        match result {
            Ok(_) => Ok(()),
            Err(e) => {
                self.reset_connection().await;
                Err(e.into())
            }
        }
    }

    pub async fn get_string(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        match conn.get::<_, Option<String>>(key).await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.reset_connection().await;
                Err(e.into())
            }
        }
    }

    /// The key is kept until it is overwritten
    pub async fn set_string(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        if let Err(e) = conn.set::<_, _, ()>(key, value).await {
            self.reset_connection().await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for RedisService {
    async fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
        self.get_string(key).await
    }

    async fn save(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.set_string(key, value).await
    }
}
