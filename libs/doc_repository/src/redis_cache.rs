//! Redis-backed cache
//!
//! Payloads are stored as JSON strings. Keys get an optional prefix so
//! several services can share one Redis database.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde_json::Value;
use tracing::instrument;

use crate::cache::Cache;
use crate::error::{CacheError, CacheResult};

impl From<redis::RedisError> for CacheError {
    fn from(error: redis::RedisError) -> Self {
        CacheError::Backend(error.to_string())
    }
}

#[derive(Clone)]
pub struct RedisCache {
    connection: ConnectionManager,
    prefix: Option<String>,
    ttl: Option<Duration>,
}

impl RedisCache {
    pub fn new(connection: ConnectionManager) -> Self {
        Self {
            connection,
            prefix: None,
            ttl: None,
        }
    }

    /// Prepend `{prefix}:` to every key
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Expire entries after `ttl`; entries never expire otherwise
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    pub fn full_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}:{key}"),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> CacheResult<Option<Value>> {
        let mut connection = self.connection.clone();
        let raw: Option<String> = connection.get(self.full_key(key)).await?;
        raw.map(|payload| {
            serde_json::from_str(&payload).map_err(|e| CacheError::Payload(e.to_string()))
        })
        .transpose()
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: Value) -> CacheResult<()> {
        let mut connection = self.connection.clone();
        let payload =
            serde_json::to_string(&value).map_err(|e| CacheError::Payload(e.to_string()))?;
        let key = self.full_key(key);
        match self.ttl {
            Some(ttl) => {
                connection
                    .set_ex::<_, _, ()>(key, payload, ttl.as_secs().max(1))
                    .await?
            }
            None => connection.set::<_, _, ()>(key, payload).await?,
        }
        Ok(())
    }
}
