use redis::Client;
use redis::aio::ConnectionManager;
use tracing::{info, instrument};

use super::{RedisConfig, ping};
use crate::common::{DatabaseError, DatabaseResult, RetryConfig, retry_with_backoff};

/// Open a reconnecting [`ConnectionManager`] and verify it with `PING`
#[instrument(skip(config), fields(database = ?config.database))]
pub async fn connect(config: &RedisConfig) -> DatabaseResult<ConnectionManager> {
    let client = Client::open(config.connection_url())?;
    let mut manager = ConnectionManager::new(client).await?;

    ping(&mut manager)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed {
            backend: "redis",
            details: e.to_string(),
        })?;

    info!("Connected to Redis");
    Ok(manager)
}

/// [`connect`] retried with exponential backoff
pub async fn connect_with_retry(
    config: &RedisConfig,
    retry_config: RetryConfig,
) -> DatabaseResult<ConnectionManager> {
    retry_with_backoff(|| connect(config), retry_config).await
}
