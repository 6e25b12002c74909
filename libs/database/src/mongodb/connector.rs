use mongodb::{Client, Database, options::ClientOptions};
use tracing::{info, instrument};

use super::{MongoConfig, ping};
use crate::common::{DatabaseError, DatabaseResult, RetryConfig, retry_with_backoff};

/// Parse `config.url` and apply the pool and timeout settings
pub async fn client_options(config: &MongoConfig) -> DatabaseResult<ClientOptions> {
    let mut options = ClientOptions::parse(&config.url).await?;
    options.max_pool_size = Some(config.max_pool_size);
    options.min_pool_size = Some(config.min_pool_size);
    options.connect_timeout = Some(config.connect_timeout);
    options.server_selection_timeout = Some(config.server_selection_timeout);
    if let Some(app_name) = &config.app_name {
        options.app_name = Some(app_name.clone());
    }
    Ok(options)
}

/// Connect and ping, returning the configured database
#[instrument(skip(config), fields(database = %config.database))]
pub async fn connect(config: &MongoConfig) -> DatabaseResult<Database> {
    let client = Client::with_options(client_options(config).await?)?;
    let database = client.database(&config.database);

    ping(&database)
        .await
        .map_err(|e| DatabaseError::ConnectionFailed {
            backend: "mongodb",
            details: e.to_string(),
        })?;

    info!("Connected to MongoDB");
    Ok(database)
}

/// [`connect`] retried with exponential backoff
pub async fn connect_with_retry(
    config: &MongoConfig,
    retry_config: RetryConfig,
) -> DatabaseResult<Database> {
    retry_with_backoff(|| connect(config), retry_config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_client_options_applies_config() {
        let config = MongoConfig::new("mongodb://localhost:27017", "app")
            .with_app_name("demo")
            .with_pool_size(20, 2)
            .with_server_selection_timeout(Duration::from_secs(3));

        let options = client_options(&config).await.unwrap();
        assert_eq!(options.max_pool_size, Some(20));
        assert_eq!(options.min_pool_size, Some(2));
        assert_eq!(options.app_name.as_deref(), Some("demo"));
        assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(3)));
    }

    #[tokio::test]
    async fn test_client_options_rejects_bad_url() {
        let config = MongoConfig::new("postgres://localhost", "app");
        assert!(client_options(&config).await.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires actual MongoDB
    async fn test_connect() {
        let url = std::env::var("MONGODB_URL")
            .unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
        let database = connect(&MongoConfig::new(url, "test")).await.unwrap();
        assert_eq!(database.name(), "test");
    }
}
