//! Redis container for cache tests

use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::redis::Redis;

/// Redis 8 container plus a reconnecting connection
///
/// Dropping the value stops the container.
///
/// ```no_run
/// use test_utils::TestRedis;
///
/// # async fn example() {
/// let redis = TestRedis::new().await;
/// let cache_connection = redis.connection();
/// // ... exercise a cache ...
/// let written = redis.keys("svc:*").await;
/// # }
/// ```
pub struct TestRedis {
    _container: ContainerAsync<Redis>,
    connection: ConnectionManager,
    url: String,
}

impl TestRedis {
    pub async fn new() -> Self {
        let container = Redis::default()
            .with_tag("8-alpine")
            .start()
            .await
            .expect("Redis container should start");
        let port = container
            .get_host_port_ipv4(6379)
            .await
            .expect("Redis port should be mapped");

        let url = format!("redis://127.0.0.1:{port}");
        let client = Client::open(url.as_str()).expect("Redis URL should parse");
        let connection = ConnectionManager::new(client)
            .await
            .expect("Redis should accept connections");
        tracing::info!(%url, "Test Redis ready");

        Self {
            _container: container,
            connection,
            url,
        }
    }

    /// Handle for the code under test
    pub fn connection(&self) -> ConnectionManager {
        self.connection.clone()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Keys matching `pattern`, sorted
    pub async fn keys(&self, pattern: &str) -> Vec<String> {
        let mut conn = self.connection();
        let mut keys: Vec<String> = conn.keys(pattern).await.expect("KEYS should succeed");
        keys.sort();
        keys
    }

    /// Remaining time to live of `key` in seconds (-1 without expiry, -2 when absent)
    pub async fn ttl(&self, key: &str) -> i64 {
        let mut conn = self.connection();
        conn.ttl(key).await.expect("TTL should succeed")
    }

    pub async fn flush(&self) {
        let mut conn = self.connection();
        redis::cmd("FLUSHDB")
            .query_async::<()>(&mut conn)
            .await
            .expect("FLUSHDB should succeed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_keys_and_flush() {
        let redis = TestRedis::new().await;
        let mut conn = redis.connection();
        conn.set::<_, _, ()>("svc:people/b", "1").await.unwrap();
        conn.set::<_, _, ()>("svc:people/a", "1").await.unwrap();
        conn.set::<_, _, ()>("other", "1").await.unwrap();

        assert_eq!(redis.keys("svc:*").await, vec!["svc:people/a", "svc:people/b"]);

        redis.flush().await;
        assert!(redis.keys("*").await.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires Docker
    async fn test_ttl_reports_expiry() {
        let redis = TestRedis::new().await;
        let mut conn = redis.connection();
        conn.set_ex::<_, _, ()>("expiring", "v", 30).await.unwrap();
        conn.set::<_, _, ()>("forever", "v").await.unwrap();

        assert!((1..=30).contains(&redis.ttl("expiring").await));
        assert_eq!(redis.ttl("forever").await, -1);
        assert_eq!(redis.ttl("missing").await, -2);
    }
}
