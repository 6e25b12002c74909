use redis::aio::ConnectionManager;

use crate::common::{DatabaseError, HealthStatus};

/// Send `PING` and require `PONG`
pub async fn ping(conn: &mut ConnectionManager) -> Result<(), DatabaseError> {
    let response: String = redis::cmd("PING").query_async(conn).await?;
    if response == "PONG" {
        Ok(())
    } else {
        Err(DatabaseError::HealthCheckFailed(format!(
            "unexpected PING response: {response}"
        )))
    }
}

/// `PING` with timing, for readiness probes
pub async fn check_health(conn: &ConnectionManager) -> HealthStatus {
    let mut conn = conn.clone();
    HealthStatus::measure("redis", ping(&mut conn)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore] // Requires actual Redis
    async fn test_check_health() {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let client = redis::Client::open(url).unwrap();
        let manager = ConnectionManager::new(client).await.unwrap();

        let status = check_health(&manager).await;
        assert!(status.healthy, "{:?}", status.message);
    }
}
