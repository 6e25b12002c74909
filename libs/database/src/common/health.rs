use std::future::Future;
use std::time::{Duration, Instant};

/// Outcome of a single health probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub backend: &'static str,
    pub healthy: bool,
    /// Error text when unhealthy
    pub message: Option<String>,
    pub latency: Duration,
}

impl HealthStatus {
    /// Time `probe` and record its outcome
    pub async fn measure<F, E>(backend: &'static str, probe: F) -> Self
    where
        F: Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        let start = Instant::now();
        let outcome = probe.await;
        let latency = start.elapsed();
        match outcome {
            Ok(()) => Self {
                backend,
                healthy: true,
                message: None,
                latency,
            },
            Err(e) => {
                tracing::warn!(backend, error = %e, "Health check failed");
                Self {
                    backend,
                    healthy: false,
                    message: Some(e.to_string()),
                    latency,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_measure_success() {
        let status = HealthStatus::measure("test", async { Ok::<_, String>(()) }).await;
        assert!(status.healthy);
        assert_eq!(status.backend, "test");
        assert!(status.message.is_none());
    }

    #[tokio::test]
    async fn test_measure_failure_keeps_message() {
        let status =
            HealthStatus::measure("test", async { Err::<(), _>("connection refused") }).await;
        assert!(!status.healthy);
        assert_eq!(status.message.as_deref(), Some("connection refused"));
    }
}
