use mongodb::Database;
use mongodb::bson::doc;

use crate::common::HealthStatus;

/// Round trip a `ping` command
pub async fn ping(database: &Database) -> mongodb::error::Result<()> {
    database.run_command(doc! { "ping": 1 }).await.map(|_| ())
}

/// Ping with timing, for readiness probes
pub async fn check_health(database: &Database) -> HealthStatus {
    HealthStatus::measure("mongodb", ping(database)).await
}
