//! Database connectivity check.

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// "ok" or "error"
    pub status: String,
    /// "successful", or "failed (<reason>)"
    pub db_connection: String,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status == "ok"
    }
}

/// Run a trivial read against the plants table. Never fails; problems are reported in the status.
#[instrument(skip(pool))]
pub async fn check_database(pool: &PgPool) -> HealthStatus {
    match sqlx::query("SELECT plant_id FROM plants LIMIT 1").fetch_optional(pool).await {
        Ok(_) => HealthStatus {
            status: "ok".to_string(),
            db_connection: "successful".to_string(),
        },
        Err(e) => {
            warn!("Database health check failed: {}", e);
            HealthStatus {
                status: "error".to_string(),
                db_connection: format!("failed ({e})"),
            }
        }
    }
}
