//! Database health checks.

use crate::client::Database;
use tracing::{debug, error};

/// Check database connection health.
pub async fn check_connection(db: &Database) -> bool {
    match sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(db.pool()).await {
        Ok(_) => {
            debug!("Database connection healthy");
            true
        }
        Err(e) => {
            error!("Database health check failed: {}", e);
            false
        }
    }
}
