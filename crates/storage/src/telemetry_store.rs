//! Telemetry persistence: one transaction per message.

use async_trait::async_trait;
use ingest_core::{Error, Result, TelemetryMessage};
use telemetry::metrics;
use tracing::debug;

use crate::client::Database;

pub const UPSERT_TELEMETRY_METRIC: &str = r#"
INSERT INTO raw_data.telemetry_metrics (time, asset_id, metric_name, value, unit, message_id)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (time, asset_id, metric_name) DO UPDATE
SET value = EXCLUDED.value,
    unit = EXCLUDED.unit,
    message_id = EXCLUDED.message_id
"#;

/// Processing hook for decoded telemetry.
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Persists every metric of `message` atomically. Returns rows written.
    async fn persist_telemetry(&self, message: &TelemetryMessage) -> Result<usize>;
}

#[async_trait]
impl TelemetrySink for Database {
    async fn persist_telemetry(&self, message: &TelemetryMessage) -> Result<usize> {
        let metrics_in = &message.payload.metrics;
        if metrics_in.is_empty() {
            return Ok(0);
        }

        let db_err = |e: sqlx::Error| {
            Error::database(format!(
                "telemetry write failed for message {}: {}",
                message.message_id, e
            ))
        };

        let mut tx = self.pool().begin().await.map_err(db_err)?;

        for metric in metrics_in {
            sqlx::query(UPSERT_TELEMETRY_METRIC)
                .bind(message.payload.timestamp)
                .bind(&message.asset_id)
                .bind(&metric.name)
                .bind(metric.value)
                .bind(metric.unit.as_deref())
                .bind(&message.message_id)
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        metrics()
            .telemetry_rows_persisted
            .inc_by(metrics_in.len() as u64);
        debug!(
            message_id = %message.message_id,
            asset_id = %message.asset_id,
            rows = metrics_in.len(),
            "Persisted telemetry message"
        );

        Ok(metrics_in.len())
    }
}
