//! Idempotent upserts for prices and energy metrics.

use async_trait::async_trait;
use ingest_core::{EnergyMetric, Error, PricePoint, Result};
use telemetry::metrics;

use crate::client::Database;
use crate::schema::{self, SchemaReport};

pub const UPSERT_PRICE: &str = r#"
INSERT INTO raw_data.market_prices (time, price, currency, unit, source)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (time, source) DO UPDATE
SET price = EXCLUDED.price
"#;

pub const UPSERT_ENERGY_METRIC: &str = r#"
INSERT INTO raw_data.energy_metrics (time, metric_name, value, unit, source)
VALUES ($1, $2, $3, $4, $5)
ON CONFLICT (time, metric_name, source) DO UPDATE
SET value = EXCLUDED.value
"#;

/// Destination for fetched market data.
///
/// Every write is keyed; replaying the same record leaves the store unchanged.
#[async_trait]
pub trait MarketStore: Send + Sync {
    /// Creates missing tables. Failures are reported, never raised.
    async fn ensure_schema(&self) -> SchemaReport;

    async fn upsert_price(&self, point: &PricePoint) -> Result<()>;

    async fn upsert_energy_metric(&self, metric: &EnergyMetric) -> Result<()>;
}

#[async_trait]
impl MarketStore for Database {
    async fn ensure_schema(&self) -> SchemaReport {
        schema::ensure_schema(self).await
    }

    async fn upsert_price(&self, point: &PricePoint) -> Result<()> {
        sqlx::query(UPSERT_PRICE)
            .bind(point.timestamp)
            .bind(point.price)
            .bind(&point.currency)
            .bind(&point.unit)
            .bind(&point.source)
            .execute(self.pool())
            .await
            .map_err(|e| Error::database(format!("price upsert failed: {}", e)))?;

        metrics().records_persisted.inc();
        Ok(())
    }

    async fn upsert_energy_metric(&self, metric: &EnergyMetric) -> Result<()> {
        sqlx::query(UPSERT_ENERGY_METRIC)
            .bind(metric.timestamp)
            .bind(&metric.metric_name)
            .bind(metric.value)
            .bind(metric.unit.as_deref())
            .bind(&metric.source)
            .execute(self.pool())
            .await
            .map_err(|e| {
                Error::database(format!(
                    "energy metric upsert failed for '{}': {}",
                    metric.metric_name, e
                ))
            })?;

        metrics().records_persisted.inc();
        Ok(())
    }
}
