//! Table schemas and schema bootstrap.
//!
//! All tables live in `raw_data` and are keyed so that every write is an
//! idempotent upsert. Hypertable conversion needs the TimescaleDB extension;
//! on plain PostgreSQL those statements fail and are reported as warnings.

use telemetry::{health, metrics};
use tracing::{debug, warn};

use crate::client::Database;

pub const CREATE_RAW_DATA_SCHEMA: &str = "CREATE SCHEMA IF NOT EXISTS raw_data";

/// Hourly market prices, one row per `(time, source)`.
pub const CREATE_MARKET_PRICES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS raw_data.market_prices (
    time TIMESTAMPTZ NOT NULL,
    price DOUBLE PRECISION NOT NULL,
    currency TEXT NOT NULL,
    unit TEXT DEFAULT '€/MWh',
    source TEXT NOT NULL,
    PRIMARY KEY (time, source)
)
"#;

/// Provider energy series, one row per `(time, metric_name, source)`.
pub const CREATE_ENERGY_METRICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS raw_data.energy_metrics (
    time TIMESTAMPTZ NOT NULL,
    metric_name TEXT NOT NULL,
    value DOUBLE PRECISION NOT NULL,
    unit TEXT,
    source TEXT NOT NULL,
    PRIMARY KEY (time, metric_name, source)
)
"#;

/// Asset telemetry readings, one row per `(time, asset_id, metric_name)`.
pub const CREATE_TELEMETRY_METRICS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS raw_data.telemetry_metrics (
    time TIMESTAMPTZ NOT NULL,
    asset_id TEXT NOT NULL,
    metric_name TEXT NOT NULL,
    value DOUBLE PRECISION NOT NULL,
    unit TEXT,
    message_id TEXT NOT NULL,
    PRIMARY KEY (time, asset_id, metric_name)
)
"#;

pub const MARKET_PRICES_HYPERTABLE: &str = "SELECT create_hypertable('raw_data.market_prices', 'time', if_not_exists => TRUE, migrate_data => TRUE)";

pub const ENERGY_METRICS_HYPERTABLE: &str = "SELECT create_hypertable('raw_data.energy_metrics', 'time', if_not_exists => TRUE, migrate_data => TRUE)";

pub const TELEMETRY_METRICS_HYPERTABLE: &str = "SELECT create_hypertable('raw_data.telemetry_metrics', 'time', if_not_exists => TRUE, migrate_data => TRUE)";

/// Bootstrap statements, in execution order.
pub fn all_statements() -> Vec<&'static str> {
    vec![
        CREATE_RAW_DATA_SCHEMA,
        CREATE_MARKET_PRICES_TABLE,
        CREATE_ENERGY_METRICS_TABLE,
        CREATE_TELEMETRY_METRICS_TABLE,
        MARKET_PRICES_HYPERTABLE,
        ENERGY_METRICS_HYPERTABLE,
        TELEMETRY_METRICS_HYPERTABLE,
    ]
}

/// Outcome of a schema bootstrap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaReport {
    pub executed: usize,
    pub warnings: Vec<String>,
}

impl SchemaReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Creates schema, tables and hypertables if absent.
///
/// Never fails: each statement error is logged, counted and attached to the
/// database health entry, and the remaining statements still run.
pub async fn ensure_schema(db: &Database) -> SchemaReport {
    let mut report = SchemaReport::default();

    for ddl in all_statements() {
        match sqlx::query(ddl).execute(db.pool()).await {
            Ok(_) => report.executed += 1,
            Err(e) => {
                let statement = ddl.split_whitespace().collect::<Vec<_>>().join(" ");
                warn!(statement = %statement, error = %e, "Schema statement failed");
                metrics().schema_warnings.inc();
                report.warnings.push(format!("{}: {}", statement, e));
            }
        }
    }

    if report.is_clean() {
        debug!(statements = report.executed, "Schema ensured");
    } else {
        health().database.set_warning(format!(
            "{} schema statement(s) failed",
            report.warnings.len()
        ));
    }

    report
}
