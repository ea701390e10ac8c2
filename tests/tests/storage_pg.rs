//! Upsert semantics against a real TimescaleDB.
//!
//! Starts a TimescaleDB container, or uses `INGESTOR_TEST_DATABASE_URL`.
//! Each test returns early when neither is available.

use chrono::{DateTime, Utc};
use ingest_core::{EnergyMetric, PricePoint, TelemetryMessage, ENERGY_SOURCE, PRICE_SOURCE};
use integration_tests::containers::TestDatabase;
use integration_tests::fixtures::{self, at};
use storage::{MarketStore, TelemetrySink};

async fn price_rows(db: &TestDatabase, time: DateTime<Utc>) -> Vec<(f64, String, String)> {
    sqlx::query_as::<_, (f64, String, String)>(
        "SELECT price, currency, source FROM raw_data.market_prices WHERE time = $1",
    )
    .bind(time)
    .fetch_all(db.database.pool())
    .await
    .unwrap()
}

#[tokio::test]
async fn test_schema_bootstrap_is_repeatable() {
    let Some(db) = TestDatabase::start().await else {
        return;
    };

    let first = db.ensure_schema().await;
    let second = db.ensure_schema().await;

    // Plain PostgreSQL lacks the extension; only hypertable conversion may fail
    for report in [&first, &second] {
        assert!(
            report.warnings.iter().all(|w| w.contains("create_hypertable")),
            "warnings: {:?}",
            report.warnings
        );
    }
    assert_eq!(first.warnings.len(), second.warnings.len());
}

#[tokio::test]
async fn test_price_upsert_is_idempotent_and_last_write_wins() {
    let Some(db) = TestDatabase::start().await else {
        return;
    };
    db.ensure_schema().await;

    let ts = at(2023, 12, 31, 23, 0);
    let point = PricePoint::pvpc(ts, -5.2);

    for _ in 0..3 {
        db.database.upsert_price(&point).await.unwrap();
    }
    assert_eq!(
        price_rows(&db, ts).await,
        vec![(-5.2, "EUR".to_string(), PRICE_SOURCE.to_string())]
    );

    db.database
        .upsert_price(&PricePoint::pvpc(ts, 7.75))
        .await
        .unwrap();
    assert_eq!(
        price_rows(&db, ts).await,
        vec![(7.75, "EUR".to_string(), PRICE_SOURCE.to_string())]
    );
}

#[tokio::test]
async fn test_energy_metric_key_includes_metric_name() {
    let Some(db) = TestDatabase::start().await else {
        return;
    };
    db.ensure_schema().await;

    let ts = at(2024, 1, 1, 0, 0);
    let metric = |name: &str, value: f64| EnergyMetric {
        timestamp: ts,
        metric_name: name.to_string(),
        value,
        unit: None,
        source: ENERGY_SOURCE.to_string(),
    };

    db.database.upsert_energy_metric(&metric("Eólica", 5_000.0)).await.unwrap();
    db.database.upsert_energy_metric(&metric("Eólica", 5_100.0)).await.unwrap();
    db.database.upsert_energy_metric(&metric("Nuclear", 7_000.0)).await.unwrap();

    let rows = sqlx::query_as::<_, (String, f64, Option<String>)>(
        "SELECT metric_name, value, unit FROM raw_data.energy_metrics WHERE time = $1 ORDER BY metric_name",
    )
    .bind(ts)
    .fetch_all(db.database.pool())
    .await
    .unwrap();

    assert_eq!(
        rows,
        vec![
            ("Eólica".to_string(), 5_100.0, None),
            ("Nuclear".to_string(), 7_000.0, None),
        ]
    );
}

#[tokio::test]
async fn test_telemetry_message_writes_one_row_per_metric() {
    let Some(db) = TestDatabase::start().await else {
        return;
    };
    db.ensure_schema().await;

    let json = fixtures::telemetry_json("battery-3", &[("soc", 55.0, "%"), ("temp", 31.5, "C")]);
    let message = TelemetryMessage::decode(&serde_json::to_vec(&json).unwrap()).unwrap();

    assert_eq!(db.database.persist_telemetry(&message).await.unwrap(), 2);
    // Replays overwrite, never duplicate
    assert_eq!(db.database.persist_telemetry(&message).await.unwrap(), 2);

    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM raw_data.telemetry_metrics WHERE asset_id = $1",
    )
    .bind("battery-3")
    .fetch_one(db.database.pool())
    .await
    .unwrap();
    assert_eq!(count, 2);
}
