//! Fetch cycle behaviour against in-memory seams.

use ingest_core::{AlertKind, ENERGY_SOURCE, PRICE_SOURCE};
use integration_tests::fixtures::{self, at};
use integration_tests::mocks::MockResponse;
use integration_tests::setup::CycleHarness;
use provider::{catalogue, TimeTruncation};
use worker::Trigger;

fn now() -> chrono::DateTime<chrono::Utc> {
    at(2024, 1, 2, 10, 30)
}

#[tokio::test]
async fn test_negative_price_is_stored_in_utc_and_alerted_once() {
    let h = CycleHarness::new();
    h.source.respond(
        &CycleHarness::price_path(),
        MockResponse::Series(vec![fixtures::series(
            "PVPC",
            &[("2024-01-01T00:00:00.000+01:00", -5.2)],
        )]),
    );

    let report = h.cycle.run_at(Trigger::Warmup, now()).await;
    assert_eq!(report.persisted, 1);
    assert_eq!(report.alerts, 1);

    let stored = h
        .store
        .price(at(2023, 12, 31, 23, 0), PRICE_SOURCE)
        .expect("price stored at 23:00 UTC");
    assert_eq!(stored.price, -5.2);
    assert_eq!(stored.currency, "EUR");
    assert_eq!(stored.unit, "€/MWh");

    let alerts = h.alerts.sent();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].kind, AlertKind::NegativePrice);
    assert_eq!(alerts[0].price, -5.2);
    assert_eq!(alerts[0].timestamp, at(2023, 12, 31, 23, 0));
}

#[tokio::test]
async fn test_non_negative_prices_raise_no_alert() {
    let h = CycleHarness::new();
    h.source.respond(
        &CycleHarness::price_path(),
        MockResponse::Series(vec![fixtures::series(
            "PVPC",
            &[
                ("2024-01-01T00:00:00.000+01:00", 0.0),
                ("2024-01-01T01:00:00.000+01:00", 12.5),
            ],
        )]),
    );

    let report = h.cycle.run_at(Trigger::Periodic, now()).await;
    assert_eq!(report.persisted, 2);
    assert_eq!(report.alerts, 0);
    assert!(h.alerts.sent().is_empty());
}

#[tokio::test]
async fn test_failed_upsert_does_not_discard_siblings() {
    let h = CycleHarness::new();
    h.source.respond(
        &CycleHarness::price_path(),
        MockResponse::Series(vec![fixtures::five_hourly_prices()]),
    );
    // Third record: 02:00+01:00
    h.store.fail_at(at(2024, 1, 1, 1, 0));

    let report = h.cycle.run_at(Trigger::Periodic, now()).await;
    assert_eq!(report.persisted, 4);
    assert_eq!(report.failed, 1);

    let stored: Vec<_> = h.store.prices().iter().map(|p| p.timestamp).collect();
    assert_eq!(
        stored,
        vec![
            at(2023, 12, 31, 23, 0),
            at(2024, 1, 1, 0, 0),
            at(2024, 1, 1, 2, 0),
            at(2024, 1, 1, 3, 0),
        ]
    );
}

#[tokio::test]
async fn test_fallback_formats_and_unparsable_records() {
    let h = CycleHarness::new();
    h.source.respond(
        &CycleHarness::price_path(),
        MockResponse::Series(vec![fixtures::series(
            "PVPC",
            &[
                ("2024-01-01T05:00:00.000+00:00", 10.0),
                ("not-a-date", 99.0),
                ("2024-01-01T05:00:00", 11.0),
                ("2024-01-01T06:00:00", 12.0),
            ],
        )]),
    );

    let report = h.cycle.run_at(Trigger::Aligned, now()).await;
    assert_eq!(report.skipped, 1);
    assert_eq!(report.persisted, 3);

    // Both spellings of 05:00 land on the same key
    let prices = h.store.prices();
    assert_eq!(prices.len(), 2);
    assert_eq!(prices[0].timestamp, at(2024, 1, 1, 5, 0));
    assert_eq!(prices[0].price, 11.0);
    assert_eq!(prices[1].timestamp, at(2024, 1, 1, 6, 0));
}

#[tokio::test]
async fn test_replaying_a_cycle_leaves_the_same_rows() {
    let h = CycleHarness::new();
    h.source.respond(
        &CycleHarness::price_path(),
        MockResponse::Series(vec![fixtures::five_hourly_prices()]),
    );
    h.source.respond(
        &catalogue::DEMAND.path(),
        MockResponse::Series(vec![fixtures::series(
            "Demanda real",
            &[("2024-01-01T00:00:00.000+01:00", 24_100.0)],
        )]),
    );

    h.cycle.run_at(Trigger::Warmup, now()).await;
    let prices_once = h.store.prices();
    let energy_once = h.store.energy_metrics();
    let writes_once = h.store.writes();

    h.cycle.run_at(Trigger::Aligned, now()).await;
    h.cycle.run_at(Trigger::Periodic, now()).await;

    assert_eq!(h.store.prices(), prices_once);
    assert_eq!(h.store.energy_metrics(), energy_once);
    assert_eq!(h.store.writes(), writes_once * 3);
}

#[tokio::test]
async fn test_energy_series_use_titles_as_metric_names() {
    let h = CycleHarness::new();
    h.source.respond(
        &catalogue::GENERATION_MIX.path(),
        MockResponse::Series(vec![
            fixtures::series("Eólica", &[("2024-01-01T00:00:00.000+01:00", 5_210.0)]),
            fixtures::series(
                "Solar fotovoltaica",
                &[("2024-01-01T00:00:00.000+01:00", 0.0)],
            ),
        ]),
    );

    let report = h.cycle.run_at(Trigger::Periodic, now()).await;
    assert_eq!(report.persisted, 2);

    let metrics = h.store.energy_metrics();
    let names: Vec<_> = metrics.iter().map(|m| m.metric_name.as_str()).collect();
    assert_eq!(names, vec!["Eólica", "Solar fotovoltaica"]);
    assert!(metrics.iter().all(|m| m.source == ENERGY_SOURCE));
    assert!(metrics.iter().all(|m| m.unit.is_none()));
    assert!(h.alerts.sent().is_empty());
}

#[tokio::test]
async fn test_failed_price_fetch_still_fetches_energy_series() {
    let h = CycleHarness::new();
    h.source
        .respond(&CycleHarness::price_path(), MockResponse::Status(503));
    h.source.respond(
        &catalogue::EMISSIONS.path(),
        MockResponse::Series(vec![fixtures::series(
            "Carbón",
            &[("2024-01-01T00:00:00.000+01:00", 1_200.0)],
        )]),
    );

    let report = h.cycle.run_at(Trigger::Periodic, now()).await;
    assert_eq!(report.series_failed, 1);
    assert_eq!(report.series_fetched, 3);
    assert!(!report.is_failed());
    assert_eq!(h.store.energy_metrics().len(), 1);
    assert!(h.store.prices().is_empty());
}

#[tokio::test]
async fn test_cycle_with_every_fetch_failing_is_reported_failed() {
    let h = CycleHarness::new();
    h.source
        .respond(&CycleHarness::price_path(), MockResponse::Status(500));
    for spec in catalogue::ENERGY_SERIES {
        h.source.respond(&spec.path(), MockResponse::Status(404));
    }

    let report = h.cycle.run_at(Trigger::Periodic, now()).await;
    assert!(report.is_failed());
    assert_eq!(report.series_failed, 4);
    assert_eq!(report.persisted, 0);
}

#[tokio::test]
async fn test_alert_failure_does_not_affect_persistence() {
    let h = CycleHarness::new();
    h.alerts.set_should_fail(true);
    h.source.respond(
        &CycleHarness::price_path(),
        MockResponse::Series(vec![fixtures::series(
            "PVPC",
            &[
                ("2024-01-01T00:00:00.000+01:00", -1.0),
                ("2024-01-01T01:00:00.000+01:00", -2.0),
            ],
        )]),
    );

    let report = h.cycle.run_at(Trigger::Periodic, now()).await;
    assert_eq!(report.persisted, 2);
    assert_eq!(report.alerts, 0);
    assert_eq!(h.store.prices().len(), 2);
}

#[tokio::test]
async fn test_requests_cover_catalogue_in_order_over_window() {
    let h = CycleHarness::new();

    h.cycle.run_at(Trigger::Warmup, now()).await;
    assert_eq!(h.store.schema_calls(), 1);

    let requests = h.source.requests();
    let paths: Vec<_> = requests
        .iter()
        .map(|r| format!("{}/{}", r.category, r.widget))
        .collect();
    assert_eq!(
        paths,
        vec![
            "mercados/precios-mercados-tiempo-real",
            "generacion/estructura-generacion",
            "demanda/evolucion",
            "generacion/no-renovables-detalle-emisiones",
        ]
    );

    for request in &requests {
        assert_eq!(request.start, at(2024, 1, 1, 10, 0));
        assert_eq!(request.end, at(2024, 1, 2, 10, 0));
        assert_eq!(request.time_trunc, Some(TimeTruncation::Hour));
    }
}
