//! One fetch cycle: schema bootstrap, price series, then auxiliary series.
//!
//! Every record is handled on its own. An unparsable timestamp or a failed
//! upsert is logged and counted, and the rest of the response is still
//! processed. A series whose fetch fails is skipped; the next series and the
//! next hourly cycle are the retry.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use broker::AlertPublisher;
use chrono::{DateTime, Duration, Utc};
use ingest_core::{parse_provider_datetime, EnergyMetric, PricePoint, ENERGY_SOURCE};
use provider::{
    catalogue, FetchError, RetryPolicy, Series, SeriesKind, SeriesRequest, SeriesSource,
    SeriesSpec, TimeTruncation,
};
use storage::MarketStore;
use telemetry::{health, metrics};
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::alert::maybe_alert;
use crate::scheduler::truncate_to_hour;

/// What launched a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Immediately at startup
    Warmup,
    /// First run on the hour boundary
    Aligned,
    /// Every hour after alignment
    Periodic,
}

impl Trigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warmup => "warmup",
            Self::Aligned => "aligned",
            Self::Periodic => "periodic",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fetch cycle configuration.
#[derive(Debug, Clone)]
pub struct CycleConfig {
    /// Width of the fetch window ending at the current hour
    pub lookback: Duration,
    pub time_trunc: Option<TimeTruncation>,
    pub retry: RetryPolicy,
    pub price_series: SeriesSpec,
    /// Fetched in order after the price series
    pub energy_series: Vec<SeriesSpec>,
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            lookback: Duration::hours(24),
            time_trunc: Some(TimeTruncation::Hour),
            retry: RetryPolicy::default(),
            price_series: catalogue::MARKET_PRICES,
            energy_series: catalogue::ENERGY_SERIES.to_vec(),
        }
    }
}

impl CycleConfig {
    pub fn with_lookback_hours(mut self, hours: i64) -> Self {
        self.lookback = Duration::hours(hours);
        self
    }

    pub fn with_time_trunc(mut self, time_trunc: Option<TimeTruncation>) -> Self {
        self.time_trunc = time_trunc;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// `[hour(now) - lookback, hour(now)]`
    pub fn window(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let end = truncate_to_hour(now);
        (end - self.lookback, end)
    }
}

/// Outcome of one cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub schema_warnings: usize,
    pub series_fetched: usize,
    pub series_failed: usize,
    pub persisted: usize,
    /// Records dropped because their timestamp did not parse
    pub skipped: usize,
    /// Records whose upsert failed
    pub failed: usize,
    pub alerts: usize,
}

impl CycleReport {
    /// True when no series could be fetched at all.
    pub fn is_failed(&self) -> bool {
        self.series_failed > 0 && self.series_fetched == 0
    }
}

/// Runs fetch cycles on behalf of the scheduler.
#[async_trait]
pub trait CycleRunner: Send + Sync + 'static {
    async fn run_cycle(&self, trigger: Trigger) -> CycleReport;
}

/// The fetch, normalize, persist and alert pipeline.
pub struct FetchCycle {
    source: Arc<dyn SeriesSource>,
    store: Arc<dyn MarketStore>,
    alerts: Arc<dyn AlertPublisher>,
    config: CycleConfig,
}

impl FetchCycle {
    pub fn new(
        source: Arc<dyn SeriesSource>,
        store: Arc<dyn MarketStore>,
        alerts: Arc<dyn AlertPublisher>,
        config: CycleConfig,
    ) -> Self {
        Self {
            source,
            store,
            alerts,
            config,
        }
    }

    pub fn config(&self) -> &CycleConfig {
        &self.config
    }

    /// Runs a cycle whose window ends at the hour containing `now`.
    pub async fn run_at(&self, trigger: Trigger, now: DateTime<Utc>) -> CycleReport {
        let cycle_id = Uuid::new_v4();
        let span = info_span!("fetch_cycle", cycle_id = %cycle_id, trigger = %trigger);
        self.execute(now).instrument(span).await
    }

    async fn execute(&self, now: DateTime<Utc>) -> CycleReport {
        let started = Instant::now();
        metrics().cycles_started.inc();
        let _in_flight = metrics().cycles_in_flight.track();

        let mut report = CycleReport::default();

        let schema = self.store.ensure_schema().await;
        report.schema_warnings = schema.warnings.len();

        let (start, end) = self.config.window(now);
        info!(start = %start, end = %end, "Fetch cycle started");

        let specs = std::iter::once(&self.config.price_series).chain(&self.config.energy_series);
        for spec in specs {
            match self.fetch(spec, start, end).await {
                Ok(series) => {
                    report.series_fetched += 1;
                    health().provider.set_healthy();
                    self.persist(spec, series, &mut report).await;
                }
                Err(e) => {
                    report.series_failed += 1;
                    metrics().fetch_errors.inc();
                    health().provider.set_unhealthy(e.to_string());
                    error!(series = %spec.path(), status = ?e.status(), error = %e, "Fetch failed");
                }
            }
        }

        let elapsed = started.elapsed();
        metrics().cycle_duration_ms.observe(elapsed.as_millis() as u64);
        if report.is_failed() {
            metrics().cycles_failed.inc();
        } else {
            metrics().cycles_completed.inc();
        }

        info!(
            persisted = report.persisted,
            skipped = report.skipped,
            failed = report.failed,
            alerts = report.alerts,
            series_failed = report.series_failed,
            duration_ms = %elapsed.as_millis(),
            "Fetch cycle finished"
        );

        let health_report = health().report();
        let issues = health_report.issues();
        if !issues.is_empty() {
            warn!(
                status = ?health_report.status,
                issues = ?issues,
                "Component health after cycle"
            );
        }

        report
    }

    async fn fetch(
        &self,
        spec: &SeriesSpec,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Series>, FetchError> {
        let request = SeriesRequest::new(spec, start, end, self.config.time_trunc)?;
        let path = spec.path();

        self.config
            .retry
            .run(&path, || self.source.fetch(&request))
            .await
    }

    async fn persist(&self, spec: &SeriesSpec, series: Vec<Series>, report: &mut CycleReport) {
        for s in series {
            debug!(series = %spec.path(), title = %s.title, values = s.values.len(), "Processing series");

            for value in s.values {
                let timestamp = match parse_provider_datetime(&value.datetime) {
                    Ok(ts) => ts,
                    Err(e) => {
                        metrics().parse_skips.inc();
                        report.skipped += 1;
                        warn!(title = %s.title, error = %e, "Skipping record");
                        continue;
                    }
                };

                match spec.kind {
                    SeriesKind::Price => {
                        let point = PricePoint::pvpc(timestamp, value.value);
                        self.persist_price(&point, report).await;
                    }
                    SeriesKind::EnergyMetric => {
                        let metric = EnergyMetric {
                            timestamp,
                            metric_name: s.title.clone(),
                            value: value.value,
                            unit: None,
                            source: ENERGY_SOURCE.to_string(),
                        };
                        self.persist_energy(&metric, report).await;
                    }
                }
            }
        }

        info!(series = %spec.path(), "Series saved");
    }

    async fn persist_price(&self, point: &PricePoint, report: &mut CycleReport) {
        match self.store.upsert_price(point).await {
            Ok(()) => report.persisted += 1,
            Err(e) => {
                metrics().upsert_errors.inc();
                report.failed += 1;
                error!(timestamp = %point.timestamp, error = %e, "Price upsert failed");
            }
        }

        // The rule looks at the fetched value, whatever the write outcome.
        if maybe_alert(self.alerts.as_ref(), point).await {
            report.alerts += 1;
        }
    }

    async fn persist_energy(&self, metric: &EnergyMetric, report: &mut CycleReport) {
        match self.store.upsert_energy_metric(metric).await {
            Ok(()) => report.persisted += 1,
            Err(e) => {
                metrics().upsert_errors.inc();
                report.failed += 1;
                error!(
                    metric = %metric.metric_name,
                    timestamp = %metric.timestamp,
                    error = %e,
                    "Energy metric upsert failed"
                );
            }
        }
    }
}

#[async_trait]
impl CycleRunner for FetchCycle {
    async fn run_cycle(&self, trigger: Trigger) -> CycleReport {
        self.run_at(trigger, Utc::now()).await
    }
}
