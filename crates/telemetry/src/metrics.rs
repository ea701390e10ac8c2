//! Internal metrics collection.
//!
//! Counters and histograms are global and lock-free. A snapshot is logged
//! on shutdown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_by(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// A gauge metric (can go up or down).
#[derive(Debug, Default)]
pub struct Gauge(AtomicU64);

impl Gauge {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    pub fn set(&self, val: u64) {
        self.0.store(val, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        // Saturate at zero; a racing reset must not wrap.
        let _ = self
            .0
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    /// Increments now and decrements when the guard drops, unwinding included.
    pub fn track(&self) -> GaugeGuard<'_> {
        self.inc();
        GaugeGuard(self)
    }
}

/// Holds one unit of a [`Gauge`] until dropped.
#[must_use = "the gauge is decremented as soon as the guard drops"]
pub struct GaugeGuard<'a>(&'a Gauge);

impl Drop for GaugeGuard<'_> {
    fn drop(&mut self) {
        self.0.dec();
    }
}

/// Histogram for latency tracking.
#[derive(Debug)]
pub struct Histogram {
    /// Buckets: 10ms, 50ms, 100ms, 250ms, 500ms, 1s, 2.5s, 5s, 10s, 30s, 60s
    buckets: [AtomicU64; 11],
    sum: AtomicU64,
    count: AtomicU64,
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

impl Histogram {
    const BUCKET_BOUNDS: [u64; 11] = [10, 50, 100, 250, 500, 1000, 2500, 5000, 10000, 30000, 60000];

    pub fn new() -> Self {
        Self {
            buckets: Default::default(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Records a value in milliseconds.
    pub fn observe(&self, ms: u64) {
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);

        let idx = Self::BUCKET_BOUNDS
            .iter()
            .position(|&bound| ms <= bound)
            .unwrap_or(Self::BUCKET_BOUNDS.len() - 1);
        self.buckets[idx].fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    pub fn mean(&self) -> f64 {
        let count = self.count();
        if count == 0 {
            0.0
        } else {
            self.sum() as f64 / count as f64
        }
    }

    /// Returns `(upper bound ms, count)` pairs.
    pub fn buckets(&self) -> Vec<(u64, u64)> {
        Self::BUCKET_BOUNDS
            .iter()
            .zip(self.buckets.iter())
            .map(|(&bound, count)| (bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

/// Collected metrics for the ingestor.
#[derive(Debug, Default)]
pub struct Metrics {
    // Fetch cycles
    pub cycles_started: Counter,
    pub cycles_completed: Counter,
    pub cycles_failed: Counter,
    pub cycles_in_flight: Gauge,

    // Provider
    pub series_fetched: Counter,
    pub fetch_errors: Counter,
    pub fetch_retries: Counter,

    // Persistence
    pub records_persisted: Counter,
    pub upsert_errors: Counter,
    pub parse_skips: Counter,
    pub schema_warnings: Counter,

    // Alerts
    pub alerts_published: Counter,
    pub alert_errors: Counter,

    // Stream consumer
    pub messages_consumed: Counter,
    pub decode_errors: Counter,
    pub consumer_errors: Counter,
    pub telemetry_rows_persisted: Counter,
    pub telemetry_errors: Counter,

    // Latency histograms
    pub fetch_latency_ms: Histogram,
    pub cycle_duration_ms: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }
}

/// A snapshot of metrics at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cycles_started: u64,
    pub cycles_completed: u64,
    pub cycles_failed: u64,
    pub cycles_in_flight: u64,
    pub series_fetched: u64,
    pub fetch_errors: u64,
    pub fetch_retries: u64,
    pub records_persisted: u64,
    pub upsert_errors: u64,
    pub parse_skips: u64,
    pub schema_warnings: u64,
    pub alerts_published: u64,
    pub alert_errors: u64,
    pub messages_consumed: u64,
    pub decode_errors: u64,
    pub consumer_errors: u64,
    pub telemetry_rows_persisted: u64,
    pub telemetry_errors: u64,
    pub fetch_latency_mean_ms: f64,
    pub cycle_duration_mean_ms: f64,
}

impl Metrics {
    /// Takes a snapshot of current metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: Utc::now(),
            cycles_started: self.cycles_started.get(),
            cycles_completed: self.cycles_completed.get(),
            cycles_failed: self.cycles_failed.get(),
            cycles_in_flight: self.cycles_in_flight.get(),
            series_fetched: self.series_fetched.get(),
            fetch_errors: self.fetch_errors.get(),
            fetch_retries: self.fetch_retries.get(),
            records_persisted: self.records_persisted.get(),
            upsert_errors: self.upsert_errors.get(),
            parse_skips: self.parse_skips.get(),
            schema_warnings: self.schema_warnings.get(),
            alerts_published: self.alerts_published.get(),
            alert_errors: self.alert_errors.get(),
            messages_consumed: self.messages_consumed.get(),
            decode_errors: self.decode_errors.get(),
            consumer_errors: self.consumer_errors.get(),
            telemetry_rows_persisted: self.telemetry_rows_persisted.get(),
            telemetry_errors: self.telemetry_errors.get(),
            fetch_latency_mean_ms: self.fetch_latency_ms.mean(),
            cycle_duration_mean_ms: self.cycle_duration_ms.mean(),
        }
    }
}

/// Global metrics registry.
pub static METRICS: std::sync::LazyLock<Metrics> = std::sync::LazyLock::new(Metrics::new);

/// Get the global metrics instance.
pub fn metrics() -> &'static Metrics {
    &METRICS
}
