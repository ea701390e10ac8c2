//! Hourly cycle scheduler.
//!
//! Runs a warm-up cycle at startup, waits for the next hour boundary, runs
//! the aligned cycle there and then one cycle every hour. Each cycle is a
//! separate task in a `JoinSet`, so a slow cycle never delays the next one.
//! Finished cycles are reaped as they complete; on cancellation the ticker
//! stops and in-flight cycles are awaited.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use telemetry::metrics;
use tokio::sync::watch;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{interval_at, sleep_until, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cycle::{CycleReport, CycleRunner, Trigger};

/// Time between periodic cycles.
pub const CYCLE_PERIOD: Duration = Duration::from_secs(3600);

/// Truncates `t` down to the start of its hour.
pub fn truncate_to_hour(t: DateTime<Utc>) -> DateTime<Utc> {
    let secs = t.timestamp();
    let floored = secs - secs.rem_euclid(3600);
    DateTime::from_timestamp(floored, 0).unwrap_or(t)
}

/// First hour boundary strictly after `t`.
pub fn next_hour_boundary(t: DateTime<Utc>) -> DateTime<Utc> {
    truncate_to_hour(t) + TimeDelta::hours(1)
}

/// Wall-clock delay from `now` to the next hour boundary.
pub fn delay_until_next_hour(now: DateTime<Utc>) -> Duration {
    (next_hour_boundary(now) - now)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

/// Scheduler lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    WaitingForAlignment,
    /// A cycle is being launched
    Running,
    Steady,
}

/// Counters for the cycles a scheduler launched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub launched: usize,
    pub completed: usize,
    pub failed: usize,
    pub panicked: usize,
}

pub struct Scheduler {
    runner: Arc<dyn CycleRunner>,
    period: Duration,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(runner: Arc<dyn CycleRunner>) -> Self {
        Self::with_period(runner, CYCLE_PERIOD)
    }

    pub fn with_period(runner: Arc<dyn CycleRunner>, period: Duration) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            runner,
            period,
            state,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    /// Runs until `cancel` fires, aligning to the wall clock.
    pub async fn run(&self, cancel: CancellationToken) -> SchedulerStats {
        self.run_from(cancel, Utc::now()).await
    }

    /// Runs as if started at wall-clock time `now`.
    pub async fn run_from(&self, cancel: CancellationToken, now: DateTime<Utc>) -> SchedulerStats {
        let mut tasks = JoinSet::new();
        let mut stats = SchedulerStats::default();

        self.launch(&mut tasks, &mut stats, Trigger::Warmup);

        let delay = delay_until_next_hour(now);
        let aligned_at = Instant::now() + delay;
        self.state.send_replace(SchedulerState::WaitingForAlignment);
        info!(
            delay_secs = delay.as_secs(),
            next_run = %next_hour_boundary(now),
            "Waiting for hour alignment"
        );

        let aligned = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break false,
                _ = sleep_until(aligned_at) => break true,
                Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                    record(&mut stats, result);
                }
            }
        };

        if aligned {
            self.launch(&mut tasks, &mut stats, Trigger::Aligned);
            self.state.send_replace(SchedulerState::Steady);

            let mut ticker = interval_at(aligned_at + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.launch(&mut tasks, &mut stats, Trigger::Periodic);
                        self.state.send_replace(SchedulerState::Steady);
                    }
                    Some(result) = tasks.join_next(), if !tasks.is_empty() => {
                        record(&mut stats, result);
                    }
                }
            }
        }

        info!(in_flight = tasks.len(), "Scheduler stopping, draining cycles");
        while let Some(result) = tasks.join_next().await {
            record(&mut stats, result);
        }

        self.state.send_replace(SchedulerState::Idle);
        info!(
            launched = stats.launched,
            completed = stats.completed,
            failed = stats.failed,
            panicked = stats.panicked,
            "Scheduler stopped"
        );
        stats
    }

    fn launch(
        &self,
        tasks: &mut JoinSet<CycleReport>,
        stats: &mut SchedulerStats,
        trigger: Trigger,
    ) {
        self.state.send_replace(SchedulerState::Running);

        let runner = self.runner.clone();
        tasks.spawn(async move { runner.run_cycle(trigger).await });
        stats.launched += 1;
    }
}

fn record(stats: &mut SchedulerStats, result: Result<CycleReport, JoinError>) {
    match result {
        Ok(report) if report.is_failed() => {
            stats.failed += 1;
            warn!(series_failed = report.series_failed, "Cycle fetched nothing");
        }
        Ok(_) => stats.completed += 1,
        Err(e) => {
            stats.panicked += 1;
            metrics().cycles_failed.inc();
            error!(error = %e, "Cycle task aborted");
        }
    }
}
