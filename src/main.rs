//! Market ingestor.
//!
//! Two long-running tasks share one cancellation token:
//! - the hourly scheduler fetching provider series into TimescaleDB and
//!   publishing negative-price alerts
//! - the telemetry stream consumer persisting inbound asset metrics

mod config;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use broker::{AlertProducer, Consumer, TopicConfig};
use provider::ProviderClient;
use storage::Database;
use telemetry::{health, init_tracing_from_env, metrics};
use worker::{FetchCycle, Scheduler, StreamConsumer};

use crate::config::AppConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // rustls 0.23+ requires explicit crypto provider selection
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting market ingestor v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;

    info!(
        brokers = %config.broker.broker_string(),
        group_id = %config.broker.consumer.group_id,
        topic = %config.broker.consumer.topic,
        alert_topic = %config.broker.alert_topic,
        provider = %config.provider.base_url,
        "Loaded configuration"
    );

    let database = Database::connect(&config.database)
        .await
        .context("Failed to connect to database")?;
    if storage::health::check_connection(&database).await {
        health().database.set_healthy();
    } else {
        health().database.set_unhealthy("Health check failed");
    }

    if !broker::health::check_connection(&config.broker).await {
        health().broker.set_unhealthy("Connection failed");
        bail!("Failed to reach broker at {}", config.broker.broker_string());
    }
    health().broker.set_healthy();

    let alert_topic = TopicConfig::new(config.broker.alert_topic.clone());
    if let Err(e) = broker::ensure_topic(&config.broker, &alert_topic).await {
        warn!(topic = %alert_topic.name, error = %e, "Could not ensure alert topic");
    }

    let missing =
        broker::health::missing_topics(&config.broker, &[config.broker.consumer.topic.as_str()])
            .await;
    if !missing.is_empty() {
        warn!(topics = ?missing, "Inbound topic not found yet, consumer will wait for it");
    }

    let database = Arc::new(database);
    let provider = ProviderClient::new(config.provider.clone())
        .context("Failed to build provider client")?;
    let alerts = Arc::new(AlertProducer::new(config.broker.clone()));
    let consumer = Consumer::new(config.broker.clone()).context("Failed to create consumer")?;

    let cycle = FetchCycle::new(
        Arc::new(provider),
        database.clone(),
        alerts,
        config.cycle_config(),
    );
    let scheduler = Scheduler::new(Arc::new(cycle));
    let stream = StreamConsumer::new(Arc::new(consumer), database.clone());

    let report = health().report();
    info!(status = ?report.status, issues = ?report.issues(), "Startup health");

    let cancel = CancellationToken::new();

    let scheduler_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { scheduler.run(cancel).await })
    };
    let stream_task = {
        let cancel = cancel.clone();
        tokio::spawn(async move { stream.run(cancel).await })
    };

    shutdown_signal().await;
    info!("Shutting down...");
    cancel.cancel();

    match scheduler_task.await {
        Ok(stats) => info!(launched = stats.launched, "Scheduler drained"),
        Err(e) => error!("Scheduler task failed: {}", e),
    }
    match stream_task.await {
        Ok(stats) => info!(processed = stats.processed, "Stream consumer drained"),
        Err(e) => error!("Stream consumer task failed: {}", e),
    }

    let snapshot = metrics().snapshot();
    info!(
        cycles_completed = snapshot.cycles_completed,
        cycles_failed = snapshot.cycles_failed,
        records_persisted = snapshot.records_persisted,
        fetch_errors = snapshot.fetch_errors,
        schema_warnings = snapshot.schema_warnings,
        alerts_published = snapshot.alerts_published,
        telemetry_rows = snapshot.telemetry_rows_persisted,
        "Final metrics"
    );

    let report = health().report();
    info!(status = ?report.status, issues = ?report.issues(), "Final health");

    database.close().await;
    info!("Shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
