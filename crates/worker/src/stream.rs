//! Telemetry stream consumer.
//!
//! Single loop: poll the inbound topic, decode each record, hand it to the
//! telemetry sink, commit each partition past the batch. Undecodable records
//! are logged and dropped. Read errors back off, reset the connection and keep
//! going. Only cancellation ends the loop.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use broker::{InboundMessage, MessageSource};
use ingest_core::TelemetryMessage;
use storage::TelemetrySink;
use telemetry::{health, metrics};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Stream consumer configuration.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Pause after a failed poll before reconnecting
    pub error_backoff: Duration,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            error_backoff: Duration::from_secs(1),
        }
    }
}

/// What happened to one inbound record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Persisted(usize),
    /// Decoded but the sink failed
    Failed,
    /// Empty or malformed payload
    Dropped,
}

/// Running totals for one consumer loop.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub processed: usize,
    pub rows: usize,
    pub dropped: usize,
    pub failed: usize,
    pub poll_errors: usize,
}

impl StreamStats {
    fn add(&mut self, outcome: MessageOutcome) {
        match outcome {
            MessageOutcome::Persisted(rows) => {
                self.processed += 1;
                self.rows += rows;
            }
            MessageOutcome::Failed => self.failed += 1,
            MessageOutcome::Dropped => self.dropped += 1,
        }
    }
}

pub struct StreamConsumer {
    source: Arc<dyn MessageSource>,
    sink: Arc<dyn TelemetrySink>,
    config: StreamConfig,
}

impl StreamConsumer {
    pub fn new(source: Arc<dyn MessageSource>, sink: Arc<dyn TelemetrySink>) -> Self {
        Self::with_config(source, sink, StreamConfig::default())
    }

    pub fn with_config(
        source: Arc<dyn MessageSource>,
        sink: Arc<dyn TelemetrySink>,
        config: StreamConfig,
    ) -> Self {
        Self {
            source,
            sink,
            config,
        }
    }

    /// Consumes until `cancel` fires.
    pub async fn run(&self, cancel: CancellationToken) -> StreamStats {
        info!(topic = %self.source.topic(), "Stream consumer started");
        let mut stats = StreamStats::default();

        loop {
            let polled = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                polled = self.source.poll() => polled,
            };

            match polled {
                Ok(batch) => {
                    if !batch.is_empty() {
                        health().broker.set_healthy();
                        self.process_batch(batch, &mut stats).await;
                    }
                }
                Err(e) => {
                    stats.poll_errors += 1;
                    metrics().consumer_errors.inc();
                    health().broker.set_unhealthy(e.to_string());
                    error!(topic = %self.source.topic(), error = %e, "Consumer error");

                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.config.error_backoff) => {}
                    }
                    self.source.reset_connection().await;
                }
            }
        }

        info!(
            processed = stats.processed,
            rows = stats.rows,
            dropped = stats.dropped,
            failed = stats.failed,
            "Stream consumer stopped"
        );
        stats
    }

    async fn process_batch(&self, batch: Vec<InboundMessage>, stats: &mut StreamStats) {
        let mut next_offsets = BTreeMap::new();
        for message in &batch {
            let next = next_offsets.entry(message.partition).or_insert(0);
            *next = (*next).max(message.offset + 1);
        }

        for message in &batch {
            stats.add(self.handle(message).await);
        }

        for (partition, next_offset) in next_offsets {
            if let Err(e) = self.source.commit(partition, next_offset).await {
                error!(partition, offset = next_offset, error = %e, "Failed to commit offset");
            }
        }
    }

    /// Decodes and persists one record.
    pub async fn handle(&self, message: &InboundMessage) -> MessageOutcome {
        let Some(payload) = message.payload.as_deref() else {
            metrics().decode_errors.inc();
            warn!(
                partition = message.partition,
                offset = message.offset,
                "Dropping record without payload"
            );
            return MessageOutcome::Dropped;
        };

        let telemetry = match TelemetryMessage::decode(payload) {
            Ok(t) => t,
            Err(e) => {
                metrics().decode_errors.inc();
                warn!(
                    partition = message.partition,
                    offset = message.offset,
                    error = %e,
                    "Error decoding telemetry message"
                );
                return MessageOutcome::Dropped;
            }
        };

        debug!(
            asset_id = %telemetry.asset_id,
            message_id = %telemetry.message_id,
            metrics = telemetry.payload.metrics.len(),
            "Processing telemetry"
        );

        if telemetry.payload.metrics.is_empty() {
            info!(message_id = %telemetry.message_id, "Telemetry message has no metrics");
        }

        match self.sink.persist_telemetry(&telemetry).await {
            Ok(rows) => MessageOutcome::Persisted(rows),
            Err(e) => {
                metrics().telemetry_errors.inc();
                error!(
                    message_id = %telemetry.message_id,
                    asset_id = %telemetry.asset_id,
                    error = %e,
                    "Failed to persist telemetry"
                );
                MessageOutcome::Failed
            }
        }
    }
}
