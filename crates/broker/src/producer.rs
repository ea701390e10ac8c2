//! Price alert producer using rskafka.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use ingest_core::{Error, PriceAlertEvent, Result};
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::record::Record;
use telemetry::metrics;
use tokio::sync::RwLock;
use tracing::{debug, error};

use crate::config::BrokerConfig;
use crate::connection;

/// Record key for every alert.
pub const ALERT_KEY: &str = "price-alert";

/// Outbound alert publication.
#[async_trait]
pub trait AlertPublisher: Send + Sync {
    async fn publish_alert(&self, alert: &PriceAlertEvent) -> Result<()>;
}

/// Publishes alerts to partition 0 of the alert topic.
///
/// The partition client is created on first use and shared across
/// concurrent cycles. A failed send drops the cached client so the next
/// alert reconnects.
pub struct AlertProducer {
    config: BrokerConfig,
    client: RwLock<Option<Arc<PartitionClient>>>,
}

impl AlertProducer {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            config,
            client: RwLock::new(None),
        }
    }

    pub fn topic(&self) -> &str {
        &self.config.alert_topic
    }

    async fn get_client(&self) -> Result<Arc<PartitionClient>> {
        {
            let client = self.client.read().await;
            if let Some(ref c) = *client {
                return Ok(c.clone());
            }
        }

        let client = connection::connect(&self.config).await?;
        let partition_client = client
            .partition_client(self.config.alert_topic.clone(), 0, UnknownTopicHandling::Error)
            .await
            .map_err(|e| Error::broker(format!("failed to get partition client: {}", e)))?;
        let partition_client = Arc::new(partition_client);

        {
            let mut guard = self.client.write().await;
            *guard = Some(partition_client.clone());
        }

        Ok(partition_client)
    }

    async fn drop_client(&self) {
        let mut guard = self.client.write().await;
        *guard = None;
    }
}

/// Builds the outbound record for an alert.
pub fn alert_record(alert: &PriceAlertEvent) -> Result<Record> {
    let payload = serde_json::to_vec(alert)?;

    Ok(Record {
        key: Some(ALERT_KEY.as_bytes().to_vec()),
        value: Some(payload),
        headers: BTreeMap::new(),
        timestamp: Utc::now(),
    })
}

#[async_trait]
impl AlertPublisher for AlertProducer {
    async fn publish_alert(&self, alert: &PriceAlertEvent) -> Result<()> {
        let record = alert_record(alert)?;
        let client = self.get_client().await?;

        match client.produce(vec![record], Compression::NoCompression).await {
            Ok(offsets) => {
                metrics().alerts_published.inc();
                debug!(
                    topic = %self.config.alert_topic,
                    offset = ?offsets.first(),
                    price = alert.price,
                    timestamp = %alert.timestamp,
                    "Published price alert"
                );
                Ok(())
            }
            Err(e) => {
                error!(topic = %self.config.alert_topic, "Failed to publish price alert: {}", e);
                metrics().alert_errors.inc();
                self.drop_client().await;
                Err(Error::broker(format!("failed to produce alert: {}", e)))
            }
        }
    }
}
