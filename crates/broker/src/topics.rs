//! Topic names and idempotent topic creation.

use ingest_core::{Error, Result};
use rskafka::client::error::{Error as ClientError, ProtocolError};
use tracing::{info, warn};

use crate::config::BrokerConfig;
use crate::connection;

/// Topic names.
pub mod topic {
    /// Inbound asset telemetry.
    pub const TELEMETRY_RAW: &str = "telemetry-raw";
    /// Outbound price alerts.
    pub const PRICE_ALERT: &str = "price-alert";
}

/// Topic configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicConfig {
    pub name: String,
    pub partitions: i32,
    pub replication_factor: i16,
}

impl TopicConfig {
    /// Single partition, replication factor 1.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            partitions: 1,
            replication_factor: 1,
        }
    }
}

/// Whether a create-topic failure only means the topic is already there.
pub fn is_already_exists(err: &ClientError) -> bool {
    matches!(
        err,
        ClientError::ServerError {
            protocol_error: ProtocolError::TopicAlreadyExists,
            ..
        }
    )
}

/// Creates `topic` unless it exists. Returns `true` if it was created.
pub async fn ensure_topic(config: &BrokerConfig, topic: &TopicConfig) -> Result<bool> {
    let client = connection::connect(config).await?;
    let controller = client
        .controller_client()
        .map_err(|e| Error::broker(format!("failed to get controller client: {}", e)))?;

    match controller
        .create_topic(
            topic.name.clone(),
            topic.partitions,
            topic.replication_factor,
            config.request_timeout_ms,
        )
        .await
    {
        Ok(()) => {
            info!(
                topic = %topic.name,
                partitions = topic.partitions,
                replication_factor = topic.replication_factor,
                "Created topic"
            );
            Ok(true)
        }
        Err(e) if is_already_exists(&e) => {
            info!(topic = %topic.name, "Topic already exists");
            Ok(false)
        }
        Err(e) => {
            warn!(topic = %topic.name, error = %e, "Failed to create topic");
            Err(Error::broker(format!(
                "failed to create topic {}: {}",
                topic.name, e
            )))
        }
    }
}
