//! Inbound topic consumer.
//!
//! Uses rskafka's partition clients with:
//! - Every partition of the topic, discovered from metadata on connect
//! - A start position per partition chosen by the offset-reset policy
//! - In-process offset tracking per partition, advanced by `commit`
//! - Partitions polled in turn, one fetch per `poll`
//! - Raw payload delivery; decoding belongs to the caller

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use ingest_core::{Error, Result};
use parking_lot::Mutex;
use rskafka::client::error::{Error as ClientError, ProtocolError};
use rskafka::client::partition::{OffsetAt, PartitionClient, UnknownTopicHandling};
use telemetry::metrics;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::{BrokerConfig, ConsumerConfig, OffsetReset};
use crate::connection;

/// One undecoded record read from the topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub partition: i32,
    pub offset: i64,
    pub key: Option<Vec<u8>>,
    pub payload: Option<Vec<u8>>,
}

/// A blocking source of inbound records.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Topic being read, for logs.
    fn topic(&self) -> &str;

    /// Waits up to the configured max wait for records. May return an empty batch.
    async fn poll(&self) -> Result<Vec<InboundMessage>>;

    /// Marks everything before `next_offset` on `partition` as processed.
    async fn commit(&self, partition: i32, next_offset: i64) -> Result<()>;

    /// Drops the cached connection; the next poll reconnects.
    async fn reset_connection(&self);
}

/// Picks the partitions of `topic` out of a metadata listing, sorted.
///
/// Errors when the topic is absent or has no partitions so the caller backs
/// off and retries until it is created.
pub fn topic_partitions<I>(listing: I, topic: &str) -> Result<Vec<i32>>
where
    I: IntoIterator<Item = (String, Vec<i32>)>,
{
    let mut partitions = listing
        .into_iter()
        .find(|(name, _)| name == topic)
        .map(|(_, partitions)| partitions)
        .ok_or_else(|| Error::broker(format!("topic {} does not exist", topic)))?;

    if partitions.is_empty() {
        return Err(Error::broker(format!("topic {} has no partitions", topic)));
    }

    partitions.sort_unstable();
    partitions.dedup();
    Ok(partitions)
}

struct PartitionReader {
    partition: i32,
    client: PartitionClient,
}

/// Consumer for every partition of the inbound telemetry topic.
pub struct Consumer {
    broker: BrokerConfig,
    /// Cached partition clients, one per partition
    readers: RwLock<Option<Arc<Vec<PartitionReader>>>>,
    /// Next offset to read, per partition. Absent until positioned.
    offsets: Mutex<BTreeMap<i32, i64>>,
    /// Round-robin position over the readers
    cursor: AtomicUsize,
}

impl Consumer {
    /// Creates a consumer. Nothing connects until the first poll.
    pub fn new(broker: BrokerConfig) -> Result<Self> {
        if broker.consumer.topic.trim().is_empty() {
            return Err(Error::config("consumer topic is empty"));
        }

        info!(
            group_id = %broker.consumer.group_id,
            topic = %broker.consumer.topic,
            offset_reset = ?broker.consumer.offset_reset,
            "Creating broker consumer"
        );

        Ok(Self {
            broker,
            readers: RwLock::new(None),
            offsets: Mutex::new(BTreeMap::new()),
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &ConsumerConfig {
        &self.broker.consumer
    }

    /// Returns the next offset to be read from `partition`, once positioned.
    pub fn current_offset(&self, partition: i32) -> Option<i64> {
        self.offsets.lock().get(&partition).copied()
    }

    fn start_position(&self) -> OffsetAt {
        match self.broker.consumer.offset_reset {
            Some(OffsetReset::Earliest) => OffsetAt::Earliest,
            Some(OffsetReset::Latest) | None => OffsetAt::Latest,
        }
    }

    async fn seek_to_start(&self, reader: &PartitionReader) -> Result<()> {
        let offset = reader
            .client
            .get_offset(self.start_position())
            .await
            .map_err(|e| Error::broker(format!("failed to get offset: {}", e)))?;

        self.offsets.lock().insert(reader.partition, offset);

        info!(
            topic = %self.broker.consumer.topic,
            partition = reader.partition,
            offset = offset,
            "Consumer positioned"
        );
        Ok(())
    }

    async fn ensure_connected(&self) -> Result<Arc<Vec<PartitionReader>>> {
        {
            let readers = self.readers.read().await;
            if let Some(ref r) = *readers {
                return Ok(r.clone());
            }
        }

        let topic = &self.broker.consumer.topic;
        let client = connection::connect(&self.broker).await?;
        let listing = client
            .list_topics()
            .await
            .map_err(|e| Error::broker(format!("failed to list topics: {}", e)))?;
        let partitions = topic_partitions(
            listing
                .into_iter()
                .map(|t| (t.name, t.partitions.into_iter().collect::<Vec<_>>())),
            topic,
        )?;

        let mut readers = Vec::with_capacity(partitions.len());
        for partition in partitions {
            let client = client
                .partition_client(topic.clone(), partition, UnknownTopicHandling::Retry)
                .await
                .map_err(|e| {
                    Error::broker(format!(
                        "failed to get partition client for partition {}: {}",
                        partition, e
                    ))
                })?;
            let reader = PartitionReader { partition, client };

            if self.current_offset(partition).is_none() {
                self.seek_to_start(&reader).await?;
            }
            readers.push(reader);
        }

        info!(topic = %topic, partitions = readers.len(), "Consumer connected");

        let readers = Arc::new(readers);
        {
            let mut guard = self.readers.write().await;
            *guard = Some(readers.clone());
        }

        Ok(readers)
    }
}

#[async_trait]
impl MessageSource for Consumer {
    fn topic(&self) -> &str {
        &self.broker.consumer.topic
    }

    async fn poll(&self) -> Result<Vec<InboundMessage>> {
        let readers = self.ensure_connected().await?;
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % readers.len();
        let reader = &readers[index];
        let partition = reader.partition;

        let Some(current) = self.current_offset(partition) else {
            self.seek_to_start(reader).await?;
            return Ok(Vec::new());
        };

        let fetched = reader
            .client
            .fetch_records(
                current,
                1..self.broker.consumer.max_bytes,
                self.broker.consumer.max_wait_ms,
            )
            .await;

        let (records, high_watermark) = match fetched {
            Ok(result) => result,
            Err(ClientError::ServerError {
                protocol_error: ProtocolError::OffsetOutOfRange,
                ..
            }) => {
                warn!(
                    partition = partition,
                    offset = current,
                    "Offset out of range, repositioning by reset policy"
                );
                self.seek_to_start(reader).await?;
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(Error::broker(format!(
                    "failed to fetch records from partition {}: {}",
                    partition, e
                )))
            }
        };

        let messages: Vec<InboundMessage> = records
            .into_iter()
            .map(|r| InboundMessage {
                partition,
                offset: r.offset,
                key: r.record.key,
                payload: r.record.value,
            })
            .collect();

        if !messages.is_empty() {
            metrics().messages_consumed.inc_by(messages.len() as u64);
            debug!(
                partition = partition,
                count = messages.len(),
                offset_start = current,
                high_watermark = high_watermark,
                "Fetched records"
            );
        }

        Ok(messages)
    }

    async fn commit(&self, partition: i32, next_offset: i64) -> Result<()> {
        let mut offsets = self.offsets.lock();
        let entry = offsets.entry(partition).or_insert(next_offset);
        let prev = *entry;
        *entry = prev.max(next_offset);
        debug!(
            partition = partition,
            prev_offset = prev,
            new_offset = *entry,
            "Committed offset"
        );
        Ok(())
    }

    async fn reset_connection(&self) {
        let mut readers = self.readers.write().await;
        *readers = None;
        info!("Consumer connection reset");
    }
}
