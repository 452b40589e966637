//! Kafka broker client.
//!
//! One producer and one consumer per client, against a shared broker set.
//! Message key: the envelope entity id (ensures ordering per rider/driver).
//! The producer requires acknowledgement from all in-sync replicas and
//! produces idempotently; the consumer commits offsets explicitly and only
//! after successful handling, so a crash mid-processing re-delivers the
//! in-flight record instead of silently skipping it.

use std::sync::Arc;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer as KafkaConsumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::producer::{FutureProducer, FutureRecord};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Envelope, EventPublisher, MessagingError, Record, RecordHandler, Result};
use async_trait::async_trait;

/// Configuration for the Kafka client.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Kafka bootstrap servers (comma-separated).
    pub brokers: String,
    /// Consumer group ID.
    pub group_id: String,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
            group_id: String::new(),
        }
    }
}

impl KafkaConfig {
    pub fn new(brokers: impl Into<String>) -> Self {
        Self {
            brokers: brokers.into(),
            group_id: String::new(),
        }
    }

    /// Set the consumer group ID.
    pub fn with_group_id(mut self, group_id: impl Into<String>) -> Self {
        self.group_id = group_id.into();
        self
    }

    /// Build a ClientConfig for the producer.
    ///
    /// `max.in.flight.requests.per.connection=1` preserves per-key ordering
    /// across producer-side retries.
    fn producer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("security.protocol", "PLAINTEXT")
            .set("acks", "all")
            .set("enable.idempotence", "true")
            .set("max.in.flight.requests.per.connection", "1")
            .set("retries", "5")
            .set("linger.ms", "5")
            .set("batch.size", "32768")
            .set("compression.type", "zstd");
        config
    }

    /// Build a ClientConfig for the consumer.
    fn consumer_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", &self.brokers)
            .set("group.id", &self.group_id)
            .set("auto.offset.reset", "earliest")
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", "6000");
        config
    }
}

/// Kafka client owning one producer and one consumer.
pub struct KafkaClient {
    pub producer: Arc<Producer>,
    pub consumer: Consumer,
}

impl KafkaClient {
    /// Create producer and consumer against the configured brokers.
    ///
    /// The cancellation token bounds every `publish_and_await` wait and stops
    /// consumer loops.
    pub fn new(config: KafkaConfig, cancel: CancellationToken) -> Result<Self> {
        let producer: FutureProducer = config
            .producer_config()
            .create()
            .map_err(|e| MessagingError::Connection(format!("failed to create producer: {e}")))?;

        let consumer: StreamConsumer = config
            .consumer_config()
            .create()
            .map_err(|e| MessagingError::Connection(format!("failed to create consumer: {e}")))?;

        info!(
            brokers = %config.brokers,
            group_id = %config.group_id,
            "Kafka client created"
        );

        Ok(Self {
            producer: Arc::new(Producer {
                inner: producer,
                cancel,
            }),
            consumer: Consumer { inner: consumer },
        })
    }
}

/// Producer half of the client.
pub struct Producer {
    inner: FutureProducer,
    cancel: CancellationToken,
}

#[async_trait]
impl EventPublisher for Producer {
    /// Fire-and-forget publish.
    ///
    /// Returns once the send is queued. The delivery report is awaited on a
    /// background task and logged; delivery failures are not raised to the
    /// caller.
    fn publish(&self, topic: &str, envelope: &Envelope) -> Result<()> {
        let payload = envelope.to_bytes()?;
        let record = FutureRecord::to(topic)
            .key(&envelope.entity_id)
            .payload(&payload);

        let delivery = self
            .inner
            .send_result(record)
            .map_err(|(e, _)| MessagingError::Publish(e.to_string()))?;

        let topic = topic.to_string();
        tokio::spawn(async move {
            match delivery.await {
                Ok(Ok((partition, offset))) => {
                    debug!(topic = %topic, partition, offset, "Delivered message");
                }
                Ok(Err((e, _))) => {
                    error!(topic = %topic, error = %e, "Delivery failed");
                }
                Err(_) => {
                    warn!(topic = %topic, "Delivery report channel dropped");
                }
            }
        });

        Ok(())
    }

    /// Publish and block until the broker acknowledges the write to all
    /// in-sync replicas, the timeout elapses, or the client is cancelled,
    /// whichever happens first.
    async fn publish_and_await(
        &self,
        topic: &str,
        envelope: &Envelope,
        timeout: Duration,
    ) -> Result<()> {
        let payload = envelope.to_bytes()?;
        let record = FutureRecord::to(topic)
            .key(&envelope.entity_id)
            .payload(&payload);

        let delivery = self
            .inner
            .send_result(record)
            .map_err(|(e, _)| MessagingError::Publish(e.to_string()))?;

        tokio::select! {
            _ = self.cancel.cancelled() => Err(MessagingError::Cancelled),
            _ = tokio::time::sleep(timeout) => Err(MessagingError::Timeout),
            result = delivery => match result {
                Ok(Ok((partition, offset))) => {
                    debug!(topic = %topic, partition, offset, "Delivered message");
                    Ok(())
                }
                Ok(Err((e, _))) => Err(MessagingError::Delivery(e.to_string())),
                Err(_) => Err(MessagingError::Delivery(
                    "delivery report channel dropped".to_string(),
                )),
            },
        }
    }
}

/// Consumer half of the client.
pub struct Consumer {
    inner: StreamConsumer,
}

impl Consumer {
    /// Subscribe to the given topics and process records until cancelled.
    ///
    /// On handler success the record's offset is committed before moving on.
    /// On handler failure the offset is **not** committed and processing
    /// continues with the next record; the failed record is re-delivered when
    /// this consumer group member restarts.
    pub async fn subscribe_and_consume(
        &self,
        cancel: CancellationToken,
        topics: &[&str],
        handler: &dyn RecordHandler,
    ) -> Result<()> {
        self.inner
            .subscribe(topics)
            .map_err(|e| MessagingError::Subscribe(e.to_string()))?;

        info!(?topics, "Subscribed to topics");

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!(?topics, "Consumer loop cancelled");
                    return Ok(());
                }
                received = self.inner.recv() => match received {
                    Err(e) => {
                        error!(error = %e, "Kafka consumer error");
                    }
                    Ok(message) => {
                        let record = Record::new(
                            message.topic(),
                            message.payload().map(<[u8]>::to_vec),
                        );

                        match handler.handle(record).await {
                            Ok(()) => {
                                if let Err(e) =
                                    self.inner.commit_message(&message, CommitMode::Async)
                                {
                                    error!(error = %e, "Failed to commit offset");
                                }
                            }
                            Err(e) => {
                                error!(
                                    topic = message.topic(),
                                    partition = message.partition(),
                                    offset = message.offset(),
                                    error = %e,
                                    "Handler failed, offset not committed"
                                );
                            }
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests;
