//! Mock publisher for testing event handlers without a broker.

use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{Envelope, EventPublisher, MessagingError, Result};

/// Records every publish instead of talking to Kafka.
#[derive(Default)]
pub struct MockProducer {
    published: Mutex<Vec<(String, Envelope)>>,
    fail_topics: Mutex<HashSet<String>>,
}

impl MockProducer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every publish to `topic` fail.
    pub fn fail_on(&self, topic: &str) {
        self.fail_topics.lock().unwrap().insert(topic.to_string());
    }

    /// All publishes so far, in order.
    pub fn published(&self) -> Vec<(String, Envelope)> {
        self.published.lock().unwrap().clone()
    }

    /// Envelopes published to a single topic, in order.
    pub fn published_to(&self, topic: &str) -> Vec<Envelope> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, e)| e.clone())
            .collect()
    }

    /// Drain the recorded publishes.
    pub fn take_published(&self) -> Vec<(String, Envelope)> {
        std::mem::take(&mut *self.published.lock().unwrap())
    }

    fn record(&self, topic: &str, envelope: &Envelope) -> Result<()> {
        if self.fail_topics.lock().unwrap().contains(topic) {
            return Err(MessagingError::Publish(format!(
                "mock publish failure on {topic}"
            )));
        }
        self.published
            .lock()
            .unwrap()
            .push((topic.to_string(), envelope.clone()));
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for MockProducer {
    fn publish(&self, topic: &str, envelope: &Envelope) -> Result<()> {
        self.record(topic, envelope)
    }

    async fn publish_and_await(
        &self,
        topic: &str,
        envelope: &Envelope,
        _timeout: Duration,
    ) -> Result<()> {
        self.record(topic, envelope)
    }
}
