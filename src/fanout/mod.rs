//! Topic fan-out.
//!
//! Bridges broker events to live connections without coupling producers to
//! the registry. Each record's envelope names the target entity; the payload
//! is forwarded untouched, tagged with the originating topic as the frame
//! type. Fan-out is transport, not business logic: it never interprets the
//! payload.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::messaging::{topics, HandlerError, Record, RecordHandler, WsMessage};
use crate::registry::{ConnectionRegistry, RegistryError};

/// Topics whose messages address a live rider or driver connection.
pub const FANOUT_TOPICS: [&str; 4] = [
    topics::DRIVER_CMD_TRIP_REQUEST,
    topics::TRIP_NO_DRIVERS_FOUND,
    topics::TRIP_DRIVER_ASSIGNED,
    topics::PAYMENT_EVENT_SESSION_CREATED,
];

/// Forwards broker records to the connection registry entry matching the
/// envelope's entity id.
pub struct TopicFanout {
    registry: Arc<ConnectionRegistry>,
}

impl TopicFanout {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl RecordHandler for TopicFanout {
    /// A missing recipient is not a processing failure, and a malformed
    /// payload would not be fixed by redelivery, so every outcome here is
    /// reported as handled and the offset commits normally.
    async fn handle(&self, record: Record) -> Result<(), HandlerError> {
        let envelope = match record.envelope() {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(topic = %record.topic, error = %e, "Skipping malformed record");
                return Ok(());
            }
        };

        let message = WsMessage::new(record.topic.clone(), envelope.data);

        match self.registry.send(&envelope.entity_id, &message).await {
            Ok(()) => {
                debug!(
                    topic = %record.topic,
                    entity_id = %envelope.entity_id,
                    "Delivered event to connection"
                );
            }
            Err(RegistryError::NotFound(entity_id)) => {
                debug!(topic = %record.topic, entity_id = %entity_id, "No live connection, dropping event");
            }
            Err(e) => {
                warn!(
                    topic = %record.topic,
                    entity_id = %envelope.entity_id,
                    error = %e,
                    "Failed to deliver event, dropping"
                );
            }
        }

        Ok(())
    }
}
