//! Broker message contracts.
//!
//! This module contains:
//! - `Envelope`: the outer `{entityID, data}` wrapper on every broker message
//! - `WsMessage`: the `{type, data}` frame exchanged over WebSocket connections
//! - Event payload types shared between services
//! - `EventPublisher` / `RecordHandler` traits implemented by the Kafka client
//!   and by the mock used in tests
//! - Topic name constants

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::proto::{Driver, Trip};

pub mod kafka;
pub mod mock;

pub use kafka::{KafkaClient, KafkaConfig};
pub use mock::MockProducer;

/// Result type for messaging operations.
pub type Result<T> = std::result::Result<T, MessagingError>;

/// Boxed error returned by record handlers.
///
/// Handlers fail for reasons outside the messaging layer (store conflicts,
/// payment provider errors), so the subscribe loop accepts any error type.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur during broker operations.
#[derive(Debug, thiserror::Error)]
pub enum MessagingError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Failed to decode message: {0}")]
    Decode(String),

    #[error("Message carries no payload")]
    MissingPayload,

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Broker reported delivery failure: {0}")]
    Delivery(String),

    #[error("Timed out waiting for broker acknowledgement")]
    Timeout,

    #[error("Cancelled while waiting for broker acknowledgement")]
    Cancelled,

    #[error("Subscribe failed: {0}")]
    Subscribe(String),
}

/// Topic names shared by all services.
///
/// The entity id key of a message on any topic consumed by the fan-out is the
/// rider or driver expected to hold the live connection for it.
pub mod topics {
    /// Trip created, published with broker acknowledgement. Payload: trip.
    pub const TRIP_CREATED: &str = "trip.created";
    /// Declined trip routed back into the driver search. Payload: trip.
    pub const TRIP_DRIVER_NOT_INTERESTED: &str = "trip.driver_not_interested";
    /// No matching driver in the live pool. No payload.
    pub const TRIP_NO_DRIVERS_FOUND: &str = "trip.no_drivers_found";
    /// Driver attached to the trip. Payload: trip.
    pub const TRIP_DRIVER_ASSIGNED: &str = "trip.driver_assigned";

    /// Trip offered to a single candidate driver. Payload: trip.
    pub const DRIVER_CMD_TRIP_REQUEST: &str = "driver.cmd.trip_request";
    /// Registration confirmation, WebSocket frame only. Payload: driver.
    pub const DRIVER_CMD_REGISTER: &str = "driver.cmd.register";
    /// Driver location update, WebSocket frame only.
    pub const DRIVER_CMD_LOCATION: &str = "driver.cmd.location";
    /// Driver accepted the offered trip. Payload: trip response.
    pub const DRIVER_TRIP_ACCEPT: &str = "driver.trip_accept";
    /// Driver declined the offered trip. Payload: trip response.
    pub const DRIVER_TRIP_DECLINE: &str = "driver.trip_decline";

    /// External collaborator contract for payment session creation.
    pub const PAYMENT_CMD_CREATE_SESSION: &str = "payment.cmd.create_session";
    /// Payment session ready for the rider. Payload: session data.
    pub const PAYMENT_EVENT_SESSION_CREATED: &str = "payment.event.session_created";
}

/// Outer wrapper on every broker message.
///
/// `entity_id` doubles as the broker partition key and the connection fan-out
/// address; it is never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "entityID")]
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Envelope {
    /// Create a payload-free notification envelope.
    pub fn notify(entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            data: None,
        }
    }

    /// Create an envelope carrying a serialized payload.
    pub fn with_payload<T: Serialize>(entity_id: impl Into<String>, payload: &T) -> Result<Self> {
        let data = serde_json::to_value(payload).map_err(|e| MessagingError::Encode(e.to_string()))?;
        Ok(Self {
            entity_id: entity_id.into(),
            data: Some(data),
        })
    }

    /// Decode the inner payload into a typed value.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        let data = self.data.clone().ok_or(MessagingError::MissingPayload)?;
        serde_json::from_value(data).map_err(|e| MessagingError::Decode(e.to_string()))
    }

    /// Serialize the envelope for the wire.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| MessagingError::Encode(e.to_string()))
    }

    /// Deserialize an envelope from the wire.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| MessagingError::Decode(e.to_string()))
    }
}

/// Frame exchanged over a rider or driver WebSocket connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WsMessage {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl WsMessage {
    pub fn new(kind: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            kind: kind.into(),
            data,
        }
    }
}

/// Payload of trip lifecycle events (`trip.created`,
/// `trip.driver_not_interested`, `driver.cmd.trip_request`,
/// `trip.driver_assigned`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripEventData {
    pub trip: Trip,
}

/// Payload of driver trip responses (`driver.trip_accept`,
/// `driver.trip_decline`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriverTripResponseData {
    #[serde(rename = "tripID")]
    pub trip_id: String,
    #[serde(rename = "riderID", default)]
    pub rider_id: String,
    #[serde(default)]
    pub driver: Option<Driver>,
}

/// Payload of `payment.event.session_created`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentSessionCreatedData {
    #[serde(rename = "tripID")]
    pub trip_id: String,
    #[serde(rename = "sessionID")]
    pub session_id: String,
    pub amount: f64,
    pub currency: String,
}

/// A record received from the broker, detached from consumer lifetimes.
#[derive(Debug, Clone)]
pub struct Record {
    pub topic: String,
    pub payload: Option<Vec<u8>>,
}

impl Record {
    pub fn new(topic: impl Into<String>, payload: Option<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload,
        }
    }

    /// Decode the record payload as an envelope.
    pub fn envelope(&self) -> Result<Envelope> {
        let bytes = self.payload.as_deref().ok_or(MessagingError::MissingPayload)?;
        Envelope::from_bytes(bytes)
    }
}

/// Publisher side of the broker client.
///
/// `publish` is fire-and-forget: it returns once the send is queued and the
/// delivery report is only logged. `publish_and_await` blocks until the broker
/// acknowledges the write, the timeout elapses, or the client is cancelled;
/// the three failures are distinguishable to the caller.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    fn publish(&self, topic: &str, envelope: &Envelope) -> Result<()>;

    async fn publish_and_await(
        &self,
        topic: &str,
        envelope: &Envelope,
        timeout: Duration,
    ) -> Result<()>;
}

/// Handler invoked by the consumer loop for each received record.
///
/// Returning an error leaves the record's offset uncommitted, so the record is
/// re-delivered when this consumer group member restarts (at-least-once).
#[async_trait]
pub trait RecordHandler: Send + Sync {
    async fn handle(&self, record: Record) -> std::result::Result<(), HandlerError>;
}
