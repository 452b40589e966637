//! Payment session trigger.
//!
//! Bridges `trip.driver_assigned` to the payment provider and announces the
//! session to the rider with broker acknowledgement: a payment session must
//! not be silently lost between provider and rider.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::messaging::{
    topics, Envelope, EventPublisher, HandlerError, MessagingError, PaymentSessionCreatedData,
    Record, RecordHandler, TripEventData,
};

use super::PaymentProcessor;

/// Topics this handler subscribes to.
pub const PAYMENT_TOPICS: [&str; 1] = [topics::TRIP_DRIVER_ASSIGNED];

/// Consumer handler creating payment sessions for assigned trips.
pub struct TripAssignedHandler {
    processor: Arc<dyn PaymentProcessor>,
    producer: Arc<dyn EventPublisher>,
    currency: String,
    publish_timeout: Duration,
}

impl TripAssignedHandler {
    pub fn new(
        processor: Arc<dyn PaymentProcessor>,
        producer: Arc<dyn EventPublisher>,
        currency: impl Into<String>,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            processor,
            producer,
            currency: currency.into(),
            publish_timeout,
        }
    }
}

#[async_trait]
impl RecordHandler for TripAssignedHandler {
    async fn handle(&self, record: Record) -> Result<(), HandlerError> {
        if record.topic != topics::TRIP_DRIVER_ASSIGNED {
            warn!(topic = %record.topic, "Unexpected record topic");
            return Ok(());
        }

        let envelope = record.envelope()?;
        let payload: TripEventData = envelope.payload()?;
        let trip = payload.trip;

        let fare = trip
            .selected_fare
            .as_ref()
            .ok_or_else(|| MessagingError::Decode("assigned trip missing fare".to_string()))?;
        let driver_id = trip
            .driver
            .as_ref()
            .map(|d| d.id.clone())
            .unwrap_or_default();

        // Rupees to paise.
        let amount_minor = (fare.total_fare * 100.0).round() as i64;

        let metadata = HashMap::from([
            ("tripID".to_string(), trip.id.clone()),
            ("riderID".to_string(), trip.rider_id.clone()),
            ("driverID".to_string(), driver_id),
        ]);

        let session_id = self
            .processor
            .create_session(amount_minor, &self.currency, metadata)
            .await?;

        info!(trip_id = %trip.id, session_id = %session_id, "Payment session created");

        let event = Envelope::with_payload(
            &trip.rider_id,
            &PaymentSessionCreatedData {
                trip_id: trip.id.clone(),
                session_id,
                amount: amount_minor as f64 / 100.0,
                currency: self.currency.clone(),
            },
        )?;

        self.producer
            .publish_and_await(
                topics::PAYMENT_EVENT_SESSION_CREATED,
                &event,
                self.publish_timeout,
            )
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::MockProducer;
    use crate::payment::{PaymentError, Result as PaymentResult};
    use crate::proto::{RideFare, Trip, TripDriver};
    use std::sync::Mutex;

    struct RecordingProcessor {
        sessions: Mutex<Vec<(i64, String)>>,
        fail: bool,
    }

    impl RecordingProcessor {
        fn new(fail: bool) -> Self {
            Self {
                sessions: Mutex::new(Vec::new()),
                fail,
            }
        }
    }

    #[async_trait]
    impl PaymentProcessor for RecordingProcessor {
        async fn create_session(
            &self,
            amount_minor: i64,
            currency: &str,
            _metadata: HashMap<String, String>,
        ) -> PaymentResult<String> {
            if self.fail {
                return Err(PaymentError::Provider("card declined".to_string()));
            }
            self.sessions
                .lock()
                .unwrap()
                .push((amount_minor, currency.to_string()));
            Ok("cs_test_123".to_string())
        }
    }

    fn assigned_record() -> Record {
        let trip = Trip {
            id: "trip-1".to_string(),
            rider_id: "rider-1".to_string(),
            status: "accepted".to_string(),
            selected_fare: Some(RideFare {
                id: "fare-1".to_string(),
                rider_id: "rider-1".to_string(),
                package_slug: "sedan".to_string(),
                total_fare: 184.5,
                route: None,
            }),
            driver: Some(TripDriver {
                id: "driver-3".to_string(),
                ..Default::default()
            }),
        };
        let envelope = Envelope::with_payload("rider-1", &TripEventData { trip }).unwrap();
        Record::new(
            topics::TRIP_DRIVER_ASSIGNED,
            Some(envelope.to_bytes().unwrap()),
        )
    }

    #[tokio::test]
    async fn assigned_trip_creates_session_and_notifies_rider() {
        let processor = Arc::new(RecordingProcessor::new(false));
        let producer = Arc::new(MockProducer::new());
        let handler = TripAssignedHandler::new(
            processor.clone(),
            producer.clone(),
            "inr",
            Duration::from_secs(30),
        );

        handler.handle(assigned_record()).await.unwrap();

        let sessions = processor.sessions.lock().unwrap().clone();
        assert_eq!(sessions, vec![(18450, "inr".to_string())]);

        let events = producer.published_to(topics::PAYMENT_EVENT_SESSION_CREATED);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].entity_id, "rider-1");

        let payload: PaymentSessionCreatedData = events[0].payload().unwrap();
        assert_eq!(payload.session_id, "cs_test_123");
        assert_eq!(payload.trip_id, "trip-1");
    }

    #[tokio::test]
    async fn provider_failure_leaves_record_unhandled() {
        let handler = TripAssignedHandler::new(
            Arc::new(RecordingProcessor::new(true)),
            Arc::new(MockProducer::new()),
            "inr",
            Duration::from_secs(30),
        );

        assert!(handler.handle(assigned_record()).await.is_err());
    }
}
