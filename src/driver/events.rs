//! Saga search side: trip-created consumer.
//!
//! On `trip.created` or `trip.driver_not_interested`, queries the live pool
//! for drivers matching the trip's fare package and offers the trip to one
//! candidate chosen uniformly at random. No candidates ends the trip's
//! automatic attempts: the rider is notified via `trip.no_drivers_found`.

use std::sync::Arc;

use async_trait::async_trait;
use rand::Rng;
use tracing::{info, warn};

use crate::messaging::{
    topics, Envelope, EventPublisher, HandlerError, MessagingError, Record, RecordHandler,
    TripEventData,
};
use crate::proto::Trip;

use super::DriverPool;

/// Topics this handler subscribes to.
pub const SEARCH_TOPICS: [&str; 2] = [topics::TRIP_CREATED, topics::TRIP_DRIVER_NOT_INTERESTED];

/// Consumer handler driving the search half of the matching saga.
pub struct TripEventHandler {
    pool: Arc<DriverPool>,
    producer: Arc<dyn EventPublisher>,
}

impl TripEventHandler {
    pub fn new(pool: Arc<DriverPool>, producer: Arc<dyn EventPublisher>) -> Self {
        Self { pool, producer }
    }

    /// Pick one candidate and offer the trip, or report that no driver
    /// matches. Publishes exactly one message per invocation.
    async fn find_and_request(&self, trip: Trip) -> Result<(), HandlerError> {
        let package_slug = trip
            .selected_fare
            .as_ref()
            .map(|fare| fare.package_slug.clone())
            .ok_or_else(|| MessagingError::Decode("trip missing selected fare".to_string()))?;

        let candidates = self.pool.find_by_package(&package_slug).await;

        if candidates.is_empty() {
            info!(trip_id = %trip.id, package_slug = %package_slug, "No drivers available");
            self.producer.publish(
                topics::TRIP_NO_DRIVERS_FOUND,
                &Envelope::notify(&trip.rider_id),
            )?;
            return Ok(());
        }

        // Uniform random pick; no preference by proximity or load.
        let chosen = &candidates[rand::rng().random_range(0..candidates.len())];

        info!(
            trip_id = %trip.id,
            driver_id = %chosen.id,
            candidates = candidates.len(),
            "Offering trip to driver"
        );

        let request = Envelope::with_payload(&chosen.id, &TripEventData { trip })?;
        self.producer
            .publish(topics::DRIVER_CMD_TRIP_REQUEST, &request)?;

        Ok(())
    }
}

#[async_trait]
impl RecordHandler for TripEventHandler {
    async fn handle(&self, record: Record) -> Result<(), HandlerError> {
        let envelope = record.envelope()?;

        match record.topic.as_str() {
            topics::TRIP_CREATED | topics::TRIP_DRIVER_NOT_INTERESTED => {
                let payload: TripEventData = envelope.payload()?;
                self.find_and_request(payload.trip).await
            }
            other => {
                warn!(topic = other, "Unexpected record topic");
                Ok(())
            }
        }
    }
}
