//! Saga response side: driver accept/decline consumer.
//!
//! On accept the trip store is the serialization point: exactly one
//! acceptance per trip wins, every later one is a conflict surfaced to the
//! subscribe loop. On decline the trip is routed back into the driver search
//! by republishing it as `trip.driver_not_interested`.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::messaging::{
    topics, DriverTripResponseData, Envelope, EventPublisher, HandlerError, MessagingError,
    Record, RecordHandler, TripEventData,
};
use crate::proto::{Driver, TripDriver};

use super::TripStore;

/// Consumer handler for `driver.trip_accept`, `driver.trip_decline` and
/// `trip.no_drivers_found`.
pub struct DriverResponseHandler {
    store: Arc<TripStore>,
    producer: Arc<dyn EventPublisher>,
}

/// Topics this handler subscribes to.
pub const RESPONSE_TOPICS: [&str; 3] = [
    topics::DRIVER_TRIP_ACCEPT,
    topics::DRIVER_TRIP_DECLINE,
    topics::TRIP_NO_DRIVERS_FOUND,
];

impl DriverResponseHandler {
    pub fn new(store: Arc<TripStore>, producer: Arc<dyn EventPublisher>) -> Self {
        Self { store, producer }
    }

    async fn handle_accept(&self, envelope: Envelope) -> Result<(), HandlerError> {
        let response: DriverTripResponseData = envelope.payload()?;
        let driver = response
            .driver
            .ok_or_else(|| MessagingError::Decode("trip accept missing driver".to_string()))?;

        let trip = self
            .store
            .assign_driver(&response.trip_id, public_fields(&driver))
            .await?;

        info!(trip_id = %trip.id, driver_id = %driver.id, "Driver assigned");

        let assigned = Envelope::with_payload(&trip.rider_id.clone(), &TripEventData { trip })?;
        self.producer
            .publish(topics::TRIP_DRIVER_ASSIGNED, &assigned)?;

        Ok(())
    }

    async fn handle_decline(&self, envelope: Envelope) -> Result<(), HandlerError> {
        let response: DriverTripResponseData = envelope.payload()?;
        info!(trip_id = %response.trip_id, "Driver declined trip");

        let trip = self.store.get(&response.trip_id).await?;

        // Route the trip back into the driver search. The declining driver is
        // not excluded: a re-search may pick the same driver again.
        let retry = Envelope::with_payload(&trip.rider_id.clone(), &TripEventData { trip })?;
        self.producer
            .publish(topics::TRIP_DRIVER_NOT_INTERESTED, &retry)?;

        Ok(())
    }

    async fn handle_no_drivers(&self, envelope: Envelope) -> Result<(), HandlerError> {
        let marked = self
            .store
            .mark_no_drivers_for_rider(&envelope.entity_id)
            .await;
        info!(
            rider_id = %envelope.entity_id,
            trips = marked.len(),
            "Marked trips out of drivers"
        );
        Ok(())
    }
}

#[async_trait]
impl RecordHandler for DriverResponseHandler {
    async fn handle(&self, record: Record) -> Result<(), HandlerError> {
        let envelope = record.envelope()?;

        match record.topic.as_str() {
            topics::DRIVER_TRIP_ACCEPT => self.handle_accept(envelope).await,
            topics::DRIVER_TRIP_DECLINE => self.handle_decline(envelope).await,
            topics::TRIP_NO_DRIVERS_FOUND => self.handle_no_drivers(envelope).await,
            other => {
                warn!(topic = other, "Unexpected record topic");
                Ok(())
            }
        }
    }
}

/// Strip a pool driver down to the public fields attached to a trip.
fn public_fields(driver: &Driver) -> TripDriver {
    TripDriver {
        id: driver.id.clone(),
        name: driver.name.clone(),
        profile_pic: driver.profile_pic.clone(),
        car_plate: driver.car_plate.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::MockProducer;
    use crate::proto::RideFare;

    fn fare(rider_id: &str) -> RideFare {
        RideFare {
            id: "fare-1".to_string(),
            rider_id: rider_id.to_string(),
            package_slug: "sedan".to_string(),
            total_fare: 150.0,
            route: None,
        }
    }

    fn driver(id: &str) -> Driver {
        Driver {
            id: id.to_string(),
            name: "Meera Iyer".to_string(),
            profile_pic: "https://example.com/p.jpg".to_string(),
            car_plate: "KA05MH7312".to_string(),
            package_slug: "sedan".to_string(),
            geohash: "tdr1y".to_string(),
            location: None,
        }
    }

    fn accept_record(trip_id: &str, rider_id: &str, driver: Driver) -> Record {
        let envelope = Envelope::with_payload(
            &driver.id.clone(),
            &DriverTripResponseData {
                trip_id: trip_id.to_string(),
                rider_id: rider_id.to_string(),
                driver: Some(driver),
            },
        )
        .unwrap();
        Record::new(topics::DRIVER_TRIP_ACCEPT, Some(envelope.to_bytes().unwrap()))
    }

    #[tokio::test]
    async fn accept_assigns_driver_and_notifies_rider() {
        let store = Arc::new(TripStore::new());
        let producer = Arc::new(MockProducer::new());
        let trip = store.create_trip("rider-1", fare("rider-1")).await;

        let handler = DriverResponseHandler::new(store.clone(), producer.clone());
        handler
            .handle(accept_record(&trip.id, "rider-1", driver("driver-3")))
            .await
            .unwrap();

        let assigned = producer.published_to(topics::TRIP_DRIVER_ASSIGNED);
        assert_eq!(assigned.len(), 1);
        assert_eq!(assigned[0].entity_id, "rider-1");

        let payload: TripEventData = assigned[0].payload().unwrap();
        assert_eq!(payload.trip.status, "accepted");
        assert_eq!(payload.trip.driver.unwrap().id, "driver-3");
    }

    #[tokio::test]
    async fn second_accept_is_a_conflict_left_uncommitted() {
        let store = Arc::new(TripStore::new());
        let producer = Arc::new(MockProducer::new());
        let trip = store.create_trip("rider-1", fare("rider-1")).await;

        let handler = DriverResponseHandler::new(store.clone(), producer.clone());
        handler
            .handle(accept_record(&trip.id, "rider-1", driver("driver-3")))
            .await
            .unwrap();

        let err = handler
            .handle(accept_record(&trip.id, "rider-1", driver("driver-4")))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("already accepted"));

        // Only the winning accept reached the rider.
        assert_eq!(producer.published_to(topics::TRIP_DRIVER_ASSIGNED).len(), 1);
        assert_eq!(
            store.get(&trip.id).await.unwrap().driver.unwrap().id,
            "driver-3"
        );
    }

    #[tokio::test]
    async fn decline_routes_trip_back_into_search() {
        let store = Arc::new(TripStore::new());
        let producer = Arc::new(MockProducer::new());
        let trip = store.create_trip("rider-1", fare("rider-1")).await;

        let envelope = Envelope::with_payload(
            "driver-3",
            &DriverTripResponseData {
                trip_id: trip.id.clone(),
                rider_id: "rider-1".to_string(),
                driver: Some(driver("driver-3")),
            },
        )
        .unwrap();

        let handler = DriverResponseHandler::new(store.clone(), producer.clone());
        handler
            .handle(Record::new(
                topics::DRIVER_TRIP_DECLINE,
                Some(envelope.to_bytes().unwrap()),
            ))
            .await
            .unwrap();

        let retries = producer.published_to(topics::TRIP_DRIVER_NOT_INTERESTED);
        assert_eq!(retries.len(), 1);
        assert_eq!(retries[0].entity_id, "rider-1");
        assert_eq!(
            retries[0].payload::<TripEventData>().unwrap().trip.id,
            trip.id
        );
    }

    #[tokio::test]
    async fn publish_failure_leaves_record_unhandled() {
        let store = Arc::new(TripStore::new());
        let producer = Arc::new(MockProducer::new());
        producer.fail_on(topics::TRIP_DRIVER_NOT_INTERESTED);
        let trip = store.create_trip("rider-1", fare("rider-1")).await;

        let envelope = Envelope::with_payload(
            "driver-3",
            &DriverTripResponseData {
                trip_id: trip.id.clone(),
                rider_id: "rider-1".to_string(),
                driver: None,
            },
        )
        .unwrap();

        let handler = DriverResponseHandler::new(store, producer);
        let result = handler
            .handle(Record::new(
                topics::DRIVER_TRIP_DECLINE,
                Some(envelope.to_bytes().unwrap()),
            ))
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn no_drivers_notification_marks_rider_trips() {
        let store = Arc::new(TripStore::new());
        let producer = Arc::new(MockProducer::new());
        let trip = store.create_trip("rider-1", fare("rider-1")).await;

        let envelope = Envelope::notify("rider-1");
        let handler = DriverResponseHandler::new(store.clone(), producer);
        handler
            .handle(Record::new(
                topics::TRIP_NO_DRIVERS_FOUND,
                Some(envelope.to_bytes().unwrap()),
            ))
            .await
            .unwrap();

        assert_eq!(store.get(&trip.id).await.unwrap().status, "no_drivers");
    }
}
