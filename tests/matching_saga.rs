//! End-to-end matching saga scenarios.
//!
//! Drives the real search/response/fan-out handlers against in-memory stores,
//! with the mock producer standing in for the broker. A small pump loop plays
//! the broker's role: it drains published envelopes and re-dispatches them to
//! whichever handler subscribes to their topic.

use std::sync::Arc;

use rideline::driver::events::{TripEventHandler, SEARCH_TOPICS};
use rideline::driver::{build_driver, DriverPool};
use rideline::fanout::{TopicFanout, FANOUT_TOPICS};
use rideline::messaging::{
    topics, DriverTripResponseData, Envelope, EventPublisher, MockProducer, Record, RecordHandler,
    TripEventData,
};
use rideline::proto::{Driver, RideFare};
use rideline::registry::{ConnectionRegistry, MockConnection};
use rideline::trip::events::{DriverResponseHandler, RESPONSE_TOPICS};
use rideline::trip::TripStore;

/// Everything a single matching scenario needs, wired the way the binaries
/// wire it, minus Kafka.
struct Harness {
    producer: Arc<MockProducer>,
    store: Arc<TripStore>,
    pool: Arc<DriverPool>,
    registry: Arc<ConnectionRegistry>,
    search: TripEventHandler,
    response: DriverResponseHandler,
    fanout: TopicFanout,
}

impl Harness {
    fn new() -> Self {
        let producer = Arc::new(MockProducer::new());
        let store = Arc::new(TripStore::new());
        let pool = Arc::new(DriverPool::new());
        let registry = Arc::new(ConnectionRegistry::new());

        Self {
            search: TripEventHandler::new(pool.clone(), producer.clone()),
            response: DriverResponseHandler::new(store.clone(), producer.clone()),
            fanout: TopicFanout::new(registry.clone()),
            producer,
            store,
            pool,
            registry,
        }
    }

    /// Drain every published envelope and re-dispatch it to the subscribing
    /// handlers, until no handler publishes anything new.
    async fn pump(&self) {
        loop {
            let published = self.producer.take_published();
            if published.is_empty() {
                return;
            }

            for (topic, envelope) in published {
                let record = Record::new(&topic, Some(envelope.to_bytes().unwrap()));

                if SEARCH_TOPICS.contains(&topic.as_str()) {
                    self.search.handle(record.clone()).await.unwrap();
                }
                if RESPONSE_TOPICS.contains(&topic.as_str()) {
                    self.response.handle(record.clone()).await.unwrap();
                }
                if FANOUT_TOPICS.contains(&topic.as_str()) {
                    self.fanout.handle(record).await.unwrap();
                }
            }
        }
    }

    /// Publish `trip.created` the way the trip service does.
    fn trip_created(&self, trip: &rideline::proto::Trip) {
        let envelope =
            Envelope::with_payload(&trip.rider_id, &TripEventData { trip: trip.clone() }).unwrap();
        self.producer
            .publish(topics::TRIP_CREATED, &envelope)
            .unwrap();
    }

    /// Publish a driver response the way the gateway forwards it.
    fn driver_response(&self, topic: &str, trip_id: &str, rider_id: &str, driver: &Driver) {
        let envelope = Envelope::with_payload(
            &driver.id,
            &DriverTripResponseData {
                trip_id: trip_id.to_string(),
                rider_id: rider_id.to_string(),
                driver: Some(driver.clone()),
            },
        )
        .unwrap();
        self.producer.publish(topic, &envelope).unwrap();
    }
}

fn fare(rider_id: &str, package_slug: &str) -> RideFare {
    RideFare {
        id: format!("fare-{rider_id}"),
        rider_id: rider_id.to_string(),
        package_slug: package_slug.to_string(),
        total_fare: 140.0,
        route: None,
    }
}

#[tokio::test]
async fn decline_then_drained_pool_notifies_rider() {
    let harness = Harness::new();

    // Trip T1: rider R1 wants a sedan; D1 drives a sedan, D2 a bike.
    let d1 = harness.pool.register(build_driver("D1", "sedan")).await;
    harness.pool.register(build_driver("D2", "bike")).await;

    let rider_conn = Arc::new(MockConnection::new());
    harness.registry.add("R1", rider_conn.clone()).await;
    let d1_conn = Arc::new(MockConnection::new());
    harness.registry.add("D1", d1_conn.clone()).await;

    let trip = harness.store.create_trip("R1", fare("R1", "sedan")).await;

    harness.trip_created(&trip);
    harness.pump().await;

    // Only the matching driver was offered the trip.
    let offers = d1_conn.sent();
    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].kind, topics::DRIVER_CMD_TRIP_REQUEST);

    // D1 declines; the only sedan driver then leaves the pool, so the
    // re-search comes up empty and the rider is notified.
    harness.pool.unregister("D1").await;
    harness.driver_response(topics::DRIVER_TRIP_DECLINE, &trip.id, "R1", &d1);
    harness.pump().await;

    let rider_frames = rider_conn.sent();
    assert_eq!(rider_frames.len(), 1);
    assert_eq!(rider_frames[0].kind, topics::TRIP_NO_DRIVERS_FOUND);

    assert_eq!(harness.store.get(&trip.id).await.unwrap().status, "no_drivers");
}

#[tokio::test]
async fn accept_assigns_driver_and_reaches_rider_connection() {
    let harness = Harness::new();

    let d3 = harness.pool.register(build_driver("D3", "suv")).await;
    let rider_conn = Arc::new(MockConnection::new());
    harness.registry.add("R2", rider_conn.clone()).await;

    let trip = harness.store.create_trip("R2", fare("R2", "suv")).await;

    harness.trip_created(&trip);
    harness.pump().await;

    harness.driver_response(topics::DRIVER_TRIP_ACCEPT, &trip.id, "R2", &d3);
    harness.pump().await;

    let stored = harness.store.get(&trip.id).await.unwrap();
    assert_eq!(stored.status, "accepted");

    // The rider's open connection received the assignment, payload carrying
    // D3's public fields.
    let frames = rider_conn.sent();
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].kind, topics::TRIP_DRIVER_ASSIGNED);

    let payload: TripEventData =
        serde_json::from_value(frames[0].data.clone().unwrap()).unwrap();
    let assigned = payload.trip.driver.unwrap();
    assert_eq!(assigned.id, "D3");
    assert_eq!(assigned.car_plate, d3.car_plate);
}

#[tokio::test]
async fn redelivered_trip_created_does_not_corrupt_state() {
    let harness = Harness::new();

    harness.pool.register(build_driver("D1", "sedan")).await;
    let trip = harness.store.create_trip("R1", fare("R1", "sedan")).await;

    // At-least-once: the same record delivered twice.
    harness.trip_created(&trip);
    harness.trip_created(&trip);
    harness.pump().await;

    assert_eq!(harness.store.get(&trip.id).await.unwrap().status, "pending");
}

#[tokio::test]
async fn offline_rider_misses_notification_without_breaking_the_saga() {
    let harness = Harness::new();

    // No connections registered at all: fan-out drops everything, the saga
    // still terminates the trip.
    let trip = harness.store.create_trip("R1", fare("R1", "sedan")).await;
    harness.trip_created(&trip);
    harness.pump().await;

    assert_eq!(harness.store.get(&trip.id).await.unwrap().status, "no_drivers");
}
