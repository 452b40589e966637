//! Trip/fare service.
//!
//! Synchronous request/response layer (fare preview, trip start) plus the
//! saga's response side: the driver accept/decline consumer lives in
//! [`events`], the store in [`store`]. Trip records are owned exclusively by
//! this service; the saga mutates them only through the store's validated
//! transitions.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use uuid::Uuid;

use crate::messaging::{topics, Envelope, EventPublisher, MessagingError, TripEventData};
use crate::pricing::{self, PricingConfig};
use crate::proto::{Coordinate, RideFare, Route, Trip};
use crate::routing::{RouteClient, RoutingError};

pub mod events;
pub mod grpc;
pub mod store;

pub use store::{StoreError, TripStatus, TripStore};

/// Result type for trip service operations.
pub type Result<T> = std::result::Result<T, TripError>;

/// Errors surfaced by the trip service.
#[derive(Debug, thiserror::Error)]
pub enum TripError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Routing(#[from] RoutingError),

    #[error("failed to publish trip event: {0}")]
    Publish(#[from] MessagingError),
}

/// Trip creation and fare preview.
pub struct TripService {
    store: Arc<TripStore>,
    routes: Arc<dyn RouteClient>,
    producer: Arc<dyn EventPublisher>,
    pricing: PricingConfig,
    publish_timeout: Duration,
}

impl TripService {
    pub fn new(
        store: Arc<TripStore>,
        routes: Arc<dyn RouteClient>,
        producer: Arc<dyn EventPublisher>,
        pricing: PricingConfig,
        publish_timeout: Duration,
    ) -> Self {
        Self {
            store,
            routes,
            producer,
            pricing,
            publish_timeout,
        }
    }

    /// Preview a trip: route the journey and persist one fare per package.
    pub async fn preview(
        &self,
        rider_id: &str,
        pickup: &Coordinate,
        destination: &Coordinate,
    ) -> Result<(Route, Vec<RideFare>)> {
        let route = self.routes.route(pickup, destination).await?;

        let mut fares = pricing::estimate_packages(&route, &self.pricing);
        for fare in &mut fares {
            fare.id = Uuid::new_v4().to_string();
            fare.rider_id = rider_id.to_string();
            fare.route = Some(route.clone());
            self.store.save_fare(fare.clone()).await;
        }

        info!(rider_id, fares = fares.len(), "Previewed trip");
        Ok((route, fares))
    }

    /// Start a trip from a previously previewed fare.
    ///
    /// The fare must belong to the requesting rider. The `trip.created` event
    /// is published with broker acknowledgement: the trip only exists for the
    /// caller once the saga trigger is durable on the topic.
    pub async fn start(&self, rider_id: &str, fare_id: &str) -> Result<Trip> {
        let fare = self.store.fare_for_rider(fare_id, rider_id).await?;
        let trip = self.store.create_trip(rider_id, fare).await;

        let envelope = Envelope::with_payload(&trip.rider_id, &TripEventData { trip: trip.clone() })?;
        self.producer
            .publish_and_await(topics::TRIP_CREATED, &envelope, self.publish_timeout)
            .await?;

        info!(trip_id = %trip.id, rider_id, "Trip created");
        Ok(trip)
    }
}
