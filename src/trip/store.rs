//! In-memory trip and fare store.
//!
//! The store is the serialization point of the matching saga: driver
//! assignment happens under the write lock, so at most one acceptance can win
//! and every other outcome is a rejected transition. Status strings on the
//! wire are materialized from the internally tagged state, never parsed back.

use std::collections::HashMap;
use std::fmt;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::proto::{RideFare, Trip, TripDriver};

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors from trip store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("trip {0} not found")]
    TripNotFound(String),

    #[error("ride fare {0} not found")]
    FareNotFound(String),

    #[error("ride fare {fare_id} does not belong to rider {rider_id}")]
    FareOwnership { fare_id: String, rider_id: String },

    #[error("trip {trip_id} already accepted by driver {driver_id}")]
    AlreadyAssigned { trip_id: String, driver_id: String },

    #[error("trip {trip_id} cannot move from {from} to {to}")]
    IllegalTransition {
        trip_id: String,
        from: TripStatus,
        to: TripStatus,
    },
}

/// Saga state of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripStatus {
    /// Created, no driver attached yet.
    Pending,
    /// A driver accepted; terminal.
    Accepted,
    /// Search exhausted the live pool; terminal, no automatic retry.
    NoDrivers,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Pending => "pending",
            TripStatus::Accepted => "accepted",
            TripStatus::NoDrivers => "no_drivers",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

struct TripEntry {
    trip: Trip,
    status: TripStatus,
}

impl TripEntry {
    /// Clone the trip with the authoritative status materialized.
    fn snapshot(&self) -> Trip {
        let mut trip = self.trip.clone();
        trip.status = self.status.as_str().to_string();
        trip
    }
}

/// Thread-safe in-memory store for trips and ride fares.
#[derive(Default)]
pub struct TripStore {
    trips: RwLock<HashMap<String, TripEntry>>,
    fares: RwLock<HashMap<String, RideFare>>,
}

impl TripStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a pending trip for the given rider and fare.
    pub async fn create_trip(&self, rider_id: &str, fare: RideFare) -> Trip {
        let trip = Trip {
            id: Uuid::new_v4().to_string(),
            rider_id: rider_id.to_string(),
            status: TripStatus::Pending.as_str().to_string(),
            selected_fare: Some(fare),
            driver: None,
        };

        let mut trips = self.trips.write().await;
        trips.insert(
            trip.id.clone(),
            TripEntry {
                trip: trip.clone(),
                status: TripStatus::Pending,
            },
        );
        trip
    }

    /// Fetch a trip by id.
    pub async fn get(&self, trip_id: &str) -> Result<Trip> {
        let trips = self.trips.read().await;
        trips
            .get(trip_id)
            .map(TripEntry::snapshot)
            .ok_or_else(|| StoreError::TripNotFound(trip_id.to_string()))
    }

    /// Attach a driver and flip the trip to accepted.
    ///
    /// Linearizable with respect to concurrent duplicate accepts: the write
    /// lock serializes the check and the mutation, so exactly one acceptance
    /// wins and the rest are rejected as conflicts.
    pub async fn assign_driver(&self, trip_id: &str, driver: TripDriver) -> Result<Trip> {
        let mut trips = self.trips.write().await;
        let entry = trips
            .get_mut(trip_id)
            .ok_or_else(|| StoreError::TripNotFound(trip_id.to_string()))?;

        match entry.status {
            TripStatus::Pending => {
                entry.trip.driver = Some(driver);
                entry.status = TripStatus::Accepted;
                Ok(entry.snapshot())
            }
            TripStatus::Accepted => Err(StoreError::AlreadyAssigned {
                trip_id: trip_id.to_string(),
                driver_id: entry
                    .trip
                    .driver
                    .as_ref()
                    .map(|d| d.id.clone())
                    .unwrap_or_default(),
            }),
            TripStatus::NoDrivers => Err(StoreError::IllegalTransition {
                trip_id: trip_id.to_string(),
                from: TripStatus::NoDrivers,
                to: TripStatus::Accepted,
            }),
        }
    }

    /// Mark a trip as having exhausted the driver pool.
    ///
    /// Idempotent for redelivered no-drivers events; rejected once a driver
    /// has already been attached.
    pub async fn mark_no_drivers(&self, trip_id: &str) -> Result<Trip> {
        let mut trips = self.trips.write().await;
        let entry = trips
            .get_mut(trip_id)
            .ok_or_else(|| StoreError::TripNotFound(trip_id.to_string()))?;

        match entry.status {
            TripStatus::Pending | TripStatus::NoDrivers => {
                entry.status = TripStatus::NoDrivers;
                Ok(entry.snapshot())
            }
            TripStatus::Accepted => Err(StoreError::IllegalTransition {
                trip_id: trip_id.to_string(),
                from: TripStatus::Accepted,
                to: TripStatus::NoDrivers,
            }),
        }
    }

    /// Mark every pending trip of a rider as out of drivers.
    ///
    /// The no-drivers notification is addressed by rider id and carries no
    /// payload, so this is the resolution step from rider to trip.
    pub async fn mark_no_drivers_for_rider(&self, rider_id: &str) -> Vec<Trip> {
        let mut trips = self.trips.write().await;
        trips
            .values_mut()
            .filter(|entry| entry.trip.rider_id == rider_id && entry.status == TripStatus::Pending)
            .map(|entry| {
                entry.status = TripStatus::NoDrivers;
                entry.snapshot()
            })
            .collect()
    }

    /// Persist a ride fare from a preview.
    pub async fn save_fare(&self, fare: RideFare) {
        self.fares.write().await.insert(fare.id.clone(), fare);
    }

    /// Fetch a fare and validate it belongs to the requesting rider.
    pub async fn fare_for_rider(&self, fare_id: &str, rider_id: &str) -> Result<RideFare> {
        let fares = self.fares.read().await;
        let fare = fares
            .get(fare_id)
            .ok_or_else(|| StoreError::FareNotFound(fare_id.to_string()))?;

        if fare.rider_id != rider_id {
            return Err(StoreError::FareOwnership {
                fare_id: fare_id.to_string(),
                rider_id: rider_id.to_string(),
            });
        }

        Ok(fare.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fare(rider_id: &str) -> RideFare {
        RideFare {
            id: Uuid::new_v4().to_string(),
            rider_id: rider_id.to_string(),
            package_slug: "sedan".to_string(),
            total_fare: 120.0,
            route: None,
        }
    }

    fn driver(id: &str) -> TripDriver {
        TripDriver {
            id: id.to_string(),
            name: "Asha Rao".to_string(),
            profile_pic: String::new(),
            car_plate: "KA01AB1234".to_string(),
        }
    }

    #[tokio::test]
    async fn assign_driver_flips_status_once() {
        let store = TripStore::new();
        let trip = store.create_trip("rider-1", fare("rider-1")).await;

        let accepted = store.assign_driver(&trip.id, driver("driver-1")).await.unwrap();
        assert_eq!(accepted.status, "accepted");
        assert_eq!(accepted.driver.unwrap().id, "driver-1");

        let err = store.assign_driver(&trip.id, driver("driver-2")).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::AlreadyAssigned { driver_id, .. } if driver_id == "driver-1"
        ));
    }

    #[tokio::test]
    async fn concurrent_accepts_have_exactly_one_winner() {
        let store = std::sync::Arc::new(TripStore::new());
        let trip = store.create_trip("rider-1", fare("rider-1")).await;

        let first = {
            let store = store.clone();
            let trip_id = trip.id.clone();
            tokio::spawn(async move { store.assign_driver(&trip_id, driver("driver-1")).await })
        };
        let second = {
            let store = store.clone();
            let trip_id = trip.id.clone();
            tokio::spawn(async move { store.assign_driver(&trip_id, driver("driver-2")).await })
        };

        let (first, second) = tokio::join!(first, second);
        let results = [first.unwrap(), second.unwrap()];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(results.iter().filter(|r| r.is_err()).count(), 1);

        let stored = store.get(&trip.id).await.unwrap();
        assert_eq!(stored.status, "accepted");
    }

    #[tokio::test]
    async fn accept_after_no_drivers_is_rejected() {
        let store = TripStore::new();
        let trip = store.create_trip("rider-1", fare("rider-1")).await;

        store.mark_no_drivers(&trip.id).await.unwrap();
        // Redelivery of the same no-drivers event is a safe no-op.
        store.mark_no_drivers(&trip.id).await.unwrap();

        let err = store.assign_driver(&trip.id, driver("driver-1")).await.unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn no_drivers_after_accept_is_rejected() {
        let store = TripStore::new();
        let trip = store.create_trip("rider-1", fare("rider-1")).await;
        store.assign_driver(&trip.id, driver("driver-1")).await.unwrap();

        let err = store.mark_no_drivers(&trip.id).await.unwrap_err();
        assert!(matches!(err, StoreError::IllegalTransition { .. }));
    }

    #[tokio::test]
    async fn mark_no_drivers_for_rider_skips_accepted_trips() {
        let store = TripStore::new();
        let pending = store.create_trip("rider-1", fare("rider-1")).await;
        let accepted = store.create_trip("rider-1", fare("rider-1")).await;
        let other = store.create_trip("rider-2", fare("rider-2")).await;
        store.assign_driver(&accepted.id, driver("driver-1")).await.unwrap();

        let marked = store.mark_no_drivers_for_rider("rider-1").await;

        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].id, pending.id);
        assert_eq!(store.get(&accepted.id).await.unwrap().status, "accepted");
        assert_eq!(store.get(&other.id).await.unwrap().status, "pending");
    }

    #[tokio::test]
    async fn fare_ownership_is_validated() {
        let store = TripStore::new();
        let fare = fare("rider-1");
        store.save_fare(fare.clone()).await;

        assert!(store.fare_for_rider(&fare.id, "rider-1").await.is_ok());
        assert!(matches!(
            store.fare_for_rider(&fare.id, "rider-2").await.unwrap_err(),
            StoreError::FareOwnership { .. }
        ));
        assert!(matches!(
            store.fare_for_rider("missing", "rider-1").await.unwrap_err(),
            StoreError::FareNotFound(_)
        ));
    }
}
