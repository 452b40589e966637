//! Driver service.
//!
//! Holds the live driver pool (one entry per connected driver, lifetime
//! bounded by the driver's connection) and the saga's search side: the
//! trip-created consumer lives in [`events`]. Driver records are synthesized
//! at registration from a small roster of starting points and identities.

use std::collections::HashMap;

use rand::Rng;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::proto::{Coordinate, Driver};

pub mod events;
pub mod grpc;

/// Starting coordinates handed out to newly registered drivers.
const START_POINTS: [(f64, f64); 5] = [
    (12.9716, 77.5946),
    (12.9352, 77.6245),
    (12.9784, 77.6408),
    (12.9121, 77.6446),
    (13.0358, 77.5970),
];

const DRIVER_NAMES: [&str; 5] = [
    "Asha Rao",
    "Ravi Kulkarni",
    "Meera Iyer",
    "Sandeep Verma",
    "Farah Khan",
];

const PLATE_LETTERS: &[u8] = b"ABCDEFGHJKLMNPRSTUVWXYZ";

/// Thread-safe pool of live drivers keyed by driver id.
#[derive(Default)]
pub struct DriverPool {
    drivers: RwLock<HashMap<String, Driver>>,
}

impl DriverPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a driver. Last writer wins, matching the
    /// connection registry's semantics for a reconnecting driver.
    pub async fn register(&self, driver: Driver) -> Driver {
        let mut drivers = self.drivers.write().await;
        drivers.insert(driver.id.clone(), driver.clone());
        info!(driver_id = %driver.id, package_slug = %driver.package_slug, "Driver registered");
        driver
    }

    /// Remove a driver from the pool.
    pub async fn unregister(&self, driver_id: &str) {
        let mut drivers = self.drivers.write().await;
        if drivers.remove(driver_id).is_none() {
            warn!(driver_id, "Unregister for unknown driver");
        } else {
            info!(driver_id, "Driver unregistered");
        }
    }

    /// Fetch a driver by id.
    pub async fn get(&self, driver_id: &str) -> Option<Driver> {
        self.drivers.read().await.get(driver_id).cloned()
    }

    /// Snapshot of all drivers whose service package matches `package_slug`.
    pub async fn find_by_package(&self, package_slug: &str) -> Vec<Driver> {
        self.drivers
            .read()
            .await
            .values()
            .filter(|d| d.package_slug == package_slug)
            .cloned()
            .collect()
    }
}

/// Build a full driver record for a registering driver id.
pub fn build_driver(driver_id: &str, package_slug: &str) -> Driver {
    let mut rng = rand::rng();
    let idx = rng.random_range(0..START_POINTS.len());
    let (latitude, longitude) = START_POINTS[idx];

    let geohash = geohash::encode(
        geohash::Coord {
            x: longitude,
            y: latitude,
        },
        9,
    )
    .unwrap_or_default();

    Driver {
        id: driver_id.to_string(),
        name: DRIVER_NAMES[idx].to_string(),
        profile_pic: format!("https://randomuser.me/api/portraits/lego/{idx}.jpg"),
        car_plate: random_plate(&mut rng),
        package_slug: package_slug.to_string(),
        geohash,
        location: Some(Coordinate {
            latitude,
            longitude,
        }),
    }
}

fn random_plate(rng: &mut impl Rng) -> String {
    let first = PLATE_LETTERS[rng.random_range(0..PLATE_LETTERS.len())] as char;
    let second = PLATE_LETTERS[rng.random_range(0..PLATE_LETTERS.len())] as char;
    format!(
        "KA{:02}{}{}{:04}",
        rng.random_range(1..=60),
        first,
        second,
        rng.random_range(0..10_000)
    )
}
