//! Route lookup against an external routing API.
//!
//! The trip service only depends on the `RouteClient` trait; the OSRM
//! implementation is the production collaborator.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::proto::{Coordinate, Geometry, Route};

/// Result type for routing operations.
pub type Result<T> = std::result::Result<T, RoutingError>;

/// Errors from route lookups.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("routing request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("routing response missing a route")]
    NoRoute,
}

/// Route-distance lookup boundary.
#[async_trait]
pub trait RouteClient: Send + Sync {
    async fn route(&self, pickup: &Coordinate, destination: &Coordinate) -> Result<Route>;
}

/// OSRM HTTP routing client.
pub struct OsrmRouteClient {
    http: reqwest::Client,
    base_url: String,
}

impl OsrmRouteClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OsrmResponse {
    #[serde(default)]
    routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
struct OsrmRoute {
    distance: f64,
    duration: f64,
    geometry: OsrmGeometry,
}

#[derive(Debug, Deserialize)]
struct OsrmGeometry {
    /// GeoJSON positions: `[longitude, latitude]`.
    #[serde(default)]
    coordinates: Vec<[f64; 2]>,
}

#[async_trait]
impl RouteClient for OsrmRouteClient {
    async fn route(&self, pickup: &Coordinate, destination: &Coordinate) -> Result<Route> {
        let url = format!(
            "{}/route/v1/driving/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url,
            pickup.longitude,
            pickup.latitude,
            destination.longitude,
            destination.latitude,
        );

        debug!(url = %url, "Fetching route");

        let response: OsrmResponse = self
            .http
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let route = response.routes.into_iter().next().ok_or(RoutingError::NoRoute)?;

        Ok(Route {
            distance: route.distance,
            duration: route.duration,
            geometry: vec![Geometry {
                coordinates: route
                    .geometry
                    .coordinates
                    .into_iter()
                    .map(|[longitude, latitude]| Coordinate {
                        latitude,
                        longitude,
                    })
                    .collect(),
            }],
        })
    }
}
