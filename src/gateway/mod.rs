//! Rider/driver edge.
//!
//! One axum router serving the trip preview/start HTTP endpoints and the
//! long-lived rider/driver WebSocket connections. Inbound client frames are
//! forwarded to the broker; broker events reach connections through the
//! fan-out consumer, which the gateway binary runs alongside this router.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use tonic::transport::Channel;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::messaging::EventPublisher;
use crate::proto::driver_service_client::DriverServiceClient;
use crate::proto::trip_service_client::TripServiceClient;
use crate::registry::ConnectionRegistry;

pub mod http;
pub mod ws;

/// Shared state for all gateway handlers.
pub struct GatewayState {
    pub registry: Arc<ConnectionRegistry>,
    pub producer: Arc<dyn EventPublisher>,
    pub trips: TripServiceClient<Channel>,
    pub drivers: DriverServiceClient<Channel>,
}

/// Build the gateway router.
pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/api/v1/trips/preview", post(http::preview_trip))
        .route("/api/v1/trips/start", post(http::start_trip))
        .route("/api/v1/ws/riders", get(ws::riders))
        .route("/api/v1/ws/drivers", get(ws::drivers))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ok", "service": "gateway" })),
    )
}

async fn ready() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(serde_json::json!({ "status": "ready", "service": "gateway" })),
    )
}
