//! WebSocket connection handlers.
//!
//! A rider or driver opens one long-lived connection identified by a
//! query-supplied id. Drivers are registered with the driver service for the
//! lifetime of the connection; their accept/decline frames are re-published
//! to the broker keyed by the driver id. Unrecognized frame types are logged
//! and ignored.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use futures::StreamExt;
use serde::Deserialize;
use tracing::{debug, error, info, warn};

use crate::messaging::{topics, Envelope, WsMessage};
use crate::proto::{RegisterDriverRequest, UnregisterDriverRequest};
use crate::registry::WsConnection;

use super::GatewayState;

#[derive(Debug, Deserialize)]
pub struct RiderParams {
    #[serde(rename = "riderID", default)]
    rider_id: String,
}

#[derive(Debug, Deserialize)]
pub struct DriverParams {
    #[serde(rename = "driverID", default)]
    driver_id: String,
    #[serde(rename = "packageSlug", default)]
    package_slug: String,
}

pub async fn riders(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<RiderParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| rider_session(state, params, socket))
}

pub async fn drivers(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<DriverParams>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| driver_session(state, params, socket))
}

async fn rider_session(state: Arc<GatewayState>, params: RiderParams, socket: WebSocket) {
    let rider_id = params.rider_id;
    if rider_id.is_empty() {
        warn!("Rider connection without riderID, closing");
        return;
    }

    let (sink, mut stream) = socket.split();
    state
        .registry
        .add(&rider_id, Arc::new(WsConnection::new(sink)))
        .await;
    info!(rider_id = %rider_id, "Rider connected");

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                debug!(rider_id = %rider_id, frame = %text, "Rider frame");
            }
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    state.registry.remove(&rider_id).await;
    info!(rider_id = %rider_id, "Rider disconnected");
}

async fn driver_session(state: Arc<GatewayState>, params: DriverParams, socket: WebSocket) {
    let driver_id = params.driver_id;
    if driver_id.is_empty() || params.package_slug.is_empty() {
        warn!("Driver connection without driverID or packageSlug, closing");
        return;
    }

    let mut drivers = state.drivers.clone();
    let registered = match drivers
        .register_driver(RegisterDriverRequest {
            driver_id: driver_id.clone(),
            package_slug: params.package_slug.clone(),
        })
        .await
    {
        Ok(response) => response.into_inner().driver,
        Err(status) => {
            error!(driver_id = %driver_id, error = %status, "Driver registration failed, closing");
            return;
        }
    };

    let (sink, mut stream) = socket.split();
    state
        .registry
        .add(&driver_id, Arc::new(WsConnection::new(sink)))
        .await;
    info!(driver_id = %driver_id, package_slug = %params.package_slug, "Driver connected");

    // Confirm registration with the driver's public record.
    let data = registered.and_then(|driver| serde_json::to_value(driver).ok());
    if let Err(e) = state
        .registry
        .send(&driver_id, &WsMessage::new(topics::DRIVER_CMD_REGISTER, data))
        .await
    {
        error!(driver_id = %driver_id, error = %e, "Failed to confirm registration");
    }

    while let Some(frame) = stream.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => continue,
        };

        let message: WsMessage = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!(driver_id = %driver_id, error = %e, "Malformed driver frame");
                continue;
            }
        };

        match message.kind.as_str() {
            topics::DRIVER_CMD_LOCATION => {
                debug!(driver_id = %driver_id, "Location update");
            }
            topics::DRIVER_TRIP_ACCEPT | topics::DRIVER_TRIP_DECLINE => {
                let envelope = Envelope {
                    entity_id: driver_id.clone(),
                    data: message.data,
                };
                if let Err(e) = state.producer.publish(&message.kind, &envelope) {
                    error!(driver_id = %driver_id, error = %e, "Failed to forward driver response");
                }
            }
            other => {
                warn!(driver_id = %driver_id, kind = other, "Unknown frame type");
            }
        }
    }

    state.registry.remove(&driver_id).await;
    if let Err(status) = drivers
        .unregister_driver(UnregisterDriverRequest {
            driver_id: driver_id.clone(),
        })
        .await
    {
        error!(driver_id = %driver_id, error = %status, "Driver unregistration failed");
    }
    info!(driver_id = %driver_id, "Driver disconnected");
}
