//! Trip preview/start HTTP handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tonic::{Code, Status};
use tracing::error;

use crate::proto::{Coordinate, PreviewTripRequest, StartTripRequest};

use super::GatewayState;

#[derive(Debug, Serialize)]
pub struct ApiResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: u16,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PreviewTripBody {
    #[serde(rename = "riderID", default)]
    rider_id: String,
    pickup: Coordinate,
    destination: Coordinate,
}

#[derive(Debug, Deserialize)]
pub struct StartTripBody {
    #[serde(rename = "riderID", default)]
    rider_id: String,
    #[serde(rename = "fareID", default)]
    fare_id: String,
}

pub async fn preview_trip(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<PreviewTripBody>,
) -> (StatusCode, Json<ApiResponse>) {
    if body.rider_id.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "riderID is required");
    }

    let mut client = state.trips.clone();
    let request = PreviewTripRequest {
        rider_id: body.rider_id,
        pickup: Some(body.pickup),
        destination: Some(body.destination),
    };

    match client.preview_trip(request).await {
        Ok(response) => success(response.into_inner()),
        Err(status) => from_status(status),
    }
}

pub async fn start_trip(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<StartTripBody>,
) -> (StatusCode, Json<ApiResponse>) {
    if body.rider_id.is_empty() || body.fare_id.is_empty() {
        return failure(StatusCode::BAD_REQUEST, "riderID and fareID are required");
    }

    let mut client = state.trips.clone();
    let request = StartTripRequest {
        rider_id: body.rider_id,
        fare_id: body.fare_id,
    };

    match client.start_trip(request).await {
        Ok(response) => success(response.into_inner()),
        Err(status) => from_status(status),
    }
}

fn success<T: Serialize>(data: T) -> (StatusCode, Json<ApiResponse>) {
    match serde_json::to_value(data) {
        Ok(value) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: Some(value),
                error: None,
            }),
        ),
        Err(e) => {
            error!(error = %e, "Failed to serialize response");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

fn failure(code: StatusCode, message: &str) -> (StatusCode, Json<ApiResponse>) {
    (
        code,
        Json(ApiResponse {
            data: None,
            error: Some(ApiError {
                code: code.as_u16(),
                message: message.to_string(),
            }),
        }),
    )
}

fn from_status(status: Status) -> (StatusCode, Json<ApiResponse>) {
    let code = match status.code() {
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::NotFound => StatusCode::NOT_FOUND,
        Code::PermissionDenied => StatusCode::FORBIDDEN,
        Code::FailedPrecondition => StatusCode::CONFLICT,
        Code::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
        Code::Unavailable => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    failure(code, status.message())
}
