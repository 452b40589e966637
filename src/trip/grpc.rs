//! gRPC surface of the trip service.

use std::sync::Arc;

use tonic::{Request, Response, Status};
use tracing::error;

use crate::messaging::MessagingError;
use crate::proto::trip_service_server::TripService as TripServiceApi;
use crate::proto::{
    PreviewTripRequest, PreviewTripResponse, StartTripRequest, StartTripResponse,
};

use super::{StoreError, TripError, TripService};

/// tonic server wrapper around [`TripService`].
pub struct TripGrpc {
    service: Arc<TripService>,
}

impl TripGrpc {
    pub fn new(service: Arc<TripService>) -> Self {
        Self { service }
    }
}

#[tonic::async_trait]
impl TripServiceApi for TripGrpc {
    async fn preview_trip(
        &self,
        request: Request<PreviewTripRequest>,
    ) -> Result<Response<PreviewTripResponse>, Status> {
        let request = request.into_inner();
        if request.rider_id.is_empty() {
            return Err(Status::invalid_argument("rider_id is required"));
        }
        let pickup = request
            .pickup
            .ok_or_else(|| Status::invalid_argument("pickup is required"))?;
        let destination = request
            .destination
            .ok_or_else(|| Status::invalid_argument("destination is required"))?;

        let (route, fares) = self
            .service
            .preview(&request.rider_id, &pickup, &destination)
            .await
            .map_err(into_status)?;

        Ok(Response::new(PreviewTripResponse {
            route: Some(route),
            fares,
        }))
    }

    async fn start_trip(
        &self,
        request: Request<StartTripRequest>,
    ) -> Result<Response<StartTripResponse>, Status> {
        let request = request.into_inner();
        if request.rider_id.is_empty() {
            return Err(Status::invalid_argument("rider_id is required"));
        }
        if request.fare_id.is_empty() {
            return Err(Status::invalid_argument("fare_id is required"));
        }

        let trip = self
            .service
            .start(&request.rider_id, &request.fare_id)
            .await
            .map_err(into_status)?;

        Ok(Response::new(StartTripResponse { trip: Some(trip) }))
    }
}

fn into_status(err: TripError) -> Status {
    error!(error = %err, "Trip request failed");
    match &err {
        TripError::Store(StoreError::FareNotFound(_)) | TripError::Store(StoreError::TripNotFound(_)) => {
            Status::not_found(err.to_string())
        }
        TripError::Store(StoreError::FareOwnership { .. }) => {
            Status::permission_denied(err.to_string())
        }
        TripError::Store(StoreError::AlreadyAssigned { .. })
        | TripError::Store(StoreError::IllegalTransition { .. }) => {
            Status::failed_precondition(err.to_string())
        }
        TripError::Publish(MessagingError::Timeout) => Status::deadline_exceeded(err.to_string()),
        TripError::Publish(_) | TripError::Routing(_) => Status::unavailable(err.to_string()),
    }
}
