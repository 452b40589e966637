//! gRPC surface of the driver service.

use std::sync::Arc;

use tonic::{Request, Response, Status};

use crate::proto::driver_service_server::DriverService as DriverServiceApi;
use crate::proto::{
    RegisterDriverRequest, RegisterDriverResponse, UnregisterDriverRequest,
    UnregisterDriverResponse,
};

use super::{build_driver, DriverPool};

/// tonic server wrapper around the driver pool.
pub struct DriverGrpc {
    pool: Arc<DriverPool>,
}

impl DriverGrpc {
    pub fn new(pool: Arc<DriverPool>) -> Self {
        Self { pool }
    }
}

#[tonic::async_trait]
impl DriverServiceApi for DriverGrpc {
    async fn register_driver(
        &self,
        request: Request<RegisterDriverRequest>,
    ) -> Result<Response<RegisterDriverResponse>, Status> {
        let request = request.into_inner();
        if request.driver_id.is_empty() {
            return Err(Status::invalid_argument("driver_id is required"));
        }
        if request.package_slug.is_empty() {
            return Err(Status::invalid_argument("package_slug is required"));
        }

        let driver = self
            .pool
            .register(build_driver(&request.driver_id, &request.package_slug))
            .await;

        Ok(Response::new(RegisterDriverResponse {
            driver: Some(driver),
        }))
    }

    async fn unregister_driver(
        &self,
        request: Request<UnregisterDriverRequest>,
    ) -> Result<Response<UnregisterDriverResponse>, Status> {
        let request = request.into_inner();
        if request.driver_id.is_empty() {
            return Err(Status::invalid_argument("driver_id is required"));
        }

        self.pool.unregister(&request.driver_id).await;
        Ok(Response::new(UnregisterDriverResponse {}))
    }
}
