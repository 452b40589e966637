//! Rideline - event-driven ride-hailing orchestration.
//!
//! Four independently deployed services (gateway, trip, driver, payment)
//! coordinate trips through Kafka topics and a small gRPC surface. The
//! library holds everything the binaries share: the broker client, the
//! connection registry and topic fan-out, the trip/driver/payment event
//! handlers, and the per-service configuration.

pub mod bootstrap;
pub mod config;
pub mod driver;
pub mod fanout;
pub mod gateway;
pub mod messaging;
pub mod payment;
pub mod pricing;
pub mod registry;
pub mod routing;
pub mod trip;

pub mod proto {
    tonic::include_proto!("rideline");
}
