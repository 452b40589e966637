//! rideline-trip: trip/fare service.
//!
//! Hosts the trip gRPC surface (fare preview, trip start) and the saga's
//! response side: the consumer that applies driver accept/decline events to
//! the trip store and emits the follow-up events.

use std::sync::Arc;
use std::time::Duration;

use tonic::transport::Server;
use tracing::{error, info};

use rideline::bootstrap;
use rideline::config::Config;
use rideline::messaging::{EventPublisher, KafkaClient};
use rideline::proto::trip_service_server::TripServiceServer;
use rideline::routing::{OsrmRouteClient, RouteClient};
use rideline::trip::events::{DriverResponseHandler, RESPONSE_TOPICS};
use rideline::trip::grpc::TripGrpc;
use rideline::trip::{TripService, TripStore};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bootstrap::init_tracing();
    let config = Config::load(None)?;
    let cancel = bootstrap::shutdown_token();

    let kafka = Arc::new(KafkaClient::new(
        config.kafka_config(&config.trip.group_id),
        cancel.clone(),
    )?);
    let producer: Arc<dyn EventPublisher> = kafka.producer.clone();

    let store = Arc::new(TripStore::new());
    let routes: Arc<dyn RouteClient> = Arc::new(OsrmRouteClient::new(&config.trip.osrm_base_url));
    let service = Arc::new(TripService::new(
        store.clone(),
        routes,
        producer.clone(),
        config.pricing.clone(),
        Duration::from_secs(config.trip.publish_timeout_secs),
    ));

    let consumer = tokio::spawn({
        let kafka = kafka.clone();
        let cancel = cancel.clone();
        let handler = DriverResponseHandler::new(store, producer);
        async move {
            if let Err(e) = kafka
                .consumer
                .subscribe_and_consume(cancel, &RESPONSE_TOPICS, &handler)
                .await
            {
                error!(error = %e, "Driver response consumer failed");
            }
        }
    });

    let addr = config.trip.grpc_addr.parse()?;
    info!(addr = %addr, "Trip service listening");

    Server::builder()
        .add_service(TripServiceServer::new(TripGrpc::new(service)))
        .serve_with_shutdown(addr, cancel.clone().cancelled_owned())
        .await?;

    cancel.cancel();
    bootstrap::drain("driver response consumer", consumer).await;
    info!("Trip service stopped");
    Ok(())
}
