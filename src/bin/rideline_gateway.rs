//! rideline-gateway: rider/driver edge.
//!
//! Serves the trip preview/start HTTP endpoints and the long-lived
//! rider/driver WebSocket connections, and runs the topic fan-out consumer
//! that bridges broker events onto those connections.

use std::sync::Arc;

use tracing::{error, info};

use rideline::bootstrap;
use rideline::config::Config;
use rideline::fanout::{TopicFanout, FANOUT_TOPICS};
use rideline::gateway::{self, GatewayState};
use rideline::messaging::{EventPublisher, KafkaClient};
use rideline::proto::driver_service_client::DriverServiceClient;
use rideline::proto::trip_service_client::TripServiceClient;
use rideline::registry::ConnectionRegistry;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bootstrap::init_tracing();
    let config = Config::load(None)?;
    let cancel = bootstrap::shutdown_token();

    let kafka = Arc::new(KafkaClient::new(
        config.kafka_config(&config.gateway.group_id),
        cancel.clone(),
    )?);
    let producer: Arc<dyn EventPublisher> = kafka.producer.clone();
    let registry = Arc::new(ConnectionRegistry::new());

    let trip_address = config.gateway.trip_address.clone();
    let trips = bootstrap::connect_with_retry("trip service", &trip_address, || {
        let address = trip_address.clone();
        async move { TripServiceClient::connect(address).await }
    })
    .await?;

    let driver_address = config.gateway.driver_address.clone();
    let drivers = bootstrap::connect_with_retry("driver service", &driver_address, || {
        let address = driver_address.clone();
        async move { DriverServiceClient::connect(address).await }
    })
    .await?;

    // Process-lifetime fan-out consumer; connections come and go underneath it.
    let fanout = TopicFanout::new(registry.clone());
    let consumer = tokio::spawn({
        let kafka = kafka.clone();
        let cancel = cancel.clone();
        async move {
            if let Err(e) = kafka
                .consumer
                .subscribe_and_consume(cancel, &FANOUT_TOPICS, &fanout)
                .await
            {
                error!(error = %e, "Fan-out consumer failed");
            }
        }
    });

    let state = Arc::new(GatewayState {
        registry,
        producer,
        trips,
        drivers,
    });

    let listener = tokio::net::TcpListener::bind(&config.gateway.http_addr).await?;
    info!(addr = %config.gateway.http_addr, "Gateway listening");

    axum::serve(listener, gateway::router(state))
        .with_graceful_shutdown(cancel.clone().cancelled_owned())
        .await?;

    cancel.cancel();
    bootstrap::drain("fan-out consumer", consumer).await;
    info!("Gateway stopped");
    Ok(())
}
