//! rideline-driver: driver service.
//!
//! Hosts driver registration over gRPC, the live driver pool, and the saga's
//! search side: the consumer that offers each searchable trip to one matching
//! driver.

use std::sync::Arc;

use tonic::transport::Server;
use tracing::{error, info};

use rideline::bootstrap;
use rideline::config::Config;
use rideline::driver::events::{TripEventHandler, SEARCH_TOPICS};
use rideline::driver::grpc::DriverGrpc;
use rideline::driver::DriverPool;
use rideline::messaging::{EventPublisher, KafkaClient};
use rideline::proto::driver_service_server::DriverServiceServer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bootstrap::init_tracing();
    let config = Config::load(None)?;
    let cancel = bootstrap::shutdown_token();

    let kafka = Arc::new(KafkaClient::new(
        config.kafka_config(&config.driver.group_id),
        cancel.clone(),
    )?);
    let producer: Arc<dyn EventPublisher> = kafka.producer.clone();

    let pool = Arc::new(DriverPool::new());

    let consumer = tokio::spawn({
        let kafka = kafka.clone();
        let cancel = cancel.clone();
        let handler = TripEventHandler::new(pool.clone(), producer);
        async move {
            if let Err(e) = kafka
                .consumer
                .subscribe_and_consume(cancel, &SEARCH_TOPICS, &handler)
                .await
            {
                error!(error = %e, "Trip event consumer failed");
            }
        }
    });

    let addr = config.driver.grpc_addr.parse()?;
    info!(addr = %addr, "Driver service listening");

    Server::builder()
        .add_service(DriverServiceServer::new(DriverGrpc::new(pool)))
        .serve_with_shutdown(addr, cancel.clone().cancelled_owned())
        .await?;

    cancel.cancel();
    bootstrap::drain("trip event consumer", consumer).await;
    info!("Driver service stopped");
    Ok(())
}
