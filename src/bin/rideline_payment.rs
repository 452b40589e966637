//! rideline-payment: payment collaborator.
//!
//! Consumes `trip.driver_assigned`, creates a checkout session with the
//! payment provider, and announces it to the rider.

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use rideline::bootstrap;
use rideline::config::Config;
use rideline::messaging::{EventPublisher, KafkaClient};
use rideline::payment::events::PAYMENT_TOPICS;
use rideline::payment::{PaymentProcessor, StripeCheckout, TripAssignedHandler};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    bootstrap::init_tracing();
    let config = Config::load(None)?;
    let cancel = bootstrap::shutdown_token();

    let kafka = Arc::new(KafkaClient::new(
        config.kafka_config(&config.payment.group_id),
        cancel.clone(),
    )?);
    let producer: Arc<dyn EventPublisher> = kafka.producer.clone();

    let processor: Arc<dyn PaymentProcessor> =
        Arc::new(StripeCheckout::new(config.payment.stripe.clone()));
    let handler = TripAssignedHandler::new(
        processor,
        producer,
        config.payment.currency.clone(),
        Duration::from_secs(config.payment.publish_timeout_secs),
    );

    info!("Payment service consuming");
    kafka
        .consumer
        .subscribe_and_consume(cancel, &PAYMENT_TOPICS, &handler)
        .await?;

    info!("Payment service stopped");
    Ok(())
}
