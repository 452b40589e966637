//! Payment collaborator.
//!
//! Consumes `trip.driver_assigned`, creates a checkout session with the
//! payment provider, and publishes `payment.event.session_created` for the
//! rider. Provider session creation sits behind the [`PaymentProcessor`]
//! trait; the production implementation talks to Stripe.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

pub mod events;

pub use events::TripAssignedHandler;

/// Result type for payment operations.
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors from payment provider calls.
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("payment provider request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("payment provider rejected the session: {0}")]
    Provider(String),
}

/// Provider boundary for creating a payment session.
///
/// `amount_minor` is in the currency's minor unit (paise for INR).
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn create_session(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String>;
}

/// Stripe Checkout configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StripeConfig {
    pub secret_key: String,
    pub success_url: String,
    pub cancel_url: String,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            success_url: "http://localhost:3000/payment/success".to_string(),
            cancel_url: "http://localhost:3000/payment/cancel".to_string(),
        }
    }
}

/// Stripe Checkout session creation.
pub struct StripeCheckout {
    http: reqwest::Client,
    config: StripeConfig,
}

impl StripeCheckout {
    pub fn new(config: StripeConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeSession {
    id: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: String,
}

#[async_trait]
impl PaymentProcessor for StripeCheckout {
    async fn create_session(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: HashMap<String, String>,
    ) -> Result<String> {
        let mut form: Vec<(String, String)> = vec![
            ("mode".to_string(), "payment".to_string()),
            ("success_url".to_string(), self.config.success_url.clone()),
            ("cancel_url".to_string(), self.config.cancel_url.clone()),
            ("line_items[0][quantity]".to_string(), "1".to_string()),
            (
                "line_items[0][price_data][currency]".to_string(),
                currency.to_string(),
            ),
            (
                "line_items[0][price_data][unit_amount]".to_string(),
                amount_minor.to_string(),
            ),
            (
                "line_items[0][price_data][product_data][name]".to_string(),
                "Rideline trip".to_string(),
            ),
        ];
        for (key, value) in metadata {
            form.push((format!("metadata[{key}]"), value));
        }

        let response = self
            .http
            .post("https://api.stripe.com/v1/checkout/sessions")
            .bearer_auth(&self.config.secret_key)
            .form(&form)
            .send()
            .await?;

        if !response.status().is_success() {
            let message = match response.json::<StripeErrorBody>().await {
                Ok(body) => body.error.message,
                Err(e) => e.to_string(),
            };
            return Err(PaymentError::Provider(message));
        }

        let session: StripeSession = response.json().await?;
        debug!(session_id = %session.id, "Checkout session created");
        Ok(session.id)
    }
}
