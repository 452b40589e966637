//! Application configuration.
//!
//! One Config struct covering every binary; each service reads its own
//! section. Loaded from an optional YAML file and `RIDELINE__`-prefixed
//! environment variables, defaults baked in via serde.

use serde::Deserialize;

use crate::messaging::KafkaConfig;
use crate::payment::StripeConfig;
use crate::pricing::PricingConfig;

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "config.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "RIDELINE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "RIDELINE";
/// Environment variable for logging configuration.
pub const LOG_ENV_VAR: &str = "RIDELINE_LOG";

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Broker connection shared by all services.
    pub kafka: KafkaSettings,
    /// Gateway configuration.
    pub gateway: GatewayConfig,
    /// Trip service configuration.
    pub trip: TripConfig,
    /// Driver service configuration.
    pub driver: DriverConfig,
    /// Payment service configuration.
    pub payment: PaymentConfig,
    /// Fare pricing coefficients.
    pub pricing: PricingConfig,
}

/// Broker connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KafkaSettings {
    /// Kafka bootstrap servers (comma-separated).
    pub brokers: String,
}

impl Default for KafkaSettings {
    fn default() -> Self {
        Self {
            brokers: "localhost:9092".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// HTTP/WebSocket listen address.
    pub http_addr: String,
    /// Trip service gRPC address.
    pub trip_address: String,
    /// Driver service gRPC address.
    pub driver_address: String,
    /// Consumer group for the fan-out consumer.
    pub group_id: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".to_string(),
            trip_address: "http://localhost:9000".to_string(),
            driver_address: "http://localhost:9001".to_string(),
            group_id: "gateway-group".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TripConfig {
    /// gRPC listen address.
    pub grpc_addr: String,
    /// Consumer group for the driver response consumer.
    pub group_id: String,
    /// Broker acknowledgement wait for `trip.created`.
    pub publish_timeout_secs: u64,
    /// Routing API base URL.
    pub osrm_base_url: String,
}

impl Default for TripConfig {
    fn default() -> Self {
        Self {
            grpc_addr: "0.0.0.0:9000".to_string(),
            group_id: "trip-service-group".to_string(),
            publish_timeout_secs: 10,
            osrm_base_url: "http://router.project-osrm.org".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// gRPC listen address.
    pub grpc_addr: String,
    /// Consumer group for the trip event consumer.
    pub group_id: String,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            grpc_addr: "0.0.0.0:9001".to_string(),
            group_id: "driver-service-group".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    /// Consumer group for the assigned-trip consumer.
    pub group_id: String,
    /// ISO currency code for sessions.
    pub currency: String,
    /// Broker acknowledgement wait for session-created events.
    pub publish_timeout_secs: u64,
    /// Stripe credentials and redirect URLs.
    pub stripe: StripeConfig,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            group_id: "payment-service-group".to_string(),
            currency: "inr".to_string(),
            publish_timeout_secs: 30,
            stripe: StripeConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `config.yaml` in the current directory (if it exists)
    /// 2. File specified by the `path` argument (if provided)
    /// 3. File specified by `RIDELINE_CONFIG` (if set)
    /// 4. Environment variables with the `RIDELINE__` prefix
    pub fn load(path: Option<&str>) -> Result<Self, Box<dyn std::error::Error>> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        Ok(config)
    }

    /// Broker client configuration for a service's consumer group.
    pub fn kafka_config(&self, group_id: &str) -> KafkaConfig {
        KafkaConfig::new(&self.kafka.brokers).with_group_id(group_id)
    }
}
