use gatepass_catalog::PricingPolicy;
use gatepass_core::{GatewayConfig, RetryPolicy};
use serde::Deserialize;
use std::env;
use std::net::IpAddr;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    /// Rate limiting is off without Redis.
    pub redis: Option<RedisConfig>,
    /// Notifications are only logged without Kafka.
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub checkout: PricingPolicy,
    #[serde(default)]
    pub store_retry: RetryPolicy,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct RedisConfig {
    pub url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    #[serde(default = "default_order_topic")]
    pub order_topic: String,
    #[serde(default = "default_checkin_topic")]
    pub checkin_topic: String,
}

fn default_order_topic() -> String {
    "order.confirmed".to_string()
}

fn default_checkin_topic() -> String {
    "ticket.checked_in".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
}

/// Fixed window per client IP.
#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests: i64,
    pub window_seconds: i64,
    /// Peers whose `X-Forwarded-For` header names the real client. Every
    /// other peer is limited by its own socket address.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests: 100,
            window_seconds: 60,
            trusted_proxies: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = config::Config::builder()
            .add_source(config::File::with_name("config/default"))
            .add_source(config::File::with_name(&format!("config/{}", run_mode)).required(false))
            // Not checked in
            .add_source(config::File::with_name("config/local").required(false))
            // e.g. `GATEPASS_GATEWAY__HASH_SECRET=...`
            .add_source(config::Environment::with_prefix("GATEPASS").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
