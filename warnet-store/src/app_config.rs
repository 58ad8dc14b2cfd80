use chrono::Duration;
use serde::Deserialize;
use std::env;
use warnet_catalog::Venue;
use warnet_order::models::MAX_DURATION_HOURS;
use warnet_order::BookingPolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub business_rules: BusinessRules,
    #[serde(default)]
    pub venues: Vec<Venue>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
}

/// Without a URL the process keeps its state in memory only.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RedisConfig {
    pub url: Option<String>,
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Key the backend writes its authoritative snapshot to.
    pub remote_snapshot_key: Option<String>,
}

fn default_key_prefix() -> String { "warnet".to_string() }

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: Option<String>,
    #[serde(default = "default_topic")]
    pub topic: String,
}

fn default_topic() -> String { "warnet.events".to_string() }

impl Default for KafkaConfig {
    fn default() -> Self {
        Self { brokers: None, topic: default_topic() }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BusinessRules {
    #[serde(default = "default_cancel_window")]
    pub cancel_window_seconds: u64,
    #[serde(default = "default_first_member_min_hours")]
    pub first_member_min_hours: f64,
    #[serde(default = "default_max_duration_hours")]
    pub max_duration_hours: f64,
    #[serde(default = "default_tick_interval")]
    pub tick_interval_millis: u64,
    #[serde(default = "default_reconcile_interval")]
    pub reconcile_interval_seconds: u64,
    #[serde(default)]
    pub session_grace_seconds: u64,
    #[serde(default = "default_unpaid_ttl")]
    pub unpaid_booking_ttl_seconds: u64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

fn default_cancel_window() -> u64 { 120 }
fn default_first_member_min_hours() -> f64 { 2.0 }
fn default_max_duration_hours() -> f64 { MAX_DURATION_HOURS }
fn default_tick_interval() -> u64 { 1000 }
fn default_reconcile_interval() -> u64 { 30 }
fn default_unpaid_ttl() -> u64 { 900 }
fn default_currency() -> String { "IDR".to_string() }

impl Default for BusinessRules {
    fn default() -> Self {
        Self {
            cancel_window_seconds: default_cancel_window(),
            first_member_min_hours: default_first_member_min_hours(),
            max_duration_hours: default_max_duration_hours(),
            tick_interval_millis: default_tick_interval(),
            reconcile_interval_seconds: default_reconcile_interval(),
            session_grace_seconds: 0,
            unpaid_booking_ttl_seconds: default_unpaid_ttl(),
            currency: default_currency(),
        }
    }
}

impl BusinessRules {
    pub fn booking_policy(&self) -> BookingPolicy {
        BookingPolicy {
            cancel_window: Duration::seconds(self.cancel_window_seconds as i64),
            first_member_min_hours: self.first_member_min_hours,
            // Configurable downwards only; remote records are held to the same ceiling
            max_duration_hours: self.max_duration_hours.min(MAX_DURATION_HOURS),
            unpaid_ttl: Duration::seconds(self.unpaid_booking_ttl_seconds as i64),
            session_grace: Duration::seconds(self.session_grace_seconds as i64),
            currency: self.currency.clone(),
        }
    }

    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_interval_millis.max(1))
    }

    pub fn reconcile_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.reconcile_interval_seconds.max(1))
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
            // WARNET__SERVER__PORT=8080 sets server.port
            .add_source(config::Environment::with_prefix("WARNET").separator("__"))
            .build()?;

        s.try_deserialize()
    }
}
