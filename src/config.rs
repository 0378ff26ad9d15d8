use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;
const DEFAULT_GATEWAY_TIMEOUT_SECS: u64 = 10;

/// Payment gateway settings for hosted checkout sessions and the inbound
/// completion webhook.
#[derive(Clone, Debug, Default, Deserialize, Validate)]
pub struct PaymentConfig {
    /// Base URL of the gateway's session-creation API. When unset, checkout
    /// still creates orders but no redirect URL is produced.
    #[serde(default)]
    pub gateway_url: Option<String>,

    /// Bearer credential for the gateway API.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Where the gateway redirects the shopper after payment.
    #[serde(default = "default_success_url")]
    pub success_url: String,

    /// Where the gateway redirects the shopper on abandonment.
    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,

    /// Shared secret for webhook signature verification. Unsigned webhooks
    /// are rejected whenever this is set.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Maximum age of a signed webhook timestamp, in seconds.
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: u64,

    /// Outbound request timeout for session creation, in seconds.
    #[serde(default = "default_gateway_timeout")]
    pub request_timeout_secs: u64,
}

/// Application configuration, loaded from `config/{default,<env>}.toml` files
/// and `APP_`-prefixed environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT secret used to verify bearer tokens from the identity provider
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// Payment gateway settings
    #[serde(default)]
    pub payment: PaymentConfig,

    /// Chat-webhook URL for order notifications; notifications are disabled
    /// when unset
    #[serde(default)]
    pub notification_webhook_url: Option<String>,

    /// When true, administrative status changes must follow the forward
    /// fulfillment sequence one step at a time. The default preserves the
    /// permissive behavior: any forward jump from a non-terminal state.
    #[serde(default)]
    pub strict_status_sequencing: bool,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_success_url() -> String {
    "http://localhost:8080/api/v1/checkout/success".to_string()
}
fn default_cancel_url() -> String {
    "http://localhost:8080/api/v1/checkout/cancel".to_string()
}
fn default_webhook_tolerance() -> u64 {
    DEFAULT_WEBHOOK_TOLERANCE_SECS
}
fn default_gateway_timeout() -> u64 {
    DEFAULT_GATEWAY_TIMEOUT_SECS
}

impl AppConfig {
    /// Programmatic constructor used by tests and tooling.
    pub fn new(
        database_url: impl Into<String>,
        jwt_secret: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        environment: impl Into<String>,
    ) -> Self {
        Self {
            database_url: database_url.into(),
            jwt_secret: jwt_secret.into(),
            host: host.into(),
            port,
            environment: environment.into(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: false,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            cors_allowed_origins: None,
            payment: PaymentConfig {
                success_url: default_success_url(),
                cancel_url: default_cancel_url(),
                webhook_tolerance_secs: default_webhook_tolerance(),
                request_timeout_secs: default_gateway_timeout(),
                ..PaymentConfig::default()
            },
            notification_webhook_url: None,
            strict_status_sequencing: false,
        }
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

/// Loads and validates configuration: `config/default.toml`, then the
/// environment-specific file, then `APP_*` environment variables (nested keys
/// separated by `__`, e.g. `APP_PAYMENT__WEBHOOK_SECRET`).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment = env::var("APP_ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", environment);

    let cfg: AppConfig = Config::builder()
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, environment)).required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        .set_default("environment", environment)?
        .build()?
        .try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    Ok(cfg)
}

/// Initializes the global tracing subscriber. Safe to call more than once;
/// later calls are no-ops.
pub fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    if json {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init();
    } else {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn programmatic_config_has_safe_defaults() {
        let cfg = AppConfig::new(
            "sqlite::memory:",
            "a_jwt_secret_that_is_long_enough_for_tests",
            "127.0.0.1",
            8080,
            "test",
        );
        assert!(!cfg.strict_status_sequencing);
        assert!(cfg.payment.gateway_url.is_none());
        assert!(cfg.notification_webhook_url.is_none());
        assert_eq!(cfg.payment.webhook_tolerance_secs, 300);
        assert!(!cfg.is_production());
    }

    #[test]
    fn short_jwt_secret_fails_validation() {
        let cfg = AppConfig::new("sqlite::memory:", "short", "127.0.0.1", 8080, "test");
        assert!(cfg.validate().is_err());
    }
}
