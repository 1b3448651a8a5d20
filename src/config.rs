use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info, warn};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const CONFIG_DIR: &str = "config";
const DEFAULT_API_BASE_URL: &str = "http://localhost:8080";
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_READ_RETRY_ATTEMPTS: u32 = 3;
const DEFAULT_READ_RETRY_BASE_DELAY_MS: u64 = 1000;
const DEFAULT_SNAPSHOT_TTL_SECS: u64 = 300;
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 100;
const DEV_DEFAULT_BEARER_TOKEN: &str = "development-bearer-token-do-not-use-in-production";

/// Application configuration for the checkout core.
///
/// Layered from built-in defaults, optional `config/*.toml` files, and
/// `CHECKOUT__*` environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Base URL of the storefront pricing authority
    #[serde(default = "default_api_base_url")]
    #[validate(custom = "validate_base_url")]
    pub api_base_url: String,

    /// Bearer token attached to every request
    #[validate(length(min = 1))]
    pub api_bearer_token: String,

    /// Public key handed to the hosted payment widget
    #[validate(length(min = 1))]
    pub gateway_public_key: String,

    /// ISO currency code used for gateway charges
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3), custom = "validate_currency")]
    pub currency: String,

    /// Per-request timeout (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Attempts for read operations (catalog, totals, addresses).
    /// Mutating operations never retry.
    #[serde(default = "default_read_retry_attempts")]
    #[validate(range(min = 1, max = 10))]
    pub read_retry_attempts: u32,

    /// Base delay for exponential read backoff (milliseconds)
    #[serde(default = "default_read_retry_base_delay_ms")]
    pub read_retry_base_delay_ms: u64,

    /// TTL for cached product snapshots (seconds)
    #[serde(default = "default_snapshot_ttl_secs")]
    pub snapshot_ttl_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    #[validate(custom = "validate_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_read_retry_attempts() -> u32 {
    DEFAULT_READ_RETRY_ATTEMPTS
}

fn default_read_retry_base_delay_ms() -> u64 {
    DEFAULT_READ_RETRY_BASE_DELAY_MS
}

fn default_snapshot_ttl_secs() -> u64 {
    DEFAULT_SNAPSHOT_TTL_SECS
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}

fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn validate_base_url(value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => Ok(()),
        _ => {
            let mut err = ValidationError::new("url");
            err.message = Some("api_base_url must be a valid http(s) URL".into());
            Err(err)
        }
    }
}

fn validate_currency(currency: &str) -> Result<(), ValidationError> {
    if currency.len() == 3 && currency.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("currency");
        err.message = Some("Currency must be a 3-letter ISO code".into());
        Err(err)
    }
}

fn validate_event_channel_capacity(capacity: usize) -> Result<(), ValidationError> {
    if capacity == 0 {
        let mut err = ValidationError::new("range");
        err.message = Some("Event channel capacity must be greater than 0".into());
        return Err(err);
    }
    Ok(())
}

impl AppConfig {
    /// Creates a configuration from the two required settings, filling the
    /// rest with defaults. Used by embedding code and tests that do not go
    /// through file/env layering.
    pub fn new(
        api_base_url: impl Into<String>,
        api_bearer_token: impl Into<String>,
        gateway_public_key: impl Into<String>,
    ) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            api_bearer_token: api_bearer_token.into(),
            gateway_public_key: gateway_public_key.into(),
            currency: default_currency(),
            request_timeout_secs: default_request_timeout_secs(),
            read_retry_attempts: default_read_retry_attempts(),
            read_retry_base_delay_ms: default_read_retry_base_delay_ms(),
            snapshot_ttl_secs: default_snapshot_ttl_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration error: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (CHECKOUT__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("CHECKOUT_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    let config = Config::builder()
        .set_default("api_base_url", DEFAULT_API_BASE_URL)?
        .set_default("currency", DEFAULT_CURRENCY)?
        .set_default("request_timeout_secs", DEFAULT_REQUEST_TIMEOUT_SECS as i64)?
        .set_default("read_retry_attempts", DEFAULT_READ_RETRY_ATTEMPTS as i64)?
        .set_default(
            "read_retry_base_delay_ms",
            DEFAULT_READ_RETRY_BASE_DELAY_MS as i64,
        )?
        .set_default("snapshot_ttl_secs", DEFAULT_SNAPSHOT_TTL_SECS as i64)?
        .set_default(
            "event_channel_capacity",
            DEFAULT_EVENT_CHANNEL_CAPACITY as i64,
        )?
        .set_default("environment", run_env.as_str())?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false))
        .add_source(Environment::with_prefix("CHECKOUT").separator("__"))
        .build()?;

    // api_bearer_token and gateway_public_key have no defaults. Outside of
    // production a placeholder keeps local development working; production
    // refuses to start without them.
    let mut config = config;
    if config.get_string("api_bearer_token").is_err() {
        if run_env.eq_ignore_ascii_case("production") {
            error!(
                "API bearer token is not configured. Set CHECKOUT__API_BEARER_TOKEN environment variable."
            );
            return Err(AppConfigError::Load(ConfigError::NotFound(
                "api_bearer_token is required but not configured".into(),
            )));
        }
        warn!("api_bearer_token not configured; using development placeholder");
        config = Config::builder()
            .add_source(config)
            .set_override("api_bearer_token", DEV_DEFAULT_BEARER_TOKEN)?
            .build()?;
    }
    if config.get_string("gateway_public_key").is_err() {
        if run_env.eq_ignore_ascii_case("production") {
            error!(
                "Gateway public key is not configured. Set CHECKOUT__GATEWAY_PUBLIC_KEY environment variable."
            );
            return Err(AppConfigError::Load(ConfigError::NotFound(
                "gateway_public_key is required but not configured".into(),
            )));
        }
        warn!("gateway_public_key not configured; using development placeholder");
        config = Config::builder()
            .add_source(config)
            .set_override("gateway_public_key", "pk_test_development")?
            .build()?;
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}

/// Initializes the tracing subscriber. `RUST_LOG` overrides the configured
/// level when set.
pub fn init_telemetry(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("storefront_checkout={}", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt()
            .with_env_filter(filter_directive)
            .json()
            .try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_config() -> AppConfig {
        AppConfig::new("http://localhost:9000", "token-123", "pk_test_abc")
    }

    #[test]
    fn default_construction_validates() {
        assert!(base_config().validate().is_ok());
    }

    #[test]
    fn rejects_invalid_base_url() {
        let mut cfg = base_config();
        cfg.api_base_url = "not a url".into();
        assert!(cfg.validate().is_err());

        cfg.api_base_url = "ftp://example.com".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_invalid_currency() {
        let mut cfg = base_config();
        cfg.currency = "US".into();
        assert!(cfg.validate().is_err());

        cfg.currency = "U5D".into();
        assert!(cfg.validate().is_err());

        cfg.currency = "NGN".into();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_retry_attempts() {
        let mut cfg = base_config();
        cfg.read_retry_attempts = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_event_capacity() {
        let mut cfg = base_config();
        cfg.event_channel_capacity = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn production_detection() {
        let mut cfg = base_config();
        assert!(!cfg.is_production());
        cfg.environment = "Production".into();
        assert!(cfg.is_production());
    }
}
