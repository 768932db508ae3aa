use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;
use std::path::Path;
use thiserror::Error;
use tracing::{error, info};
use validator::{Validate, ValidationError};

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_GATEWAY_VERSION: &str = "2.1.0";
const DEFAULT_GATEWAY_COMMAND: &str = "pay";
const DEFAULT_CURRENCY_CODE: &str = "VND";
const DEFAULT_LOCALE: &str = "vn";

/// Merchant-facing VNPay gateway settings.
///
/// Loaded once at startup, validated, and treated as immutable afterwards;
/// the gateway client receives it by value rather than through any static.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct VnPayConfig {
    /// Gateway protocol version
    #[serde(default = "default_gateway_version")]
    #[validate(length(min = 1))]
    pub version: String,

    /// Gateway command for payment creation
    #[serde(default = "default_gateway_command")]
    #[validate(length(min = 1))]
    pub command: String,

    /// Merchant terminal code issued by the gateway
    #[validate(length(min = 1))]
    pub tmn_code: String,

    /// Settlement currency code
    #[serde(default = "default_currency_code")]
    #[validate(length(min = 1))]
    pub currency_code: String,

    /// Locale for gateway-hosted payment pages
    #[serde(default = "default_locale")]
    #[validate(length(min = 1))]
    pub locale: String,

    /// Shared HMAC secret; never logged
    #[validate(length(min = 8))]
    pub hash_secret: String,

    /// Gateway payment endpoint the customer is redirected to
    #[validate(custom = "validate_http_url")]
    pub base_url: String,

    /// URL the gateway sends the customer back to after payment
    #[validate(custom = "validate_http_url")]
    pub return_url: String,
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Server host address
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    #[validate(custom = "validate_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Payment gateway settings
    #[validate]
    pub vnpay: VnPayConfig,
}

impl AppConfig {
    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    /// Gets log level reference
    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("Configuration loading failed: {0}")]
    Load(#[from] ConfigError),

    #[error("Configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Default value functions
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_gateway_version() -> String {
    DEFAULT_GATEWAY_VERSION.to_string()
}

fn default_gateway_command() -> String {
    DEFAULT_GATEWAY_COMMAND.to_string()
}

fn default_currency_code() -> String {
    DEFAULT_CURRENCY_CODE.to_string()
}

fn default_locale() -> String {
    DEFAULT_LOCALE.to_string()
}

/// Validates log level values
fn validate_log_level(level: &str) -> Result<(), ValidationError> {
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if valid_levels.contains(&level.to_lowercase().as_str()) {
        Ok(())
    } else {
        let mut err = ValidationError::new("log_level");
        err.message = Some("Must be one of: trace, debug, info, warn, error".into());
        Err(err)
    }
}

fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        let mut err = ValidationError::new("url");
        err.message = Some("Must be an absolute http(s) URL".into());
        Err(err)
    }
}

/// Initializes tracing using the provided log level as the default filter
pub fn init_tracing(level: &str, json: bool) {
    use tracing_subscriber::fmt;

    let default_directive = format!("bookshop_payments={},tower_http=debug", level);
    let filter_directive = env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(default_directive);

    if json {
        let _ = fmt().with_env_filter(filter_directive).json().try_init();
    } else {
        let _ = fmt().with_env_filter(filter_directive).try_init();
    }
}

/// Loads application configuration
///
/// Layers configuration sources in this order:
/// 1. Built-in defaults
/// 2. Default config (config/default.toml)
/// 3. Environment-specific config (config/{env}.toml)
/// 4. Environment variables (APP__*)
pub fn load_config() -> Result<AppConfig, AppConfigError> {
    // Support both RUN_ENV and APP_ENV for selecting config profile
    let run_env = env::var("RUN_ENV")
        .or_else(|_| env::var("APP_ENV"))
        .unwrap_or_else(|_| DEFAULT_ENV.to_string());
    info!("Loading configuration for environment: {}", run_env);

    if !Path::new(CONFIG_DIR).exists() {
        info!(
            "Config directory '{}' not found; relying on built-in defaults and environment variables",
            CONFIG_DIR
        );
    }

    // NOTE: the merchant code and hash secret have no defaults - they MUST
    // be provided via environment variable or config file, so a
    // misconfigured deployment fails before it accepts traffic.
    let builder = Config::builder()
        .set_default("host", "0.0.0.0")?
        .set_default("port", DEFAULT_PORT as i64)?
        .set_default("environment", DEFAULT_ENV)?
        .set_default("log_level", DEFAULT_LOG_LEVEL)?
        .set_default("log_json", false)?
        .add_source(File::with_name(&format!("{}/default", CONFIG_DIR)).required(false))
        .add_source(File::with_name(&format!("{}/{}", CONFIG_DIR, run_env)).required(false));

    let config = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    // Check the gateway credentials before deserialization to give a clear
    // startup error instead of a generic missing-field message.
    for (key, env_var) in [
        ("vnpay.tmn_code", "APP__VNPAY__TMN_CODE"),
        ("vnpay.hash_secret", "APP__VNPAY__HASH_SECRET"),
        ("vnpay.base_url", "APP__VNPAY__BASE_URL"),
        ("vnpay.return_url", "APP__VNPAY__RETURN_URL"),
    ] {
        if config.get_string(key).is_err() {
            error!(
                "Gateway configuration '{}' is not set. Provide it via {} or a config file.",
                key, env_var
            );
            return Err(AppConfigError::Load(ConfigError::NotFound(format!(
                "{} is required but not configured. Set {}.",
                key, env_var
            ))));
        }
    }

    let app_config: AppConfig = config.try_deserialize()?;

    app_config.validate().map_err(|e| {
        error!("Configuration validation failed: {:?}", e);
        AppConfigError::Validation(e)
    })?;

    info!("Configuration loaded successfully");
    Ok(app_config)
}
