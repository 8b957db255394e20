//! Configuration system for keyforge.
//!
//! Configuration is loaded from multiple sources with the following precedence:
//! 1. Environment variables (highest priority)
//! 2. `config.toml` file
//! 3. Default values (lowest priority)
//!
//! # Environment Variables
//!
//! - `KEYFORGE_PRIVATE_KEY_PATH` - Private signing key PEM file
//! - `KEYFORGE_PUBLIC_KEY_PATH` - Public key PEM written by `generate`
//! - `KEYFORGE_PRIVATE_KEY` - The private key itself, as a single value
//!   (fallback when no key file exists; PEM framing may arrive mangled)
//! - `KEYFORGE_UTC_OFFSET_HOURS` - Civil timezone for expiry boundaries
//! - `KEYFORGE_HORIZON_ENABLED` - Enforce the maximum issuance horizon
//! - `KEYFORGE_SERVER_HOST` / `KEYFORGE_SERVER_PORT` - HTTP bind address
//! - `KEYFORGE_SHARED_SECRET` - Static secret required by the issue endpoint
//! - `KEYFORGE_LOG_LEVEL` - Log level (trace, debug, info, warn, error)

use config::Config;
use serde::Deserialize;
use std::env;
use std::sync::OnceLock;

use crate::errors::{LicenseError, LicenseResult};
use crate::expiry::{ExpiryCalculator, ExpiryPolicy, DEFAULT_UTC_OFFSET_HOURS};
use crate::key_source::{default_key_source, ChainSource};

/// Global configuration singleton.
static CONFIG: OnceLock<KeyforgeConfig> = OnceLock::new();

/// Root configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct KeyforgeConfig {
    /// Key material locations
    pub keys: KeyConfig,
    /// Expiry validation settings
    pub expiry: ExpiryConfig,
    /// HTTP server configuration (used by the `server` feature)
    pub server: ServerConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Key material locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KeyConfig {
    /// Path to the private signing key (PKCS#1 or PKCS#8 PEM)
    pub private_key_path: String,
    /// Path where `generate` writes the public key
    pub public_key_path: String,
    /// Environment variable consulted when the key file is absent
    pub env_var: String,
}

impl Default for KeyConfig {
    fn default() -> Self {
        Self {
            private_key_path: "keys/private.pem".to_string(),
            public_key_path: "keys/public.pem".to_string(),
            env_var: "KEYFORGE_PRIVATE_KEY".to_string(),
        }
    }
}

/// Expiry validation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExpiryConfig {
    /// Fixed civil UTC offset, in whole hours, for expiry day boundaries
    pub utc_offset_hours: i32,
    /// Whether the maximum issuance horizon is enforced
    pub horizon_enabled: bool,
    /// Horizon: civil months ahead
    pub horizon_months: u32,
    /// Horizon: extra days beyond the months
    pub horizon_days: u64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: DEFAULT_UTC_OFFSET_HOURS,
            horizon_enabled: true,
            horizon_months: 1,
            horizon_days: 1,
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Static shared secret required on the issue endpoint
    pub shared_secret: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            shared_secret: String::new(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl KeyforgeConfig {
    /// Load configuration from file and environment.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. `config.toml` file (optional)
    /// 3. Environment variables
    fn load() -> LicenseResult<Self> {
        let builder = Config::builder()
            // Load from config.toml (optional); defaults come from serde.
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .set_override_option(
                "keys.private_key_path",
                env::var("KEYFORGE_PRIVATE_KEY_PATH").ok(),
            )
            .map_err(|e| LicenseError::Config(e.to_string()))?
            .set_override_option(
                "keys.public_key_path",
                env::var("KEYFORGE_PUBLIC_KEY_PATH").ok(),
            )
            .map_err(|e| LicenseError::Config(e.to_string()))?
            .set_override_option(
                "expiry.utc_offset_hours",
                env::var("KEYFORGE_UTC_OFFSET_HOURS")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| LicenseError::Config(e.to_string()))?
            .set_override_option(
                "expiry.horizon_enabled",
                env::var("KEYFORGE_HORIZON_ENABLED")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok()),
            )
            .map_err(|e| LicenseError::Config(e.to_string()))?
            .set_override_option("server.host", env::var("KEYFORGE_SERVER_HOST").ok())
            .map_err(|e| LicenseError::Config(e.to_string()))?
            .set_override_option(
                "server.port",
                env::var("KEYFORGE_SERVER_PORT")
                    .ok()
                    .and_then(|v| v.parse::<i64>().ok()),
            )
            .map_err(|e| LicenseError::Config(e.to_string()))?
            .set_override_option(
                "server.shared_secret",
                env::var("KEYFORGE_SHARED_SECRET").ok(),
            )
            .map_err(|e| LicenseError::Config(e.to_string()))?
            .set_override_option("logging.level", env::var("KEYFORGE_LOG_LEVEL").ok())
            .map_err(|e| LicenseError::Config(e.to_string()))?;

        let settings = builder
            .build()
            .map_err(|e| LicenseError::Config(format!("failed to build config: {e}")))?;

        settings
            .try_deserialize()
            .map_err(|e| LicenseError::Config(format!("failed to deserialize config: {e}")))
    }

    /// Validate the configuration.
    pub fn validate(&self) -> LicenseResult<()> {
        if self.server.port == 0 {
            return Err(LicenseError::Config(
                "server.port must be greater than 0".to_string(),
            ));
        }
        if self.keys.private_key_path.is_empty() {
            return Err(LicenseError::Config(
                "keys.private_key_path cannot be empty".to_string(),
            ));
        }
        if self.expiry.utc_offset_hours.abs() > 23 {
            return Err(LicenseError::Config(format!(
                "expiry.utc_offset_hours must be within ±23, got {}",
                self.expiry.utc_offset_hours
            )));
        }
        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(LicenseError::Config(format!(
                    "logging.level must be one of trace/debug/info/warn/error, got '{other}'"
                )));
            }
        }
        Ok(())
    }

    /// Expiry calculator for the configured civil timezone.
    pub fn expiry_calculator(&self) -> LicenseResult<ExpiryCalculator> {
        ExpiryCalculator::from_offset_hours(self.expiry.utc_offset_hours)
    }

    /// The unified expiry policy both entry points share.
    pub fn expiry_policy(&self) -> ExpiryPolicy {
        if self.expiry.horizon_enabled {
            ExpiryPolicy::with_horizon(self.expiry.horizon_months, self.expiry.horizon_days)
        } else {
            ExpiryPolicy::not_in_past()
        }
    }

    /// The standard key acquisition chain: key file first, then environment.
    pub fn key_source(&self) -> ChainSource {
        default_key_source(&self.keys.private_key_path, &self.keys.env_var)
    }
}

/// Get the global configuration, loading and validating it on first use.
pub fn get_config() -> LicenseResult<&'static KeyforgeConfig> {
    if let Some(config) = CONFIG.get() {
        return Ok(config);
    }
    let config = KeyforgeConfig::load()?;
    config.validate()?;
    Ok(CONFIG.get_or_init(|| config))
}
