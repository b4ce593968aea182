//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL for the storefront (default: `http://localhost:3000`)
//! - `RAZORPAY_KEY_ID` - Razorpay key id (public, handed to the checkout widget)
//! - `RAZORPAY_KEY_SECRET` - Razorpay key secret (order creation, signature checks)
//! - `RAZORPAY_WEBHOOK_SECRET` - Secret configured on the Razorpay webhook
//! - `RAZORPAY_API_BASE` - Gateway API base URL (default: `https://api.razorpay.com`)
//! - `CHECKOUT_CURRENCY` - Order currency (default: INR)
//! - `CHECKOUT_TAX_RATE` - Tax rate as a fraction (default: 0.18)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment tag
//!
//! The server starts without Razorpay credentials so the catalog and cart
//! keep working; the payment endpoints report the missing setup instead.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};

use rust_decimal::Decimal;
use sakria_core::CurrencyCode;
use sakria_core::checkout::DEFAULT_TAX_RATE;
use secrecy::SecretString;
use thiserror::Error;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.0;

pub const DEFAULT_API_BASE: &str = "https://api.razorpay.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "your_",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "insert",
    "enter-",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    pub razorpay: RazorpayConfig,
    pub checkout: CheckoutSettings,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    pub sentry_environment: Option<String>,
}

/// Razorpay credentials and endpoint.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct RazorpayConfig {
    pub key_id: Option<String>,
    pub key_secret: Option<SecretString>,
    pub webhook_secret: Option<SecretString>,
    pub api_base: String,
}

impl std::fmt::Debug for RazorpayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |set: bool| if set { "[REDACTED]" } else { "[UNSET]" };
        f.debug_struct("RazorpayConfig")
            .field("key_id", &self.key_id)
            .field("key_secret", &redact(self.key_secret.is_some()))
            .field("webhook_secret", &redact(self.webhook_secret.is_some()))
            .field("api_base", &self.api_base)
            .finish()
    }
}

impl Default for RazorpayConfig {
    fn default() -> Self {
        Self {
            key_id: None,
            key_secret: None,
            webhook_secret: None,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

impl RazorpayConfig {
    /// Key id and secret, if both are set.
    #[must_use]
    pub fn credentials(&self) -> Option<(&str, &SecretString)> {
        match (&self.key_id, &self.key_secret) {
            (Some(id), Some(secret)) => Some((id.as_str(), secret)),
            _ => None,
        }
    }

    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            key_id: get_optional_env("RAZORPAY_KEY_ID"),
            key_secret: get_optional_secret("RAZORPAY_KEY_SECRET")?,
            webhook_secret: get_optional_secret("RAZORPAY_WEBHOOK_SECRET")?,
            api_base: get_env_or_default("RAZORPAY_API_BASE", DEFAULT_API_BASE)
                .trim_end_matches('/')
                .to_string(),
        })
    }
}

/// Currency and tax applied to every order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutSettings {
    pub currency: CurrencyCode,
    pub tax_rate: Decimal,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            currency: CurrencyCode::INR,
            tax_rate: DEFAULT_TAX_RATE,
        }
    }
}

impl CheckoutSettings {
    fn from_env() -> Result<Self, ConfigError> {
        let currency = get_env_or_default("CHECKOUT_CURRENCY", "INR")
            .parse::<CurrencyCode>()
            .map_err(|e| ConfigError::InvalidEnvVar("CHECKOUT_CURRENCY".to_string(), e))?;
        let tax_rate = match get_optional_env("CHECKOUT_TAX_RATE") {
            Some(raw) => parse_tax_rate(&raw)?,
            None => DEFAULT_TAX_RATE,
        };
        Ok(Self { currency, tax_rate })
    }
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unparseable value or
    /// a secret looks like a placeholder.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("STOREFRONT_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_HOST".to_string(), e.to_string())
            })?;
        let port = get_env_or_default("STOREFRONT_PORT", "3000")
            .parse::<u16>()
            .map_err(|e| {
                ConfigError::InvalidEnvVar("STOREFRONT_PORT".to_string(), e.to_string())
            })?;
        let base_url = get_env_or_default("STOREFRONT_BASE_URL", "http://localhost:3000");
        url::Url::parse(&base_url).map_err(|e| {
            ConfigError::InvalidEnvVar("STOREFRONT_BASE_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            host,
            port,
            base_url,
            razorpay: RazorpayConfig::from_env()?,
            checkout: CheckoutSettings::from_env()?,
            sentry_dsn: get_optional_env("SENTRY_DSN"),
            sentry_environment: get_optional_env("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([127, 0, 0, 1]),
            port: 3000,
            base_url: "http://localhost:3000".to_string(),
            razorpay: RazorpayConfig::default(),
            checkout: CheckoutSettings::default(),
            sentry_dsn: None,
            sentry_environment: None,
        }
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable, treating blank values as unset.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    get_optional_env(key).unwrap_or_else(|| default.to_string())
}

/// Load and validate an optional secret from environment.
fn get_optional_secret(key: &str) -> Result<Option<SecretString>, ConfigError> {
    get_optional_env(key)
        .map(|value| {
            validate_secret_strength(&value, key)?;
            Ok(SecretString::from(value))
        })
        .transpose()
}

fn parse_tax_rate(raw: &str) -> Result<Decimal, ConfigError> {
    let invalid = |msg: String| ConfigError::InvalidEnvVar("CHECKOUT_TAX_RATE".to_string(), msg);
    let rate = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|e| invalid(e.to_string()))?;
    if rate.is_sign_negative() || rate > Decimal::ONE {
        return Err(invalid(format!("must be between 0 and 1 (got {rate})")));
    }
    Ok(rate)
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)]
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use the value from the Razorpay dashboard."
            ),
        ));
    }

    Ok(())
}
