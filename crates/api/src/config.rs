//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use checkout::CheckoutSettings;
use domain::{Money, PricingPolicy};
use secrecy::SecretString;
use thiserror::Error;

const DEV_TOKEN_SECRET: &str = "dev-only-token-secret";

/// A variable was set to a value that does not parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for {key}: {value:?}")]
pub struct ConfigError {
    pub key: &'static str,
    pub value: String,
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST` — bind address (default: `"0.0.0.0"`)
/// - `PORT` — listen port (default: `3000`)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `DATABASE_URL` — Postgres connection string; unset runs in memory
/// - `DATABASE_MAX_CONNECTIONS` — pool size (default: `10`)
/// - `JWT_SECRET` — token signing secret
/// - `JWT_TTL_SECS` — token lifetime (default: 7 days)
/// - `STRIPE_SECRET_KEY` — unset uses the in-memory processor
/// - `STRIPE_API_BASE` — Stripe API base URL
/// - `PAYMENT_CURRENCY` (default: `"usd"`), `PAYMENT_TIMEOUT_SECS` (default: `10`)
/// - `TAX_RATE_BPS` (default: `800`), `FREE_SHIPPING_THRESHOLD_CENTS`
///   (default: `10000`), `FLAT_SHIPPING_FEE_CENTS` (default: `999`)
/// - `ORDER_NUMBER_PREFIX` (default: `"BIZOE"`)
/// - `STRICT_STATUS_TRANSITIONS` (default: `false`)
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt_secret: SecretString,
    /// False when `JWT_SECRET` was not set and the development secret is used.
    pub jwt_secret_configured: bool,
    pub jwt_ttl: Duration,
    pub stripe_secret_key: Option<SecretString>,
    pub stripe_api_base: String,
    pub checkout: CheckoutSettings,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// Blank values count as unset; a value that does not parse is an error.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| non_blank(&lookup, key);

        let defaults = Self::default();
        let pricing = defaults.checkout.pricing;
        let jwt_secret = var("JWT_SECRET");

        Ok(Self {
            host: var("HOST").unwrap_or(defaults.host),
            port: parsed(&lookup, "PORT")?.unwrap_or(defaults.port),
            log_level: var("RUST_LOG").unwrap_or(defaults.log_level),
            database_url: var("DATABASE_URL"),
            database_max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS")?
                .unwrap_or(defaults.database_max_connections),
            jwt_secret_configured: jwt_secret.is_some(),
            jwt_secret: jwt_secret.map(SecretString::from).unwrap_or(defaults.jwt_secret),
            jwt_ttl: parsed(&lookup, "JWT_TTL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.jwt_ttl),
            stripe_secret_key: var("STRIPE_SECRET_KEY").map(SecretString::from),
            stripe_api_base: var("STRIPE_API_BASE").unwrap_or(defaults.stripe_api_base),
            checkout: CheckoutSettings {
                pricing: PricingPolicy {
                    tax_rate_bps: parsed(&lookup, "TAX_RATE_BPS")?.unwrap_or(pricing.tax_rate_bps),
                    free_shipping_threshold: parsed(&lookup, "FREE_SHIPPING_THRESHOLD_CENTS")?
                        .map(Money::from_cents)
                        .unwrap_or(pricing.free_shipping_threshold),
                    flat_shipping_fee: parsed(&lookup, "FLAT_SHIPPING_FEE_CENTS")?
                        .map(Money::from_cents)
                        .unwrap_or(pricing.flat_shipping_fee),
                },
                order_number_prefix: var("ORDER_NUMBER_PREFIX")
                    .unwrap_or(defaults.checkout.order_number_prefix),
                currency: var("PAYMENT_CURRENCY")
                    .map(|currency| currency.to_lowercase())
                    .unwrap_or(defaults.checkout.currency),
                payment_timeout: parsed(&lookup, "PAYMENT_TIMEOUT_SECS")?
                    .map(Duration::from_secs)
                    .unwrap_or(defaults.checkout.payment_timeout),
                strict_status_transitions: flag(&lookup, "STRICT_STATUS_TRANSITIONS")?
                    .unwrap_or(defaults.checkout.strict_status_transitions),
            },
        })
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn non_blank(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|value| !value.trim().is_empty())
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    non_blank(lookup, key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError { key, value })
        })
        .transpose()
}

/// Accepts `true/false`, `1/0`, `yes/no` and `on/off`.
fn flag(lookup: &impl Fn(&str) -> Option<String>, key: &'static str) -> Result<Option<bool>, ConfigError> {
    non_blank(lookup, key)
        .map(|value| match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError { key, value }),
        })
        .transpose()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            database_url: None,
            database_max_connections: 10,
            jwt_secret: SecretString::from(DEV_TOKEN_SECRET),
            jwt_secret_configured: false,
            jwt_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            stripe_secret_key: None,
            stripe_api_base: checkout::services::stripe::STRIPE_API_BASE.to_string(),
            checkout: CheckoutSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned()).unwrap()
    }

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 3000);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.database_max_connections, 10);
        assert_eq!(config.jwt_ttl, Duration::from_secs(604_800));
        assert!(config.database_url.is_none());
        assert!(config.stripe_secret_key.is_none());
        assert!(!config.jwt_secret_configured);
        assert_eq!(config.checkout, CheckoutSettings::default());
    }

    #[test]
    fn test_empty_environment_uses_defaults() {
        let config = from_pairs(&[]);
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.checkout.pricing.tax_rate_bps, 800);
        assert_eq!(config.checkout.order_number_prefix, "BIZOE");
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("DATABASE_URL", "postgres://localhost/checkout"),
            ("JWT_SECRET", "s3cret"),
            ("STRIPE_SECRET_KEY", "sk_test_1"),
            ("PAYMENT_CURRENCY", "EUR"),
            ("PAYMENT_TIMEOUT_SECS", "3"),
            ("TAX_RATE_BPS", "725"),
            ("FREE_SHIPPING_THRESHOLD_CENTS", "5000"),
            ("ORDER_NUMBER_PREFIX", "SHOP"),
            ("STRICT_STATUS_TRANSITIONS", "true"),
        ]);

        assert_eq!(config.port, 8080);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/checkout")
        );
        assert!(config.jwt_secret_configured);
        assert_eq!(config.jwt_secret.expose_secret(), "s3cret");
        assert!(config.stripe_secret_key.is_some());
        assert_eq!(config.checkout.currency, "eur");
        assert_eq!(config.checkout.payment_timeout, Duration::from_secs(3));
        assert_eq!(config.checkout.pricing.tax_rate_bps, 725);
        assert_eq!(config.checkout.pricing.free_shipping_threshold.cents(), 5000);
        assert_eq!(config.checkout.pricing.flat_shipping_fee.cents(), 999);
        assert_eq!(config.checkout.order_number_prefix, "SHOP");
        assert!(config.checkout.strict_status_transitions);
    }

    #[test]
    fn test_blank_values_fall_back() {
        let config = from_pairs(&[("PORT", " "), ("DATABASE_URL", "  ")]);
        assert_eq!(config.port, 3000);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn test_unparseable_values_are_rejected() {
        for (key, value) in [
            ("PORT", "not-a-port"),
            ("TAX_RATE_BPS", "8%"),
            ("PAYMENT_TIMEOUT_SECS", "10s"),
            ("STRICT_STATUS_TRANSITIONS", "maybe"),
        ] {
            let vars = HashMap::from([(key.to_string(), value.to_string())]);
            let result = Config::from_lookup(|k| vars.get(k).cloned());
            assert_eq!(
                result.err(),
                Some(ConfigError {
                    key,
                    value: value.to_string()
                })
            );
        }
    }

    #[test]
    fn test_flag_spellings() {
        let on = from_pairs(&[("STRICT_STATUS_TRANSITIONS", "1")]);
        assert!(on.checkout.strict_status_transitions);
        let off = from_pairs(&[("STRICT_STATUS_TRANSITIONS", "off")]);
        assert!(!off.checkout.strict_status_transitions);
    }

    #[test]
    fn test_addr_formatting() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            ..Config::default()
        };
        assert_eq!(config.addr(), "127.0.0.1:8080");
    }
}
