//! Application configuration loaded from the environment
//!
//! Values come from process env, optionally seeded from a `.env` file via
//! dotenvy. Secrets are never given defaults.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::env;
use std::str::FromStr;

/// Default sanity ceiling for a single order total
pub const DEFAULT_MAX_ORDER_TOTAL: Decimal = dec!(1000000);

/// Default conversion rate from USD to the platform point currency
pub const DEFAULT_POINTS_PER_USD: Decimal = dec!(50);

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: String,
    /// Admin API key; admin routes answer CONFIG_ERROR when unset
    pub admin_api_key: Option<String>,
    pub max_order_total: Decimal,
    /// Webhook that receives outbound customer notifications
    pub notification_webhook_url: Option<String>,
    pub notification_timeout_secs: u64,
    pub admin_session_ttl_secs: u64,
    /// Secret mixed into payment record integrity hashes
    pub payment_hash_secret: String,
    pub points_per_usd: Decimal,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let database_url = required("DATABASE_URL")?;
        let payment_hash_secret = required("PAYMENT_HASH_SECRET")?;

        Ok(Self {
            database_url,
            bind_addr: env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string()),
            admin_api_key: optional("ADMIN_API_KEY"),
            max_order_total: parsed("MAX_ORDER_TOTAL", DEFAULT_MAX_ORDER_TOTAL)?,
            notification_webhook_url: optional("NOTIFICATION_WEBHOOK_URL"),
            notification_timeout_secs: parsed("NOTIFICATION_TIMEOUT_SECS", 10)?,
            admin_session_ttl_secs: parsed("ADMIN_SESSION_TTL_SECS", 3600)?,
            payment_hash_secret,
            points_per_usd: parsed("POINTS_PER_USD", DEFAULT_POINTS_PER_USD)?,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn optional(name: &'static str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parsed_falls_back_to_default() {
        let value: u64 = parsed("DELIVERY_ORDERS_TEST_UNSET_VAR", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_required_reports_missing_name() {
        let err = required("DELIVERY_ORDERS_TEST_MISSING_VAR").unwrap_err();
        assert_eq!(err.to_string(), "DELIVERY_ORDERS_TEST_MISSING_VAR must be set");
    }
}
