//! Process configuration.
//!
//! Read from `STOREFRONT_*` environment variables; a missing variable falls back to its
//! default with a warning, a malformed one is an error.

use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_cart::ProductSettings;
use storefront_core::CurrencyFormat;

pub const CONFIRMATION_TTL_SECS: &str = "STOREFRONT_CONFIRMATION_TTL_SECS";
pub const CURRENCY_SYMBOL: &str = "STOREFRONT_CURRENCY_SYMBOL";
pub const CURRENCY_PRECISION: &str = "STOREFRONT_CURRENCY_PRECISION";
pub const ADD_TO_CART_QTY: &str = "STOREFRONT_ADD_TO_CART_QTY";
pub const UPDATE_NODE_VIEW: &str = "STOREFRONT_UPDATE_NODE_VIEW";

const DEFAULT_CONFIRMATION_TTL_SECS: u64 = 900;
const MAX_CONFIRMATION_TTL_SECS: u64 = 365 * 24 * 60 * 60;
const MAX_CURRENCY_PRECISION: u32 = 6;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorefrontConfig {
    /// Lifetime of delete confirmations, in seconds.
    pub confirmation_ttl_secs: u64,
    pub currency: CurrencyFormat,
    pub product: ProductSettings,
}

impl Default for StorefrontConfig {
    fn default() -> Self {
        Self {
            confirmation_ttl_secs: DEFAULT_CONFIRMATION_TTL_SECS,
            currency: CurrencyFormat::default(),
            product: ProductSettings::default(),
        }
    }
}

impl StorefrontConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any variable source. `from_env` is this over the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let confirmation_ttl_secs =
            parse_or(&lookup, CONFIRMATION_TTL_SECS, defaults.confirmation_ttl_secs)?;

        let symbol = lookup(CURRENCY_SYMBOL).unwrap_or_else(|| {
            tracing::warn!(variable = CURRENCY_SYMBOL, fallback = %defaults.currency.symbol, "not set; using default");
            defaults.currency.symbol.clone()
        });
        let precision = parse_or(&lookup, CURRENCY_PRECISION, defaults.currency.precision)?;

        let product = ProductSettings {
            add_to_cart_qty: parse_or(&lookup, ADD_TO_CART_QTY, defaults.product.add_to_cart_qty)?,
            update_node_view: parse_or(&lookup, UPDATE_NODE_VIEW, defaults.product.update_node_view)?,
        };

        let config = Self {
            confirmation_ttl_secs,
            currency: CurrencyFormat {
                symbol,
                precision,
                ..defaults.currency
            },
            product,
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Range checks shared by every constructor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=MAX_CONFIRMATION_TTL_SECS).contains(&self.confirmation_ttl_secs) {
            return Err(ConfigError::Invalid {
                name: CONFIRMATION_TTL_SECS,
                value: self.confirmation_ttl_secs.to_string(),
                reason: format!("must be between 1 and {MAX_CONFIRMATION_TTL_SECS} seconds"),
            });
        }
        if self.currency.precision > MAX_CURRENCY_PRECISION {
            return Err(ConfigError::Invalid {
                name: CURRENCY_PRECISION,
                value: self.currency.precision.to_string(),
                reason: format!("at most {MAX_CURRENCY_PRECISION} decimal places are supported"),
            });
        }
        Ok(())
    }

    /// Confirmation lifetime, capped at one year.
    pub fn confirmation_ttl(&self) -> Duration {
        let secs = self.confirmation_ttl_secs.min(MAX_CONFIRMATION_TTL_SECS);
        Duration::seconds(i64::try_from(secs).unwrap_or(0))
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr + std::fmt::Display,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
            name,
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => {
            tracing::warn!(variable = name, fallback = %default, "not set; using default");
            Ok(default)
        }
    }
}
