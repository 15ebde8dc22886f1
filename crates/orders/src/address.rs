use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, ValueObject};

/// Postal address attached to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub street: String,
    pub city: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2, upper case.
    country: String,
}

impl Address {
    /// Build an address; `country` is normalised to upper case and must be two letters.
    pub fn new(
        name: impl Into<String>,
        street: impl Into<String>,
        city: impl Into<String>,
        postal_code: impl Into<String>,
        country: &str,
    ) -> Result<Self, DomainError> {
        Ok(Self {
            name: name.into(),
            street: street.into(),
            city: city.into(),
            postal_code: postal_code.into(),
            country: normalize_country(country)?,
        })
    }

    /// Address that only knows its country (enough for country-based rules).
    pub fn in_country(country: &str) -> Result<Self, DomainError> {
        Self::new("", "", "", "", country)
    }

    pub fn country(&self) -> &str {
        &self.country
    }
}

impl ValueObject for Address {}

fn normalize_country(code: &str) -> Result<String, DomainError> {
    let code = code.trim();
    if code.len() != 2 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(DomainError::validation(format!(
            "country must be a two-letter ISO code, got '{code}'"
        )));
    }
    Ok(code.to_ascii_uppercase())
}
