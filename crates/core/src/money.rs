//! Money amounts and their display format.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::value_object::ValueObject;

/// Digits stored after the decimal point (amounts are kept in cents).
const STORED_DIGITS: u32 = 2;

/// Signed amount in minor units (cents). Negative amounts are refunds/credits.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Self = Self(0);

    pub const fn from_minor_units(minor_units: i64) -> Self {
        Self(minor_units)
    }

    pub const fn minor_units(self) -> i64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Money) -> Result<Money, DomainError> {
        self.0
            .checked_add(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("money overflow"))
    }

    pub fn checked_sub(self, other: Money) -> Result<Money, DomainError> {
        self.0
            .checked_sub(other.0)
            .map(Money)
            .ok_or_else(|| DomainError::invariant("money overflow"))
    }

    /// `self * quantity`, e.g. a line total.
    pub fn checked_mul(self, quantity: u32) -> Result<Money, DomainError> {
        self.0
            .checked_mul(i64::from(quantity))
            .map(Money)
            .ok_or_else(|| DomainError::invariant("money overflow"))
    }

    pub fn checked_sum<I>(amounts: I) -> Result<Money, DomainError>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::ZERO, |acc, m| acc.checked_add(m))
    }
}

impl ValueObject for Money {}

/// How amounts are rendered for people ("$1,234.50").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurrencyFormat {
    pub symbol: String,
    pub symbol_after: bool,
    pub thousands_separator: String,
    pub decimal_separator: String,
    pub precision: u32,
}

impl Default for CurrencyFormat {
    fn default() -> Self {
        Self {
            symbol: "$".to_string(),
            symbol_after: false,
            thousands_separator: ",".to_string(),
            decimal_separator: ".".to_string(),
            precision: 2,
        }
    }
}

impl ValueObject for CurrencyFormat {}

impl CurrencyFormat {
    /// Most decimal places `format` renders; larger precisions are clamped.
    pub const MAX_PRECISION: u32 = 18;

    /// Render `amount`, rounding half away from zero when `precision` is below the
    /// stored digits. The sign goes in front of the symbol.
    pub fn format(&self, amount: Money) -> String {
        let negative = amount.minor_units() < 0;
        let abs = u128::from(amount.minor_units().unsigned_abs());
        let precision = self.precision.min(Self::MAX_PRECISION);

        let scaled = if precision >= STORED_DIGITS {
            abs * 10u128.pow(precision - STORED_DIGITS)
        } else {
            let divisor = 10u128.pow(STORED_DIGITS - precision);
            (abs + divisor / 2) / divisor
        };
        let unit = 10u128.pow(precision);
        let whole = group_thousands(&(scaled / unit).to_string(), &self.thousands_separator);

        let mut number = whole;
        if precision > 0 {
            number.push_str(&self.decimal_separator);
            number.push_str(&format!(
                "{:0width$}",
                scaled % unit,
                width = precision as usize
            ));
        }

        let body = if self.symbol_after {
            format!("{number}{}", self.symbol)
        } else {
            format!("{}{number}", self.symbol)
        };

        if negative && scaled != 0 {
            format!("-{body}")
        } else {
            body
        }
    }
}

fn group_thousands(digits: &str, separator: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3 * separator.len());
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && (len - idx) % 3 == 0 {
            out.push_str(separator);
        }
        out.push(ch);
    }
    out
}
