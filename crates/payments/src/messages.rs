//! Texts for the payments screen and the order log.

use storefront_core::{CurrencyFormat, Money};

pub const PAYMENT_ENTERED: &str = "Payment entered.";
pub const PAYMENT_DELETED: &str = "Payment deleted.";
pub const DELETE_QUESTION: &str = "Are you sure you want to delete this payment?";

/// Order log line, e.g. "Check payment for $1.00 entered.".
pub fn entered_log(method_label: &str, amount: Money, format: &CurrencyFormat) -> String {
    format!("{method_label} payment for {} entered.", format.format(amount))
}

/// Order log line, e.g. "Check payment for $1.00 deleted.".
pub fn deleted_log(method_label: &str, amount: Money, format: &CurrencyFormat) -> String {
    format!("{method_label} payment for {} deleted.", format.format(amount))
}
