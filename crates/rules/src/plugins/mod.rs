//! Built-in plugins.

mod billing_country;
mod unban_ip;

pub use billing_country::BillingCountryCondition;
pub use unban_ip::UnbanIpAction;
