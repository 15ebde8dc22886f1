use std::collections::BTreeMap;
use std::sync::Arc;

use crate::context::{ContextDefinition, ExecutionContext};
use crate::error::RulesError;
use crate::plugin::{Condition, PluginDefinition};
use crate::services::CountryManager;

/// True when the order's billing address is in one of the given countries.
pub struct BillingCountryCondition {
    countries: Arc<dyn CountryManager>,
}

impl BillingCountryCondition {
    pub const ID: &'static str = "uc_order_condition_billing_country";

    pub fn new(countries: Arc<dyn CountryManager>) -> Self {
        Self { countries }
    }

    /// Choices for the `countries` context.
    pub fn country_options(&self) -> BTreeMap<String, String> {
        self.countries.enabled_list()
    }
}

impl Condition for BillingCountryCondition {
    fn definition(&self) -> PluginDefinition {
        PluginDefinition {
            id: Self::ID,
            label: "Check an order's billing country",
            category: "Order",
            contexts: vec![
                ContextDefinition {
                    name: "order",
                    label: "Order",
                    required: true,
                    multiple: false,
                },
                ContextDefinition {
                    name: "countries",
                    label: "Countries",
                    required: true,
                    multiple: true,
                },
            ],
        }
    }

    fn summary(&self) -> String {
        "Check user's billing country".to_string()
    }

    fn evaluate(&self, ctx: &ExecutionContext) -> Result<bool, RulesError> {
        ctx.check(&self.definition().contexts)?;
        let order = ctx.order("order")?;
        let countries = ctx.strings("countries")?;

        // Orders without a billing address match no country.
        let Some(address) = order.billing_address() else {
            return Ok(false);
        };
        Ok(countries
            .iter()
            .any(|code| code.trim().eq_ignore_ascii_case(address.country())))
    }
}
