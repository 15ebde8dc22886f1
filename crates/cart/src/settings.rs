use serde::{Deserialize, Serialize};

/// Store-wide product display settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductSettings {
    /// Show a quantity field on the add-to-cart form. When off, every add is for
    /// exactly one unit.
    pub add_to_cart_qty: bool,
    /// Refresh displayed price and weight as the customer changes options.
    pub update_node_view: bool,
}

impl Default for ProductSettings {
    fn default() -> Self {
        Self {
            add_to_cart_qty: true,
            update_node_view: false,
        }
    }
}

impl ProductSettings {
    /// Quantity actually added for a requested quantity.
    pub fn effective_quantity(&self, requested: u32) -> u32 {
        if self.add_to_cart_qty { requested } else { 1 }
    }
}
