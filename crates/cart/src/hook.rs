//! The cart hook trait.

use crate::cart::{AddToCartRequest, CartItem, ItemData};

/// Why a hook refused an add-to-cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Refusal {
    /// Shown to the customer unless `silent` is set.
    pub message: Option<String>,
    pub silent: bool,
}

impl Refusal {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            silent: false,
        }
    }

    pub fn silent() -> Self {
        Self {
            message: None,
            silent: true,
        }
    }
}

/// A participant in cart operations.
///
/// Every capability has a no-op default, so a hook only implements what it cares
/// about. Hooks must be `Send + Sync`: one registry serves all carts.
pub trait CartHook: Send + Sync {
    /// Unique id, used in logs.
    fn id(&self) -> &str;

    /// Veto an add-to-cart before anything changes.
    fn validate(&self, _request: &AddToCartRequest) -> Result<(), Refusal> {
        Ok(())
    }

    /// Extra data stored on the cart item. Items with different data are kept on
    /// separate lines.
    fn decorate(&self, _request: &AddToCartRequest) -> ItemData {
        ItemData::new()
    }

    fn on_insert(&self, _item: &CartItem) {}

    fn on_update(&self, _item: &CartItem) {}

    fn on_delete(&self, _item: &CartItem) {}
}
