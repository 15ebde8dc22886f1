use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use storefront_core::{Entity, Money};

use crate::error::CartError;
use crate::registry::HookRegistry;
use crate::settings::ProductSettings;

/// Free-form data attached to a cart line by hooks (attributes, shippable flag, ...).
pub type ItemData = BTreeMap<String, serde_json::Value>;

/// Cart identifier: a customer id or an anonymous session id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(pub String);

impl core::fmt::Display for CartId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Position of a line inside one cart.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartItemId(pub u32);

impl core::fmt::Display for CartItemId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// What the add-to-cart form submits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
    #[serde(default)]
    pub data: ItemData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub product_id: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub data: ItemData,
}

impl CartItem {
    pub fn line_total(&self) -> Result<Money, CartError> {
        Ok(self.unit_price.checked_mul(self.quantity)?)
    }
}

impl Entity for CartItem {
    type Id = CartItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Result of an add-to-cart attempt as shown to the customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddToCartOutcome {
    pub success: bool,
    pub message: Option<String>,
    /// Suppress any notice.
    pub silent: bool,
    /// The line that was inserted or updated.
    pub item: Option<CartItemId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    id: CartId,
    items: BTreeMap<CartItemId, CartItem>,
    last_item_id: u32,
}

impl Cart {
    pub fn new(id: CartId) -> Self {
        Self {
            id,
            items: BTreeMap::new(),
            last_item_id: 0,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &CartItem> {
        self.items.values()
    }

    pub fn item(&self, id: CartItemId) -> Option<&CartItem> {
        self.items.get(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> Result<Money, CartError> {
        let mut total = Money::ZERO;
        for item in self.items.values() {
            total = total.checked_add(item.line_total()?)?;
        }
        Ok(total)
    }

    /// Add a product.
    ///
    /// Hooks may refuse the add (nothing changes) and contribute item data. A line
    /// with the same product and data absorbs the quantity; otherwise a new line is
    /// inserted.
    pub fn add_item(
        &mut self,
        hooks: &HookRegistry,
        settings: &ProductSettings,
        mut request: AddToCartRequest,
    ) -> Result<AddToCartOutcome, CartError> {
        request.quantity = settings.effective_quantity(request.quantity);
        if request.quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        if let Err(refusal) = hooks.validate(&request) {
            return Ok(AddToCartOutcome {
                success: false,
                message: refusal.message,
                silent: refusal.silent,
                item: None,
            });
        }

        let data = hooks.decorate(&request);
        let existing = self
            .items
            .values()
            .find(|i| i.product_id == request.product_id && i.data == data)
            .map(|i| i.id);

        let id = match existing {
            Some(id) => {
                let item = self.items.get_mut(&id).ok_or(CartError::ItemNotFound(id))?;
                item.quantity = item
                    .quantity
                    .checked_add(request.quantity)
                    .ok_or_else(|| CartError::Invariant("quantity overflow".to_string()))?;
                hooks.notify_update(item);
                id
            }
            None => {
                let next = self
                    .last_item_id
                    .checked_add(1)
                    .ok_or_else(|| CartError::Invariant("cart item id overflow".to_string()))?;
                let id = CartItemId(next);
                let item = CartItem {
                    id,
                    product_id: request.product_id,
                    title: request.title.clone(),
                    quantity: request.quantity,
                    unit_price: request.unit_price,
                    data,
                };
                hooks.notify_insert(&item);
                self.items.insert(id, item);
                self.last_item_id = id.0;
                id
            }
        };

        tracing::info!(cart_id = %self.id, item_id = %id, "item added to cart");

        Ok(AddToCartOutcome {
            success: true,
            message: Some(format!("{} added to your shopping cart.", request.title)),
            silent: false,
            item: Some(id),
        })
    }

    /// Set a line's quantity. Zero removes the line.
    pub fn update_quantity(
        &mut self,
        hooks: &HookRegistry,
        id: CartItemId,
        quantity: u32,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return self.remove_item(hooks, id);
        }

        let item = self.items.get_mut(&id).ok_or(CartError::ItemNotFound(id))?;
        if item.quantity != quantity {
            item.quantity = quantity;
            hooks.notify_update(item);
        }
        Ok(())
    }

    pub fn remove_item(&mut self, hooks: &HookRegistry, id: CartItemId) -> Result<(), CartError> {
        let item = self.items.remove(&id).ok_or(CartError::ItemNotFound(id))?;
        hooks.notify_delete(&item);
        tracing::info!(cart_id = %self.id, item_id = %id, "item removed from cart");
        Ok(())
    }
}

impl Entity for Cart {
    type Id = CartId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}
