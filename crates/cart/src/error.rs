use thiserror::Error;

use storefront_core::DomainError;

use crate::cart::CartItemId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("cart item {0} does not exist")]
    ItemNotFound(CartItemId),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl From<DomainError> for CartError {
    fn from(value: DomainError) -> Self {
        CartError::Invariant(value.to_string())
    }
}
