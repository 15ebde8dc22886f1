use thiserror::Error;

use storefront_core::{DomainError, LineItemId, PackageId};
use storefront_orders::ShippingType;

use crate::messages;

/// Rejections from the packaging aggregate. All of them are user-input problems: they
/// are reported as-is and never retried, and none of them changes state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PackagingError {
    #[error("{}", messages::EMPTY_PACKAGE)]
    EmptySelection,

    #[error("product {item} is already in package {package}")]
    AlreadyPackaged { item: LineItemId, package: PackageId },

    #[error("product {0} is not a shippable product of this order")]
    InvalidItem(LineItemId),

    #[error("package {0} does not exist")]
    PackageNotFound(PackageId),

    #[error("product {item} ships as {found}, but the package holds {expected} items")]
    ShippingTypeMismatch {
        item: LineItemId,
        expected: ShippingType,
        found: ShippingType,
    },

    #[error("shipments must contain at least one package")]
    EmptyShipment,

    #[error("packaging has not been opened for this order")]
    NotOpened,

    #[error("packaging is already open for this order")]
    AlreadyOpened,

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl From<DomainError> for PackagingError {
    fn from(value: DomainError) -> Self {
        PackagingError::Invariant(value.to_string())
    }
}

impl From<PackagingError> for DomainError {
    fn from(value: PackagingError) -> Self {
        match value {
            PackagingError::PackageNotFound(id) => DomainError::not_found(format!("package {id}")),
            PackagingError::NotOpened => DomainError::not_found("packaging"),
            PackagingError::AlreadyOpened => DomainError::conflict(value.to_string()),
            PackagingError::Invariant(msg) => DomainError::invariant(msg),
            other => DomainError::validation(other.to_string()),
        }
    }
}
