//! Application services: the operations administrators invoke on an order.
//!
//! Services load state through the command dispatcher, turn calls into aggregate
//! commands and report failures as `ServiceError`, keeping the domain rejection typed.

pub mod packaging;
pub mod payments;

use serde::Serialize;
use thiserror::Error;

use storefront_core::DomainError;
use storefront_fulfillment::PackagingError;
use storefront_orders::OrderId;
use storefront_payments::PaymentError;

use crate::command_dispatcher::DispatchError;
use crate::confirmation::{ConfirmationError, ConfirmationToken};
use crate::repository::RepositoryError;

pub use packaging::{DeletedPackage, OrderPackagingService};
pub use payments::{DeletedPayment, PaymentService};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("order {0} not found")]
    OrderNotFound(OrderId),

    #[error(transparent)]
    Packaging(#[from] PackagingError),

    #[error(transparent)]
    Payment(#[from] PaymentError),

    #[error(transparent)]
    Confirmation(#[from] ConfirmationError),

    /// The order aggregate refused a change.
    #[error(transparent)]
    Order(DomainError),

    /// Lost an optimistic concurrency race; the caller may retry.
    #[error("concurrent modification: {0}")]
    Conflict(String),

    #[error("infrastructure failure: {0}")]
    Infrastructure(String),
}

impl From<RepositoryError> for ServiceError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::NotFound(id) => ServiceError::OrderNotFound(id),
            RepositoryError::Conflict(id) => ServiceError::Conflict(format!("order {id}")),
            RepositoryError::Rejected(e) => ServiceError::Order(e),
            RepositoryError::Storage(msg) => ServiceError::Infrastructure(msg),
        }
    }
}

impl<E> From<DispatchError<E>> for ServiceError
where
    E: Into<ServiceError> + std::fmt::Display,
{
    fn from(value: DispatchError<E>) -> Self {
        match value {
            DispatchError::Rejected(e) => e.into(),
            DispatchError::Concurrency(msg) => ServiceError::Conflict(msg),
            other => ServiceError::Infrastructure(other.to_string()),
        }
    }
}

/// First step of a two-step delete: the token plus the texts of the confirmation form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeleteConfirmation {
    pub token: ConfirmationToken,
    pub question: String,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_errors_map_to_service_errors() {
        let rejected: ServiceError = DispatchError::Rejected(PackagingError::EmptySelection).into();
        assert!(matches!(rejected, ServiceError::Packaging(PackagingError::EmptySelection)));

        let raced: ServiceError = DispatchError::<PackagingError>::Concurrency("stream moved".to_string()).into();
        assert!(matches!(raced, ServiceError::Conflict(msg) if msg == "stream moved"));

        let corrupt: ServiceError = DispatchError::<PaymentError>::CorruptStream("gap at 3".to_string()).into();
        match corrupt {
            ServiceError::Infrastructure(msg) => assert_eq!(msg, "corrupt event stream: gap at 3"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
