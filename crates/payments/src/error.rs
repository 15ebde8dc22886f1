use thiserror::Error;

use storefront_core::{DomainError, PaymentId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    #[error("payment amount must not be zero")]
    ZeroAmount,

    #[error("payment {0} does not exist")]
    PaymentNotFound(PaymentId),

    #[error("unknown payment method '{0}'")]
    UnknownMethod(String),

    #[error("invariant violated: {0}")]
    Invariant(String),
}

impl From<DomainError> for PaymentError {
    fn from(value: DomainError) -> Self {
        PaymentError::Invariant(value.to_string())
    }
}

impl From<PaymentError> for DomainError {
    fn from(value: PaymentError) -> Self {
        match value {
            PaymentError::PaymentNotFound(id) => DomainError::not_found(format!("payment {id}")),
            PaymentError::Invariant(msg) => DomainError::invariant(msg),
            other => DomainError::validation(other.to_string()),
        }
    }
}
