//! `storefront-core`: shared domain building blocks.
//!
//! Identifiers, the domain error model, aggregate traits and money. No IO lives here.

pub mod aggregate;
pub mod entity;
pub mod error;
pub mod id;
pub mod money;
pub mod value_object;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{AggregateId, LineItemId, PackageId, PaymentId, ShipmentId, UserId};
pub use money::{CurrencyFormat, Money};
pub use value_object::ValueObject;
