//! Orders domain module (event-sourced).
//!
//! An order owns its line items for its whole life; packaging, payments and rules
//! read them but never change them.

pub mod address;
pub mod order;

pub use address::Address;
pub use order::{
    BillingAddressChanged, ChangeBillingAddress, CreateOrder, LineItem, NewLineItem, Order,
    OrderCommand, OrderCreated, OrderEvent, OrderId, ShippingType,
};
