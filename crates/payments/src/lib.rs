//! Payments domain module (event-sourced).
//!
//! Every order has a ledger of received payments. The balance is never stored; it is
//! recomputed from the order total and the ledger on each read.

pub mod error;
pub mod ledger;
pub mod messages;
pub mod method;

pub use error::PaymentError;
pub use ledger::{
    DeletePayment, EnterPayment, Payment, PaymentDeleted, PaymentEntered, PaymentLedger,
    PaymentLedgerCommand, PaymentLedgerEvent,
};
pub use method::{PaymentMethod, PaymentMethods};
