//! Stream names and decoding of bus payloads back into typed events.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use storefront_events::{Event, EventEnvelope};
use storefront_fulfillment::PackagingEvent;
use storefront_orders::{OrderEvent, OrderId};
use storefront_payments::PaymentLedgerEvent;

/// Aggregate type of the order stream.
pub const ORDER: &str = "orders.order";
/// Aggregate type of an order's packaging stream.
pub const PACKAGING: &str = "fulfillment.packaging";
/// Aggregate type of an order's payment ledger stream.
pub const PAYMENT_LEDGER: &str = "payments.ledger";

/// Any event the storefront writes, tagged by the stream it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorefrontEvent {
    Order(OrderEvent),
    Packaging(PackagingEvent),
    Payment(PaymentLedgerEvent),
}

impl StorefrontEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            StorefrontEvent::Order(e) => e.order_id(),
            StorefrontEvent::Packaging(e) => e.order_id(),
            StorefrontEvent::Payment(e) => e.order_id(),
        }
    }
}

impl Event for StorefrontEvent {
    fn event_type(&self) -> &'static str {
        match self {
            StorefrontEvent::Order(e) => e.event_type(),
            StorefrontEvent::Packaging(e) => e.event_type(),
            StorefrontEvent::Payment(e) => e.event_type(),
        }
    }

    fn version(&self) -> u32 {
        match self {
            StorefrontEvent::Order(e) => e.version(),
            StorefrontEvent::Packaging(e) => e.version(),
            StorefrontEvent::Payment(e) => e.version(),
        }
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            StorefrontEvent::Order(e) => e.occurred_at(),
            StorefrontEvent::Packaging(e) => e.occurred_at(),
            StorefrontEvent::Payment(e) => e.occurred_at(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown aggregate type '{0}'")]
    UnknownAggregateType(String),
    #[error("failed to deserialize {aggregate_type} event: {reason}")]
    Payload { aggregate_type: String, reason: String },
}

/// Turn a JSON envelope from the bus into a typed one.
pub fn decode(envelope: &EventEnvelope<JsonValue>) -> Result<EventEnvelope<StorefrontEvent>, DecodeError> {
    let aggregate_type = envelope.aggregate_type();
    let payload = envelope.payload().clone();
    let fail = |e: serde_json::Error| DecodeError::Payload {
        aggregate_type: aggregate_type.to_string(),
        reason: e.to_string(),
    };

    let event = match aggregate_type {
        ORDER => StorefrontEvent::Order(serde_json::from_value(payload).map_err(fail)?),
        PACKAGING => StorefrontEvent::Packaging(serde_json::from_value(payload).map_err(fail)?),
        PAYMENT_LEDGER => StorefrontEvent::Payment(serde_json::from_value(payload).map_err(fail)?),
        other => return Err(DecodeError::UnknownAggregateType(other.to_string())),
    };

    Ok(envelope.clone().map(|_| event))
}
