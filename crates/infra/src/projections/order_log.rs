//! The order log: a per-order, human-readable history of admin actions.

use chrono::{DateTime, Utc};

use storefront_core::CurrencyFormat;
use storefront_events::{Event, EventEnvelope, Projection};
use storefront_fulfillment::{PackagingEvent, messages as packaging_messages};
use storefront_orders::{OrderEvent, OrderId};
use storefront_payments::{PaymentLedgerEvent, PaymentMethods, messages as payment_messages};

use crate::read_model::ReadStore;
use crate::streams::StorefrontEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLogEntry {
    pub at: DateTime<Utc>,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderLog {
    pub entries: Vec<OrderLogEntry>,
}

impl OrderLog {
    pub fn messages(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.message.as_str()).collect()
    }
}

pub struct OrderLogProjection<S>
where
    S: ReadStore<OrderId, OrderLog>,
{
    store: S,
    currency: CurrencyFormat,
    methods: PaymentMethods,
}

impl<S> OrderLogProjection<S>
where
    S: ReadStore<OrderId, OrderLog>,
{
    pub fn new(store: S, currency: CurrencyFormat, methods: PaymentMethods) -> Self {
        Self {
            store,
            currency,
            methods,
        }
    }

    pub fn get(&self, order_id: OrderId) -> OrderLog {
        self.store.get(&order_id).unwrap_or_default()
    }

    fn describe(&self, event: &StorefrontEvent) -> Option<String> {
        match event {
            StorefrontEvent::Order(OrderEvent::OrderCreated(_)) => Some("Order created.".to_string()),
            StorefrontEvent::Order(OrderEvent::BillingAddressChanged(e)) => Some(format!(
                "Billing address changed to {}.",
                e.address.country()
            )),
            StorefrontEvent::Packaging(PackagingEvent::PackagingOpened(_)) => None,
            StorefrontEvent::Packaging(PackagingEvent::PackageCreated(e)) => {
                Some(format!("Package {} created.", e.package_id))
            }
            StorefrontEvent::Packaging(PackagingEvent::PackageEdited(e)) => {
                Some(format!("Package {} edited.", e.package_id))
            }
            StorefrontEvent::Packaging(PackagingEvent::PackageDeleted(e)) => {
                Some(packaging_messages::package_deleted(e.package_id))
            }
            StorefrontEvent::Packaging(PackagingEvent::ShipmentCreated(e)) => {
                let packages: Vec<String> = e.packages.iter().map(ToString::to_string).collect();
                Some(format!(
                    "Shipment {} created with package(s) {}.",
                    e.shipment_id,
                    packages.join(", ")
                ))
            }
            StorefrontEvent::Payment(PaymentLedgerEvent::PaymentEntered(e)) => Some(payment_messages::entered_log(
                self.methods.label(&e.payment.method),
                e.payment.amount,
                &self.currency,
            )),
            StorefrontEvent::Payment(PaymentLedgerEvent::PaymentDeleted(e)) => Some(payment_messages::deleted_log(
                self.methods.label(&e.payment.method),
                e.payment.amount,
                &self.currency,
            )),
        }
    }
}

impl<S> Projection for OrderLogProjection<S>
where
    S: ReadStore<OrderId, OrderLog>,
{
    type Ev = StorefrontEvent;

    fn apply(&mut self, envelope: &EventEnvelope<StorefrontEvent>) {
        let event = envelope.payload();
        let Some(message) = self.describe(event) else {
            return;
        };
        let entry = OrderLogEntry {
            at: event.occurred_at(),
            message,
        };
        self.store
            .update(event.order_id(), &mut |log| log.entries.push(entry.clone()));
    }
}

impl<S> core::fmt::Debug for OrderLogProjection<S>
where
    S: ReadStore<OrderId, OrderLog>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("OrderLogProjection")
            .field("currency", &self.currency)
            .finish_non_exhaustive()
    }
}
