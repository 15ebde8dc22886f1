use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{
    Aggregate, AggregateId, AggregateRoot, DomainError, Entity, LineItemId, Money,
};
use storefront_events::Event;

use crate::address::Address;

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

impl OrderId {
    pub fn new(id: AggregateId) -> Self {
        Self(id)
    }
}

impl core::fmt::Display for OrderId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

/// Package type a product ships in ("small_package", "freight", ...).
///
/// Only items of the same type can share a package.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShippingType(String);

impl ShippingType {
    pub const SMALL_PACKAGE: &'static str = "small_package";

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ShippingType {
    fn default() -> Self {
        Self::new(Self::SMALL_PACKAGE)
    }
}

impl core::fmt::Display for ShippingType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One purchased product entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: LineItemId,
    pub sku: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub shippable: bool,
    pub shipping_type: ShippingType,
}

impl LineItem {
    pub fn line_total(&self) -> Result<Money, DomainError> {
        self.unit_price.checked_mul(self.quantity)
    }
}

impl Entity for LineItem {
    type Id = LineItemId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Line item as submitted with `CreateOrder`; the order assigns ids 1, 2, ... in
/// submission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewLineItem {
    pub sku: String,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub shippable: bool,
    #[serde(default)]
    pub shipping_type: ShippingType,
}

impl NewLineItem {
    /// Shippable small-package item.
    pub fn shippable(sku: impl Into<String>, title: impl Into<String>, quantity: u32, unit_price: Money) -> Self {
        Self {
            sku: sku.into(),
            title: title.into(),
            quantity,
            unit_price,
            shippable: true,
            shipping_type: ShippingType::default(),
        }
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    id: OrderId,
    primary_email: String,
    billing_address: Option<Address>,
    payment_method: Option<String>,
    lines: Vec<LineItem>,
    total: Money,
    version: u64,
    created: bool,
}

impl Order {
    /// Not-yet-created instance, ready for rehydration.
    pub fn empty(id: OrderId) -> Self {
        Self {
            id,
            primary_email: String::new(),
            billing_address: None,
            payment_method: None,
            lines: Vec::new(),
            total: Money::ZERO,
            version: 0,
            created: false,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.created
    }

    pub fn primary_email(&self) -> &str {
        &self.primary_email
    }

    pub fn billing_address(&self) -> Option<&Address> {
        self.billing_address.as_ref()
    }

    pub fn payment_method(&self) -> Option<&str> {
        self.payment_method.as_deref()
    }

    /// Line items in sequence order.
    pub fn lines(&self) -> &[LineItem] {
        &self.lines
    }

    pub fn line(&self, id: LineItemId) -> Option<&LineItem> {
        self.lines.iter().find(|l| l.id == id)
    }

    pub fn shippable_lines(&self) -> impl Iterator<Item = &LineItem> {
        self.lines.iter().filter(|l| l.shippable)
    }

    pub fn is_shippable(&self) -> bool {
        self.lines.iter().any(|l| l.shippable)
    }

    /// Σ quantity × unit price, fixed at creation.
    pub fn total(&self) -> Money {
        self.total
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: CreateOrder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOrder {
    pub order_id: OrderId,
    pub primary_email: String,
    pub billing_address: Option<Address>,
    pub payment_method: Option<String>,
    pub lines: Vec<NewLineItem>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: ChangeBillingAddress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBillingAddress {
    pub order_id: OrderId,
    pub address: Address,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderCommand {
    CreateOrder(CreateOrder),
    ChangeBillingAddress(ChangeBillingAddress),
}

/// Event: OrderCreated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreated {
    pub order_id: OrderId,
    pub primary_email: String,
    pub billing_address: Option<Address>,
    pub payment_method: Option<String>,
    pub lines: Vec<LineItem>,
    pub total: Money,
    pub occurred_at: DateTime<Utc>,
}

/// Event: BillingAddressChanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingAddressChanged {
    pub order_id: OrderId,
    pub address: Address,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEvent {
    OrderCreated(OrderCreated),
    BillingAddressChanged(BillingAddressChanged),
}

impl OrderEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            OrderEvent::OrderCreated(e) => e.order_id,
            OrderEvent::BillingAddressChanged(e) => e.order_id,
        }
    }
}

impl Event for OrderEvent {
    fn event_type(&self) -> &'static str {
        match self {
            OrderEvent::OrderCreated(_) => "orders.order.created",
            OrderEvent::BillingAddressChanged(_) => "orders.order.billing_address_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            OrderEvent::OrderCreated(e) => e.occurred_at,
            OrderEvent::BillingAddressChanged(e) => e.occurred_at,
        }
    }
}

impl Aggregate for Order {
    type Command = OrderCommand;
    type Event = OrderEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            OrderEvent::OrderCreated(e) => {
                self.id = e.order_id;
                self.primary_email = e.primary_email.clone();
                self.billing_address = e.billing_address.clone();
                self.payment_method = e.payment_method.clone();
                self.lines = e.lines.clone();
                self.total = e.total;
                self.created = true;
            }
            OrderEvent::BillingAddressChanged(e) => {
                self.billing_address = Some(e.address.clone());
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            OrderCommand::CreateOrder(cmd) => self.handle_create(cmd),
            OrderCommand::ChangeBillingAddress(cmd) => self.handle_change_billing(cmd),
        }
    }
}

impl Order {
    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), DomainError> {
        if self.id != order_id {
            return Err(DomainError::invariant("order_id mismatch"));
        }
        Ok(())
    }

    fn handle_create(&self, cmd: &CreateOrder) -> Result<Vec<OrderEvent>, DomainError> {
        if self.created {
            return Err(DomainError::conflict("order already exists"));
        }
        self.ensure_order_id(cmd.order_id)?;

        if cmd.lines.is_empty() {
            return Err(DomainError::validation("an order needs at least one line item"));
        }
        if !cmd.primary_email.contains('@') {
            return Err(DomainError::validation("primary email address is invalid"));
        }

        let mut lines = Vec::with_capacity(cmd.lines.len());
        let mut next_id = LineItemId::FIRST;
        for new in &cmd.lines {
            if new.sku.trim().is_empty() {
                return Err(DomainError::validation("line item SKU must not be empty"));
            }
            if new.quantity == 0 {
                return Err(DomainError::validation("line item quantity must be positive"));
            }
            if new.unit_price < Money::ZERO {
                return Err(DomainError::validation("line item price must not be negative"));
            }
            lines.push(LineItem {
                id: next_id,
                sku: new.sku.clone(),
                title: new.title.clone(),
                quantity: new.quantity,
                unit_price: new.unit_price,
                shippable: new.shippable,
                shipping_type: new.shipping_type.clone(),
            });
            next_id = next_id.next()?;
        }

        let total = Money::checked_sum(
            lines
                .iter()
                .map(LineItem::line_total)
                .collect::<Result<Vec<_>, _>>()?,
        )?;

        Ok(vec![OrderEvent::OrderCreated(OrderCreated {
            order_id: cmd.order_id,
            primary_email: cmd.primary_email.clone(),
            billing_address: cmd.billing_address.clone(),
            payment_method: cmd.payment_method.clone(),
            lines,
            total,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_change_billing(
        &self,
        cmd: &ChangeBillingAddress,
    ) -> Result<Vec<OrderEvent>, DomainError> {
        if !self.created {
            return Err(DomainError::not_found(format!("order {}", cmd.order_id)));
        }
        self.ensure_order_id(cmd.order_id)?;

        if self.billing_address.as_ref() == Some(&cmd.address) {
            return Ok(vec![]);
        }

        Ok(vec![OrderEvent::BillingAddressChanged(BillingAddressChanged {
            order_id: cmd.order_id,
            address: cmd.address.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    /// Line item ids of this order, for membership checks.
    pub fn line_ids(&self) -> BTreeSet<LineItemId> {
        self.lines.iter().map(|l| l.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn test_order_id() -> OrderId {
        OrderId::new(AggregateId::new())
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn four_products() -> Vec<NewLineItem> {
        (1..=4)
            .map(|i| NewLineItem::shippable(format!("SKU-{i}"), format!("Product {i}"), 1, Money::from_minor_units(1000 * i)))
            .collect()
    }

    fn create_cmd(order_id: OrderId, lines: Vec<NewLineItem>) -> CreateOrder {
        CreateOrder {
            order_id,
            primary_email: "buyer@example.org".to_string(),
            billing_address: Some(Address::in_country("US").unwrap()),
            payment_method: Some("other".to_string()),
            lines,
            occurred_at: test_time(),
        }
    }

    #[test]
    fn create_order_assigns_sequential_line_ids_and_total() {
        let order_id = test_order_id();
        let order = Order::empty(order_id);

        let events = order
            .handle(&OrderCommand::CreateOrder(create_cmd(order_id, four_products())))
            .unwrap();
        assert_eq!(events.len(), 1);

        match &events[0] {
            OrderEvent::OrderCreated(e) => {
                let ids: Vec<u32> = e.lines.iter().map(|l| l.id.get()).collect();
                assert_eq!(ids, vec![1, 2, 3, 4]);
                assert_eq!(e.total, Money::from_minor_units(10_000));
            }
            _ => panic!("Expected OrderCreated event"),
        }
    }

    #[test]
    fn create_order_without_lines_is_rejected() {
        let order_id = test_order_id();
        let err = Order::empty(order_id)
            .handle(&OrderCommand::CreateOrder(create_cmd(order_id, vec![])))
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn zero_quantity_is_rejected() {
        let order_id = test_order_id();
        let mut lines = four_products();
        lines[2].quantity = 0;
        let err = Order::empty(order_id)
            .handle(&OrderCommand::CreateOrder(create_cmd(order_id, lines)))
            .unwrap_err();
        match err {
            DomainError::Validation(msg) if msg.contains("quantity") => {}
            other => panic!("Expected quantity validation error, got {other:?}"),
        }
    }

    #[test]
    fn cannot_create_twice() {
        let order_id = test_order_id();
        let mut order = Order::empty(order_id);
        storefront_events::execute(&mut order, &OrderCommand::CreateOrder(create_cmd(order_id, four_products()))).unwrap();

        let err = order
            .handle(&OrderCommand::CreateOrder(create_cmd(order_id, four_products())))
            .unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn changing_billing_address_is_recorded_once() {
        let order_id = test_order_id();
        let mut order = Order::empty(order_id);
        storefront_events::execute(&mut order, &OrderCommand::CreateOrder(create_cmd(order_id, four_products()))).unwrap();

        let change = OrderCommand::ChangeBillingAddress(ChangeBillingAddress {
            order_id,
            address: Address::in_country("ca").unwrap(),
            occurred_at: test_time(),
        });
        let events = storefront_events::execute(&mut order, &change).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(order.billing_address().unwrap().country(), "CA");
        assert_eq!(order.version(), 2);

        // Same address again: nothing to record.
        assert!(order.handle(&change).unwrap().is_empty());
    }

    #[test]
    fn shippable_lines_filter_out_downloads() {
        let order_id = test_order_id();
        let mut lines = four_products();
        lines[1].shippable = false;
        let mut order = Order::empty(order_id);
        storefront_events::execute(&mut order, &OrderCommand::CreateOrder(create_cmd(order_id, lines))).unwrap();

        let shippable: Vec<u32> = order.shippable_lines().map(|l| l.id.get()).collect();
        assert_eq!(shippable, vec![1, 3, 4]);
    }

    proptest! {
        /// Property: the recorded total always equals Σ qty × price of the lines.
        #[test]
        fn total_matches_line_totals(items in prop::collection::vec((1u32..50, 0i64..100_000), 1..12)) {
            let order_id = test_order_id();
            let lines: Vec<NewLineItem> = items
                .iter()
                .enumerate()
                .map(|(i, (qty, price))| NewLineItem::shippable(format!("SKU-{i}"), "p", *qty, Money::from_minor_units(*price)))
                .collect();
            let mut order = Order::empty(order_id);
            storefront_events::execute(&mut order, &OrderCommand::CreateOrder(create_cmd(order_id, lines))).unwrap();

            let expected: i64 = items.iter().map(|(q, p)| i64::from(*q) * p).sum();
            prop_assert_eq!(order.total().minor_units(), expected);
        }
    }
}
