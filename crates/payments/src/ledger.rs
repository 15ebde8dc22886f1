use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{Aggregate, AggregateRoot, Entity, Money, PaymentId, UserId};
use storefront_events::Event;
use storefront_orders::OrderId;

use crate::error::PaymentError;

/// A payment received against an order. Negative amounts are refunds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    /// Payment method id, e.g. "check".
    pub method: String,
    pub amount: Money,
    /// Free text; stored and returned exactly as entered, markup included.
    pub comment: Option<String>,
    pub received_at: DateTime<Utc>,
    pub received_by: UserId,
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Aggregate root: the payments received for one order.
///
/// The stream starts with the first payment; an order without payments has an empty
/// ledger at version 0.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentLedger {
    order_id: OrderId,
    payments: BTreeMap<PaymentId, Payment>,
    last_payment_id: Option<PaymentId>,
    version: u64,
}

impl PaymentLedger {
    pub fn empty(order_id: OrderId) -> Self {
        Self {
            order_id,
            payments: BTreeMap::new(),
            last_payment_id: None,
            version: 0,
        }
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    /// Payments in the order they were entered.
    pub fn payments(&self) -> impl Iterator<Item = &Payment> {
        self.payments.values()
    }

    pub fn payment(&self, id: PaymentId) -> Option<&Payment> {
        self.payments.get(&id)
    }

    pub fn total_paid(&self) -> Result<Money, PaymentError> {
        Ok(Money::checked_sum(self.payments.values().map(|p| p.amount))?)
    }

    /// `order_total - Σ payments`. Negative when the customer overpaid.
    pub fn balance(&self, order_total: Money) -> Result<Money, PaymentError> {
        Ok(order_total.checked_sub(self.total_paid()?)?)
    }

    fn next_payment_id(&self) -> Result<PaymentId, PaymentError> {
        match self.last_payment_id {
            Some(last) => Ok(last.next()?),
            None => Ok(PaymentId::FIRST),
        }
    }
}

impl AggregateRoot for PaymentLedger {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.order_id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

/// Command: EnterPayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnterPayment {
    pub order_id: OrderId,
    pub method: String,
    pub amount: Money,
    pub comment: Option<String>,
    pub received_by: UserId,
    pub occurred_at: DateTime<Utc>,
}

/// Command: DeletePayment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletePayment {
    pub order_id: OrderId,
    pub payment_id: PaymentId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentLedgerCommand {
    EnterPayment(EnterPayment),
    DeletePayment(DeletePayment),
}

/// Event: PaymentEntered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentEntered {
    pub order_id: OrderId,
    pub payment: Payment,
    pub occurred_at: DateTime<Utc>,
}

/// Event: PaymentDeleted. Carries the removed payment for the order log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDeleted {
    pub order_id: OrderId,
    pub payment: Payment,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentLedgerEvent {
    PaymentEntered(PaymentEntered),
    PaymentDeleted(PaymentDeleted),
}

impl PaymentLedgerEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            PaymentLedgerEvent::PaymentEntered(e) => e.order_id,
            PaymentLedgerEvent::PaymentDeleted(e) => e.order_id,
        }
    }

    pub fn payment(&self) -> &Payment {
        match self {
            PaymentLedgerEvent::PaymentEntered(e) => &e.payment,
            PaymentLedgerEvent::PaymentDeleted(e) => &e.payment,
        }
    }
}

impl Event for PaymentLedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentLedgerEvent::PaymentEntered(_) => "payments.payment.entered",
            PaymentLedgerEvent::PaymentDeleted(_) => "payments.payment.deleted",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            PaymentLedgerEvent::PaymentEntered(e) => e.occurred_at,
            PaymentLedgerEvent::PaymentDeleted(e) => e.occurred_at,
        }
    }
}

impl Aggregate for PaymentLedger {
    type Command = PaymentLedgerCommand;
    type Event = PaymentLedgerEvent;
    type Error = PaymentError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            PaymentLedgerEvent::PaymentEntered(e) => {
                self.order_id = e.order_id;
                let id = e.payment.id;
                self.payments.insert(id, e.payment.clone());
                self.last_payment_id = self.last_payment_id.max(Some(id));
            }
            PaymentLedgerEvent::PaymentDeleted(e) => {
                self.payments.remove(&e.payment.id);
            }
        }

        self.version += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            PaymentLedgerCommand::EnterPayment(cmd) => self.handle_enter(cmd),
            PaymentLedgerCommand::DeletePayment(cmd) => self.handle_delete(cmd),
        }
    }
}

impl PaymentLedger {
    fn ensure_order_id(&self, order_id: OrderId) -> Result<(), PaymentError> {
        if self.order_id != order_id {
            return Err(PaymentError::Invariant("order_id mismatch".to_string()));
        }
        Ok(())
    }

    fn handle_enter(&self, cmd: &EnterPayment) -> Result<Vec<PaymentLedgerEvent>, PaymentError> {
        self.ensure_order_id(cmd.order_id)?;

        if cmd.amount.is_zero() {
            return Err(PaymentError::ZeroAmount);
        }
        if cmd.method.trim().is_empty() {
            return Err(PaymentError::UnknownMethod(cmd.method.clone()));
        }
        // Reject entries that would make the balance unrepresentable.
        self.total_paid()?.checked_add(cmd.amount)?;

        let payment = Payment {
            id: self.next_payment_id()?,
            method: cmd.method.clone(),
            amount: cmd.amount,
            comment: cmd.comment.clone(),
            received_at: cmd.occurred_at,
            received_by: cmd.received_by,
        };

        Ok(vec![PaymentLedgerEvent::PaymentEntered(PaymentEntered {
            order_id: cmd.order_id,
            payment,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_delete(&self, cmd: &DeletePayment) -> Result<Vec<PaymentLedgerEvent>, PaymentError> {
        self.ensure_order_id(cmd.order_id)?;

        let payment = self
            .payments
            .get(&cmd.payment_id)
            .ok_or(PaymentError::PaymentNotFound(cmd.payment_id))?;

        Ok(vec![PaymentLedgerEvent::PaymentDeleted(PaymentDeleted {
            order_id: cmd.order_id,
            payment: payment.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use storefront_core::AggregateId;
    use storefront_events::execute;

    fn test_order_id() -> OrderId {
        OrderId::new(AggregateId::new())
    }

    fn test_user() -> UserId {
        UserId::new()
    }

    fn test_time() -> DateTime<Utc> {
        Utc::now()
    }

    fn enter(ledger: &mut PaymentLedger, cents: i64) -> Result<Vec<PaymentLedgerEvent>, PaymentError> {
        let cmd = PaymentLedgerCommand::EnterPayment(EnterPayment {
            order_id: ledger.order_id(),
            method: "check".to_string(),
            amount: Money::from_minor_units(cents),
            comment: Some("<b>Received in full</b>".to_string()),
            received_by: test_user(),
            occurred_at: test_time(),
        });
        execute(ledger, &cmd)
    }

    fn delete(ledger: &mut PaymentLedger, id: u32) -> Result<Vec<PaymentLedgerEvent>, PaymentError> {
        let cmd = PaymentLedgerCommand::DeletePayment(DeletePayment {
            order_id: ledger.order_id(),
            payment_id: PaymentId::new(id),
            occurred_at: test_time(),
        });
        execute(ledger, &cmd)
    }

    #[test]
    fn partial_payments_reduce_the_balance() {
        let mut ledger = PaymentLedger::empty(test_order_id());
        let total = Money::from_minor_units(10_000);

        enter(&mut ledger, 100).unwrap();
        enter(&mut ledger, 2_500).unwrap();
        assert_eq!(ledger.balance(total).unwrap(), Money::from_minor_units(7_400));

        enter(&mut ledger, 5_000).unwrap();
        assert_eq!(ledger.balance(total).unwrap(), Money::from_minor_units(2_400));
    }

    #[test]
    fn deleting_a_payment_restores_the_balance() {
        let mut ledger = PaymentLedger::empty(test_order_id());
        let total = Money::from_minor_units(10_000);
        enter(&mut ledger, 100).unwrap();
        enter(&mut ledger, 2_500).unwrap();
        enter(&mut ledger, 5_000).unwrap();

        let events = delete(&mut ledger, 2).unwrap();
        match &events[0] {
            PaymentLedgerEvent::PaymentDeleted(e) => {
                assert_eq!(e.payment.amount, Money::from_minor_units(2_500))
            }
            _ => panic!("Expected PaymentDeleted event"),
        }
        assert_eq!(ledger.balance(total).unwrap(), Money::from_minor_units(4_900));
        assert_eq!(ledger.payments().count(), 2);
    }

    #[test]
    fn payment_ids_are_not_reused_after_delete() {
        let mut ledger = PaymentLedger::empty(test_order_id());
        enter(&mut ledger, 100).unwrap();
        delete(&mut ledger, 1).unwrap();
        enter(&mut ledger, 100).unwrap();

        let ids: Vec<u32> = ledger.payments().map(|p| p.id.get()).collect();
        assert_eq!(ids, vec![2]);
    }

    #[test]
    fn zero_amount_is_rejected() {
        let mut ledger = PaymentLedger::empty(test_order_id());
        assert_eq!(enter(&mut ledger, 0).unwrap_err(), PaymentError::ZeroAmount);
        assert_eq!(ledger.version(), 0);
    }

    #[test]
    fn refunds_increase_the_balance() {
        let mut ledger = PaymentLedger::empty(test_order_id());
        enter(&mut ledger, 1_000).unwrap();
        enter(&mut ledger, -400).unwrap();
        assert_eq!(
            ledger.balance(Money::from_minor_units(1_000)).unwrap(),
            Money::from_minor_units(400)
        );
    }

    #[test]
    fn comment_markup_is_kept_verbatim() {
        let mut ledger = PaymentLedger::empty(test_order_id());
        enter(&mut ledger, 100).unwrap();
        let payment = ledger.payment(PaymentId::FIRST).unwrap();
        assert_eq!(payment.comment.as_deref(), Some("<b>Received in full</b>"));
    }

    #[test]
    fn deleting_unknown_payment_fails() {
        let mut ledger = PaymentLedger::empty(test_order_id());
        enter(&mut ledger, 100).unwrap();
        delete(&mut ledger, 1).unwrap();
        assert_eq!(
            delete(&mut ledger, 1).unwrap_err(),
            PaymentError::PaymentNotFound(PaymentId::new(1))
        );
    }

    proptest! {
        /// Property: the balance always equals total minus the sum of the remaining
        /// payments, whatever was entered and deleted.
        #[test]
        fn balance_is_total_minus_remaining_payments(
            total in 0i64..1_000_000,
            amounts in prop::collection::vec(-50_000i64..50_000, 1..20),
            deletions in prop::collection::vec(1u32..25, 0..10),
        ) {
            let mut ledger = PaymentLedger::empty(test_order_id());
            for amount in &amounts {
                let _ = enter(&mut ledger, *amount);
            }
            for id in deletions {
                let _ = delete(&mut ledger, id);
            }

            let remaining: i64 = ledger.payments().map(|p| p.amount.minor_units()).sum();
            prop_assert_eq!(
                ledger.balance(Money::from_minor_units(total)).unwrap(),
                Money::from_minor_units(total - remaining)
            );
        }
    }
}
