use std::sync::Arc;

use serde_json::Value as JsonValue;
use uuid::Uuid;

use storefront_core::{CurrencyFormat, Money, PaymentId, UserId};
use storefront_events::{EventBus, EventEnvelope};
use storefront_orders::OrderId;
use storefront_payments::{
    DeletePayment, EnterPayment, Payment, PaymentError, PaymentLedger, PaymentLedgerCommand,
    PaymentLedgerEvent, PaymentMethods, messages,
};

use crate::clock::Clock;
use crate::command_dispatcher::{CommandDispatcher, Dispatched};
use crate::confirmation::PendingConfirmations;
use crate::event_store::EventStore;
use crate::repository::OrderRepository;
use crate::services::{DeleteConfirmation, ServiceError};
use crate::streams;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedPayment {
    pub order_id: OrderId,
    pub payment: Payment,
    /// "Payment deleted."
    pub message: &'static str,
}

/// Payments received against orders.
pub struct PaymentService<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
    orders: Arc<dyn OrderRepository>,
    methods: PaymentMethods,
    currency: CurrencyFormat,
    confirmations: PendingConfirmations<PaymentId>,
    clock: Arc<dyn Clock>,
}

impl<S, B> std::fmt::Debug for PaymentService<S, B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaymentService")
            .field("methods", &self.methods)
            .field("confirmations", &self.confirmations)
            .finish_non_exhaustive()
    }
}

impl<S, B> PaymentService<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    pub fn new(
        dispatcher: Arc<CommandDispatcher<S, B>>,
        orders: Arc<dyn OrderRepository>,
        methods: PaymentMethods,
        currency: CurrencyFormat,
        confirmations: PendingConfirmations<PaymentId>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            dispatcher,
            orders,
            methods,
            currency,
            confirmations,
            clock,
        }
    }

    pub fn methods(&self) -> &PaymentMethods {
        &self.methods
    }

    /// Record a payment. Negative amounts are refunds.
    pub fn enter_payment(
        &self,
        order_id: OrderId,
        method: &str,
        amount: Money,
        comment: Option<String>,
        received_by: UserId,
    ) -> Result<Payment, ServiceError> {
        self.orders.load(order_id)?;
        let label = self.methods.get(method)?.label.clone();

        let dispatched = self.dispatch(
            order_id,
            PaymentLedgerCommand::EnterPayment(EnterPayment {
                order_id,
                method: method.to_string(),
                amount,
                comment,
                received_by,
                occurred_at: self.clock.now(),
            }),
        )?;
        let payment = dispatched
            .decided
            .iter()
            .find_map(|e| match e {
                PaymentLedgerEvent::PaymentEntered(e) => Some(e.payment.clone()),
                _ => None,
            })
            .ok_or_else(|| PaymentError::Invariant("no payment entered".to_string()))?;

        tracing::info!(
            %order_id,
            payment_id = %payment.id,
            "{}",
            messages::entered_log(&label, payment.amount, &self.currency)
        );
        Ok(payment)
    }

    /// Payments in the order they were entered.
    pub fn list_payments(&self, order_id: OrderId) -> Result<Vec<Payment>, ServiceError> {
        self.orders.load(order_id)?;
        Ok(self.ledger(order_id)?.payments().cloned().collect())
    }

    /// Order total minus everything received so far.
    pub fn balance(&self, order_id: OrderId) -> Result<Money, ServiceError> {
        let order = self.orders.load(order_id)?;
        Ok(self.ledger(order_id)?.balance(order.total())?)
    }

    pub fn request_delete(&self, order_id: OrderId, payment_id: PaymentId) -> Result<DeleteConfirmation, ServiceError> {
        self.orders.load(order_id)?;
        if self.ledger(order_id)?.payment(payment_id).is_none() {
            return Err(PaymentError::PaymentNotFound(payment_id).into());
        }

        let token = self.confirmations.issue(order_id, payment_id, self.clock.now())?;
        tracing::debug!(%order_id, %payment_id, token = %token.id, "payment delete requested");
        Ok(DeleteConfirmation {
            token,
            question: messages::DELETE_QUESTION.to_string(),
            description: None,
        })
    }

    pub fn confirm_delete(&self, token: Uuid) -> Result<DeletedPayment, ServiceError> {
        let (order_id, payment_id) = self.confirmations.take(token, self.clock.now()).inspect_err(|e| {
            tracing::warn!(%token, error = %e, "payment delete confirmation rejected");
        })?;

        let dispatched = self.dispatch(
            order_id,
            PaymentLedgerCommand::DeletePayment(DeletePayment {
                order_id,
                payment_id,
                occurred_at: self.clock.now(),
            }),
        )?;
        let payment = dispatched
            .decided
            .first()
            .map(|e| e.payment().clone())
            .ok_or_else(|| PaymentError::Invariant("no payment deleted".to_string()))?;

        tracing::info!(
            %order_id,
            %payment_id,
            "{}",
            messages::deleted_log(self.methods.label(&payment.method), payment.amount, &self.currency)
        );
        Ok(DeletedPayment {
            order_id,
            payment,
            message: messages::PAYMENT_DELETED,
        })
    }

    pub fn cancel_delete(&self, token: Uuid) -> Result<(), ServiceError> {
        self.confirmations.cancel(token).inspect_err(|e| {
            tracing::warn!(%token, error = %e, "payment delete cancellation rejected");
        })?;
        Ok(())
    }

    fn ledger(&self, order_id: OrderId) -> Result<PaymentLedger, ServiceError> {
        Ok(self
            .dispatcher
            .load(order_id.0, streams::PAYMENT_LEDGER, |id| PaymentLedger::empty(OrderId::new(id)))?)
    }

    fn dispatch(
        &self,
        order_id: OrderId,
        command: PaymentLedgerCommand,
    ) -> Result<Dispatched<PaymentLedger>, ServiceError> {
        Ok(self.dispatcher.dispatch(order_id.0, streams::PAYMENT_LEDGER, &command, |id| {
            PaymentLedger::empty(OrderId::new(id))
        })?)
    }
}
