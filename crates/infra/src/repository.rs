//! Order persistence seen from the services: load an order by id, create one.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use thiserror::Error;

use storefront_core::DomainError;
use storefront_events::{EventBus, EventEnvelope};
use storefront_orders::{Address, ChangeBillingAddress, CreateOrder, Order, OrderCommand, OrderId};

use crate::command_dispatcher::{CommandDispatcher, DispatchError};
use crate::event_store::EventStore;
use crate::streams;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("order {0} was modified concurrently")]
    Conflict(OrderId),

    #[error(transparent)]
    Rejected(DomainError),

    #[error("order storage failure: {0}")]
    Storage(String),
}

impl RepositoryError {
    fn from_dispatch(order_id: OrderId, err: DispatchError<DomainError>) -> Self {
        match err {
            DispatchError::Rejected(e) => RepositoryError::Rejected(e),
            DispatchError::Concurrency(_) => RepositoryError::Conflict(order_id),
            other => RepositoryError::Storage(other.to_string()),
        }
    }
}

pub trait OrderRepository: Send + Sync {
    /// Current state of an existing order.
    fn load(&self, order_id: OrderId) -> Result<Order, RepositoryError>;

    fn create(&self, command: CreateOrder) -> Result<Order, RepositoryError>;

    fn change_billing_address(
        &self,
        order_id: OrderId,
        address: Address,
        occurred_at: DateTime<Utc>,
    ) -> Result<Order, RepositoryError>;
}

/// `OrderRepository` over the `orders.order` event stream.
#[derive(Debug)]
pub struct EventSourcedOrderRepository<S, B> {
    dispatcher: Arc<CommandDispatcher<S, B>>,
}

impl<S, B> EventSourcedOrderRepository<S, B> {
    pub fn new(dispatcher: Arc<CommandDispatcher<S, B>>) -> Self {
        Self { dispatcher }
    }
}

impl<S, B> EventSourcedOrderRepository<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn dispatch(&self, order_id: OrderId, command: OrderCommand) -> Result<Order, RepositoryError> {
        self.dispatcher
            .dispatch(order_id.0, streams::ORDER, &command, |id| Order::empty(OrderId::new(id)))
            .map(|d| d.aggregate)
            .map_err(|e| RepositoryError::from_dispatch(order_id, e))
    }
}

impl<S, B> OrderRepository for EventSourcedOrderRepository<S, B>
where
    S: EventStore + Send + Sync,
    B: EventBus<EventEnvelope<JsonValue>> + Send + Sync,
{
    fn load(&self, order_id: OrderId) -> Result<Order, RepositoryError> {
        let order = self
            .dispatcher
            .load(order_id.0, streams::ORDER, |id| Order::empty(OrderId::new(id)))
            .map_err(|e| RepositoryError::from_dispatch(order_id, e))?;
        if !order.exists() {
            return Err(RepositoryError::NotFound(order_id));
        }
        Ok(order)
    }

    fn create(&self, command: CreateOrder) -> Result<Order, RepositoryError> {
        let order_id = command.order_id;
        let order = self.dispatch(order_id, OrderCommand::CreateOrder(command))?;
        tracing::info!(%order_id, lines = order.lines().len(), "order created");
        Ok(order)
    }

    fn change_billing_address(
        &self,
        order_id: OrderId,
        address: Address,
        occurred_at: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        self.load(order_id)?;
        self.dispatch(
            order_id,
            OrderCommand::ChangeBillingAddress(ChangeBillingAddress {
                order_id,
                address,
                occurred_at,
            }),
        )
    }
}
