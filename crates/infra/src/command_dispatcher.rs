//! Command execution pipeline for event-sourced aggregates.
//!
//! ```text
//! Command
//!   ↓
//! 1. Load the (aggregate_type, aggregate_id) stream
//!   ↓
//! 2. Rehydrate the aggregate
//!   ↓
//! 3. Handle the command (pure decision, produces events)
//!   ↓
//! 4. Append with ExpectedVersion::Exact(loaded version)
//!   ↓
//! 5. Publish the committed events
//! ```
//!
//! A lost race between two writers of the same stream fails step 4 with
//! `DispatchError::Concurrency`; nothing is published in that case.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use storefront_core::{Aggregate, AggregateId, AggregateRoot, ExpectedVersion};
use storefront_events::{EventBus, EventEnvelope};

use crate::event_store::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

/// Dispatch failure. `E` is the aggregate's own rejection type, passed through
/// untouched so callers can match on it.
#[derive(Debug, Error)]
pub enum DispatchError<E> {
    /// The aggregate refused the command.
    #[error("{0}")]
    Rejected(E),

    /// Another writer appended to the stream first.
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    /// The loaded stream is malformed (wrong stream, bad sequence numbers).
    #[error("corrupt event stream: {0}")]
    CorruptStream(String),

    #[error("failed to deserialize stored event: {0}")]
    Deserialize(String),

    #[error("event store failure: {0}")]
    Store(EventStoreError),

    /// Publication failed after a successful append (at-least-once; a retry may
    /// deliver duplicates).
    #[error("event publication failed: {0}")]
    Publish(String),
}

impl<E> From<EventStoreError> for DispatchError<E> {
    fn from(value: EventStoreError) -> Self {
        match value {
            EventStoreError::Concurrency(msg) => DispatchError::Concurrency(msg),
            other => DispatchError::Store(other),
        }
    }
}

/// Outcome of a successful dispatch: the aggregate after the new events, the events
/// it decided, and the same events as stored.
#[derive(Debug)]
pub struct Dispatched<A: Aggregate> {
    pub aggregate: A,
    pub decided: Vec<A::Event>,
    pub events: Vec<StoredEvent>,
}

#[derive(Debug)]
pub struct CommandDispatcher<S, B> {
    store: S,
    bus: B,
}

impl<S, B> CommandDispatcher<S, B> {
    pub fn new(store: S, bus: B) -> Self {
        Self { store, bus }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }
}

impl<S, B> CommandDispatcher<S, B>
where
    S: EventStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    /// Rehydrate an aggregate without handling a command.
    pub fn load<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<A, DispatchError<A::Error>>
    where
        A: Aggregate,
        A::Event: DeserializeOwned,
    {
        let history = self.store.load_stream(aggregate_type, aggregate_id)?;
        validate_loaded_stream(aggregate_type, aggregate_id, &history)?;

        let mut aggregate = make_aggregate(aggregate_id);
        apply_history::<A>(&mut aggregate, &history)?;
        Ok(aggregate)
    }

    /// Run `command` against the current state of the stream and persist the result.
    ///
    /// A command that decides no events succeeds without touching the store.
    pub fn dispatch<A>(
        &self,
        aggregate_id: AggregateId,
        aggregate_type: &str,
        command: &A::Command,
        make_aggregate: impl FnOnce(AggregateId) -> A,
    ) -> Result<Dispatched<A>, DispatchError<A::Error>>
    where
        A: Aggregate,
        A::Event: storefront_events::Event + Serialize + DeserializeOwned,
    {
        let mut aggregate = self.load(aggregate_id, aggregate_type, make_aggregate)?;
        let expected = ExpectedVersion::Exact(aggregate.version());

        let decided = aggregate.handle(command).map_err(DispatchError::Rejected)?;
        if decided.is_empty() {
            return Ok(Dispatched {
                aggregate,
                decided,
                events: vec![],
            });
        }

        let uncommitted = decided
            .iter()
            .map(|ev| UncommittedEvent::from_typed(aggregate_id, aggregate_type, Uuid::now_v7(), ev))
            .collect::<Result<Vec<_>, _>>()?;

        let committed = self.store.append(uncommitted, expected)?;

        for ev in &decided {
            aggregate.apply(ev);
        }

        for stored in &committed {
            self.bus
                .publish(stored.to_envelope())
                .map_err(|e| DispatchError::Publish(format!("{e:?}")))?;
        }

        tracing::debug!(
            aggregate_type,
            %aggregate_id,
            events = committed.len(),
            version = aggregate.version(),
            "command dispatched"
        );

        Ok(Dispatched {
            aggregate,
            decided,
            events: committed,
        })
    }
}

fn validate_loaded_stream<E>(
    aggregate_type: &str,
    aggregate_id: AggregateId,
    stream: &[StoredEvent],
) -> Result<(), DispatchError<E>> {
    // A buggy backend must not leak another stream's events into this aggregate.
    let mut last = 0u64;
    for (idx, e) in stream.iter().enumerate() {
        if e.aggregate_id != aggregate_id || e.aggregate_type != aggregate_type {
            return Err(DispatchError::CorruptStream(format!(
                "loaded stream contains a foreign event at index {idx}"
            )));
        }
        if e.sequence_number != last + 1 {
            return Err(DispatchError::CorruptStream(format!(
                "expected sequence_number {} at index {idx}, found {}",
                last + 1,
                e.sequence_number
            )));
        }
        last = e.sequence_number;
    }
    Ok(())
}

fn apply_history<A>(aggregate: &mut A, history: &[StoredEvent]) -> Result<(), DispatchError<A::Error>>
where
    A: Aggregate,
    A::Event: DeserializeOwned,
{
    for stored in history {
        let ev: A::Event = serde_json::from_value(stored.payload.clone())
            .map_err(|e| DispatchError::Deserialize(e.to_string()))?;
        aggregate.apply(&ev);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use storefront_core::{DomainError, LineItemId, Money};
    use storefront_events::InMemoryEventBus;
    use storefront_orders::{CreateOrder, NewLineItem, Order, OrderCommand, OrderId};

    use crate::event_store::InMemoryEventStore;

    type Bus = Arc<InMemoryEventBus<EventEnvelope<JsonValue>>>;

    fn dispatcher() -> (CommandDispatcher<InMemoryEventStore, Bus>, Bus) {
        let bus: Bus = Arc::new(InMemoryEventBus::new());
        (CommandDispatcher::new(InMemoryEventStore::new(), bus.clone()), bus)
    }

    fn create(order_id: OrderId) -> OrderCommand {
        OrderCommand::CreateOrder(CreateOrder {
            order_id,
            primary_email: "customer@example.com".to_string(),
            billing_address: None,
            payment_method: None,
            lines: vec![NewLineItem::shippable("SKU-1", "Product 1", 2, Money::from_minor_units(500))],
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn dispatch_persists_publishes_and_returns_new_state() {
        let (dispatcher, bus) = dispatcher();
        let sub = bus.subscribe();
        let order_id = OrderId::new(AggregateId::new());

        let dispatched = dispatcher
            .dispatch(order_id.0, "orders.order", &create(order_id), |id| Order::empty(OrderId::new(id)))
            .unwrap();

        assert_eq!(dispatched.events.len(), 1);
        assert_eq!(dispatched.aggregate.total(), Money::from_minor_units(1_000));
        assert!(dispatched.aggregate.line(LineItemId::FIRST).is_some());
        assert_eq!(sub.drain().len(), 1);

        let loaded: Order = dispatcher
            .load(order_id.0, "orders.order", |id| Order::empty(OrderId::new(id)))
            .unwrap();
        assert_eq!(loaded.version(), 1);
    }

    #[test]
    fn rejection_is_passed_through_and_nothing_is_published() {
        let (dispatcher, bus) = dispatcher();
        let sub = bus.subscribe();
        let order_id = OrderId::new(AggregateId::new());
        let make = |id| Order::empty(OrderId::new(id));

        dispatcher.dispatch(order_id.0, "orders.order", &create(order_id), make).unwrap();
        let err = dispatcher
            .dispatch(order_id.0, "orders.order", &create(order_id), make)
            .unwrap_err();

        match err {
            DispatchError::Rejected(DomainError::Conflict(_)) => {}
            other => panic!("Expected a conflict rejection, got {other:?}"),
        }
        assert_eq!(sub.drain().len(), 1);
    }

    #[test]
    fn stale_writer_loses_with_concurrency_error() {
        let store = Arc::new(InMemoryEventStore::new());
        let order_id = OrderId::new(AggregateId::new());
        let first = UncommittedEvent {
            event_id: Uuid::now_v7(),
            aggregate_id: order_id.0,
            aggregate_type: "orders.order".to_string(),
            event_type: "x".to_string(),
            event_version: 1,
            occurred_at: Utc::now(),
            payload: serde_json::json!({}),
        };
        store.append(vec![first.clone()], ExpectedVersion::Exact(0)).unwrap();

        let err = store.append(vec![first], ExpectedVersion::Exact(0)).unwrap_err();
        let mapped: DispatchError<DomainError> = err.into();
        assert!(matches!(mapped, DispatchError::Concurrency(_)));
    }
}
