use std::collections::HashMap;
use std::sync::RwLock;

use storefront_core::{AggregateId, ExpectedVersion};

use super::r#trait::{EventStore, EventStoreError, StoredEvent, UncommittedEvent};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct StreamKey {
    aggregate_type: String,
    aggregate_id: AggregateId,
}

/// In-memory append-only event store for tests and single-process use.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<StreamKey, Vec<StoredEvent>>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn current_version(stream: &[StoredEvent]) -> u64 {
        stream.last().map(|e| e.sequence_number).unwrap_or(0)
    }

    /// Every stored event across all streams, ordered by stream then sequence number.
    /// Used to rebuild read models.
    pub fn all_events(&self) -> Result<Vec<StoredEvent>, EventStoreError> {
        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        let mut keys: Vec<&StreamKey> = streams.keys().collect();
        keys.sort_by(|a, b| (a.aggregate_id, &a.aggregate_type).cmp(&(b.aggregate_id, &b.aggregate_type)));
        Ok(keys
            .into_iter()
            .filter_map(|k| streams.get(k))
            .flat_map(|s| s.iter().cloned())
            .collect())
    }
}

impl EventStore for InMemoryEventStore {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let Some(first) = events.first() else {
            return Ok(vec![]);
        };

        // All events must target the same stream.
        let key = StreamKey {
            aggregate_type: first.aggregate_type.clone(),
            aggregate_id: first.aggregate_id,
        };
        for (idx, e) in events.iter().enumerate() {
            if e.aggregate_id != key.aggregate_id || e.aggregate_type != key.aggregate_type {
                return Err(EventStoreError::InvalidAppend(format!(
                    "batch mixes streams (index {idx})"
                )));
            }
        }

        let mut streams = self
            .streams
            .write()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        let stream = streams.entry(key).or_default();
        let current = Self::current_version(stream);

        if !expected_version.matches(current) {
            return Err(EventStoreError::Concurrency(format!(
                "expected {expected_version:?}, found {current}"
            )));
        }

        let mut next = current + 1;
        let mut committed = Vec::with_capacity(events.len());
        for e in events {
            let stored = StoredEvent {
                event_id: e.event_id,
                aggregate_id: e.aggregate_id,
                aggregate_type: e.aggregate_type,
                sequence_number: next,
                event_type: e.event_type,
                event_version: e.event_version,
                occurred_at: e.occurred_at,
                payload: e.payload,
            };
            next += 1;
            stream.push(stored.clone());
            committed.push(stored);
        }

        Ok(committed)
    }

    fn load_stream(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        let key = StreamKey {
            aggregate_type: aggregate_type.to_string(),
            aggregate_id,
        };

        let streams = self
            .streams
            .read()
            .map_err(|_| EventStoreError::Unavailable("lock poisoned".to_string()))?;

        Ok(streams.get(&key).cloned().unwrap_or_default())
    }
}
