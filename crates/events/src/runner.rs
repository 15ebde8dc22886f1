//! Projection runner: ordering and de-duplication in front of a `Projection`.

use std::collections::HashMap;

use thiserror::Error;

use storefront_core::AggregateId;

use crate::{EventEnvelope, Projection};

/// Streams are keyed by aggregate type and id: one order owns several streams.
type StreamKey = (String, AggregateId);

/// Last sequence number applied for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionCursor {
    aggregate_type: String,
    aggregate_id: AggregateId,
    last_sequence_number: u64,
}

impl ProjectionCursor {
    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn aggregate_id(&self) -> AggregateId {
        self.aggregate_id
    }

    pub fn last_sequence_number(&self) -> u64 {
        self.last_sequence_number
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProjectionError {
    #[error("sequence numbers start at 1 (stream {aggregate_id})")]
    ZeroSequence { aggregate_id: AggregateId },
    #[error("gap in stream {aggregate_id}: last applied {last}, received {found}")]
    Gap {
        aggregate_id: AggregateId,
        last: u64,
        found: u64,
    },
}

/// Feeds envelopes to a projection, one cursor per stream.
///
/// - an envelope at or below the cursor is a duplicate and is skipped;
/// - an envelope more than one past the cursor is a gap and is rejected.
#[derive(Debug)]
pub struct ProjectionRunner<P>
where
    P: Projection,
{
    projection: P,
    cursors: HashMap<StreamKey, u64>,
}

impl<P> ProjectionRunner<P>
where
    P: Projection,
{
    pub fn new(projection: P) -> Self {
        Self {
            projection,
            cursors: HashMap::new(),
        }
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    pub fn into_projection(self) -> P {
        self.projection
    }

    pub fn cursor(&self, aggregate_type: &str, aggregate_id: AggregateId) -> Option<ProjectionCursor> {
        self.cursors
            .get(&(aggregate_type.to_string(), aggregate_id))
            .map(|&last_sequence_number| ProjectionCursor {
                aggregate_type: aggregate_type.to_string(),
                aggregate_id,
                last_sequence_number,
            })
    }

    /// Apply one envelope. Returns `Ok(false)` when it was a duplicate.
    pub fn apply(&mut self, envelope: &EventEnvelope<P::Ev>) -> Result<bool, ProjectionError> {
        let aggregate_id = envelope.aggregate_id();
        let found = envelope.sequence_number();
        if found == 0 {
            return Err(ProjectionError::ZeroSequence { aggregate_id });
        }

        let key = (envelope.aggregate_type().to_string(), aggregate_id);
        let last = self.cursors.get(&key).copied().unwrap_or(0);
        if found <= last {
            return Ok(false);
        }
        if found != last + 1 {
            return Err(ProjectionError::Gap {
                aggregate_id,
                last,
                found,
            });
        }

        self.projection.apply(envelope);
        self.cursors.insert(key, found);
        Ok(true)
    }

    pub fn run<'a>(
        &mut self,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<(), ProjectionError>
    where
        P::Ev: 'a,
    {
        for env in envelopes {
            self.apply(env)?;
        }
        Ok(())
    }

    /// Fresh projection from `factory`, fed the full history.
    pub fn rebuild_from_scratch<'a>(
        factory: impl FnOnce() -> P,
        envelopes: impl IntoIterator<Item = &'a EventEnvelope<P::Ev>>,
    ) -> Result<Self, ProjectionError>
    where
        P::Ev: 'a,
    {
        let mut runner = ProjectionRunner::new(factory());
        runner.run(envelopes)?;
        Ok(runner)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::Event;

    #[derive(Debug, Clone)]
    struct Ticked(u32);

    impl Event for Ticked {
        fn event_type(&self) -> &'static str {
            "test.ticked"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }

    #[derive(Debug, Default)]
    struct Sum(u32);

    impl Projection for Sum {
        type Ev = Ticked;

        fn apply(&mut self, envelope: &EventEnvelope<Ticked>) {
            self.0 += envelope.payload().0;
        }
    }

    fn env(stream: AggregateId, seq: u64, value: u32) -> EventEnvelope<Ticked> {
        typed_env("test", stream, seq, value)
    }

    fn typed_env(kind: &str, stream: AggregateId, seq: u64, value: u32) -> EventEnvelope<Ticked> {
        EventEnvelope::new(Uuid::now_v7(), stream, kind, seq, Ticked(value))
    }

    #[test]
    fn duplicates_are_skipped() {
        let stream = AggregateId::new();
        let mut runner = ProjectionRunner::new(Sum::default());

        assert!(runner.apply(&env(stream, 1, 5)).unwrap());
        assert!(!runner.apply(&env(stream, 1, 5)).unwrap());

        assert_eq!(runner.projection().0, 5);
        assert_eq!(runner.cursor("test", stream).unwrap().last_sequence_number(), 1);
    }

    #[test]
    fn gaps_are_rejected() {
        let stream = AggregateId::new();
        let mut runner = ProjectionRunner::new(Sum::default());
        runner.apply(&env(stream, 1, 1)).unwrap();

        let err = runner.apply(&env(stream, 3, 1)).unwrap_err();
        assert!(matches!(err, ProjectionError::Gap { last: 1, found: 3, .. }));
    }

    #[test]
    fn streams_are_tracked_independently() {
        let a = AggregateId::new();
        let b = AggregateId::new();
        let history = vec![env(a, 1, 1), env(b, 1, 10), env(a, 2, 2)];

        let runner = ProjectionRunner::rebuild_from_scratch(Sum::default, &history).unwrap();

        assert_eq!(runner.projection().0, 13);
        assert_eq!(runner.cursor("test", b).unwrap().last_sequence_number(), 1);
    }

    #[test]
    fn streams_of_one_aggregate_id_are_told_apart_by_type() {
        let id = AggregateId::new();
        let mut runner = ProjectionRunner::new(Sum::default());

        assert!(runner.apply(&typed_env("order", id, 1, 1)).unwrap());
        assert!(runner.apply(&typed_env("order_packaging", id, 1, 2)).unwrap());

        assert_eq!(runner.projection().0, 3);
    }
}
