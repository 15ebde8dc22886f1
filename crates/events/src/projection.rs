use crate::{Event, EventEnvelope};

/// Builds a read model from envelopes.
///
/// Read models are disposable: drop them and replay the store to rebuild. `apply` must
/// be idempotent because the bus delivers at least once; `ProjectionRunner` filters
/// duplicates by sequence number before calling it.
pub trait Projection {
    type Ev: Event;

    fn apply(&mut self, envelope: &EventEnvelope<Self::Ev>);
}
