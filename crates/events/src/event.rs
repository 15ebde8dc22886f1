use chrono::{DateTime, Utc};

/// A fact recorded by an aggregate.
///
/// Events are immutable, versioned and append-only. `event_type` is the stable name
/// stored next to the JSON payload (e.g. "fulfillment.package.created").
pub trait Event: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn event_type(&self) -> &'static str;

    /// Schema version of this event type.
    fn version(&self) -> u32;

    /// Business time.
    fn occurred_at(&self) -> DateTime<Utc>;
}
