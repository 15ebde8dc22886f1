//! Projections (read model builders).
//!
//! Projections are rebuildable from the event store and idempotent under at-least-once
//! delivery; `ProjectionRunner` in front of them drops duplicates per stream.

pub mod order_log;

pub use order_log::{OrderLog, OrderLogEntry, OrderLogProjection};
