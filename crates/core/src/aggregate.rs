//! Aggregate traits for the event-sourced domain models.

use crate::error::{DomainError, DomainResult};

/// Aggregate root: identity + version.
pub trait AggregateRoot {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied so far (the stream revision).
    fn version(&self) -> u64;
}

/// Optimistic concurrency expectation for an aggregate stream.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip the check.
    Any,
    /// The stream must be exactly at this revision.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "stale aggregate (expected: {self:?}, actual: {actual})"
            )))
        }
    }
}

/// Decide/evolve split used by every aggregate in the workspace.
///
/// - `handle(&self, cmd)` validates a command against current state and returns the
///   events it produces. It never mutates.
/// - `apply(&mut self, event)` folds one event into state and bumps the version.
///
/// A rejected command therefore leaves the aggregate untouched.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
