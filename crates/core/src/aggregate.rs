//! Aggregates: versioned domain state changed only through events.

use crate::error::{DomainError, DomainResult};

/// Identity and version of a consistency boundary (one product's inventory,
/// for example).
pub trait AggregateRoot {
    /// Key the aggregate is loaded and stored by.
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;

    /// Number of events applied so far. Persisted with the state and
    /// compared on write.
    fn version(&self) -> u64;
}

/// Version a write was decided against. A store rejects the write if its
/// stored version has moved on.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExpectedVersion(pub u64);

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        self.0 == actual
    }

    pub fn check(self, actual: u64) -> DomainResult<()> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(DomainError::conflict(format!(
                "stale write: decided against version {}, stored version is {actual}",
                self.0
            )))
        }
    }
}

/// Command handling split into a pure decision and a state fold.
///
/// `handle` validates a command against current state and returns the events
/// it produces; `apply` folds one event into state. Neither does IO, so a
/// service can decide, persist the events' effects, and only then apply.
pub trait Aggregate: AggregateRoot {
    type Command: Clone + core::fmt::Debug;
    type Event: Clone + core::fmt::Debug;
    type Error: core::fmt::Debug;

    fn apply(&mut self, event: &Self::Event);

    /// Must leave `self` untouched; an `Err` means nothing happened.
    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;
}
