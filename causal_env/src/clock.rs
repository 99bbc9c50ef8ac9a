//! The clock capability contract shared by every causal delivery algorithm.

use crate::types::ProcessId;
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// A logical clock that can drive causal delivery.
///
/// Each process owns exactly one clock. The delivery engine only talks to a
/// clock through this trait, so vector, matrix and SES clocks all share the
/// same buffering and cascade logic.
///
/// # Lifecycle
///
/// ```text
/// sender                          receiver
///   increment()
///   snapshot() ── Timestamp ──►   is_deliverable(ts, sender)?
///                                   ├─ yes: merge(ts, sender)
///                                   └─ no:  examine(ts, sender), buffer
/// ```
pub trait CausalClock: Clone + Debug {
    /// Immutable copy of the clock carried inside a message.
    type Timestamp: Clone + Debug + PartialEq + Serialize + DeserializeOwned;

    /// Returns the process that owns this clock.
    fn owner(&self) -> ProcessId;

    /// Returns the number of processes the clock tracks.
    fn process_count(&self) -> usize;

    /// Advances the owner's own progress by exactly one.
    ///
    /// Called only when the owner sends.
    fn increment(&mut self);

    /// Produces a snapshot that does not alias the live clock.
    fn snapshot(&self) -> Self::Timestamp;

    /// Causal-readiness test for a message from `sender` stamped `remote`.
    fn is_deliverable(&self, remote: &Self::Timestamp, sender: ProcessId) -> bool;

    /// Absorbs remote knowledge at delivery time.
    ///
    /// Only called after [`is_deliverable`](Self::is_deliverable) returned true.
    fn merge(&mut self, remote: &Self::Timestamp, sender: ProcessId);

    /// Absorbs whatever a clock may learn from a message it cannot deliver yet.
    ///
    /// Called on arrival of a message that gets buffered and on every later
    /// re-check of a buffered message. Must never change the outcome of
    /// `is_deliverable`.
    fn examine(&mut self, _remote: &Self::Timestamp, _sender: ProcessId) {}

    /// Returns the clock to its initial all-zero state, keeping configuration.
    fn reset(&mut self);

    /// The owner's own component: how many sends it has issued.
    fn own_progress(&self) -> u64;

    /// Every component of the clock in a fixed order, for monotonicity checks.
    fn components(&self) -> Vec<u64>;

    /// The sender's vector clock as carried by `timestamp`.
    ///
    /// Used to compare messages by causal precedence.
    fn causal_vector(timestamp: &Self::Timestamp) -> Vec<u64>
    where
        Self: Sized;
}

/// Returns true if `a` causally precedes `b`: `a <= b` componentwise and `a != b`.
pub fn happened_before(a: &[u64], b: &[u64]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x <= y) && a != b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happened_before() {
        assert!(happened_before(&[1, 0, 0], &[1, 1, 0]));
        assert!(!happened_before(&[1, 1, 0], &[1, 1, 0]));
        assert!(!happened_before(&[1, 0, 0], &[0, 1, 0]));
        assert!(!happened_before(&[0, 1, 0], &[1, 0, 0]));
    }
}
