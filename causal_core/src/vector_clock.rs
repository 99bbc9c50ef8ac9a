//! Vector clock for Birman–Schiper–Stephenson causal broadcast.
//!
//! Each process keeps one counter per process. A message from `j` is
//! deliverable exactly when it is the next unseen message from `j` and it
//! depends on nothing the receiver has not already delivered from anyone else.

use causal_env::{CausalClock, ProcessId};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// Immutable vector snapshot carried by a message.
///
/// Serialized as a plain JSON array (`[1, 0, 0]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<u64>", from = "Vec<u64>")]
pub struct VectorTimestamp(DVector<u64>);

impl VectorTimestamp {
    /// Builds a timestamp from explicit components.
    pub fn from_slice(components: &[u64]) -> Self {
        Self(DVector::from_vec(components.to_vec()))
    }

    /// Returns the component for `process`.
    pub fn get(&self, process: ProcessId) -> u64 {
        self.0[process.index()]
    }

    /// Number of components.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Components in process order.
    pub fn as_slice(&self) -> &[u64] {
        self.0.as_slice()
    }

    pub(crate) fn entries(&self) -> &DVector<u64> {
        &self.0
    }
}

impl From<VectorTimestamp> for Vec<u64> {
    fn from(ts: VectorTimestamp) -> Self {
        ts.0.iter().copied().collect()
    }
}

impl From<Vec<u64>> for VectorTimestamp {
    fn from(components: Vec<u64>) -> Self {
        Self(DVector::from_vec(components))
    }
}

impl std::fmt::Display for VectorTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_components(f, self.0.iter())
    }
}

/// BSS vector clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorClock {
    owner: ProcessId,
    entries: DVector<u64>,
}

impl VectorClock {
    /// Creates an all-zero clock for `owner` in a system of `process_count` processes.
    pub fn new(owner: ProcessId, process_count: usize) -> Self {
        assert!(owner.in_range(process_count), "{} outside {} processes", owner, process_count);
        Self {
            owner,
            entries: DVector::zeros(process_count),
        }
    }

    /// Returns the component for `process`.
    pub fn get(&self, process: ProcessId) -> u64 {
        self.entries[process.index()]
    }

    /// Components in process order.
    pub fn as_slice(&self) -> &[u64] {
        self.entries.as_slice()
    }
}

impl CausalClock for VectorClock {
    type Timestamp = VectorTimestamp;

    fn owner(&self) -> ProcessId {
        self.owner
    }

    fn process_count(&self) -> usize {
        self.entries.len()
    }

    fn increment(&mut self) {
        self.entries[self.owner.index()] += 1;
    }

    fn snapshot(&self) -> VectorTimestamp {
        VectorTimestamp(self.entries.clone())
    }

    fn is_deliverable(&self, remote: &VectorTimestamp, sender: ProcessId) -> bool {
        causally_ready(remote.entries().iter(), self.entries.iter(), sender.index())
    }

    fn merge(&mut self, remote: &VectorTimestamp, sender: ProcessId) {
        let j = sender.index();
        for (k, local) in self.entries.iter_mut().enumerate() {
            let theirs = remote.entries()[k];
            if k == j {
                *local = theirs;
            } else {
                *local = (*local).max(theirs);
            }
        }
    }

    fn reset(&mut self) {
        self.entries.fill(0);
    }

    fn own_progress(&self) -> u64 {
        self.entries[self.owner.index()]
    }

    fn components(&self) -> Vec<u64> {
        self.entries.iter().copied().collect()
    }

    fn causal_vector(timestamp: &VectorTimestamp) -> Vec<u64> {
        timestamp.as_slice().to_vec()
    }
}

impl std::fmt::Display for VectorClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_components(f, self.entries.iter())
    }
}

/// The BSS readiness test, shared by every clock that compares vectors.
///
/// `remote[sender]` must be exactly one past `local[sender]`, and every other
/// remote component must already be covered locally.
pub(crate) fn causally_ready<'a>(
    remote: impl IntoIterator<Item = &'a u64>,
    local: impl IntoIterator<Item = &'a u64>,
    sender: usize,
) -> bool {
    remote
        .into_iter()
        .zip(local)
        .enumerate()
        .all(|(k, (&theirs, &ours))| {
            if k == sender {
                theirs == ours + 1
            } else {
                theirs <= ours
            }
        })
}

/// Elementwise maximum, in place.
pub(crate) fn absorb(local: &mut DVector<u64>, remote: &DVector<u64>) {
    *local = local.zip_map(remote, |a, b| a.max(b));
}

pub(crate) fn write_components<'a>(
    f: &mut std::fmt::Formatter<'_>,
    components: impl Iterator<Item = &'a u64>,
) -> std::fmt::Result {
    f.write_str("[")?;
    for (i, value) in components.enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", value)?;
    }
    f.write_str("]")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(i: usize) -> ProcessId {
        ProcessId(i)
    }

    #[test]
    fn test_increment_only_touches_own_component() {
        let mut clock = VectorClock::new(p(0), 3);
        clock.increment();
        assert_eq!(clock.as_slice(), &[1, 0, 0]);
        assert_eq!(clock.own_progress(), 1);
    }

    #[test]
    fn test_snapshot_does_not_alias() {
        let mut clock = VectorClock::new(p(0), 3);
        clock.increment();
        let ts = clock.snapshot();
        clock.increment();
        assert_eq!(ts.as_slice(), &[1, 0, 0]);
        assert_eq!(clock.as_slice(), &[2, 0, 0]);
    }

    #[test]
    fn test_independent_message_is_deliverable() {
        // P2's first message carries no dependency on P1.
        let receiver = VectorClock::new(p(2), 3);
        let ts = VectorTimestamp::from_slice(&[0, 1, 0]);
        assert!(receiver.is_deliverable(&ts, p(1)));
    }

    #[test]
    fn test_dependency_blocks_delivery() {
        let receiver = VectorClock::new(p(2), 3);
        let ts = VectorTimestamp::from_slice(&[1, 1, 0]);
        assert!(!receiver.is_deliverable(&ts, p(1)));
    }

    #[test]
    fn test_gap_from_sender_blocks_delivery() {
        let receiver = VectorClock::new(p(1), 3);
        let second = VectorTimestamp::from_slice(&[2, 0, 0]);
        assert!(!receiver.is_deliverable(&second, p(0)));
    }

    #[test]
    fn test_merge_takes_sender_component_and_max_elsewhere() {
        let mut receiver = VectorClock::new(p(2), 3);
        let first = VectorTimestamp::from_slice(&[1, 0, 0]);
        receiver.merge(&first, p(0));
        assert_eq!(receiver.as_slice(), &[1, 0, 0]);

        let second = VectorTimestamp::from_slice(&[1, 1, 0]);
        assert!(receiver.is_deliverable(&second, p(1)));
        receiver.merge(&second, p(1));
        assert_eq!(receiver.as_slice(), &[1, 1, 0]);
    }

    #[test]
    fn test_reset_zeroes_every_component() {
        let mut clock = VectorClock::new(p(1), 3);
        clock.increment();
        clock.merge(&VectorTimestamp::from_slice(&[1, 0, 0]), p(0));
        clock.reset();
        assert_eq!(clock.as_slice(), &[0, 0, 0]);
        assert_eq!(clock.owner(), p(1));
    }

    #[test]
    fn test_timestamp_serializes_as_array() {
        let ts = VectorTimestamp::from_slice(&[1, 1, 0]);
        assert_eq!(serde_json::to_string(&ts).unwrap(), "[1,1,0]");
        let back: VectorTimestamp = serde_json::from_str("[1,1,0]").unwrap();
        assert_eq!(back, ts);
        assert_eq!(ts.to_string(), "[1, 1, 0]");
    }
}
