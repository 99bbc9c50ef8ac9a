//! Schiper–Eggli–Sandoz style clock: vector delivery test plus full merge.
//!
//! The clock keeps two vectors:
//! - `delivered`: what the owner has actually delivered. This is the vector
//!   that goes through the BSS readiness test.
//! - `horizon`: everything the owner has *heard about*, including the causal
//!   history piggybacked on messages it could not deliver yet.
//!
//! Under [`SesMergePolicy::OnExamine`] a message contributes to the horizon
//! as soon as it is examined, buffered or not. The delivery vector only moves
//! when the message is delivered, so early information never unblocks a
//! message ahead of its causal predecessors.

use crate::vector_clock::{absorb, causally_ready, write_components, VectorTimestamp};
use crate::kind::UnknownVariant;
use causal_env::{CausalClock, ProcessId};
use nalgebra::DVector;
use serde::{Deserialize, Serialize};

/// When a receiver absorbs the causal history carried by a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SesMergePolicy {
    /// Absorb on every examination, including while the message sits in the buffer
    #[default]
    OnExamine,
    /// Absorb only when the message is delivered
    OnDeliver,
}

impl SesMergePolicy {
    /// Returns the policy name used on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            SesMergePolicy::OnExamine => "examine",
            SesMergePolicy::OnDeliver => "deliver",
        }
    }
}

impl std::fmt::Display for SesMergePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for SesMergePolicy {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "examine" | "on_examine" | "on-examine" => Ok(SesMergePolicy::OnExamine),
            "deliver" | "on_deliver" | "on-deliver" => Ok(SesMergePolicy::OnDeliver),
            _ => Err(UnknownVariant::new("SES merge policy", s)),
        }
    }
}

/// Snapshot of an SES clock: the sender's delivery vector and its knowledge horizon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SesTimestamp {
    pub vector: VectorTimestamp,
    pub horizon: VectorTimestamp,
}

impl std::fmt::Display for SesTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (horizon {})", self.vector, self.horizon)
    }
}

/// SES clock owned by one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SesClock {
    owner: ProcessId,
    policy: SesMergePolicy,
    delivered: DVector<u64>,
    horizon: DVector<u64>,
}

impl SesClock {
    /// Creates an all-zero clock with the default merge-on-examine policy.
    pub fn new(owner: ProcessId, process_count: usize) -> Self {
        Self::with_policy(owner, process_count, SesMergePolicy::default())
    }

    /// Creates an all-zero clock with an explicit merge policy.
    pub fn with_policy(owner: ProcessId, process_count: usize, policy: SesMergePolicy) -> Self {
        assert!(owner.in_range(process_count), "{} outside {} processes", owner, process_count);
        Self {
            owner,
            policy,
            delivered: DVector::zeros(process_count),
            horizon: DVector::zeros(process_count),
        }
    }

    pub fn policy(&self) -> SesMergePolicy {
        self.policy
    }

    /// The delivery vector.
    pub fn delivered(&self) -> &[u64] {
        self.delivered.as_slice()
    }

    /// The knowledge horizon.
    pub fn horizon(&self) -> &[u64] {
        self.horizon.as_slice()
    }
}

impl CausalClock for SesClock {
    type Timestamp = SesTimestamp;

    fn owner(&self) -> ProcessId {
        self.owner
    }

    fn process_count(&self) -> usize {
        self.delivered.len()
    }

    fn increment(&mut self) {
        let o = self.owner.index();
        self.delivered[o] += 1;
        self.horizon[o] = self.horizon[o].max(self.delivered[o]);
    }

    fn snapshot(&self) -> SesTimestamp {
        SesTimestamp {
            vector: VectorTimestamp::from(self.delivered.iter().copied().collect::<Vec<_>>()),
            horizon: VectorTimestamp::from(self.horizon.iter().copied().collect::<Vec<_>>()),
        }
    }

    fn is_deliverable(&self, remote: &SesTimestamp, sender: ProcessId) -> bool {
        causally_ready(remote.vector.entries().iter(), self.delivered.iter(), sender.index())
    }

    fn merge(&mut self, remote: &SesTimestamp, _sender: ProcessId) {
        absorb(&mut self.delivered, remote.vector.entries());
        absorb(&mut self.horizon, remote.horizon.entries());
        absorb(&mut self.horizon, &self.delivered);
    }

    fn examine(&mut self, remote: &SesTimestamp, _sender: ProcessId) {
        if self.policy == SesMergePolicy::OnExamine {
            absorb(&mut self.horizon, remote.horizon.entries());
        }
    }

    fn reset(&mut self) {
        self.delivered.fill(0);
        self.horizon.fill(0);
    }

    fn own_progress(&self) -> u64 {
        self.delivered[self.owner.index()]
    }

    fn components(&self) -> Vec<u64> {
        self.delivered.iter().chain(self.horizon.iter()).copied().collect()
    }

    fn causal_vector(timestamp: &SesTimestamp) -> Vec<u64> {
        timestamp.vector.as_slice().to_vec()
    }
}

impl std::fmt::Display for SesClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_components(f, self.delivered.iter())?;
        f.write_str(" (horizon ")?;
        write_components(f, self.horizon.iter())?;
        f.write_str(")")
    }
}
