//! Run configuration shared by the runner, the generator and the CLI.

use causal_core::{ClockKind, SesMergePolicy};
use serde::{Deserialize, Serialize};

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Master seed for generated traces
    pub seed: u64,

    /// Number of processes for generated traces
    pub process_count: usize,

    /// Clock algorithm driving the engine
    pub clock: ClockKind,

    /// When SES clocks absorb piggybacked history
    pub ses_policy: SesMergePolicy,

    /// Send and broadcast events in a generated trace
    pub events: usize,

    /// Probability that a generated send is a broadcast
    pub broadcast_ratio: f64,

    /// Probability of a receive whenever one is possible
    pub receive_bias: f64,

    /// Receive everything still in flight at the end of a generated trace
    pub drain: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            process_count: 3,
            clock: ClockKind::Vector,
            ses_policy: SesMergePolicy::default(),
            events: 20,
            broadcast_ratio: 1.0,
            receive_bias: 0.5,
            drain: true,
        }
    }
}

impl SimConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_processes(mut self, process_count: usize) -> Self {
        self.process_count = process_count;
        self
    }

    pub fn with_clock(mut self, clock: ClockKind) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_ses_policy(mut self, policy: SesMergePolicy) -> Self {
        self.ses_policy = policy;
        self
    }

    pub fn with_events(mut self, events: usize) -> Self {
        self.events = events;
        self
    }

    /// Sets the broadcast probability, clamped to `[0, 1]`.
    pub fn with_broadcast_ratio(mut self, ratio: f64) -> Self {
        self.broadcast_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// Sets the receive probability, clamped to `[0, 1]`.
    pub fn with_receive_bias(mut self, bias: f64) -> Self {
        self.receive_bias = bias.clamp(0.0, 1.0);
        self
    }

    pub fn with_drain(mut self, drain: bool) -> Self {
        self.drain = drain;
        self
    }
}
