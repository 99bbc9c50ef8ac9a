//! Seeded random trace generation.
//!
//! Every trace is derived from a single `u64` seed, so a failing property test
//! or CLI run can be reproduced from the seed alone.

use crate::config::SimConfig;
use crate::trace::{EventTrace, TraceEvent};
use causal_env::{CausalError, PayloadTag, ProcessId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::{BTreeMap, VecDeque};

/// Produces valid traces: sends and broadcasts interleaved with FIFO receives.
#[derive(Debug, Clone)]
pub struct TraceGenerator {
    seed: u64,
    process_count: usize,
    events: usize,
    broadcast_ratio: f64,
    receive_bias: f64,
    drain: bool,
}

impl TraceGenerator {
    /// Creates a generator with the default knobs for `process_count` processes.
    pub fn new(seed: u64, process_count: usize) -> Self {
        Self::from_config(&SimConfig::default().with_seed(seed).with_processes(process_count))
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self {
            seed: config.seed,
            process_count: config.process_count,
            events: config.events,
            broadcast_ratio: config.broadcast_ratio.clamp(0.0, 1.0),
            receive_bias: config.receive_bias.clamp(0.0, 1.0),
            drain: config.drain,
        }
    }

    /// Sets the number of send and broadcast events.
    pub fn with_events(mut self, events: usize) -> Self {
        self.events = events;
        self
    }

    pub fn with_broadcast_ratio(mut self, ratio: f64) -> Self {
        self.broadcast_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn with_receive_bias(mut self, bias: f64) -> Self {
        self.receive_bias = bias.clamp(0.0, 1.0);
        self
    }

    pub fn with_drain(mut self, drain: bool) -> Self {
        self.drain = drain;
        self
    }

    /// Generates and validates a trace.
    ///
    /// Needs at least two processes so that every send has a receiver.
    pub fn generate(&self) -> Result<EventTrace, CausalError> {
        let n = self.process_count;
        if n < 2 {
            return Err(CausalError::InvalidProcessCount(n));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        // BTreeMap keeps channel iteration order independent of hashing
        let mut channels: BTreeMap<(ProcessId, ProcessId), VecDeque<PayloadTag>> = BTreeMap::new();
        let mut events = Vec::new();
        let mut sends = 0;

        while sends < self.events {
            let pending = pending_channels(&channels);
            if !pending.is_empty() && rng.gen_bool(self.receive_bias) {
                let channel = pending[rng.gen_range(0..pending.len())];
                events.extend(take(&mut channels, channel));
                continue;
            }

            let from = ProcessId(rng.gen_range(0..n));
            let payload = PayloadTag::new(format!("m{}", sends));
            if rng.gen_bool(self.broadcast_ratio) {
                for to in ProcessId::all(n).filter(|&to| to != from) {
                    channels.entry((from, to)).or_default().push_back(payload.clone());
                }
                events.push(TraceEvent::Broadcast { from, payload });
            } else {
                let to = ProcessId((from.index() + 1 + rng.gen_range(0..n - 1)) % n);
                channels.entry((from, to)).or_default().push_back(payload.clone());
                events.push(TraceEvent::Send { from, to, payload });
            }
            sends += 1;
        }

        if self.drain {
            loop {
                let pending = pending_channels(&channels);
                if pending.is_empty() {
                    break;
                }
                let channel = pending[rng.gen_range(0..pending.len())];
                events.extend(take(&mut channels, channel));
            }
        }

        EventTrace::load(n, events)
    }
}

fn pending_channels(
    channels: &BTreeMap<(ProcessId, ProcessId), VecDeque<PayloadTag>>,
) -> Vec<(ProcessId, ProcessId)> {
    channels
        .iter()
        .filter(|(_, queue)| !queue.is_empty())
        .map(|(&channel, _)| channel)
        .collect()
}

/// Pops the oldest message on a non-empty channel as a Receive event.
fn take(
    channels: &mut BTreeMap<(ProcessId, ProcessId), VecDeque<PayloadTag>>,
    (from, to): (ProcessId, ProcessId),
) -> Option<TraceEvent> {
    let payload = channels.get_mut(&(from, to))?.pop_front()?;
    Some(TraceEvent::Receive { from, to, payload })
}
