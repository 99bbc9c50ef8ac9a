//! Invariant checker - the oracle that judges a replay.
//!
//! After every step the checker compares engine state with the previous step
//! and records every broken invariant:
//! - clock components never decrease
//! - the own component rises by exactly one per send event, zero otherwise
//! - no message is delivered twice
//! - no buffered message is deliverable once a step completes
//! - each channel delivers in send order
//! - a receiver never delivers a message after one of its causal successors

use causal_core::DeliveryEngine;
use causal_env::{
    happened_before, CausalClock, DeliveryNotification, MessageId, NotificationKind, ProcessId,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

/// One broken invariant, tagged with the step that broke it.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum InvariantViolation {
    #[error("step {step}: {process} clock regressed from {before:?} to {after:?}")]
    ClockRegressed {
        step: usize,
        process: ProcessId,
        before: Vec<u64>,
        after: Vec<u64>,
    },

    #[error("step {step}: {process} own component moved by {found}, expected {expected}")]
    OwnProgress {
        step: usize,
        process: ProcessId,
        expected: u64,
        found: i128,
    },

    #[error("step {step}: {message} delivered twice")]
    DuplicateDelivery { step: usize, message: MessageId },

    #[error("step {step}: {message} is deliverable but still buffered at {process}")]
    StuckInBuffer {
        step: usize,
        process: ProcessId,
        message: MessageId,
    },

    #[error("step {step}: {message} overtook an earlier message on {from}->{to}")]
    ChannelReordered {
        step: usize,
        from: ProcessId,
        to: ProcessId,
        message: MessageId,
    },

    #[error("step {step}: {process} delivered {later} before its causal predecessor {earlier}")]
    CausalOrder {
        step: usize,
        process: ProcessId,
        earlier: MessageId,
        later: MessageId,
    },
}

#[derive(Debug, Clone)]
struct SentRecord {
    sender: ProcessId,
    receiver: ProcessId,
    /// Position on its channel
    sequence: u64,
    causal: Vec<u64>,
}

/// Tracks engine state across steps of one replay.
#[derive(Debug, Clone)]
pub struct InvariantChecker {
    components: Vec<Vec<u64>>,
    own_progress: Vec<u64>,
    sent: HashMap<MessageId, SentRecord>,
    channel_sent: HashMap<(ProcessId, ProcessId), u64>,
    channel_delivered: HashMap<(ProcessId, ProcessId), u64>,
    delivered: HashSet<MessageId>,
    /// Per receiver: delivered messages in delivery order
    delivery_log: Vec<Vec<MessageId>>,
    violations: Vec<InvariantViolation>,
}

impl InvariantChecker {
    /// Captures the starting state of `engine`.
    pub fn new<C: CausalClock>(engine: &DeliveryEngine<C>) -> Self {
        let mut checker = Self {
            components: Vec::new(),
            own_progress: Vec::new(),
            sent: HashMap::new(),
            channel_sent: HashMap::new(),
            channel_delivered: HashMap::new(),
            delivered: HashSet::new(),
            delivery_log: Vec::new(),
            violations: Vec::new(),
        };
        checker.reset(engine);
        checker
    }

    /// Forgets everything and recaptures `engine`, typically after a driver reset.
    pub fn reset<C: CausalClock>(&mut self, engine: &DeliveryEngine<C>) {
        self.components = engine.processes().iter().map(|p| p.clock().components()).collect();
        self.own_progress = engine.processes().iter().map(|p| p.clock().own_progress()).collect();
        self.sent.clear();
        self.channel_sent.clear();
        self.channel_delivered.clear();
        self.delivered.clear();
        self.delivery_log = vec![Vec::new(); engine.process_count()];
        self.violations.clear();
    }

    /// Checks the state reached after `step`, given that step's notifications.
    ///
    /// A step replays one trace event, so a process issues at most one send
    /// event per step.
    pub fn check_step<C: CausalClock>(
        &mut self,
        step: usize,
        engine: &DeliveryEngine<C>,
        notifications: &[DeliveryNotification<C::Timestamp>],
    ) {
        let mut senders: HashSet<ProcessId> = HashSet::new();

        for notification in notifications {
            match notification.kind {
                NotificationKind::Sent => {
                    senders.insert(notification.process);
                    let channel = (notification.process, notification.peer);
                    let counter = self.channel_sent.entry(channel).or_insert(0);
                    *counter += 1;
                    self.sent.insert(
                        notification.message,
                        SentRecord {
                            sender: notification.process,
                            receiver: notification.peer,
                            sequence: *counter,
                            causal: C::causal_vector(&notification.clock),
                        },
                    );
                }
                NotificationKind::Buffered => {}
                NotificationKind::Delivered => self.check_delivery(step, notification.message),
            }
        }

        for process in engine.processes() {
            let id = process.id();
            let after = process.clock().components();
            let before = &self.components[id.index()];
            if before.iter().zip(&after).any(|(b, a)| a < b) {
                self.violations.push(InvariantViolation::ClockRegressed {
                    step,
                    process: id,
                    before: before.clone(),
                    after: after.clone(),
                });
            }
            self.components[id.index()] = after;

            let progress = process.clock().own_progress();
            let expected = u64::from(senders.contains(&id));
            let found = i128::from(progress) - i128::from(self.own_progress[id.index()]);
            if found != i128::from(expected) {
                self.violations.push(InvariantViolation::OwnProgress {
                    step,
                    process: id,
                    expected,
                    found,
                });
            }
            self.own_progress[id.index()] = progress;

            for message in process.buffer() {
                if process.clock().is_deliverable(message.timestamp(), message.sender()) {
                    self.violations.push(InvariantViolation::StuckInBuffer {
                        step,
                        process: id,
                        message: message.id(),
                    });
                }
            }
        }
    }

    /// Everything recorded since the last reset.
    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    pub fn is_clean(&self) -> bool {
        self.violations.is_empty()
    }

    /// Number of distinct messages seen delivered.
    pub fn delivered_count(&self) -> usize {
        self.delivered.len()
    }

    fn check_delivery(&mut self, step: usize, message: MessageId) {
        if !self.delivered.insert(message) {
            self.violations.push(InvariantViolation::DuplicateDelivery { step, message });
            return;
        }

        // Sends always precede their deliveries within one replay
        let Some(record) = self.sent.get(&message) else {
            return;
        };

        let channel = (record.sender, record.receiver);
        let last = self.channel_delivered.entry(channel).or_insert(0);
        if record.sequence <= *last {
            self.violations.push(InvariantViolation::ChannelReordered {
                step,
                from: record.sender,
                to: record.receiver,
                message,
            });
        }
        *last = (*last).max(record.sequence);

        let receiver = record.receiver.index();
        for &prior_id in &self.delivery_log[receiver] {
            let Some(prior) = self.sent.get(&prior_id) else {
                continue;
            };
            if happened_before(&record.causal, &prior.causal) {
                self.violations.push(InvariantViolation::CausalOrder {
                    step,
                    process: record.receiver,
                    earlier: message,
                    later: prior_id,
                });
            }
        }
        self.delivery_log[receiver].push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::SimulationDriver;
    use crate::generator::TraceGenerator;
    use crate::scenarios::ScenarioId;
    use crate::trace::EventTrace;
    use causal_core::{MatrixClock, SesClock, SesMergePolicy, VectorClock};
    use proptest::prelude::*;

    fn replay<C: CausalClock>(
        trace: EventTrace,
        clock_for: impl Fn(ProcessId, usize) -> C,
    ) -> (SimulationDriver<C>, InvariantChecker) {
        let mut driver = SimulationDriver::new(trace, clock_for).unwrap();
        let mut checker = InvariantChecker::new(driver.engine());
        let mut step = 0;
        while !driver.is_finished() {
            let notifications = driver.step().unwrap();
            checker.check_step(step, driver.engine(), &notifications);
            step += 1;
        }
        (driver, checker)
    }

    #[test]
    fn test_scenarios_are_clean_under_every_clock() {
        for scenario in ScenarioId::all() {
            let (_, checker) = replay(scenario.trace().unwrap(), VectorClock::new);
            assert!(checker.is_clean(), "vector {}: {:?}", scenario, checker.violations());

            let (_, checker) = replay(scenario.trace().unwrap(), MatrixClock::new);
            assert!(checker.is_clean(), "matrix {}: {:?}", scenario, checker.violations());

            let (_, checker) = replay(scenario.trace().unwrap(), SesClock::new);
            assert!(checker.is_clean(), "ses {}: {:?}", scenario, checker.violations());
        }
    }

    #[test]
    fn test_detects_fabricated_duplicate_delivery() {
        let trace = ScenarioId::Independent.trace().unwrap();
        let (driver, mut checker) = replay(trace, VectorClock::new);

        let duplicate = DeliveryNotification {
            kind: NotificationKind::Delivered,
            process: ProcessId(2),
            peer: ProcessId(0),
            message: MessageId(0),
            clock: driver.engine().process(ProcessId(2)).unwrap().clock().snapshot(),
            payload: "m1".into(),
        };
        checker.check_step(4, driver.engine(), &[duplicate]);

        assert_eq!(
            checker.violations(),
            &[InvariantViolation::DuplicateDelivery { step: 4, message: MessageId(0) }]
        );
    }

    #[test]
    fn test_detects_unexplained_progress() {
        let trace = ScenarioId::Independent.trace().unwrap();
        let mut driver = SimulationDriver::new(trace, VectorClock::new).unwrap();
        let mut checker = InvariantChecker::new(driver.engine());

        // The send notification is withheld, so P1's increment looks spurious.
        driver.step().unwrap();
        checker.check_step(0, driver.engine(), &[]);

        assert!(matches!(
            checker.violations(),
            [InvariantViolation::OwnProgress { process: ProcessId(0), expected: 0, found: 1, .. }]
        ));
    }

    #[test]
    fn test_reset_clears_violations() {
        let trace = ScenarioId::Independent.trace().unwrap();
        let mut driver = SimulationDriver::new(trace, VectorClock::new).unwrap();
        let mut checker = InvariantChecker::new(driver.engine());
        driver.step().unwrap();
        checker.check_step(0, driver.engine(), &[]);
        assert!(!checker.is_clean());

        driver.reset();
        checker.reset(driver.engine());
        assert!(checker.is_clean());
        assert_eq!(checker.delivered_count(), 0);
    }

    fn broadcast_trace(seed: u64, processes: usize, events: usize) -> EventTrace {
        TraceGenerator::new(seed, processes)
            .with_events(events)
            .with_broadcast_ratio(1.0)
            .with_drain(true)
            .generate()
            .unwrap()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_mixed_traces_keep_invariants(
            seed in any::<u64>(),
            processes in 2usize..6,
            events in 0usize..40,
            ratio in 0.0f64..1.0,
        ) {
            let trace = TraceGenerator::new(seed, processes)
                .with_events(events)
                .with_broadcast_ratio(ratio)
                .generate()
                .unwrap();

            let (_, checker) = replay(trace.clone(), VectorClock::new);
            prop_assert!(checker.is_clean(), "{:?}", checker.violations());
            let (_, checker) = replay(trace.clone(), MatrixClock::new);
            prop_assert!(checker.is_clean(), "{:?}", checker.violations());
            let (_, checker) = replay(trace, SesClock::new);
            prop_assert!(checker.is_clean(), "{:?}", checker.violations());
        }

        #[test]
        fn prop_broadcast_traces_deliver_everything(
            seed in any::<u64>(),
            processes in 2usize..6,
            events in 1usize..30,
        ) {
            let trace = broadcast_trace(seed, processes, events);
            let expected = trace.message_count();

            let (driver, checker) = replay(trace.clone(), VectorClock::new);
            prop_assert_eq!(driver.engine().pending(), 0);
            prop_assert_eq!(checker.delivered_count(), expected);

            let (driver, checker) = replay(trace.clone(), MatrixClock::new);
            prop_assert_eq!(driver.engine().pending(), 0);
            prop_assert_eq!(checker.delivered_count(), expected);

            let (driver, checker) = replay(trace.clone(), SesClock::new);
            prop_assert_eq!(driver.engine().pending(), 0);
            prop_assert_eq!(checker.delivered_count(), expected);

            let deliver_policy = |id, n| SesClock::with_policy(id, n, SesMergePolicy::OnDeliver);
            let (driver, _) = replay(trace, deliver_policy);
            prop_assert_eq!(driver.engine().pending(), 0);
        }

        #[test]
        fn prop_replay_after_reset_is_identical(
            seed in any::<u64>(),
            events in 0usize..25,
        ) {
            let trace = TraceGenerator::new(seed, 3)
                .with_events(events)
                .with_broadcast_ratio(0.7)
                .generate()
                .unwrap();

            let mut driver = SimulationDriver::new(trace, MatrixClock::new).unwrap();
            let first = serde_json::to_string(&driver.run_to_end().unwrap()).unwrap();
            driver.reset();
            let second = serde_json::to_string(&driver.run_to_end().unwrap()).unwrap();
            prop_assert_eq!(first, second);
        }
    }
}
