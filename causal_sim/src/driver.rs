//! SimulationDriver - steps a validated trace through the delivery engine.

use crate::trace::{EventTrace, TraceEvent};
use causal_core::{DeliveryEngine, Message};
use causal_env::{CausalClock, CausalError, DeliveryNotification, DeliveryObserver, ProcessId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

/// Replay position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DriverState {
    /// The next `step()` executes the event at this index
    Ready(usize),
    /// Every event has been replayed
    Finished,
}

/// Replays one trace event per `step()`.
///
/// Messages created by Send and Broadcast events stay in flight, keyed by
/// their send event and receiver, until the bound Receive hands them to the
/// engine.
pub struct SimulationDriver<C: CausalClock> {
    trace: EventTrace,
    engine: DeliveryEngine<C>,
    state: DriverState,
    in_flight: HashMap<(usize, ProcessId), Message<C::Timestamp>>,
    observers: Vec<Box<dyn DeliveryObserver<C::Timestamp>>>,
}

impl<C: CausalClock> SimulationDriver<C> {
    /// Creates a driver positioned before the first event.
    pub fn new(
        trace: EventTrace,
        clock_for: impl Fn(ProcessId, usize) -> C,
    ) -> Result<Self, CausalError> {
        let engine = DeliveryEngine::new(trace.process_count(), clock_for)?;
        let state = Self::initial_state(&trace);

        Ok(Self {
            trace,
            engine,
            state,
            in_flight: HashMap::new(),
            observers: Vec::new(),
        })
    }

    /// Registers an observer called after every step and on every reset.
    pub fn attach(&mut self, observer: Box<dyn DeliveryObserver<C::Timestamp>>) {
        self.observers.push(observer);
    }

    /// Executes the next event and returns everything it caused, in order.
    pub fn step(&mut self) -> Result<Vec<DeliveryNotification<C::Timestamp>>, CausalError> {
        let index = match self.state {
            DriverState::Ready(index) => index,
            DriverState::Finished => {
                return Err(CausalError::NoMoreEvents {
                    events: self.trace.len(),
                })
            }
        };

        let event = self.trace.events()[index].clone();
        debug!("{}", self.trace.describe(index));

        match event {
            TraceEvent::Send { from, to, payload } => {
                let message = self.engine.process_send(from, to, payload)?;
                self.in_flight.insert((index, to), message);
            }
            TraceEvent::Broadcast { from, payload } => {
                for message in self.engine.process_broadcast(from, payload)? {
                    self.in_flight.insert((index, message.receiver()), message);
                }
            }
            TraceEvent::Receive { to, .. } => {
                let message = self
                    .trace
                    .binding(index)
                    .and_then(|send_index| self.in_flight.remove(&(send_index, to)));
                let Some(message) = message else {
                    panic!("receive at event {} is not bound to an in-flight message", index);
                };
                self.engine.process_arrival(message)?;
            }
        }

        let notifications = self.engine.drain_notifications();
        self.state = if index + 1 < self.trace.len() {
            DriverState::Ready(index + 1)
        } else {
            DriverState::Finished
        };

        for observer in &mut self.observers {
            observer.observe(index, &notifications);
        }

        Ok(notifications)
    }

    /// Steps until the trace is exhausted, returning one batch per step.
    pub fn run_to_end(
        &mut self,
    ) -> Result<Vec<Vec<DeliveryNotification<C::Timestamp>>>, CausalError> {
        let mut batches = Vec::new();
        while !self.is_finished() {
            batches.push(self.step()?);
        }
        Ok(batches)
    }

    /// Returns to the state before the first event.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.in_flight.clear();
        self.state = Self::initial_state(&self.trace);

        for observer in &mut self.observers {
            observer.on_reset();
        }
    }

    pub fn is_finished(&self) -> bool {
        self.state == DriverState::Finished
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn trace(&self) -> &EventTrace {
        &self.trace
    }

    pub fn engine(&self) -> &DeliveryEngine<C> {
        &self.engine
    }

    /// Messages sent but not yet received.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    fn initial_state(trace: &EventTrace) -> DriverState {
        if trace.is_empty() {
            DriverState::Finished
        } else {
            DriverState::Ready(0)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenarios::ScenarioId;
    use causal_core::{MatrixClock, SesClock, VectorClock};
    use causal_env::NotificationKind;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn vector_driver(scenario: ScenarioId) -> SimulationDriver<VectorClock> {
        SimulationDriver::new(scenario.trace().unwrap(), VectorClock::new).unwrap()
    }

    fn p3_clock(driver: &SimulationDriver<VectorClock>) -> Vec<u64> {
        driver.engine().process(ProcessId(2)).unwrap().clock().components()
    }

    #[test]
    fn test_independent_scenario() {
        let mut driver = vector_driver(ScenarioId::Independent);

        let sent = driver.step().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].kind, NotificationKind::Sent);
        assert_eq!(driver.in_flight(), 1);

        driver.step().unwrap();
        let first = driver.step().unwrap();
        assert_eq!(first[0].kind, NotificationKind::Delivered);
        assert_eq!(first[0].peer, ProcessId(1));

        let second = driver.step().unwrap();
        assert_eq!(second[0].kind, NotificationKind::Delivered);
        assert!(driver.is_finished());
        assert_eq!(p3_clock(&driver), vec![1, 1, 0]);
        assert_eq!(driver.engine().stats().buffered, 0);
    }

    #[test]
    fn test_dependency_scenario() {
        let mut driver = vector_driver(ScenarioId::Dependency);
        for _ in 0..3 {
            driver.step().unwrap();
        }

        let buffered = driver.step().unwrap();
        assert_eq!(buffered.len(), 1);
        assert_eq!(buffered[0].kind, NotificationKind::Buffered);
        assert_eq!(buffered[0].payload.as_str(), "m2");
        assert_eq!(p3_clock(&driver), vec![0, 0, 0]);

        let released = driver.step().unwrap();
        let delivered: Vec<(&str, Vec<u64>)> = released
            .iter()
            .map(|n| (n.payload.as_str(), n.clock.as_slice().to_vec()))
            .collect();
        assert_eq!(
            delivered,
            vec![("m1", vec![1, 0, 0]), ("m2", vec![1, 1, 0])]
        );
        assert!(driver.is_finished());
        assert_eq!(driver.in_flight(), 0);
    }

    #[test]
    fn test_step_after_end_fails() {
        let mut driver = vector_driver(ScenarioId::Independent);
        driver.run_to_end().unwrap();
        let err = driver.step().unwrap_err();
        assert_eq!(err, CausalError::NoMoreEvents { events: 4 });
        assert!(err.is_end_of_trace());
    }

    #[test]
    fn test_reset_replays_identically() {
        let mut driver = vector_driver(ScenarioId::Classroom);
        let first = serde_json::to_string(&driver.run_to_end().unwrap()).unwrap();

        driver.reset();
        assert_eq!(driver.state(), DriverState::Ready(0));
        assert_eq!(driver.in_flight(), 0);
        assert_eq!(p3_clock(&driver), vec![0, 0, 0]);

        let second = serde_json::to_string(&driver.run_to_end().unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_empty_trace_starts_finished() {
        let trace = EventTrace::load(2, Vec::new()).unwrap();
        let driver = SimulationDriver::new(trace, VectorClock::new).unwrap();
        assert!(driver.is_finished());
    }

    #[test]
    fn test_observer_sees_every_step_and_reset() {
        #[derive(Default)]
        struct Recorder {
            steps: Vec<(usize, usize)>,
            resets: usize,
        }

        struct Shared(Rc<RefCell<Recorder>>);

        impl<T> DeliveryObserver<T> for Shared {
            fn observe(&mut self, step: usize, notifications: &[DeliveryNotification<T>]) {
                self.0.borrow_mut().steps.push((step, notifications.len()));
            }

            fn on_reset(&mut self) {
                self.0.borrow_mut().resets += 1;
            }
        }

        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let mut driver = vector_driver(ScenarioId::Dependency);
        driver.attach(Box::new(Shared(recorder.clone())));

        driver.run_to_end().unwrap();
        driver.reset();

        let recorder = recorder.borrow();
        assert_eq!(recorder.steps, vec![(0, 2), (1, 1), (2, 1), (3, 1), (4, 2)]);
        assert_eq!(recorder.resets, 1);
    }

    #[test]
    fn test_every_clock_finishes_every_scenario() {
        for scenario in ScenarioId::all() {
            let trace = scenario.trace().unwrap();

            let mut vector = SimulationDriver::new(trace.clone(), VectorClock::new).unwrap();
            vector.run_to_end().unwrap();
            assert_eq!(vector.engine().pending(), 0, "vector {}", scenario);

            let mut matrix = SimulationDriver::new(trace.clone(), MatrixClock::new).unwrap();
            matrix.run_to_end().unwrap();
            assert_eq!(matrix.engine().pending(), 0, "matrix {}", scenario);

            let mut ses = SimulationDriver::new(trace, SesClock::new).unwrap();
            ses.run_to_end().unwrap();
            assert_eq!(ses.engine().pending(), 0, "ses {}", scenario);
        }
    }

    #[test]
    fn test_chain_scenario_releases_one_per_arrival() {
        let mut driver = vector_driver(ScenarioId::Chain);
        for _ in 0..9 {
            driver.step().unwrap();
        }
        assert_eq!(driver.engine().process(ProcessId(2)).unwrap().buffer().len(), 2);

        let first = driver.step().unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(driver.engine().process(ProcessId(2)).unwrap().buffer().len(), 1);

        let second = driver.step().unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(driver.engine().pending(), 0);
        assert_eq!(driver.engine().stats().cascaded, 2);
    }
}
