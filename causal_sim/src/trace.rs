//! Event traces: authored send/broadcast/receive scripts, validated at load.
//!
//! A trace is validated once, before any engine exists. Validation also binds
//! every Receive to the send event it consumes, so the driver never has to
//! search the network for a message.

use crate::error::SimError;
use causal_env::{CausalError, PayloadTag, ProcessId, TraceViolation};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::path::Path;

/// One authored event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TraceEvent {
    /// Unicast from `from` to `to`
    Send {
        from: ProcessId,
        to: ProcessId,
        payload: PayloadTag,
    },

    /// One send from `from` to every other process
    Broadcast { from: ProcessId, payload: PayloadTag },

    /// `to` takes the next message on the `from -> to` channel off the network
    Receive {
        from: ProcessId,
        to: ProcessId,
        payload: PayloadTag,
    },
}

impl TraceEvent {
    pub fn send(from: usize, to: usize, payload: &str) -> Self {
        TraceEvent::Send {
            from: ProcessId(from),
            to: ProcessId(to),
            payload: PayloadTag::new(payload),
        }
    }

    pub fn broadcast(from: usize, payload: &str) -> Self {
        TraceEvent::Broadcast {
            from: ProcessId(from),
            payload: PayloadTag::new(payload),
        }
    }

    pub fn receive(from: usize, to: usize, payload: &str) -> Self {
        TraceEvent::Receive {
            from: ProcessId(from),
            to: ProcessId(to),
            payload: PayloadTag::new(payload),
        }
    }

    /// The originating process, for Send and Broadcast.
    pub fn sender(&self) -> Option<ProcessId> {
        match self {
            TraceEvent::Send { from, .. } | TraceEvent::Broadcast { from, .. } => Some(*from),
            TraceEvent::Receive { .. } => None,
        }
    }

    pub fn payload(&self) -> &PayloadTag {
        match self {
            TraceEvent::Send { payload, .. }
            | TraceEvent::Broadcast { payload, .. }
            | TraceEvent::Receive { payload, .. } => payload,
        }
    }
}

impl std::fmt::Display for TraceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TraceEvent::Send { from, to, payload } => {
                write!(f, "{} sends {} to {}", from, payload, to)
            }
            TraceEvent::Broadcast { from, payload } => {
                write!(f, "{} broadcasts {}", from, payload)
            }
            TraceEvent::Receive { from, to, payload } => {
                write!(f, "{} receives {} from {}", to, payload, from)
            }
        }
    }
}

/// On-disk shape of a trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceFile {
    pub process_count: usize,
    pub events: Vec<TraceEvent>,
}

/// A validated trace.
#[derive(Debug, Clone, PartialEq)]
pub struct EventTrace {
    process_count: usize,
    events: Vec<TraceEvent>,

    /// For each Receive, the index of the send event it consumes
    bindings: Vec<Option<usize>>,
}

impl EventTrace {
    /// Validates `events` for a system of `process_count` processes.
    ///
    /// Receives are matched FIFO against the earlier, not yet consumed sends
    /// on the same channel. A broadcast feeds every outgoing channel of its
    /// sender.
    pub fn load(process_count: usize, events: Vec<TraceEvent>) -> Result<Self, CausalError> {
        if process_count == 0 {
            return Err(CausalError::InvalidProcessCount(process_count));
        }

        let mut channels: HashMap<(ProcessId, ProcessId), VecDeque<usize>> = HashMap::new();
        let mut bindings = Vec::with_capacity(events.len());

        for (index, event) in events.iter().enumerate() {
            let in_range = |id: ProcessId| -> Result<(), CausalError> {
                if id.in_range(process_count) {
                    Ok(())
                } else {
                    Err(CausalError::malformed(
                        index,
                        TraceViolation::ProcessOutOfRange { id, process_count },
                    ))
                }
            };

            match event {
                TraceEvent::Send { from, to, .. } => {
                    in_range(*from)?;
                    in_range(*to)?;
                    if from == to {
                        return Err(CausalError::malformed(
                            index,
                            TraceViolation::SelfSend { process: *from },
                        ));
                    }
                    channels.entry((*from, *to)).or_default().push_back(index);
                    bindings.push(None);
                }
                TraceEvent::Broadcast { from, .. } => {
                    in_range(*from)?;
                    for to in ProcessId::all(process_count).filter(|to| to != from) {
                        channels.entry((*from, to)).or_default().push_back(index);
                    }
                    bindings.push(None);
                }
                TraceEvent::Receive { from, to, payload } => {
                    in_range(*from)?;
                    in_range(*to)?;
                    if from == to {
                        return Err(CausalError::malformed(
                            index,
                            TraceViolation::SelfReceive { process: *to },
                        ));
                    }

                    let send_index = channels
                        .get_mut(&(*from, *to))
                        .and_then(|queue| queue.pop_front())
                        .ok_or_else(|| {
                            CausalError::malformed(
                                index,
                                TraceViolation::UnmatchedReceive { from: *from, to: *to },
                            )
                        })?;

                    let expected = events[send_index].payload();
                    if expected != payload {
                        return Err(CausalError::malformed(
                            index,
                            TraceViolation::PayloadMismatch {
                                from: *from,
                                to: *to,
                                expected: expected.to_string(),
                                found: payload.to_string(),
                            },
                        ));
                    }
                    bindings.push(Some(send_index));
                }
            }
        }

        Ok(Self {
            process_count,
            events,
            bindings,
        })
    }

    /// Validates a deserialized trace file.
    pub fn from_file_contents(file: TraceFile) -> Result<Self, CausalError> {
        Self::load(file.process_count, file.events)
    }

    /// Reads and validates a JSON trace file.
    pub fn read_json(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let text = std::fs::read_to_string(path)?;
        let file: TraceFile = serde_json::from_str(&text)?;
        Ok(Self::from_file_contents(file)?)
    }

    pub fn to_file_contents(&self) -> TraceFile {
        TraceFile {
            process_count: self.process_count,
            events: self.events.clone(),
        }
    }

    pub fn process_count(&self) -> usize {
        self.process_count
    }

    pub fn events(&self) -> &[TraceEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TraceEvent> {
        self.events.get(index)
    }

    /// The send event consumed by the Receive at `index`.
    pub fn binding(&self, index: usize) -> Option<usize> {
        self.bindings.get(index).copied().flatten()
    }

    /// Human-readable description of the event at `index`.
    pub fn describe(&self, index: usize) -> String {
        match self.events.get(index) {
            Some(event) => format!("Step {}: {}", index + 1, event),
            None => format!("Step {}: (end of trace)", index + 1),
        }
    }

    /// Number of messages the trace puts on the network.
    pub fn message_count(&self) -> usize {
        self.events
            .iter()
            .map(|event| match event {
                TraceEvent::Send { .. } => 1,
                TraceEvent::Broadcast { .. } => self.process_count - 1,
                TraceEvent::Receive { .. } => 0,
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn violation(err: CausalError) -> (usize, TraceViolation) {
        match err {
            CausalError::MalformedTrace { index, violation } => (index, violation),
            other => panic!("expected malformed trace, got {other:?}"),
        }
    }

    #[test]
    fn test_receive_binds_to_matching_send() {
        let trace = EventTrace::load(
            3,
            vec![
                TraceEvent::send(0, 2, "m1"),
                TraceEvent::send(1, 2, "m2"),
                TraceEvent::receive(1, 2, "m2"),
                TraceEvent::receive(0, 2, "m1"),
            ],
        )
        .unwrap();

        assert_eq!(trace.binding(0), None);
        assert_eq!(trace.binding(2), Some(1));
        assert_eq!(trace.binding(3), Some(0));
        assert_eq!(trace.message_count(), 2);
    }

    #[test]
    fn test_broadcast_feeds_every_channel() {
        let trace = EventTrace::load(
            3,
            vec![
                TraceEvent::broadcast(0, "m1"),
                TraceEvent::receive(0, 2, "m1"),
                TraceEvent::receive(0, 1, "m1"),
            ],
        )
        .unwrap();

        assert_eq!(trace.binding(1), Some(0));
        assert_eq!(trace.binding(2), Some(0));
        assert_eq!(trace.message_count(), 2);
    }

    #[test]
    fn test_receive_without_send_is_rejected() {
        let err = EventTrace::load(3, vec![TraceEvent::receive(0, 2, "m1")]).unwrap_err();
        assert_eq!(
            violation(err),
            (0, TraceViolation::UnmatchedReceive { from: ProcessId(0), to: ProcessId(2) })
        );
    }

    #[test]
    fn test_receive_consumes_each_send_once() {
        let err = EventTrace::load(
            2,
            vec![
                TraceEvent::send(0, 1, "m1"),
                TraceEvent::receive(0, 1, "m1"),
                TraceEvent::receive(0, 1, "m1"),
            ],
        )
        .unwrap_err();
        assert_eq!(violation(err).0, 2);
    }

    #[test]
    fn test_receive_before_send_is_rejected() {
        let err = EventTrace::load(
            2,
            vec![TraceEvent::receive(0, 1, "m1"), TraceEvent::send(0, 1, "m1")],
        )
        .unwrap_err();
        assert_eq!(violation(err).0, 0);
    }

    #[test]
    fn test_channels_are_fifo() {
        let err = EventTrace::load(
            2,
            vec![
                TraceEvent::send(0, 1, "m1"),
                TraceEvent::send(0, 1, "m2"),
                TraceEvent::receive(0, 1, "m2"),
            ],
        )
        .unwrap_err();
        assert_eq!(
            violation(err),
            (
                2,
                TraceViolation::PayloadMismatch {
                    from: ProcessId(0),
                    to: ProcessId(1),
                    expected: "m1".to_string(),
                    found: "m2".to_string(),
                }
            )
        );
    }

    #[test]
    fn test_self_addressed_events_are_rejected() {
        let err = EventTrace::load(3, vec![TraceEvent::send(1, 1, "m")]).unwrap_err();
        assert_eq!(violation(err), (0, TraceViolation::SelfSend { process: ProcessId(1) }));

        let err = EventTrace::load(3, vec![TraceEvent::receive(2, 2, "m")]).unwrap_err();
        assert_eq!(violation(err), (0, TraceViolation::SelfReceive { process: ProcessId(2) }));
    }

    #[test]
    fn test_out_of_range_process_is_rejected() {
        let err = EventTrace::load(
            3,
            vec![TraceEvent::send(0, 1, "ok"), TraceEvent::broadcast(3, "m")],
        )
        .unwrap_err();
        assert_eq!(
            violation(err),
            (1, TraceViolation::ProcessOutOfRange { id: ProcessId(3), process_count: 3 })
        );
    }

    #[test]
    fn test_empty_system_is_rejected() {
        let err = EventTrace::load(0, Vec::new()).unwrap_err();
        assert_eq!(err, CausalError::InvalidProcessCount(0));
    }

    #[test]
    fn test_unreceived_sends_are_legal() {
        let trace = EventTrace::load(2, vec![TraceEvent::send(0, 1, "lost")]).unwrap();
        assert_eq!(trace.len(), 1);
    }

    #[test]
    fn test_trace_file_json_shape() {
        let json = r#"{
            "process_count": 3,
            "events": [
                {"kind": "send", "from": 0, "to": 2, "payload": "m1"},
                {"kind": "broadcast", "from": 1, "payload": "m2"},
                {"kind": "receive", "from": 0, "to": 2, "payload": "m1"}
            ]
        }"#;
        let file: TraceFile = serde_json::from_str(json).unwrap();
        let trace = EventTrace::from_file_contents(file).unwrap();
        assert_eq!(trace.get(1), Some(&TraceEvent::broadcast(1, "m2")));
        assert_eq!(trace.describe(2), "Step 3: P3 receives m1 from P1");
    }

    #[test]
    fn test_read_json_reports_io_errors() {
        let err = EventTrace::read_json("/nonexistent/trace.json").unwrap_err();
        assert!(matches!(err, SimError::Io(_)));
    }
}
