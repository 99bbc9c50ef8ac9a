//! Error types for the causal delivery simulator.

use crate::types::ProcessId;
use thiserror::Error;

/// Structural problems found while loading an event trace.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceViolation {
    /// An event names a process outside `0..process_count`
    #[error("process {id} is outside the declared {process_count} processes")]
    ProcessOutOfRange { id: ProcessId, process_count: usize },

    /// A process tries to receive a message it sent itself
    #[error("{process} cannot receive its own message")]
    SelfReceive { process: ProcessId },

    /// A process addresses a unicast message to itself
    #[error("{process} cannot send a message to itself")]
    SelfSend { process: ProcessId },

    /// No earlier, unconsumed send exists on the channel
    #[error("no pending send from {from} to {to}")]
    UnmatchedReceive { from: ProcessId, to: ProcessId },

    /// The receive names a different payload than the next send on the channel
    #[error("expected payload {expected:?} on channel {from}->{to}, found {found:?}")]
    PayloadMismatch {
        from: ProcessId,
        to: ProcessId,
        expected: String,
        found: String,
    },
}

/// Errors surfaced by the engine and the replay driver.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CausalError {
    /// The trace failed validation; no engine state was created
    #[error("Malformed trace at event {index}: {violation}")]
    MalformedTrace {
        index: usize,
        violation: TraceViolation,
    },

    /// `step()` was called after the last event
    #[error("No more events: all {events} events have been replayed")]
    NoMoreEvents { events: usize },

    /// An engine operation named a process that does not exist
    #[error("Unknown process {id} (system has {process_count} processes)")]
    UnknownProcess { id: ProcessId, process_count: usize },

    /// A unicast send names the same process as sender and receiver
    #[error("{process} cannot send a message to itself")]
    SelfAddressed { process: ProcessId },

    /// A system needs at least one process
    #[error("Invalid process count: {0}")]
    InvalidProcessCount(usize),
}

impl CausalError {
    /// Creates a malformed-trace error for the event at `index`.
    pub fn malformed(index: usize, violation: TraceViolation) -> Self {
        Self::MalformedTrace { index, violation }
    }

    /// Creates an unknown-process error.
    pub fn unknown_process(id: ProcessId, process_count: usize) -> Self {
        Self::UnknownProcess { id, process_count }
    }

    /// Returns true for the recoverable end-of-trace condition.
    pub fn is_end_of_trace(&self) -> bool {
        matches!(self, Self::NoMoreEvents { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_trace_names_index() {
        let err = CausalError::malformed(
            4,
            TraceViolation::UnmatchedReceive { from: ProcessId(0), to: ProcessId(2) },
        );
        assert_eq!(err.to_string(), "Malformed trace at event 4: no pending send from P1 to P3");
        assert!(!err.is_end_of_trace());
    }

    #[test]
    fn test_no_more_events_is_recoverable() {
        let err = CausalError::NoMoreEvents { events: 3 };
        assert!(err.is_end_of_trace());
    }
}
