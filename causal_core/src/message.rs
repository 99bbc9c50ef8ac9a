//! Immutable messages exchanged between simulated processes.

use causal_env::{MessageId, PayloadTag, ProcessId};
use serde::{Deserialize, Serialize};

/// A stamped message. Fields are read-only once the engine creates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message<T> {
    id: MessageId,
    sender: ProcessId,
    receiver: ProcessId,
    timestamp: T,
    payload: PayloadTag,
}

impl<T> Message<T> {
    pub(crate) fn new(
        id: MessageId,
        sender: ProcessId,
        receiver: ProcessId,
        timestamp: T,
        payload: PayloadTag,
    ) -> Self {
        Self {
            id,
            sender,
            receiver,
            timestamp,
            payload,
        }
    }

    pub fn id(&self) -> MessageId {
        self.id
    }

    pub fn sender(&self) -> ProcessId {
        self.sender
    }

    pub fn receiver(&self) -> ProcessId {
        self.receiver
    }

    /// The sender's clock snapshot taken at send time.
    pub fn timestamp(&self) -> &T {
        &self.timestamp
    }

    pub fn payload(&self) -> &PayloadTag {
        &self.payload
    }
}

impl<T: std::fmt::Display> std::fmt::Display for Message<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}->{} ({}) @ {}",
            self.id, self.sender, self.receiver, self.payload, self.timestamp
        )
    }
}
