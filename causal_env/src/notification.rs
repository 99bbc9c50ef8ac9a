//! Notification stream consumed by external observers (visualizers, exporters).

use crate::types::{MessageId, PayloadTag, ProcessId};
use serde::{Deserialize, Serialize};

/// What happened to a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    /// The sender stamped and emitted the message
    Sent,
    /// The receiver could not deliver it yet and put it in its buffer
    Buffered,
    /// The receiver delivered it (immediately or from the buffer)
    Delivered,
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            NotificationKind::Sent => "sent",
            NotificationKind::Buffered => "buffered",
            NotificationKind::Delivered => "delivered",
        };
        f.write_str(label)
    }
}

/// One observable side effect of a simulation step.
///
/// `process` is where the effect happened (the sender for `Sent`, the
/// receiver otherwise) and `peer` is the other end of the channel. `clock`
/// is `process`'s clock right after the effect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryNotification<T> {
    pub kind: NotificationKind,
    pub process: ProcessId,
    pub peer: ProcessId,
    pub message: MessageId,
    pub clock: T,
    pub payload: PayloadTag,
}

impl<T> std::fmt::Display for DeliveryNotification<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            NotificationKind::Sent => {
                write!(f, "{} sends {} ({}) to {}", self.process, self.message, self.payload, self.peer)
            }
            NotificationKind::Buffered => {
                write!(f, "{} buffers {} ({}) from {}", self.process, self.message, self.payload, self.peer)
            }
            NotificationKind::Delivered => {
                write!(f, "{} delivers {} ({}) from {}", self.process, self.message, self.payload, self.peer)
            }
        }
    }
}

/// Receives the ordered side effects of every simulation step.
///
/// Observers are passive: they see notifications after the step completed
/// and cannot touch engine state.
pub trait DeliveryObserver<T> {
    /// Called once per step with everything that step caused, in order.
    fn observe(&mut self, step: usize, notifications: &[DeliveryNotification<T>]);

    /// Called when the driver is reset to its initial state.
    fn on_reset(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_display() {
        let n = DeliveryNotification {
            kind: NotificationKind::Buffered,
            process: ProcessId(2),
            peer: ProcessId(1),
            message: MessageId(1),
            clock: vec![0u64, 0, 0],
            payload: PayloadTag::new("m2"),
        };
        assert_eq!(n.to_string(), "P3 buffers m1 (m2) from P2");
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&NotificationKind::Delivered).unwrap();
        assert_eq!(json, "\"delivered\"");
    }
}
