//! A simulated process: one exclusively owned clock plus a hold-back buffer.

use crate::message::Message;
use causal_env::{CausalClock, MessageId, ProcessId};

/// Process state. Only the delivery engine mutates it.
#[derive(Debug, Clone)]
pub struct Process<C: CausalClock> {
    id: ProcessId,
    clock: C,
    /// Undelivered messages in arrival order
    buffer: Vec<Message<C::Timestamp>>,
    /// Delivered message ids in delivery order
    delivered: Vec<MessageId>,
}

impl<C: CausalClock> Process<C> {
    pub(crate) fn new(id: ProcessId, clock: C) -> Self {
        assert_eq!(clock.owner(), id, "clock for {} handed to {}", clock.owner(), id);
        Self {
            id,
            clock,
            buffer: Vec::new(),
            delivered: Vec::new(),
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Messages waiting for their causal predecessors, oldest first.
    pub fn buffer(&self) -> &[Message<C::Timestamp>] {
        &self.buffer
    }

    /// Ids of delivered messages, in delivery order.
    pub fn delivered(&self) -> &[MessageId] {
        &self.delivered
    }

    /// Returns true if the message is waiting in the buffer.
    pub fn holds(&self, id: MessageId) -> bool {
        self.buffer.iter().any(|m| m.id() == id)
    }

    pub(crate) fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub(crate) fn hold(&mut self, message: Message<C::Timestamp>) {
        self.buffer.push(message);
    }

    pub(crate) fn record_delivery(&mut self, id: MessageId) {
        self.delivered.push(id);
    }

    /// Removes and returns the oldest buffered message that is now deliverable.
    ///
    /// Every message looked at is examined first, so clocks that learn from
    /// pending messages see each of them on every pass.
    pub(crate) fn release_next(&mut self) -> Option<Message<C::Timestamp>> {
        for idx in 0..self.buffer.len() {
            let message = &self.buffer[idx];
            self.clock.examine(message.timestamp(), message.sender());
            if self.clock.is_deliverable(message.timestamp(), message.sender()) {
                return Some(self.buffer.remove(idx));
            }
        }
        None
    }

    pub(crate) fn reset(&mut self) {
        self.clock.reset();
        self.buffer.clear();
        self.delivered.clear();
    }
}
