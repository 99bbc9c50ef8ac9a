//! The Delivery Engine - deliverability test, buffering and cascading release.
//!
//! One engine serves every clock algorithm: the algorithms only differ in the
//! `CausalClock` implementation plugged in.
//!
//! # Arrival
//!
//! ```text
//!            arrival(m)
//!                │
//!      is_deliverable(m)? ──no──► examine, buffer (Buffered)
//!                │yes
//!        merge, log (Delivered)
//!                │
//!   ┌──► rescan buffer oldest→newest ──none ready──► done
//!   │            │first ready
//!   └── merge, log (Delivered, cascaded)
//! ```
//!
//! The cascade restarts from the oldest buffered message after every release,
//! so simultaneously deliverable messages leave in arrival order.

use crate::message::Message;
use crate::process::Process;
use causal_env::{
    CausalClock, CausalError, DeliveryNotification, MessageId, NotificationKind, PayloadTag,
    ProcessId,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Running counters since the last reset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineStats {
    /// Messages created (one per destination for a broadcast)
    pub sent: u64,
    /// Arrivals that had to wait in a buffer
    pub buffered: u64,
    /// Deliveries of any kind
    pub delivered: u64,
    /// Deliveries released from a buffer by a cascade
    pub cascaded: u64,
}

/// Executes sends and arrivals against a fixed set of processes.
#[derive(Debug, Clone)]
pub struct DeliveryEngine<C: CausalClock> {
    processes: Vec<Process<C>>,

    /// Every message id ever delivered, for the at-most-once check
    delivered: HashSet<MessageId>,

    next_message: u64,

    /// Side effects of the current step, drained by the driver
    notifications: Vec<DeliveryNotification<C::Timestamp>>,

    stats: EngineStats,
}

impl<C: CausalClock> DeliveryEngine<C> {
    /// Creates an engine with `process_count` processes.
    ///
    /// `clock_for` builds the initial clock of each process; it receives the
    /// owner and the process count.
    pub fn new(
        process_count: usize,
        clock_for: impl Fn(ProcessId, usize) -> C,
    ) -> Result<Self, CausalError> {
        if process_count == 0 {
            return Err(CausalError::InvalidProcessCount(process_count));
        }

        let processes = ProcessId::all(process_count)
            .map(|id| Process::new(id, clock_for(id, process_count)))
            .collect();

        Ok(Self {
            processes,
            delivered: HashSet::new(),
            next_message: 0,
            notifications: Vec::new(),
            stats: EngineStats::default(),
        })
    }

    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    pub fn processes(&self) -> &[Process<C>] {
        &self.processes
    }

    pub fn process(&self, id: ProcessId) -> Option<&Process<C>> {
        self.processes.get(id.index())
    }

    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Returns true if the message has been delivered.
    pub fn is_delivered(&self, id: MessageId) -> bool {
        self.delivered.contains(&id)
    }

    /// Total number of messages sitting in buffers.
    pub fn pending(&self) -> usize {
        self.processes.iter().map(|p| p.buffer().len()).sum()
    }

    /// Stamps and emits a unicast message. The message stays in flight until
    /// it is handed to [`process_arrival`](Self::process_arrival).
    pub fn process_send(
        &mut self,
        from: ProcessId,
        to: ProcessId,
        payload: PayloadTag,
    ) -> Result<Message<C::Timestamp>, CausalError> {
        self.check(from)?;
        self.check(to)?;
        if from == to {
            return Err(CausalError::SelfAddressed { process: from });
        }

        let sender = &mut self.processes[from.index()];
        sender.clock_mut().increment();
        let timestamp = sender.clock().snapshot();

        Ok(self.emit(from, to, timestamp, payload))
    }

    /// Stamps one message per other process with a single increment.
    ///
    /// Messages are returned in ascending receiver order.
    pub fn process_broadcast(
        &mut self,
        from: ProcessId,
        payload: PayloadTag,
    ) -> Result<Vec<Message<C::Timestamp>>, CausalError> {
        self.check(from)?;

        let sender = &mut self.processes[from.index()];
        sender.clock_mut().increment();
        let timestamp = sender.clock().snapshot();

        let receivers: Vec<ProcessId> = ProcessId::all(self.process_count())
            .filter(|&id| id != from)
            .collect();

        Ok(receivers
            .into_iter()
            .map(|to| self.emit(from, to, timestamp.clone(), payload.clone()))
            .collect())
    }

    /// Hands an in-flight message to its receiver.
    ///
    /// Delivers it and drains the receiver's buffer to a fixed point, or
    /// buffers it if a causal predecessor is still missing.
    pub fn process_arrival(&mut self, message: Message<C::Timestamp>) -> Result<(), CausalError> {
        self.check(message.sender())?;
        self.check(message.receiver())?;
        assert!(
            !self.delivered.contains(&message.id()),
            "{} arrived again after delivery",
            message.id()
        );
        assert!(
            !self.processes[message.receiver().index()].holds(message.id()),
            "{} arrived again while buffered",
            message.id()
        );

        let receiver = message.receiver();
        let process = &mut self.processes[receiver.index()];

        if process.clock().is_deliverable(message.timestamp(), message.sender()) {
            self.deliver(message, false);
            self.cascade(receiver);
        } else {
            process.clock_mut().examine(message.timestamp(), message.sender());
            debug!(
                "{} buffers {} from {} (clock {:?})",
                receiver,
                message.id(),
                message.sender(),
                process.clock().components()
            );

            self.notifications.push(DeliveryNotification {
                kind: NotificationKind::Buffered,
                process: receiver,
                peer: message.sender(),
                message: message.id(),
                clock: process.clock().snapshot(),
                payload: message.payload().clone(),
            });
            self.stats.buffered += 1;
            process.hold(message);
        }

        Ok(())
    }

    /// Takes the side effects recorded since the last drain, in order.
    pub fn drain_notifications(&mut self) -> Vec<DeliveryNotification<C::Timestamp>> {
        std::mem::take(&mut self.notifications)
    }

    /// Returns every process to its initial state.
    pub fn reset(&mut self) {
        for process in &mut self.processes {
            process.reset();
        }
        self.delivered.clear();
        self.notifications.clear();
        self.next_message = 0;
        self.stats = EngineStats::default();
    }

    // ========== Private Helper Methods ==========

    fn check(&self, id: ProcessId) -> Result<(), CausalError> {
        if id.in_range(self.process_count()) {
            Ok(())
        } else {
            Err(CausalError::unknown_process(id, self.process_count()))
        }
    }

    fn emit(
        &mut self,
        from: ProcessId,
        to: ProcessId,
        timestamp: C::Timestamp,
        payload: PayloadTag,
    ) -> Message<C::Timestamp> {
        let id = MessageId(self.next_message);
        self.next_message += 1;

        debug!("{} sends {} ({}) to {}", from, id, payload, to);

        self.notifications.push(DeliveryNotification {
            kind: NotificationKind::Sent,
            process: from,
            peer: to,
            message: id,
            clock: timestamp.clone(),
            payload: payload.clone(),
        });
        self.stats.sent += 1;

        Message::new(id, from, to, timestamp, payload)
    }

    fn deliver(&mut self, message: Message<C::Timestamp>, from_buffer: bool) {
        assert!(
            self.delivered.insert(message.id()),
            "{} delivered twice",
            message.id()
        );

        let process = &mut self.processes[message.receiver().index()];
        process.clock_mut().merge(message.timestamp(), message.sender());
        process.record_delivery(message.id());

        debug!(
            "{} delivers {} from {}{} (clock {:?})",
            process.id(),
            message.id(),
            message.sender(),
            if from_buffer { " [cascade]" } else { "" },
            process.clock().components()
        );

        self.notifications.push(DeliveryNotification {
            kind: NotificationKind::Delivered,
            process: process.id(),
            peer: message.sender(),
            message: message.id(),
            clock: process.clock().snapshot(),
            payload: message.payload().clone(),
        });
        self.stats.delivered += 1;
        if from_buffer {
            self.stats.cascaded += 1;
        }
    }

    fn cascade(&mut self, receiver: ProcessId) {
        while let Some(message) = self.processes[receiver.index()].release_next() {
            self.deliver(message, true);
        }
    }
}
