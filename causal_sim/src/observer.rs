//! Logs the notification stream through `tracing`.

use causal_env::{DeliveryNotification, DeliveryObserver};
use std::fmt::Debug;
use tracing::debug;

/// Observer that writes every notification at debug level.
#[derive(Debug, Clone)]
pub struct TracingObserver {
    label: String,
}

impl TracingObserver {
    /// `label` prefixes each line, typically `scenario/clock`.
    pub fn new(label: impl Into<String>) -> Self {
        Self { label: label.into() }
    }
}

impl<T: Debug> DeliveryObserver<T> for TracingObserver {
    fn observe(&mut self, step: usize, notifications: &[DeliveryNotification<T>]) {
        for notification in notifications {
            debug!(
                "[{}] step {}: {} -> {:?}",
                self.label,
                step + 1,
                notification,
                notification.clock
            );
        }
    }

    fn on_reset(&mut self) {
        debug!("[{}] reset", self.label);
    }
}
