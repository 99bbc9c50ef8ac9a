//! Causal Delivery Shared Vocabulary
//!
//! This crate holds the pieces every layer of the simulator agrees on:
//! - Identifiers (`ProcessId`, `MessageId`, `PayloadTag`)
//! - The `CausalClock` contract implemented by every clock algorithm
//! - The notification stream and its `DeliveryObserver` seam
//! - Error types
//!
//! # Layering
//!
//! ```text
//! causal_sim   (trace, driver, scenarios, CLI)
//!     │
//! causal_core  (clocks, processes, delivery engine)
//!     │
//! causal_env   (this crate)
//! ```

mod clock;
mod error;
mod notification;
mod types;

pub use clock::{happened_before, CausalClock};
pub use error::{CausalError, TraceViolation};
pub use notification::{DeliveryNotification, DeliveryObserver, NotificationKind};
pub use types::{MessageId, PayloadTag, ProcessId};
