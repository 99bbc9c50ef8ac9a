//! Causal Delivery Core - clocks, processes and the delivery engine
//!
//! Three interchangeable algorithms decide when a message may be delivered:
//! 1. **Vector clocks** (BSS): next message from the sender, no unseen dependencies
//! 2. **Matrix clocks**: the full knowledge grid travels with every message
//! 3. **SES clocks**: vector test, with causal history absorbed while buffered
//!
//! All three plug into the same [`DeliveryEngine`] through the
//! [`causal_env::CausalClock`] contract.

pub mod engine;
pub mod kind;
pub mod matrix_clock;
pub mod message;
pub mod process;
pub mod ses_clock;
pub mod vector_clock;

// Re-export key types for convenience
pub use engine::{DeliveryEngine, EngineStats};
pub use kind::{ClockKind, UnknownVariant};
pub use matrix_clock::{MatrixClock, MatrixTimestamp};
pub use message::Message;
pub use process::Process;
pub use ses_clock::{SesClock, SesMergePolicy, SesTimestamp};
pub use vector_clock::{VectorClock, VectorTimestamp};
