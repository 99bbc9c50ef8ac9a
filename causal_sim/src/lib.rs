//! Causal Delivery Deterministic Replay Harness
//!
//! This crate steps authored or generated event traces through the
//! [`causal_core::DeliveryEngine`], one event per step, and judges every run
//! against the causal delivery invariants.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                      ScenarioRunner                       │
//! │  ┌──────────────┐   ┌────────────────────────────────┐    │
//! │  │ EventTrace   │──►│ SimulationDriver               │    │
//! │  │ (validated)  │   │  Ready(i) ──step()──► Finished │    │
//! │  └──────▲───────┘   └───────┬────────────────────────┘    │
//! │         │                   │ notifications               │
//! │  scenarios / generator /    ├──► InvariantChecker         │
//! │  JSON trace file            ├──► TraceExport              │
//! │                             └──► DeliveryObserver(s)      │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use causal_sim::{ScenarioRunner, SimConfig};
//! use causal_sim::scenarios::ScenarioId;
//!
//! let runner = ScenarioRunner::new(SimConfig::default());
//! let result = runner.run(ScenarioId::Dependency)?;
//! assert!(result.passed);
//! ```

mod checker;
mod config;
mod driver;
mod error;
mod exporter;
mod generator;
mod observer;
mod runner;
pub mod scenarios;
mod trace;

pub use checker::{InvariantChecker, InvariantViolation};
pub use config::SimConfig;
pub use driver::{DriverState, SimulationDriver};
pub use error::SimError;
pub use exporter::{ExportStep, TraceExport};
pub use generator::TraceGenerator;
pub use observer::TracingObserver;
pub use runner::{ScenarioResult, ScenarioRunner};
pub use trace::{EventTrace, TraceEvent, TraceFile};
