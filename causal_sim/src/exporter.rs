//! JSON exporter for external visualizers.
//!
//! Exports every replay step with its notifications, plus the final clocks
//! and the verdict.

use crate::error::SimError;
use crate::runner::ScenarioResult;
use causal_env::DeliveryNotification;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// One replayed event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportStep {
    /// Zero-based event index
    pub index: usize,

    /// Human-readable event, e.g. "Step 3: P3 receives m1 from P1"
    pub description: String,

    /// Side effects in order; clock snapshots keep their algorithm-specific shape
    pub notifications: Vec<serde_json::Value>,
}

/// Complete replay export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceExport {
    /// Scenario name, `random` or the trace file
    pub scenario: String,

    /// Clock algorithm
    pub clock: String,

    pub process_count: usize,

    /// Seed used for generated traces
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// All steps
    pub steps: Vec<ExportStep>,

    /// Clock components of every process after the last step
    pub final_clocks: Vec<Vec<u64>>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl TraceExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, clock: &str, process_count: usize, seed: Option<u64>) -> Self {
        Self {
            scenario: scenario.to_string(),
            clock: clock.to_string(),
            process_count,
            seed,
            steps: Vec::new(),
            final_clocks: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Adds a step.
    pub fn add_step<T: Serialize>(
        &mut self,
        index: usize,
        description: String,
        notifications: &[DeliveryNotification<T>],
    ) -> Result<(), SimError> {
        let notifications = notifications
            .iter()
            .map(serde_json::to_value)
            .collect::<Result<Vec<_>, _>>()?;
        self.steps.push(ExportStep {
            index,
            description,
            notifications,
        });
        Ok(())
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, result: &ScenarioResult) {
        self.final_clocks = result.final_clocks.clone();
        self.passed = result.passed;
        self.failure_reason = result.failure_reason.clone();
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<(), SimError> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
