//! Built-in classroom scenarios.

use crate::trace::{EventTrace, TraceEvent};
use causal_core::UnknownVariant;
use causal_env::CausalError;

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// Two concurrent messages reach P3 out of order; neither waits
    Independent,

    /// m2 depends on m1 and overtakes it; P3 buffers m2 until m1 arrives
    Dependency,

    /// Two buffered messages at P3, released by two successive arrivals
    Chain,

    /// Seven broadcasts exchanged among three processes
    Classroom,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::Independent,
            ScenarioId::Dependency,
            ScenarioId::Chain,
            ScenarioId::Classroom,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::Independent => "independent",
            ScenarioId::Dependency => "dependency",
            ScenarioId::Chain => "chain",
            ScenarioId::Classroom => "classroom",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::Independent => "Concurrent m1 (P1) and m2 (P2) reach P3 in reverse order",
            ScenarioId::Dependency => "P2 sends m2 after delivering m1; m2 overtakes m1 at P3",
            ScenarioId::Chain => "Two messages wait at P3 and are released one arrival at a time",
            ScenarioId::Classroom => "Seven broadcasts m0..m6 with two buffered arrivals at P3",
        }
    }

    /// Number of processes the scenario is written for.
    pub fn process_count(&self) -> usize {
        3
    }

    /// Builds the validated trace.
    pub fn trace(&self) -> Result<EventTrace, CausalError> {
        EventTrace::load(self.process_count(), self.events())
    }

    fn events(&self) -> Vec<TraceEvent> {
        use crate::trace::TraceEvent as E;

        match self {
            ScenarioId::Independent => vec![
                E::send(0, 2, "m1"),
                E::send(1, 2, "m2"),
                E::receive(1, 2, "m2"),
                E::receive(0, 2, "m1"),
            ],
            ScenarioId::Dependency => vec![
                E::broadcast(0, "m1"),
                E::receive(0, 1, "m1"),
                E::send(1, 2, "m2"),
                E::receive(1, 2, "m2"),
                E::receive(0, 2, "m1"),
            ],
            ScenarioId::Chain => vec![
                E::broadcast(0, "m1"),
                E::receive(0, 1, "m1"),
                E::broadcast(1, "m2"),
                E::receive(1, 0, "m2"),
                E::broadcast(0, "m3"),
                E::receive(0, 1, "m3"),
                E::broadcast(1, "m4"),
                // P3 hears from P2 first: m2 waits on m1, m4 waits on m3
                E::receive(1, 2, "m2"),
                E::receive(1, 2, "m4"),
                E::receive(0, 2, "m1"),
                E::receive(0, 2, "m3"),
                E::receive(1, 0, "m4"),
            ],
            ScenarioId::Classroom => vec![
                E::broadcast(0, "m0"),
                E::broadcast(0, "m1"),
                E::receive(0, 1, "m0"),
                E::receive(0, 1, "m1"),
                E::receive(0, 2, "m0"),
                E::broadcast(1, "m2"),
                E::broadcast(0, "m3"),
                E::receive(1, 2, "m2"),
                E::receive(0, 2, "m1"),
                E::receive(1, 0, "m2"),
                E::receive(0, 1, "m3"),
                E::broadcast(1, "m4"),
                E::receive(1, 2, "m4"),
                E::receive(1, 0, "m4"),
                E::receive(0, 2, "m3"),
                E::broadcast(2, "m5"),
                E::receive(2, 0, "m5"),
                E::receive(2, 1, "m5"),
                E::broadcast(1, "m6"),
                E::receive(1, 0, "m6"),
                E::receive(1, 2, "m6"),
            ],
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "independent" | "concurrent" => Ok(ScenarioId::Independent),
            "dependency" | "dependent" => Ok(ScenarioId::Dependency),
            "chain" => Ok(ScenarioId::Chain),
            "classroom" | "bss" => Ok(ScenarioId::Classroom),
            _ => Err(UnknownVariant::new("scenario", s)),
        }
    }
}
