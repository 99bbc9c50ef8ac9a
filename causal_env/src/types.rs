//! Common identifiers shared by the engine and the simulation harness.

use serde::{Deserialize, Serialize};

/// Index of a process in the simulated system.
///
/// Processes are numbered `0..N`. They are displayed 1-based (`P1`, `P2`, ...)
/// to match the usual classroom notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProcessId(pub usize);

impl ProcessId {
    /// Returns the zero-based index.
    pub fn index(&self) -> usize {
        self.0
    }

    /// Iterates over every process id in a system of `process_count` processes.
    pub fn all(process_count: usize) -> impl Iterator<Item = ProcessId> {
        (0..process_count).map(ProcessId)
    }

    /// Returns true if this id is valid for `process_count` processes.
    pub fn in_range(&self, process_count: usize) -> bool {
        self.0 < process_count
    }
}

impl From<usize> for ProcessId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0 + 1)
    }
}

/// Engine-assigned message identity.
///
/// Ids are handed out in send order, so on any single channel they grow
/// monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Opaque label attached to a message by the trace author.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PayloadTag(pub String);

impl PayloadTag {
    /// Creates a tag from anything string-like.
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Returns the tag text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for PayloadTag {
    fn from(tag: &str) -> Self {
        Self(tag.to_string())
    }
}

impl std::fmt::Display for PayloadTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
