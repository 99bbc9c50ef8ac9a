//! Matrix clock for unicast causal delivery.
//!
//! Process `p` keeps an N×N grid. Row `i` is `p`'s best knowledge of process
//! `i`'s vector clock; row `p` is `p`'s own vector clock. Carrying the whole
//! grid lets a receiver learn what the sender knew about everyone else, not
//! just what the sender itself has seen.

use crate::vector_clock::{causally_ready, write_components};
use causal_env::{CausalClock, ProcessId};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Immutable copy of a whole matrix clock.
///
/// Serialized as a list of rows (`[[1,0,0],[0,0,0],[0,0,0]]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "Vec<Vec<u64>>", try_from = "Vec<Vec<u64>>")]
pub struct MatrixTimestamp(DMatrix<u64>);

impl MatrixTimestamp {
    /// Builds a timestamp from explicit rows. Every row must have one entry per row.
    pub fn from_rows(rows: &[Vec<u64>]) -> Result<Self, String> {
        let n = rows.len();
        if let Some(bad) = rows.iter().position(|row| row.len() != n) {
            return Err(format!("row {} has {} entries, expected {}", bad, rows[bad].len(), n));
        }
        Ok(Self(DMatrix::from_fn(n, n, |i, k| rows[i][k])))
    }

    /// Returns `process`'s row: the snapshot owner's view of that process's vector clock.
    pub fn row(&self, process: ProcessId) -> Vec<u64> {
        self.0.row(process.index()).iter().copied().collect()
    }

    /// Returns a single cell.
    pub fn get(&self, row: ProcessId, column: ProcessId) -> u64 {
        self.0[(row.index(), column.index())]
    }

    /// Grid dimension.
    pub fn dimension(&self) -> usize {
        self.0.nrows()
    }

    /// Rows in process order.
    pub fn rows(&self) -> Vec<Vec<u64>> {
        (0..self.0.nrows())
            .map(|i| self.0.row(i).iter().copied().collect())
            .collect()
    }
}

impl From<MatrixTimestamp> for Vec<Vec<u64>> {
    fn from(ts: MatrixTimestamp) -> Self {
        ts.rows()
    }
}

impl TryFrom<Vec<Vec<u64>>> for MatrixTimestamp {
    type Error = String;

    fn try_from(rows: Vec<Vec<u64>>) -> Result<Self, Self::Error> {
        Self::from_rows(&rows)
    }
}

impl std::fmt::Display for MatrixTimestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_grid(f, &self.0)
    }
}

/// Matrix clock owned by one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixClock {
    owner: ProcessId,
    grid: DMatrix<u64>,
}

impl MatrixClock {
    /// Creates an all-zero grid for `owner` in a system of `process_count` processes.
    pub fn new(owner: ProcessId, process_count: usize) -> Self {
        assert!(owner.in_range(process_count), "{} outside {} processes", owner, process_count);
        Self {
            owner,
            grid: DMatrix::zeros(process_count, process_count),
        }
    }

    /// The owner's own vector clock (its row of the grid).
    pub fn own_row(&self) -> Vec<u64> {
        self.row(self.owner)
    }

    /// The owner's knowledge of `process`'s vector clock.
    pub fn row(&self, process: ProcessId) -> Vec<u64> {
        self.grid.row(process.index()).iter().copied().collect()
    }

    /// Returns a single cell.
    pub fn get(&self, row: ProcessId, column: ProcessId) -> u64 {
        self.grid[(row.index(), column.index())]
    }
}

impl CausalClock for MatrixClock {
    type Timestamp = MatrixTimestamp;

    fn owner(&self) -> ProcessId {
        self.owner
    }

    fn process_count(&self) -> usize {
        self.grid.nrows()
    }

    fn increment(&mut self) {
        let o = self.owner.index();
        self.grid[(o, o)] += 1;
    }

    fn snapshot(&self) -> MatrixTimestamp {
        MatrixTimestamp(self.grid.clone())
    }

    /// Compares the sender's own row in the snapshot against the receiver's
    /// own row, with the usual vector test.
    fn is_deliverable(&self, remote: &MatrixTimestamp, sender: ProcessId) -> bool {
        causally_ready(
            remote.0.row(sender.index()).iter(),
            self.grid.row(self.owner.index()).iter(),
            sender.index(),
        )
    }

    fn merge(&mut self, remote: &MatrixTimestamp, sender: ProcessId) {
        // Knowledge about every process only ever grows.
        self.grid = self.grid.zip_map(&remote.0, |a, b| a.max(b));

        // The receiver's own row moves forward to cover the sender's clock.
        let (o, j) = (self.owner.index(), sender.index());
        for k in 0..self.grid.ncols() {
            let theirs = remote.0[(j, k)];
            if theirs > self.grid[(o, k)] {
                self.grid[(o, k)] = theirs;
            }
        }
    }

    fn reset(&mut self) {
        self.grid.fill(0);
    }

    fn own_progress(&self) -> u64 {
        let o = self.owner.index();
        self.grid[(o, o)]
    }

    fn components(&self) -> Vec<u64> {
        // Row-major, so row i occupies components[i*N .. (i+1)*N].
        let n = self.grid.nrows();
        (0..n)
            .flat_map(|i| (0..n).map(move |k| (i, k)))
            .map(|cell| self.grid[cell])
            .collect()
    }

    /// Column-wise maximum. A process's own row dominates every other row it
    /// holds, so this equals the sender's vector clock.
    fn causal_vector(timestamp: &MatrixTimestamp) -> Vec<u64> {
        timestamp
            .0
            .column_iter()
            .map(|column| column.iter().copied().max().unwrap_or(0))
            .collect()
    }
}

impl std::fmt::Display for MatrixClock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write_grid(f, &self.grid)
    }
}

fn write_grid(f: &mut std::fmt::Formatter<'_>, grid: &DMatrix<u64>) -> std::fmt::Result {
    f.write_str("[")?;
    for i in 0..grid.nrows() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write_components(f, grid.row(i).iter())?;
    }
    f.write_str("]")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(i: usize) -> ProcessId {
        ProcessId(i)
    }

    #[test]
    fn test_increment_bumps_own_diagonal() {
        let mut clock = MatrixClock::new(p(1), 3);
        clock.increment();
        assert_eq!(clock.get(p(1), p(1)), 1);
        assert_eq!(clock.own_row(), vec![0, 1, 0]);
        assert_eq!(clock.components().iter().sum::<u64>(), 1);
    }

    #[test]
    fn test_snapshot_copies_whole_grid() {
        let mut clock = MatrixClock::new(p(0), 3);
        clock.increment();
        let ts = clock.snapshot();
        clock.increment();
        assert_eq!(ts.rows(), vec![vec![1, 0, 0], vec![0, 0, 0], vec![0, 0, 0]]);
        assert_eq!(clock.own_row(), vec![2, 0, 0]);
    }

    #[test]
    fn test_deliverable_uses_sender_row() {
        let receiver = MatrixClock::new(p(2), 3);
        let independent = MatrixTimestamp::from_rows(&[
            vec![0, 0, 0],
            vec![0, 1, 0],
            vec![0, 0, 0],
        ])
        .unwrap();
        assert!(receiver.is_deliverable(&independent, p(1)));

        let dependent = MatrixTimestamp::from_rows(&[
            vec![1, 0, 0],
            vec![1, 1, 0],
            vec![0, 0, 0],
        ])
        .unwrap();
        assert!(!receiver.is_deliverable(&dependent, p(1)));
    }

    #[test]
    fn test_merge_never_regresses_and_advances_own_row() {
        let mut p2 = MatrixClock::new(p(1), 3);
        let mut p1 = MatrixClock::new(p(0), 3);
        p1.increment();
        let m1 = p1.snapshot();

        assert!(p2.is_deliverable(&m1, p(0)));
        p2.merge(&m1, p(0));
        assert_eq!(p2.row(p(0)), vec![1, 0, 0]);
        assert_eq!(p2.own_row(), vec![1, 0, 0]);
        // Receiving does not count as own progress.
        assert_eq!(p2.own_progress(), 0);

        p2.increment();
        let m2 = p2.snapshot();
        assert_eq!(m2.row(p(1)), vec![1, 1, 0]);

        let mut p3 = MatrixClock::new(p(2), 3);
        assert!(!p3.is_deliverable(&m2, p(1)));
        p3.merge(&m1, p(0));
        assert!(p3.is_deliverable(&m2, p(1)));
        p3.merge(&m2, p(1));
        assert_eq!(p3.own_row(), vec![1, 1, 0]);
        assert_eq!(p3.row(p(1)), vec![1, 1, 0]);
        assert_eq!(p3.row(p(0)), vec![1, 0, 0]);
    }

    #[test]
    fn test_causal_vector_is_sender_clock() {
        let ts = MatrixTimestamp::from_rows(&[
            vec![1, 0, 0],
            vec![1, 1, 0],
            vec![0, 0, 0],
        ])
        .unwrap();
        assert_eq!(MatrixClock::causal_vector(&ts), vec![1, 1, 0]);
    }

    #[test]
    fn test_from_rows_rejects_ragged_grid() {
        assert!(MatrixTimestamp::from_rows(&[vec![1, 0], vec![0]]).is_err());
    }

    #[test]
    fn test_timestamp_serializes_as_rows() {
        let ts = MatrixTimestamp::from_rows(&[vec![1, 0], vec![0, 2]]).unwrap();
        assert_eq!(serde_json::to_string(&ts).unwrap(), "[[1,0],[0,2]]");
        assert_eq!(ts.to_string(), "[[1, 0], [0, 2]]");
    }
}
