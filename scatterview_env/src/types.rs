//! Common types for the ScatterView environment abstraction.

use serde::{Deserialize, Serialize};

/// Identifier of a simulated worker process.
///
/// Ids are dense in `0..worker_count`; id 0 is the coordinator ("master")
/// that scatters input rows and gathers results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WorkerId(pub usize);

impl WorkerId {
    /// The coordinator process.
    pub const COORDINATOR: WorkerId = WorkerId(0);

    /// Returns the zero-based index.
    pub fn index(&self) -> usize {
        self.0
    }

    /// Returns true for the coordinator (rank 0).
    pub fn is_coordinator(&self) -> bool {
        self.0 == 0
    }

    /// Iterates over the ids of a pool of `count` workers.
    pub fn range(count: usize) -> impl Iterator<Item = WorkerId> {
        (0..count).map(WorkerId)
    }
}

impl std::fmt::Display for WorkerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "P{}", self.0)
    }
}
