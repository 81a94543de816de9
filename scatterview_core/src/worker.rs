//! Simulated worker processes.

use scatterview_env::WorkerId;
use serde::{Deserialize, Serialize};

/// Lifecycle status shown on a process node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    #[default]
    Idle,
    Distributing,
    Computing,
    Gathering,
    Completed,
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            WorkerStatus::Idle => "Idle",
            WorkerStatus::Distributing => "Distributing",
            WorkerStatus::Computing => "Computing",
            WorkerStatus::Gathering => "Gathering",
            WorkerStatus::Completed => "Completed",
        };
        write!(f, "{}", label)
    }
}

/// A simulated process node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Worker {
    pub id: WorkerId,
    pub status: WorkerStatus,
    pub annotation: String,
}

impl Worker {
    /// Creates an idle worker.
    pub fn new(id: WorkerId) -> Self {
        Self {
            id,
            status: WorkerStatus::Idle,
            annotation: String::new(),
        }
    }

    /// Display name, e.g. `Process 0 (Master)`.
    pub fn label(&self) -> String {
        if self.id.is_coordinator() {
            format!("Process {} (Master)", self.id.index())
        } else {
            format!("Process {}", self.id.index())
        }
    }
}

/// Creates a fresh pool of idle workers.
pub fn spawn_pool(count: usize) -> Vec<Worker> {
    WorkerId::range(count).map(Worker::new).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool() {
        let pool = spawn_pool(3);
        assert_eq!(pool.len(), 3);
        assert!(pool.iter().all(|w| w.status == WorkerStatus::Idle));
        assert_eq!(pool[0].label(), "Process 0 (Master)");
        assert_eq!(pool[2].label(), "Process 2");
    }
}
