//! Step Planner - flattens a work assignment into discrete steps.
//!
//! The queue for `(N, W)` is always:
//!
//! ```text
//! Scatter, Compute(w0, r, c)..., Compute(w1, r, c)..., ..., Gather, Finalize
//! ```
//!
//! with compute steps in worker-id order and row-major order within a worker.

use crate::assignment::assign;
use scatterview_env::WorkerId;
use serde::{Deserialize, Serialize};

/// One atomic, replayable unit of stepwise execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    Scatter,
    Compute {
        worker: WorkerId,
        row: usize,
        col: usize,
    },
    Gather,
    Finalize,
}

impl Step {
    /// Human-readable label for the step log.
    pub fn description(&self) -> String {
        match self {
            Step::Scatter => "Scatter matrix data to processes".to_string(),
            Step::Compute { worker, row, col } => {
                format!("Process {}: Computing C[{}][{}]", worker.index(), row, col)
            }
            Step::Gather => "Gather results from processes".to_string(),
            Step::Finalize => "Simulation completed".to_string(),
        }
    }
}

/// Number of steps `plan(n, _)` produces.
pub fn step_count(matrix_size: usize) -> usize {
    matrix_size * matrix_size + 3
}

/// Builds the step queue for `(N, W)`.
pub fn plan(matrix_size: usize, worker_count: usize) -> Vec<Step> {
    let mut steps = Vec::with_capacity(step_count(matrix_size));
    steps.push(Step::Scatter);

    for range in assign(matrix_size, worker_count).iter().filter(|r| r.is_active()) {
        for row in range.rows() {
            for col in 0..matrix_size {
                steps.push(Step::Compute {
                    worker: range.worker,
                    row,
                    col,
                });
            }
        }
    }

    steps.push(Step::Gather);
    steps.push(Step::Finalize);
    steps
}
