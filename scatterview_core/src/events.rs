//! Domain events consumed by a view layer.

use crate::matrix::MatrixName;
use crate::worker::WorkerStatus;
use scatterview_env::WorkerId;
use serde::{Deserialize, Serialize};

/// Phases of a scatter/compute/gather run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Scatter,
    Compute,
    Gather,
    Finalize,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Scatter => "scatter",
            Phase::Compute => "compute",
            Phase::Gather => "gather",
            Phase::Finalize => "finalize",
        };
        write!(f, "{}", name)
    }
}

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SimEvent {
    PhaseStarted {
        phase: Phase,
    },
    PhaseCompleted {
        phase: Phase,
    },
    WorkerStatusChanged {
        worker: WorkerId,
        status: WorkerStatus,
        annotation: String,
    },
    /// Highlight of a cell being read or produced
    CellComputing {
        matrix: MatrixName,
        row: usize,
        col: usize,
    },
    CellComputed {
        row: usize,
        col: usize,
        value: i64,
        worker: WorkerId,
    },
    /// A gathered row was written back into `C`
    RowCompleted {
        row: usize,
        worker: WorkerId,
    },
    RunCompleted,
    RunFailed {
        message: String,
    },
    LogMessage {
        text: String,
        level: LogLevel,
    },
}

impl SimEvent {
    /// Shorthand for an info log line.
    pub fn info(text: impl Into<String>) -> Self {
        SimEvent::LogMessage {
            text: text.into(),
            level: LogLevel::Info,
        }
    }

    /// Shorthand for a log line at any level.
    pub fn log(level: LogLevel, text: impl Into<String>) -> Self {
        SimEvent::LogMessage {
            text: text.into(),
            level,
        }
    }
}

/// An event stamped with its run epoch and the context clock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emitted {
    pub epoch: u64,
    pub at_ms: u64,
    pub event: SimEvent,
}
