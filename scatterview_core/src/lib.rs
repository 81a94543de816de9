//! ScatterView Core - row-wise scatter/compute/gather simulation
//!
//! Teaches how distributed matrix multiplication is organised:
//! 1. **Scatter**: the coordinator hands each worker a contiguous block of rows of `A`
//! 2. **Compute**: every worker produces its rows of `C = A x B`
//! 3. **Gather**: the coordinator collects the rows and finalises `C`
//!
//! The engine emits [`SimEvent`]s for a view layer and can be driven
//! continuously or one [`Step`] at a time.

pub mod assignment;
pub mod config;
pub mod engine;
pub mod epoch;
pub mod error;
pub mod events;
pub mod matrix;
pub mod mpi_template;
pub mod pacing;
pub mod planner;
pub mod sink;
pub mod worker;

// Re-export key types for convenience
pub use assignment::{assign, RowRange};
pub use config::{EntryMode, ExecutionMode, SimulationConfig};
pub use engine::{RunOutcome, SimulationEngine, StepOutcome};
pub use error::{ConfigError, SimError};
pub use events::{Emitted, LogLevel, Phase, SimEvent};
pub use matrix::{MatrixName, MatrixStore};
pub use pacing::Pacing;
pub use planner::{plan, Step};
pub use sink::{ChannelSink, EventSink, NullSink, RecordingSink, TracingSink};
pub use worker::{Worker, WorkerStatus};
