//! Error types for the simulation core.

use scatterview_env::WorkerId;
use thiserror::Error;

/// Rejected simulation configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// At least one worker is required to own rows
    #[error("Worker count must be at least 1")]
    NoWorkers,

    /// Speed multiplier would divide delays by zero, flip their sign, or be NaN
    #[error("Speed multiplier must be a positive finite number, got {0}")]
    InvalidSpeed(f64),

    /// Config file could not be read or parsed
    #[error("Failed to load config: {0}")]
    Load(String),
}

/// Errors raised by the simulation engine.
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Operation not allowed while a run is in progress
    #[error("A simulation run is already in progress")]
    Busy,

    /// Supplied matrices are not square or not of equal size
    #[error("Invalid matrix shape: {0}")]
    InvalidShape(String),

    /// A worker task panicked or was cancelled
    #[error("Worker {worker} failed: {message}")]
    WorkerFailed { worker: WorkerId, message: String },

    /// Work belonging to a superseded run
    #[error("Stale epoch: expected {expected}, found {found}")]
    StaleEpoch { expected: u64, found: u64 },
}
