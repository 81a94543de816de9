//! Run configuration passed explicitly into the engine.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Matrix sizes offered by the surrounding UI.
pub const SUPPORTED_MATRIX_SIZES: [usize; 3] = [2, 4, 8];

/// How the input matrices are populated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryMode {
    #[default]
    Random,
    Manual,
}

/// How a run is driven.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// All workers run concurrently until the run finishes
    #[default]
    Continuous,
    /// One step per `execute_next_step` call
    Stepwise,
}

impl std::str::FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continuous" | "run" => Ok(ExecutionMode::Continuous),
            "stepwise" | "step" => Ok(ExecutionMode::Stepwise),
            _ => Err(format!("Unknown execution mode: {}", s)),
        }
    }
}

impl std::str::FromStr for EntryMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "random" => Ok(EntryMode::Random),
            "manual" => Ok(EntryMode::Manual),
            _ => Err(format!("Unknown entry mode: {}", s)),
        }
    }
}

/// Configuration for a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Side length N of the square matrices
    pub matrix_size: usize,

    /// Number of simulated worker processes
    pub worker_count: usize,

    /// Random or manually entered inputs
    pub entry_mode: EntryMode,

    /// Continuous or stepwise execution
    pub execution_mode: ExecutionMode,

    /// Divides every animation delay
    pub speed_multiplier: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            matrix_size: 2,
            worker_count: 2,
            entry_mode: EntryMode::Random,
            execution_mode: ExecutionMode::Continuous,
            speed_multiplier: 1.0,
        }
    }
}

impl SimulationConfig {
    /// Creates a config for the given size and worker count.
    pub fn new(matrix_size: usize, worker_count: usize) -> Self {
        Self {
            matrix_size,
            worker_count,
            ..Self::default()
        }
    }

    /// Sets the execution mode.
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.execution_mode = mode;
        self
    }

    /// Sets the speed multiplier.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed_multiplier = speed;
        self
    }

    /// Checks the invariants the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_count == 0 {
            return Err(ConfigError::NoWorkers);
        }
        validate_speed(self.speed_multiplier)
    }

    /// Loads a config from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }
}

/// Rejects speed multipliers that are zero, negative, or not finite.
pub fn validate_speed(speed: f64) -> Result<(), ConfigError> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidSpeed(speed))
    }
}

/// Worker counts the UI offers for a matrix size: powers of two in `[2, size]`.
pub fn supported_worker_counts(matrix_size: usize) -> Vec<usize> {
    std::iter::successors(Some(2usize), |w| w.checked_mul(2))
        .take_while(|w| *w <= matrix_size)
        .collect()
}

/// Advisory check against the UI's menu; the engine runs any valid pair.
pub fn is_supported_pair(matrix_size: usize, worker_count: usize) -> bool {
    SUPPORTED_MATRIX_SIZES.contains(&matrix_size)
        && supported_worker_counts(matrix_size).contains(&worker_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SimulationConfig::default();
        assert_eq!(config.matrix_size, 2);
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.execution_mode, ExecutionMode::Continuous);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        assert_eq!(SimulationConfig::new(4, 0).validate(), Err(ConfigError::NoWorkers));
        assert!(SimulationConfig::new(0, 1).validate().is_ok());
        assert!(SimulationConfig::new(4, 2).with_speed(0.0).validate().is_err());
        assert!(SimulationConfig::new(4, 2).with_speed(-1.0).validate().is_err());
        assert!(SimulationConfig::new(4, 2).with_speed(f64::NAN).validate().is_err());
        // Outside the UI slider range is still fine
        assert!(SimulationConfig::new(4, 2).with_speed(25.0).validate().is_ok());
    }

    #[test]
    fn test_supported_worker_counts() {
        assert_eq!(supported_worker_counts(2), vec![2]);
        assert_eq!(supported_worker_counts(4), vec![2, 4]);
        assert_eq!(supported_worker_counts(8), vec![2, 4, 8]);
        assert!(is_supported_pair(8, 4));
        assert!(!is_supported_pair(8, 3));
        assert!(!is_supported_pair(3, 2));
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("step".parse::<ExecutionMode>(), Ok(ExecutionMode::Stepwise));
        assert_eq!("Continuous".parse::<ExecutionMode>(), Ok(ExecutionMode::Continuous));
        assert_eq!("manual".parse::<EntryMode>(), Ok(EntryMode::Manual));
        assert!("sideways".parse::<ExecutionMode>().is_err());
    }

    #[test]
    fn test_json_defaults_fill_missing_fields() {
        let config: SimulationConfig =
            serde_json::from_str(r#"{"matrix_size": 8, "execution_mode": "stepwise"}"#).unwrap();
        assert_eq!(config.matrix_size, 8);
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.execution_mode, ExecutionMode::Stepwise);
    }

    #[test]
    fn test_from_json_file_missing() {
        let err = SimulationConfig::from_json_file("/nonexistent/scatterview.json");
        assert!(matches!(err, Err(ConfigError::Load(_))));
    }
}
