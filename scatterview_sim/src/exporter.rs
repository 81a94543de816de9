//! JSON exporter for run replays.
//!
//! Captures every event of a run together with the final `C`, so a
//! front end can replay the animation offline.

use crate::world::SimWorld;

use scatterview_core::{Emitted, MatrixName, SimulationConfig};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use uuid::Uuid;

/// Complete simulation export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimExport {
    /// Unique id of this export
    pub run_id: Uuid,

    /// Scenario name, or "custom" for ad-hoc runs
    pub scenario: String,

    /// Seed used
    pub seed: u64,

    /// Engine configuration
    pub config: SimulationConfig,

    /// Virtual duration in milliseconds
    pub duration_ms: u64,

    /// Every event in emission order
    pub events: Vec<Emitted>,

    /// Output matrix at the end of the run
    pub final_c: Vec<Vec<i64>>,

    /// Final results
    pub passed: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SimExport {
    /// Creates a new export container.
    pub fn new(scenario: &str, seed: u64, config: SimulationConfig) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            scenario: scenario.to_string(),
            seed,
            config,
            duration_ms: 0,
            events: Vec::new(),
            final_c: Vec::new(),
            passed: false,
            failure_reason: None,
        }
    }

    /// Copies the recorded events and the output matrix out of a world.
    pub fn capture(&mut self, world: &SimWorld) {
        self.record(
            world.sink.snapshot(),
            world.engine.store().rows(MatrixName::C),
            world.elapsed_ms(),
        );
    }

    /// Stores a timeline collected outside a `SimWorld`.
    pub fn record(&mut self, events: Vec<Emitted>, final_c: Vec<Vec<i64>>, duration_ms: u64) {
        self.events = events;
        self.final_c = final_c;
        self.duration_ms = duration_ms;
    }

    /// Finalizes the export.
    pub fn finalize(&mut self, passed: bool, failure_reason: Option<String>) {
        self.passed = passed;
        self.failure_reason = failure_reason;
    }

    /// Writes to a JSON file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> std::io::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let mut file = File::create(path)?;
        file.write_all(json.as_bytes())?;
        Ok(())
    }
}
