//! SimWorld - The simulation harness container.

use crate::context::SimContext;
use crate::oracle::{Mismatch, Oracle};

use scatterview_core::{
    ExecutionMode, RecordingSink, RunOutcome, SimError, SimulationConfig, SimulationEngine,
    Step, StepOutcome,
};
use std::sync::Arc;
use tracing::debug;

/// Configuration for a simulation run.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Master seed for determinism
    pub seed: u64,

    /// Engine configuration
    pub engine: SimulationConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            engine: SimulationConfig::default(),
        }
    }
}

/// The SimWorld - one engine on a virtual clock with a recording sink.
pub struct SimWorld {
    /// Configuration
    pub config: SimConfig,

    /// Shared simulation context (virtual clock)
    pub context: Arc<SimContext>,

    /// Every event the engine emitted
    pub sink: Arc<RecordingSink>,

    /// The engine under test
    pub engine: SimulationEngine<SimContext>,
}

impl SimWorld {
    /// Creates a new SimWorld with the given configuration.
    pub fn new(config: SimConfig) -> Result<Self, SimError> {
        let context = SimContext::shared(config.seed);
        let sink = Arc::new(RecordingSink::new());
        let engine = SimulationEngine::new(context.clone(), sink.clone(), config.engine.clone())?;

        Ok(Self {
            config,
            context,
            sink,
            engine,
        })
    }

    /// Runs to completion in continuous mode.
    pub async fn run_continuous(&mut self) -> Result<RunOutcome, SimError> {
        self.engine.set_execution_mode(ExecutionMode::Continuous)?;
        Ok(self.engine.start().await)
    }

    /// Runs to completion in stepwise mode; returns the executed steps.
    pub async fn run_stepwise(&mut self) -> Result<Vec<Step>, SimError> {
        self.engine.set_execution_mode(ExecutionMode::Stepwise)?;
        self.engine.start().await;
        self.drain_steps().await
    }

    /// Executes steps until the queue reports completion.
    pub async fn drain_steps(&mut self) -> Result<Vec<Step>, SimError> {
        let mut visited = Vec::new();
        loop {
            match self.engine.execute_next_step().await {
                StepOutcome::Executed { index, total, step } => {
                    debug!("step {}/{}: {:?}", index + 1, total, step);
                    visited.push(step);
                }
                StepOutcome::Completed | StepOutcome::Idle => return Ok(visited),
            }
        }
    }

    /// Checks `C` against the ground truth.
    pub fn verify(&self) -> Result<(), Mismatch> {
        Oracle::new(self.engine.store()).verify(self.engine.store())
    }

    /// Virtual time elapsed so far, in milliseconds.
    pub fn elapsed_ms(&self) -> u64 {
        self.context.time_ns() / 1_000_000
    }
}
