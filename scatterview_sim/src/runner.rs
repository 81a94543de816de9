//! Scenario runner - executes the named scenarios on a virtual clock.

use crate::oracle::Oracle;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimWorld};

use scatterview_core::assignment::owner_of;
use scatterview_core::{
    assign, plan, MatrixName, RunOutcome, SimError, SimEvent, SimulationConfig, Step,
    WorkerStatus,
};
use scatterview_env::WorkerId;
use tracing::{debug, info};

/// Results from running a scenario.
#[derive(Debug, Clone)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: ScenarioId,

    /// Seed used
    pub seed: u64,

    /// Whether scenario passed all assertions
    pub passed: bool,

    /// Failure message if any
    pub failure_reason: Option<String>,

    /// Metrics collected during run
    pub metrics: ScenarioMetrics,
}

/// Metrics collected during scenario execution.
#[derive(Debug, Clone, Default)]
pub struct ScenarioMetrics {
    /// Stepwise steps executed
    pub steps_executed: u64,

    /// Events recorded by the sink
    pub events_emitted: u64,

    /// `CellComputed` events
    pub cells_computed: u64,

    /// Virtual time consumed (ms)
    pub virtual_time_ms: u64,
}

impl ScenarioMetrics {
    fn absorb(&mut self, world: &SimWorld) {
        let events = world.sink.events();
        self.events_emitted += events.len() as u64;
        self.cells_computed += events
            .iter()
            .filter(|e| matches!(e, SimEvent::CellComputed { .. }))
            .count() as u64;
        self.virtual_time_ms += world.elapsed_ms();
    }
}

/// Outcome of a scenario body before it is wrapped into a result.
type Check = Result<ScenarioMetrics, String>;

fn ensure(condition: bool, reason: impl FnOnce() -> String) -> Result<(), String> {
    if condition {
        Ok(())
    } else {
        Err(reason())
    }
}

fn sim(e: SimError) -> String {
    e.to_string()
}

const TEXTBOOK_A: [[i64; 2]; 2] = [[1, 2], [3, 4]];
const TEXTBOOK_B: [[i64; 2]; 2] = [[5, 6], [7, 8]];

fn to_rows(m: [[i64; 2]; 2]) -> Vec<Vec<i64>> {
    m.iter().map(|r| r.to_vec()).collect()
}

/// Runs scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,

    /// Speed multiplier handed to every engine
    speed: f64,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self { seed, speed: 1.0 }
    }

    /// Sets the speed multiplier.
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    fn world(&self, n: usize, w: usize) -> Result<SimWorld, String> {
        SimWorld::new(SimConfig {
            seed: self.seed,
            engine: SimulationConfig::new(n, w).with_speed(self.speed),
        })
        .map_err(sim)
    }

    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);

        let check = match scenario {
            ScenarioId::Textbook => self.run_textbook().await,
            ScenarioId::UnevenRows => self.run_uneven_rows().await,
            ScenarioId::IdleWorkers => self.run_idle_workers().await,
            ScenarioId::ModeParity => self.run_mode_parity().await,
            ScenarioId::FullGrid => self.run_full_grid().await,
            ScenarioId::ResetMidway => self.run_reset_midway().await,
        };

        match check {
            Ok(metrics) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: true,
                failure_reason: None,
                metrics,
            },
            Err(reason) => ScenarioResult {
                scenario,
                seed: self.seed,
                passed: false,
                failure_reason: Some(reason),
                metrics: ScenarioMetrics::default(),
            },
        }
    }

    async fn run_textbook(&self) -> Check {
        let a = to_rows(TEXTBOOK_A);
        let b = to_rows(TEXTBOOK_B);
        let expected = Oracle::from_rows(&a, &b).expected_rows();
        ensure(expected == vec![vec![19, 22], vec![43, 50]], || {
            format!("textbook product {:?}", expected)
        })?;
        let mut metrics = ScenarioMetrics::default();

        let mut stepwise = self.world(2, 2)?;
        stepwise.engine.load_matrices(&a, &b).map_err(sim)?;
        let steps = stepwise.run_stepwise().await.map_err(sim)?;

        let compute = |w: usize, row: usize, col: usize| Step::Compute {
            worker: WorkerId(w),
            row,
            col,
        };
        let order = vec![
            Step::Scatter,
            compute(0, 0, 0),
            compute(0, 0, 1),
            compute(1, 1, 0),
            compute(1, 1, 1),
            Step::Gather,
            Step::Finalize,
        ];
        ensure(steps == order, || format!("unexpected step order {:?}", steps))?;
        let c = stepwise.engine.store().rows(MatrixName::C);
        ensure(c == expected, || format!("stepwise C = {:?}", c))?;
        metrics.steps_executed += steps.len() as u64;
        metrics.absorb(&stepwise);

        let mut continuous = self.world(2, 2)?;
        continuous.engine.load_matrices(&a, &b).map_err(sim)?;
        let outcome = continuous.run_continuous().await.map_err(sim)?;
        ensure(outcome == RunOutcome::Completed, || format!("continuous run: {:?}", outcome))?;
        let c = continuous.engine.store().rows(MatrixName::C);
        ensure(c == expected, || format!("continuous C = {:?}", c))?;
        metrics.absorb(&continuous);

        Ok(metrics)
    }

    async fn run_uneven_rows(&self) -> Check {
        let ranges = assign(3, 2);
        ensure(ranges[1].len() == 1, || {
            format!("worker 1 owns {} rows, expected 1", ranges[1].len())
        })?;

        let mut world = self.world(3, 2)?;
        world.run_continuous().await.map_err(sim)?;
        world.verify().map_err(|m| m.to_string())?;

        let rows_of_worker_1: Vec<usize> = world
            .sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SimEvent::RowCompleted { row, worker } if worker == WorkerId(1) => Some(row),
                _ => None,
            })
            .collect();
        ensure(rows_of_worker_1 == vec![2], || {
            format!("worker 1 wrote rows {:?}", rows_of_worker_1)
        })?;

        let oracle = Oracle::new(world.engine.store());
        for event in world.sink.events() {
            if let SimEvent::CellComputed { row, col, value, .. } = event {
                ensure(oracle.expected(row, col) == Some(value), || {
                    format!("reported C[{}][{}] = {}", row, col, value)
                })?;
            }
        }

        let mut metrics = ScenarioMetrics::default();
        metrics.absorb(&world);
        Ok(metrics)
    }

    async fn run_idle_workers(&self) -> Check {
        let mut world = self.world(2, 4)?;
        let steps = world.run_stepwise().await.map_err(sim)?;
        world.verify().map_err(|m| m.to_string())?;

        let idle_compute = steps
            .iter()
            .any(|s| matches!(s, Step::Compute { worker, .. } if worker.index() >= 2));
        ensure(!idle_compute, || "an idle worker was given a compute step".to_string())?;
        ensure(steps.len() == 7, || format!("{} steps, expected 7", steps.len()))?;
        let all_done = world
            .engine
            .workers()
            .iter()
            .all(|w| w.status == WorkerStatus::Completed);
        ensure(all_done, || "not every worker reached completed".to_string())?;

        let mut metrics = ScenarioMetrics {
            steps_executed: steps.len() as u64,
            ..ScenarioMetrics::default()
        };
        metrics.absorb(&world);
        Ok(metrics)
    }

    async fn run_mode_parity(&self) -> Check {
        let mut continuous = self.world(8, 4)?;
        let mut stepwise = self.world(8, 4)?;

        continuous.run_continuous().await.map_err(sim)?;
        let steps = stepwise.run_stepwise().await.map_err(sim)?;

        let c1 = continuous.engine.store().rows(MatrixName::C);
        let c2 = stepwise.engine.store().rows(MatrixName::C);
        ensure(c1 == c2, || "continuous and stepwise results differ".to_string())?;
        continuous.verify().map_err(|m| m.to_string())?;

        let mut metrics = ScenarioMetrics {
            steps_executed: steps.len() as u64,
            ..ScenarioMetrics::default()
        };
        metrics.absorb(&continuous);
        metrics.absorb(&stepwise);
        Ok(metrics)
    }

    async fn run_full_grid(&self) -> Check {
        let mut world = self.world(8, 8)?;
        world.run_continuous().await.map_err(sim)?;
        world.verify().map_err(|m| m.to_string())?;

        let mut per_worker = [0usize; 8];
        for event in world.sink.events() {
            if let SimEvent::CellComputed { row, worker, .. } = event {
                ensure(owner_of(row, 8, 8) == Some(worker), || {
                    format!("{} computed row {} it does not own", worker, row)
                })?;
                per_worker[worker.index()] += 1;
            }
        }
        ensure(per_worker.iter().all(|c| *c == 8), || {
            format!("cells per worker {:?}", per_worker)
        })?;

        let mut metrics = ScenarioMetrics::default();
        metrics.absorb(&world);
        Ok(metrics)
    }

    async fn run_reset_midway(&self) -> Check {
        let mut world = self.world(4, 2)?;
        world
            .engine
            .set_execution_mode(scatterview_core::ExecutionMode::Stepwise)
            .map_err(sim)?;
        world.engine.start().await;

        let half = plan(4, 2).len() / 2;
        for _ in 0..half {
            world.engine.execute_next_step().await;
        }
        let epoch = world.engine.epoch();
        world.engine.reset();
        ensure(!world.engine.is_running(), || "still running after reset".to_string())?;
        ensure(world.engine.epoch() > epoch, || "epoch did not advance".to_string())?;
        debug!("reset after {} steps", half);

        world.engine.start().await;
        let steps = world.drain_steps().await.map_err(sim)?;
        ensure(steps.len() == plan(4, 2).len(), || {
            format!("fresh run executed {} steps", steps.len())
        })?;
        Oracle::new(world.engine.store())
            .verify(world.engine.store())
            .map_err(|m| m.to_string())?;

        let mut metrics = ScenarioMetrics {
            steps_executed: (half + steps.len()) as u64,
            ..ScenarioMetrics::default()
        };
        metrics.absorb(&world);
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_all_scenarios_pass() {
        let runner = ScenarioRunner::new(42);
        for id in ScenarioId::all() {
            let result = runner.run(id).await;
            assert!(result.passed, "{} failed: {:?}", id, result.failure_reason);
        }
    }

    #[tokio::test]
    async fn test_scenarios_pass_across_seeds_and_speeds() {
        for seed in [1, 7, 1234] {
            let runner = ScenarioRunner::new(seed).with_speed(3.0);
            let result = runner.run(ScenarioId::ModeParity).await;
            assert!(result.passed, "seed {}: {:?}", seed, result.failure_reason);
        }
    }

    #[tokio::test]
    async fn test_metrics() {
        let result = ScenarioRunner::new(5).run(ScenarioId::FullGrid).await;
        assert_eq!(result.metrics.cells_computed, 64);
        assert!(result.metrics.events_emitted > 64);
        assert!(result.metrics.virtual_time_ms >= 2000);

        let result = ScenarioRunner::new(5).run(ScenarioId::Textbook).await;
        assert_eq!(result.metrics.steps_executed, 7);
        // 4 cells stepwise + 4 cells continuous
        assert_eq!(result.metrics.cells_computed, 8);
    }

    #[tokio::test]
    async fn test_faster_speed_uses_less_virtual_time() {
        let slow = ScenarioRunner::new(3).with_speed(0.5).run(ScenarioId::IdleWorkers).await;
        let fast = ScenarioRunner::new(3).with_speed(2.0).run(ScenarioId::IdleWorkers).await;
        assert!(fast.metrics.virtual_time_ms < slow.metrics.virtual_time_ms);
    }
}
