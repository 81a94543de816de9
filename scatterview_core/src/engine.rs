//! Simulation Engine - drives a scatter/compute/gather run.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    SimulationEngine<Ctx>                     │
//! │  config ──► assign(N, W) ──► continuous: one task per worker │
//! │                        └──► stepwise:  plan(N, W) queue      │
//! │                                                              │
//! │  Ctx: ScatterContext   (clock, sleep, jitter, rng)           │
//! │  EventSink             (view layer)                          │
//! │  EpochGate             (drops work from superseded runs)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Continuous mode runs every active worker as its own task over a read-only
//! snapshot of `A` and `B`. Workers only report values; `C` is written by the
//! engine after all of them have joined, so no two writers ever touch it.
//! Stepwise mode pulls one [`Step`] at a time and writes each cell directly.
//!
//! # Usage
//!
//! ```ignore
//! let ctx = TokioContext::shared();
//! let sink = Arc::new(TracingSink);
//! let mut engine = SimulationEngine::new(ctx, sink, SimulationConfig::new(4, 2))?;
//! engine.start().await;
//! ```

use crate::assignment::{assign, RowRange};
use crate::config::{validate_speed, EntryMode, ExecutionMode, SimulationConfig};
use crate::epoch::EpochGate;
use crate::error::{ConfigError, SimError};
use crate::events::{Emitted, LogLevel, Phase, SimEvent};
use crate::matrix::{MatrixName, MatrixStore, Operands};
use crate::pacing::Pacing;
use crate::planner::{plan, Step};
use crate::sink::EventSink;
use crate::worker::{spawn_pool, Worker, WorkerStatus};

use scatterview_env::{ScatterContext, WorkerId};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Result of calling [`SimulationEngine::start`].
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// A run was already in progress
    Ignored,
    /// Continuous run finished and `C` holds the product
    Completed,
    /// Stepwise run initialised; drive it with `execute_next_step`
    Stepping { total_steps: usize },
    /// Continuous run aborted; the engine is idle again
    Failed { message: String },
}

/// Result of calling [`SimulationEngine::execute_next_step`].
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// No step queue has been built since the last reset
    Idle,
    /// Executed the step at `index` (zero-based)
    Executed {
        index: usize,
        total: usize,
        step: Step,
    },
    /// Queue exhausted; the run is complete
    Completed,
}

/// Stamps and delivers events for one epoch.
struct Reporter<Ctx: ScatterContext> {
    context: Arc<Ctx>,
    sink: Arc<dyn EventSink>,
    gate: EpochGate,
    epoch: u64,
}

impl<Ctx: ScatterContext> Reporter<Ctx> {
    fn emit(&self, event: SimEvent) -> Result<(), SimError> {
        self.gate.check(self.epoch)?;
        self.sink.emit(Emitted {
            epoch: self.epoch,
            at_ms: self.context.now().as_millis() as u64,
            event,
        });
        Ok(())
    }

    async fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            self.context.sleep(delay).await;
        }
    }
}

/// Rows computed by one worker task.
#[derive(Debug)]
struct WorkerResult {
    worker: WorkerId,
    start_row: usize,
    rows: Vec<Vec<i64>>,
}

/// Everything a worker task owns.
struct WorkerJob<Ctx: ScatterContext> {
    range: RowRange,
    operands: Operands,
    reporter: Reporter<Ctx>,
    pacing: Pacing,
    speed: f64,
}

impl<Ctx: ScatterContext> WorkerJob<Ctx> {
    fn jitter(&self, (min, max): (u64, u64)) -> Duration {
        let raw = self
            .reporter
            .context
            .jitter(Duration::from_millis(min), Duration::from_millis(max));
        Pacing::scale(raw, self.speed)
    }

    async fn run(self) -> Result<WorkerResult, SimError> {
        let n = self.operands.size();
        let worker = self.range.worker;
        let mut rows = Vec::with_capacity(self.range.len());

        for row in self.range.rows() {
            let mut values = vec![0; n];
            for (col, slot) in values.iter_mut().enumerate() {
                self.reporter.emit(SimEvent::CellComputing {
                    matrix: MatrixName::C,
                    row,
                    col,
                })?;

                let mut cell = 0;
                for k in 0..n {
                    self.reporter.emit(SimEvent::CellComputing {
                        matrix: MatrixName::A,
                        row,
                        col: k,
                    })?;
                    self.reporter.emit(SimEvent::CellComputing {
                        matrix: MatrixName::B,
                        row: k,
                        col,
                    })?;
                    cell += self.operands.term(row, col, k);
                    self.reporter.pause(self.jitter(self.pacing.multiply_jitter_ms)).await;
                }

                *slot = cell;
                self.reporter.emit(SimEvent::CellComputed {
                    row,
                    col,
                    value: cell,
                    worker,
                })?;
                self.reporter.pause(self.jitter(self.pacing.settle_jitter_ms)).await;
            }
            rows.push(values);
        }

        debug!("{} finished rows {:?}", worker, self.range.rows());
        Ok(WorkerResult {
            worker,
            start_row: self.range.start_row,
            rows,
        })
    }
}

/// Clears the running flag when a continuous run ends, however it ends.
struct RunGuard(Arc<AtomicBool>);

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Extracts a readable message from a failed worker task.
fn describe_join_error(err: tokio::task::JoinError) -> String {
    if err.is_cancelled() {
        return "task cancelled".to_string();
    }
    match err.try_into_panic() {
        Ok(payload) => {
            if let Some(msg) = payload.downcast_ref::<&str>() {
                format!("panicked: {}", msg)
            } else if let Some(msg) = payload.downcast_ref::<String>() {
                format!("panicked: {}", msg)
            } else {
                "panicked".to_string()
            }
        }
        Err(err) => err.to_string(),
    }
}

/// The simulation engine.
///
/// Generic over the context so the same code animates in real time
/// (`TokioContext`) or replays instantly on a virtual clock.
pub struct SimulationEngine<Ctx: ScatterContext> {
    context: Arc<Ctx>,
    sink: Arc<dyn EventSink>,
    config: SimulationConfig,
    pacing: Pacing,
    store: MatrixStore,
    workers: Vec<Worker>,
    running: Arc<AtomicBool>,
    step_queue: Vec<Step>,
    current_step: usize,
    gate: EpochGate,
    /// Seed extension for the next matrix generation
    generation: u64,
}

impl<Ctx: ScatterContext> SimulationEngine<Ctx> {
    /// Creates an engine with freshly generated inputs and idle workers.
    pub fn new(
        context: Arc<Ctx>,
        sink: Arc<dyn EventSink>,
        config: SimulationConfig,
    ) -> Result<Self, SimError> {
        config.validate()?;

        let mut engine = Self {
            context,
            sink,
            store: MatrixStore::zeros(config.matrix_size),
            workers: spawn_pool(config.worker_count),
            config,
            pacing: Pacing::default(),
            running: Arc::new(AtomicBool::new(false)),
            step_queue: Vec::new(),
            current_step: 0,
            gate: EpochGate::new(),
            generation: 0,
        };
        engine.regenerate();
        Ok(engine)
    }

    /// Replaces the nominal delays.
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    // ------------------------------------------------------------------
    // Configuration
    // ------------------------------------------------------------------

    /// Applies a new configuration between runs.
    ///
    /// A changed worker count recreates every worker. A changed size, a
    /// switch back to random entry, or a changed worker count under random
    /// entry regenerates the inputs.
    pub fn configure(&mut self, config: SimulationConfig) -> Result<(), SimError> {
        if self.is_running() {
            return Err(SimError::Busy);
        }
        config.validate()?;

        let workers_changed = config.worker_count != self.config.worker_count;
        let regenerate = config.matrix_size != self.config.matrix_size
            || (config.entry_mode != self.config.entry_mode
                && config.entry_mode == EntryMode::Random)
            || (workers_changed && config.entry_mode == EntryMode::Random);

        self.config = config;
        if workers_changed {
            self.workers = spawn_pool(self.config.worker_count);
            self.step_queue.clear();
            self.current_step = 0;
        }
        if regenerate {
            self.regenerate();
        }
        info!(
            "Configured {}x{} matrices on {} workers",
            self.config.matrix_size, self.config.matrix_size, self.config.worker_count
        );
        Ok(())
    }

    /// Changes the speed multiplier; takes effect at the next delay.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), ConfigError> {
        validate_speed(speed)?;
        self.config.speed_multiplier = speed;
        Ok(())
    }

    /// Switches between continuous and stepwise execution between runs.
    pub fn set_execution_mode(&mut self, mode: ExecutionMode) -> Result<(), SimError> {
        if self.is_running() {
            return Err(SimError::Busy);
        }
        self.config.execution_mode = mode;
        Ok(())
    }

    /// Draws new random inputs and zeroes `C`.
    pub fn randomize(&mut self) -> Result<(), SimError> {
        if self.is_running() {
            return Err(SimError::Busy);
        }
        self.regenerate();
        Ok(())
    }

    /// Loads explicit inputs. Their size must match the configuration.
    pub fn load_matrices(&mut self, a: &[Vec<i64>], b: &[Vec<i64>]) -> Result<(), SimError> {
        if self.is_running() {
            return Err(SimError::Busy);
        }
        let store = MatrixStore::from_rows(a, b)?;
        if store.size() != self.config.matrix_size {
            return Err(SimError::InvalidShape(format!(
                "expected {0}x{0} inputs, got {1}x{1}",
                self.config.matrix_size,
                store.size()
            )));
        }
        self.store = store;
        Ok(())
    }

    /// Manual entry of one input cell. Ignored while a run is in progress.
    pub fn set_cell(&mut self, matrix: MatrixName, row: usize, col: usize, value: i64) {
        if self.is_running() {
            warn!("Ignoring edit of {}[{}][{}] during a run", matrix, row, col);
            return;
        }
        self.store.set_cell(matrix, row, col, value);
    }

    fn regenerate(&mut self) {
        self.generation += 1;
        let mut rng = self.context.derive_rng(self.generation);
        self.store.generate_random(self.config.matrix_size, &mut rng);
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn store(&self) -> &MatrixStore {
        &self.store
    }

    pub fn workers(&self) -> &[Worker] {
        &self.workers
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn execution_mode(&self) -> ExecutionMode {
        self.config.execution_mode
    }

    pub fn speed_multiplier(&self) -> f64 {
        self.config.speed_multiplier
    }

    /// Index of the next step to execute.
    pub fn current_step(&self) -> usize {
        self.current_step
    }

    /// The stepwise queue of the current run (empty outside stepwise runs).
    pub fn step_queue(&self) -> &[Step] {
        &self.step_queue
    }

    /// The current run epoch.
    pub fn epoch(&self) -> u64 {
        self.gate.current()
    }

    pub fn context(&self) -> &Arc<Ctx> {
        &self.context
    }

    // ------------------------------------------------------------------
    // Event helpers
    // ------------------------------------------------------------------

    fn reporter(&self, epoch: u64) -> Reporter<Ctx> {
        Reporter {
            context: Arc::clone(&self.context),
            sink: Arc::clone(&self.sink),
            gate: self.gate.clone(),
            epoch,
        }
    }

    fn emit(&self, event: SimEvent) {
        self.sink.emit(Emitted {
            epoch: self.gate.current(),
            at_ms: self.context.now().as_millis() as u64,
            event,
        });
    }

    fn log(&self, level: LogLevel, text: impl Into<String>) {
        self.emit(SimEvent::log(level, text));
    }

    fn set_status(&mut self, id: WorkerId, status: WorkerStatus, annotation: impl Into<String>) {
        let annotation = annotation.into();
        let Some(worker) = self.workers.get_mut(id.index()) else {
            return;
        };
        worker.status = status;
        worker.annotation = annotation.clone();
        self.emit(SimEvent::WorkerStatusChanged {
            worker: id,
            status,
            annotation,
        });
    }

    fn set_all(&mut self, status: WorkerStatus, annotation: &str) {
        for id in WorkerId::range(self.workers.len()) {
            self.set_status(id, status, annotation);
        }
    }

    async fn pause_ms(&self, ms: u64) {
        let delay = Pacing::scaled_ms(ms, self.config.speed_multiplier);
        if !delay.is_zero() {
            self.context.sleep(delay).await;
        }
    }

    /// Scatter or gather animation between the coordinator and the workers.
    async fn communicate(&mut self, phase: Phase) {
        let (status, annotation, ms) = match phase {
            Phase::Gather => (
                WorkerStatus::Gathering,
                "Collecting computed results",
                self.pacing.gather_ms,
            ),
            _ => (
                WorkerStatus::Distributing,
                "Sending rows to workers",
                self.pacing.scatter_ms,
            ),
        };
        self.emit(SimEvent::PhaseStarted { phase });
        self.set_status(WorkerId::COORDINATOR, status, annotation);
        self.pause_ms(ms).await;
        self.emit(SimEvent::PhaseCompleted { phase });
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Starts a run in the configured execution mode.
    ///
    /// No-op while a run is in progress. Continuous runs are awaited to the
    /// end; failures are reported as events and never escape.
    pub async fn start(&mut self) -> RunOutcome {
        if self.is_running() {
            warn!("Start ignored: a run is already in progress");
            return RunOutcome::Ignored;
        }

        let epoch = self.gate.advance();
        self.running.store(true, Ordering::SeqCst);
        self.step_queue.clear();
        self.current_step = 0;
        self.set_all(WorkerStatus::Idle, "");

        let n = self.config.matrix_size;
        info!(
            epoch,
            "Starting run: {}x{} on {} workers ({:?}, {}x)",
            n,
            n,
            self.config.worker_count,
            self.config.execution_mode,
            self.config.speed_multiplier
        );
        self.log(
            LogLevel::Info,
            format!("Starting MPI simulation with {} processes", self.config.worker_count),
        );
        self.log(LogLevel::Info, format!("Matrix dimensions: {}×{}", n, n));
        self.log(
            LogLevel::Info,
            format!("Animation speed: {}x", self.config.speed_multiplier),
        );

        match self.config.execution_mode {
            ExecutionMode::Stepwise => {
                self.log(
                    LogLevel::Info,
                    "Step mode enabled - advance the run one step at a time",
                );
                self.store.reset_output();
                self.initialize_step_mode();
                RunOutcome::Stepping {
                    total_steps: self.step_queue.len(),
                }
            }
            ExecutionMode::Continuous => {
                let _guard = RunGuard(Arc::clone(&self.running));
                match self.run_matrix_multiplication(epoch).await {
                    Ok(()) => {
                        self.log(LogLevel::Success, "Matrix multiplication completed successfully");
                        self.emit(SimEvent::RunCompleted);
                        info!(epoch, "Run completed");
                        RunOutcome::Completed
                    }
                    Err(e) => {
                        let message = e.to_string();
                        error!(epoch, "Simulation error: {}", message);
                        self.log(LogLevel::Error, format!("Simulation error: {}", message));
                        self.emit(SimEvent::RunFailed {
                            message: message.clone(),
                        });
                        RunOutcome::Failed { message }
                    }
                }
            }
        }
    }

    /// Clears run state and worker statuses. Matrices are kept.
    ///
    /// Opens a new epoch, so anything still in flight from the previous run
    /// is discarded.
    pub fn reset(&mut self) {
        let epoch = self.gate.advance();
        self.running.store(false, Ordering::SeqCst);
        self.step_queue.clear();
        self.current_step = 0;
        self.set_all(WorkerStatus::Idle, "");
        self.log(LogLevel::Info, "System reset and ready for simulation");
        debug!(epoch, "Engine reset");
    }

    // ------------------------------------------------------------------
    // Continuous mode
    // ------------------------------------------------------------------

    async fn run_matrix_multiplication(&mut self, epoch: u64) -> Result<(), SimError> {
        let ranges = assign(self.config.matrix_size, self.config.worker_count);
        self.store.reset_output();

        // Phase 1: scatter
        self.log(LogLevel::Info, "Phase 1: Scattering matrix data to processes");
        self.communicate(Phase::Scatter).await;

        // Phase 2: one task per active worker
        self.log(LogLevel::Info, "Phase 2: Starting parallel computation");
        self.emit(SimEvent::PhaseStarted {
            phase: Phase::Compute,
        });
        let operands = self.store.operands();
        let mut handles: Vec<(WorkerId, JoinHandle<Result<WorkerResult, SimError>>)> =
            Vec::new();

        for range in ranges.iter().filter(|r| r.is_active()) {
            self.set_status(
                range.worker,
                WorkerStatus::Computing,
                format!("Computing rows {}-{}", range.start_row, range.end_row - 1),
            );
            let job = WorkerJob {
                range: *range,
                operands: operands.clone(),
                reporter: self.reporter(epoch),
                pacing: self.pacing.clone(),
                speed: self.config.speed_multiplier,
            };
            handles.push((range.worker, tokio::spawn(job.run())));
        }

        let results = join_workers(handles).await?;
        self.emit(SimEvent::PhaseCompleted {
            phase: Phase::Compute,
        });

        // Phase 3: gather
        self.log(LogLevel::Info, "Phase 3: Gathering results from processes");
        self.communicate(Phase::Gather).await;

        // Phase 4: write-back, each row exactly once
        self.gate.check(epoch)?;
        self.log(LogLevel::Success, "Phase 4: Finalizing computation results");
        self.emit(SimEvent::PhaseStarted {
            phase: Phase::Finalize,
        });
        for result in &results {
            for (offset, values) in result.rows.iter().enumerate() {
                let row = result.start_row + offset;
                self.store.write_row(row, values);
                self.emit(SimEvent::RowCompleted {
                    row,
                    worker: result.worker,
                });
            }
        }
        self.emit(SimEvent::PhaseCompleted {
            phase: Phase::Finalize,
        });
        self.set_all(WorkerStatus::Completed, "Finished");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Stepwise mode
    // ------------------------------------------------------------------

    /// Builds the step queue for the current configuration.
    pub fn initialize_step_mode(&mut self) {
        self.step_queue = plan(self.config.matrix_size, self.config.worker_count);
        self.current_step = 0;
        debug!("Step queue built: {} steps", self.step_queue.len());
    }

    /// Executes the next queued step, or completes the run once the queue
    /// is exhausted. Calling it again after completion changes nothing.
    pub async fn execute_next_step(&mut self) -> StepOutcome {
        if self.step_queue.is_empty() {
            return StepOutcome::Idle;
        }
        let total = self.step_queue.len();
        if self.current_step >= total {
            self.complete_step_mode();
            return StepOutcome::Completed;
        }

        let index = self.current_step;
        let step = self.step_queue[index];
        self.log(
            LogLevel::Info,
            format!("Step {}/{}: {}", index + 1, total, step.description()),
        );

        match step {
            Step::Scatter => self.communicate(Phase::Scatter).await,
            Step::Compute { worker, row, col } => self.execute_compute_step(worker, row, col).await,
            Step::Gather => self.communicate(Phase::Gather).await,
            Step::Finalize => {
                self.emit(SimEvent::PhaseStarted {
                    phase: Phase::Finalize,
                });
                self.emit(SimEvent::PhaseCompleted {
                    phase: Phase::Finalize,
                });
                self.log(LogLevel::Success, "Matrix multiplication completed successfully");
            }
        }

        self.current_step += 1;
        StepOutcome::Executed { index, total, step }
    }

    async fn execute_compute_step(&mut self, worker: WorkerId, row: usize, col: usize) {
        self.set_status(
            worker,
            WorkerStatus::Computing,
            format!("Computing C[{}][{}]", row, col),
        );
        self.emit(SimEvent::CellComputing {
            matrix: MatrixName::C,
            row,
            col,
        });

        let mut cell = 0;
        for k in 0..self.store.size() {
            self.emit(SimEvent::CellComputing {
                matrix: MatrixName::A,
                row,
                col: k,
            });
            self.emit(SimEvent::CellComputing {
                matrix: MatrixName::B,
                row: k,
                col,
            });
            cell += self.store.get(MatrixName::A, row, k).unwrap_or(0)
                * self.store.get(MatrixName::B, k, col).unwrap_or(0);
            self.pause_ms(self.pacing.step_multiply_ms).await;
        }

        self.store.write_cell(row, col, cell);
        self.emit(SimEvent::CellComputed {
            row,
            col,
            value: cell,
            worker,
        });
        self.pause_ms(self.pacing.step_settle_ms).await;
    }

    fn complete_step_mode(&mut self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        for id in WorkerId::range(self.workers.len()) {
            if self.workers[id.index()].status != WorkerStatus::Completed {
                self.set_status(id, WorkerStatus::Completed, "Finished");
            }
        }
        if was_running {
            self.emit(SimEvent::RunCompleted);
            info!(epoch = self.gate.current(), "Stepwise run completed");
        }
    }
}

/// Waits for every worker task. On the first failure the remaining tasks
/// are aborted and the error is returned.
async fn join_workers(
    handles: Vec<(WorkerId, JoinHandle<Result<WorkerResult, SimError>>)>,
) -> Result<Vec<WorkerResult>, SimError> {
    let mut results = Vec::with_capacity(handles.len());
    let mut pending = handles.into_iter();

    while let Some((worker, handle)) = pending.next() {
        let outcome = match handle.await {
            Ok(result) => result,
            Err(join_err) => Err(SimError::WorkerFailed {
                worker,
                message: describe_join_error(join_err),
            }),
        };
        match outcome {
            Ok(result) => results.push(result),
            Err(e) => {
                for (_, rest) in pending {
                    rest.abort();
                }
                return Err(e);
            }
        }
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::RecordingSink;
    use async_trait::async_trait;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    /// Virtual clock that records every sleep and can panic on a chosen call.
    struct ScriptedContext {
        seed: u64,
        elapsed: Mutex<Duration>,
        sleeps: Mutex<Vec<Duration>>,
        calls: AtomicUsize,
        panic_on_call: Option<usize>,
    }

    impl ScriptedContext {
        fn new(seed: u64) -> Self {
            Self {
                seed,
                elapsed: Mutex::new(Duration::ZERO),
                sleeps: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                panic_on_call: None,
            }
        }

        fn panicking_on(seed: u64, call: usize) -> Self {
            Self {
                panic_on_call: Some(call),
                ..Self::new(seed)
            }
        }

        fn sleeps(&self) -> Vec<Duration> {
            self.sleeps.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ScatterContext for ScriptedContext {
        fn now(&self) -> Duration {
            *self.elapsed.lock().unwrap()
        }

        async fn sleep(&self, duration: Duration) {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.panic_on_call == Some(call) {
                panic!("injected failure");
            }
            let mut elapsed = self.elapsed.lock().unwrap();
            *elapsed = elapsed.saturating_add(duration);
            drop(elapsed);
            self.sleeps.lock().unwrap().push(duration);
        }

        fn jitter(&self, min: Duration, _max: Duration) -> Duration {
            min
        }

        fn derive_rng(&self, seed_extension: u64) -> StdRng {
            StdRng::seed_from_u64(self.seed ^ seed_extension)
        }

        fn seed(&self) -> u64 {
            self.seed
        }
    }

    const A: [[i64; 2]; 2] = [[1, 2], [3, 4]];
    const B: [[i64; 2]; 2] = [[5, 6], [7, 8]];

    fn rows(m: [[i64; 2]; 2]) -> Vec<Vec<i64>> {
        m.iter().map(|r| r.to_vec()).collect()
    }

    fn engine_with(
        ctx: ScriptedContext,
        config: SimulationConfig,
    ) -> (SimulationEngine<ScriptedContext>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let engine = SimulationEngine::new(Arc::new(ctx), sink.clone(), config).unwrap();
        (engine, sink)
    }

    fn textbook(mode: ExecutionMode) -> (SimulationEngine<ScriptedContext>, Arc<RecordingSink>) {
        let (mut engine, sink) =
            engine_with(ScriptedContext::new(1), SimulationConfig::new(2, 2).with_mode(mode));
        engine.load_matrices(&rows(A), &rows(B)).unwrap();
        (engine, sink)
    }

    async fn drain_steps(engine: &mut SimulationEngine<ScriptedContext>) -> Vec<Step> {
        let mut visited = Vec::new();
        loop {
            match engine.execute_next_step().await {
                StepOutcome::Executed { step, .. } => visited.push(step),
                _ => return visited,
            }
        }
    }

    #[tokio::test]
    async fn test_continuous_textbook() {
        let (mut engine, sink) = textbook(ExecutionMode::Continuous);
        assert_eq!(engine.start().await, RunOutcome::Completed);

        assert_eq!(engine.store().rows(MatrixName::C), vec![vec![19, 22], vec![43, 50]]);
        assert!(!engine.is_running());
        assert!(engine
            .workers()
            .iter()
            .all(|w| w.status == WorkerStatus::Completed));

        let events = sink.events();
        assert_eq!(events.last(), Some(&SimEvent::RunCompleted));
        let computed = events
            .iter()
            .filter(|e| matches!(e, SimEvent::CellComputed { .. }))
            .count();
        assert_eq!(computed, 4);
        let rows_done = events
            .iter()
            .filter(|e| matches!(e, SimEvent::RowCompleted { .. }))
            .count();
        assert_eq!(rows_done, 2);
    }

    #[tokio::test]
    async fn test_continuous_phase_order() {
        let (mut engine, sink) = textbook(ExecutionMode::Continuous);
        engine.start().await;

        let phases: Vec<SimEvent> = sink
            .events()
            .into_iter()
            .filter(|e| {
                matches!(
                    e,
                    SimEvent::PhaseStarted { .. } | SimEvent::PhaseCompleted { .. }
                )
            })
            .collect();
        let expected: Vec<SimEvent> = [
            (true, Phase::Scatter),
            (false, Phase::Scatter),
            (true, Phase::Compute),
            (false, Phase::Compute),
            (true, Phase::Gather),
            (false, Phase::Gather),
            (true, Phase::Finalize),
            (false, Phase::Finalize),
        ]
        .into_iter()
        .map(|(started, phase)| {
            if started {
                SimEvent::PhaseStarted { phase }
            } else {
                SimEvent::PhaseCompleted { phase }
            }
        })
        .collect();
        assert_eq!(phases, expected);
    }

    #[tokio::test]
    async fn test_cells_written_only_at_write_back() {
        let (mut engine, sink) = textbook(ExecutionMode::Continuous);
        engine.start().await;

        let events = sink.events();
        let gather = events
            .iter()
            .position(|e| *e == SimEvent::PhaseStarted { phase: Phase::Gather })
            .unwrap();
        let first_row = events
            .iter()
            .position(|e| matches!(e, SimEvent::RowCompleted { .. }))
            .unwrap();
        let last_cell = events
            .iter()
            .rposition(|e| matches!(e, SimEvent::CellComputed { .. }))
            .unwrap();
        assert!(last_cell < gather);
        assert!(gather < first_row);
    }

    #[tokio::test]
    async fn test_stepwise_textbook_order() {
        let (mut engine, _sink) = textbook(ExecutionMode::Stepwise);
        assert_eq!(engine.start().await, RunOutcome::Stepping { total_steps: 7 });
        assert!(engine.is_running());

        let visited = drain_steps(&mut engine).await;
        let compute = |w: usize, row: usize, col: usize| Step::Compute {
            worker: WorkerId(w),
            row,
            col,
        };
        assert_eq!(
            visited,
            vec![
                Step::Scatter,
                compute(0, 0, 0),
                compute(0, 0, 1),
                compute(1, 1, 0),
                compute(1, 1, 1),
                Step::Gather,
                Step::Finalize,
            ]
        );
        assert_eq!(engine.store().rows(MatrixName::C), vec![vec![19, 22], vec![43, 50]]);
        assert!(!engine.is_running());
    }

    #[tokio::test]
    async fn test_stepwise_cells_appear_one_at_a_time() {
        let (mut engine, _sink) = textbook(ExecutionMode::Stepwise);
        engine.start().await;

        engine.execute_next_step().await; // scatter
        engine.execute_next_step().await; // C[0][0]
        assert_eq!(engine.store().rows(MatrixName::C), vec![vec![19, 0], vec![0, 0]]);
        assert_eq!(engine.current_step(), 2);
        assert_eq!(engine.workers()[0].status, WorkerStatus::Computing);
        assert_eq!(engine.workers()[0].annotation, "Computing C[0][0]");
    }

    #[tokio::test]
    async fn test_step_past_end_is_idempotent() {
        let (mut engine, sink) = textbook(ExecutionMode::Stepwise);
        engine.start().await;
        drain_steps(&mut engine).await;

        let c = engine.store().rows(MatrixName::C);
        let workers = engine.workers().to_vec();
        let completions = sink
            .events()
            .iter()
            .filter(|e| **e == SimEvent::RunCompleted)
            .count();
        assert_eq!(completions, 1);

        for _ in 0..5 {
            assert_eq!(engine.execute_next_step().await, StepOutcome::Completed);
        }
        assert_eq!(engine.store().rows(MatrixName::C), c);
        assert_eq!(engine.workers(), workers.as_slice());
        let completions = sink
            .events()
            .iter()
            .filter(|e| **e == SimEvent::RunCompleted)
            .count();
        assert_eq!(completions, 1);
    }

    #[tokio::test]
    async fn test_step_without_run_is_idle() {
        let (mut engine, _sink) = textbook(ExecutionMode::Stepwise);
        assert_eq!(engine.execute_next_step().await, StepOutcome::Idle);
        assert!(engine
            .workers()
            .iter()
            .all(|w| w.status == WorkerStatus::Idle));
    }

    #[tokio::test]
    async fn test_start_is_noop_while_stepping() {
        let (mut engine, _sink) = textbook(ExecutionMode::Stepwise);
        engine.start().await;
        engine.execute_next_step().await;
        let epoch = engine.epoch();

        assert_eq!(engine.start().await, RunOutcome::Ignored);
        assert_eq!(engine.current_step(), 1);
        assert_eq!(engine.epoch(), epoch);
    }

    #[tokio::test]
    async fn test_modes_agree_on_random_inputs() {
        let config = SimulationConfig::new(8, 3);
        let (mut continuous, _) = engine_with(ScriptedContext::new(77), config.clone());
        let (mut stepwise, _) = engine_with(
            ScriptedContext::new(77),
            config.with_mode(ExecutionMode::Stepwise),
        );
        assert_eq!(
            continuous.store().rows(MatrixName::A),
            stepwise.store().rows(MatrixName::A)
        );

        assert_eq!(continuous.start().await, RunOutcome::Completed);
        stepwise.start().await;
        drain_steps(&mut stepwise).await;

        let c = continuous.store().rows(MatrixName::C);
        assert_eq!(c, stepwise.store().rows(MatrixName::C));
        for (i, row) in c.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                assert_eq!(*value, continuous.store().compute_cell(i, j));
            }
        }
    }

    #[tokio::test]
    async fn test_more_workers_than_rows() {
        let (mut engine, sink) = engine_with(ScriptedContext::new(5), SimulationConfig::new(2, 4));
        assert_eq!(engine.start().await, RunOutcome::Completed);

        let busy: Vec<WorkerId> = sink
            .events()
            .into_iter()
            .filter_map(|e| match e {
                SimEvent::WorkerStatusChanged {
                    worker,
                    status: WorkerStatus::Computing,
                    ..
                } => Some(worker),
                _ => None,
            })
            .collect();
        assert_eq!(busy, vec![WorkerId(0), WorkerId(1)]);
        assert!(engine
            .workers()
            .iter()
            .all(|w| w.status == WorkerStatus::Completed));
    }

    #[tokio::test]
    async fn test_stepwise_delays_are_speed_scaled() {
        let (mut engine, _sink) = engine_with(
            ScriptedContext::new(3),
            SimulationConfig::new(2, 2)
                .with_mode(ExecutionMode::Stepwise)
                .with_speed(2.0),
        );
        engine.start().await;
        engine.execute_next_step().await; // scatter
        engine.execute_next_step().await; // one cell: 2 multiplies + settle

        assert_eq!(
            engine.context().sleeps(),
            vec![
                Duration::from_millis(500),
                Duration::from_millis(50),
                Duration::from_millis(50),
                Duration::from_millis(100),
            ]
        );
    }

    #[tokio::test]
    async fn test_continuous_delays_use_jitter_floor() {
        let (mut engine, _sink) = textbook(ExecutionMode::Continuous);
        engine.start().await;

        let sleeps = engine.context().sleeps();
        // scatter + 4 cells * (2 multiplies + settle) + gather
        assert_eq!(sleeps.len(), 1 + 4 * 3 + 1);
        assert_eq!(sleeps[0], Duration::from_millis(1000));
        assert_eq!(*sleeps.last().unwrap(), Duration::from_millis(1000));
        assert!(sleeps[1..sleeps.len() - 1]
            .iter()
            .all(|d| *d == Duration::from_millis(15) || *d == Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn test_worker_failure_is_reported_and_recoverable() {
        // call 0 is the scatter pause on the engine task, call 1 lands in a worker
        let (mut engine, sink) = engine_with(
            ScriptedContext::panicking_on(9, 1),
            SimulationConfig::new(2, 2),
        );

        let outcome = engine.start().await;
        assert!(matches!(outcome, RunOutcome::Failed { ref message } if message.contains("injected failure")));
        assert!(!engine.is_running());
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, SimEvent::RunFailed { .. })));
        assert!(sink.events().iter().any(|e| matches!(
            e,
            SimEvent::LogMessage {
                level: LogLevel::Error,
                ..
            }
        )));

        assert_eq!(engine.start().await, RunOutcome::Completed);
        let c = engine.store().rows(MatrixName::C);
        for (i, row) in c.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                assert_eq!(*value, engine.store().compute_cell(i, j));
            }
        }
    }

    #[tokio::test]
    async fn test_reset_keeps_matrices_and_clears_run() {
        let (mut engine, _sink) = textbook(ExecutionMode::Stepwise);
        engine.start().await;
        engine.execute_next_step().await;
        engine.execute_next_step().await;
        let epoch = engine.epoch();

        engine.reset();
        assert!(!engine.is_running());
        assert!(engine.step_queue().is_empty());
        assert_eq!(engine.current_step(), 0);
        assert!(engine.epoch() > epoch);
        assert!(engine.workers().iter().all(|w| w.status == WorkerStatus::Idle));
        assert_eq!(engine.store().rows(MatrixName::A), rows(A));
        assert_eq!(engine.store().get(MatrixName::C, 0, 0), Some(19));

        // A fresh run starts from a zeroed C
        engine.start().await;
        assert_eq!(engine.store().get(MatrixName::C, 0, 0), Some(0));
        drain_steps(&mut engine).await;
        assert_eq!(engine.store().rows(MatrixName::C), vec![vec![19, 22], vec![43, 50]]);
    }

    #[tokio::test]
    async fn test_configure_recreates_workers_and_matrices() {
        let (mut engine, _sink) = textbook(ExecutionMode::Continuous);
        engine.start().await;

        engine.configure(SimulationConfig::new(4, 4)).unwrap();
        assert_eq!(engine.workers().len(), 4);
        assert!(engine.workers().iter().all(|w| w.status == WorkerStatus::Idle));
        assert_eq!(engine.store().size(), 4);

        assert!(matches!(
            engine.configure(SimulationConfig::new(4, 0)),
            Err(SimError::Config(ConfigError::NoWorkers))
        ));
    }

    #[test]
    fn test_worker_count_change_regenerates_random_inputs() {
        let (mut engine, _sink) = engine_with(ScriptedContext::new(4), SimulationConfig::new(4, 2));
        let before = engine.store().rows(MatrixName::A);

        engine.configure(SimulationConfig::new(4, 4)).unwrap();
        assert_eq!(engine.workers().len(), 4);
        assert_ne!(engine.store().rows(MatrixName::A), before);
    }

    #[test]
    fn test_worker_count_change_keeps_manual_inputs() {
        let manual = |w: usize| SimulationConfig {
            entry_mode: EntryMode::Manual,
            ..SimulationConfig::new(2, w)
        };
        let (mut engine, _sink) = engine_with(ScriptedContext::new(4), manual(2));
        engine.load_matrices(&rows(A), &rows(B)).unwrap();

        engine.configure(manual(4)).unwrap();
        assert_eq!(engine.workers().len(), 4);
        assert_eq!(engine.store().rows(MatrixName::A), rows(A));
        assert_eq!(engine.store().rows(MatrixName::B), rows(B));
    }

    #[tokio::test]
    async fn test_tiny_speed_completes_continuous_run() {
        let (mut engine, sink) = engine_with(
            ScriptedContext::new(2),
            SimulationConfig::new(2, 2).with_speed(1e-300),
        );
        engine.load_matrices(&rows(A), &rows(B)).unwrap();

        assert_eq!(engine.start().await, RunOutcome::Completed);
        assert!(!engine.is_running());
        assert_eq!(engine.store().rows(MatrixName::C), vec![vec![19, 22], vec![43, 50]]);
        assert_eq!(engine.context().sleeps()[0], Duration::MAX);
        assert_eq!(sink.events().last(), Some(&SimEvent::RunCompleted));
    }

    #[tokio::test]
    async fn test_tiny_speed_completes_stepwise_run() {
        let (mut engine, _sink) = engine_with(
            ScriptedContext::new(2),
            SimulationConfig::new(2, 2)
                .with_mode(ExecutionMode::Stepwise)
                .with_speed(1e-300),
        );
        engine.load_matrices(&rows(A), &rows(B)).unwrap();
        engine.start().await;

        assert_eq!(drain_steps(&mut engine).await.len(), 7);
        assert!(!engine.is_running());
        assert_eq!(engine.store().rows(MatrixName::C), vec![vec![19, 22], vec![43, 50]]);
    }

    #[tokio::test]
    async fn test_busy_while_stepping() {
        let (mut engine, _sink) = textbook(ExecutionMode::Stepwise);
        engine.start().await;
        assert!(matches!(engine.randomize(), Err(SimError::Busy)));
        assert!(matches!(
            engine.set_execution_mode(ExecutionMode::Continuous),
            Err(SimError::Busy)
        ));

        engine.set_cell(MatrixName::A, 0, 0, 9);
        assert_eq!(engine.store().get(MatrixName::A, 0, 0), Some(1));
    }

    #[test]
    fn test_set_speed_rejects_zero() {
        let (mut engine, _sink) = textbook(ExecutionMode::Continuous);
        assert!(engine.set_speed(0.0).is_err());
        assert!(engine.set_speed(0.1).is_ok());
        assert_eq!(engine.speed_multiplier(), 0.1);
    }

    #[test]
    fn test_manual_edit_clamps() {
        let (mut engine, _sink) = textbook(ExecutionMode::Continuous);
        engine.set_cell(MatrixName::B, 1, 1, 12);
        assert_eq!(engine.store().get(MatrixName::B, 1, 1), Some(9));
    }

    #[tokio::test]
    async fn test_stale_worker_cannot_emit() {
        let ctx = Arc::new(ScriptedContext::new(0));
        let sink = Arc::new(RecordingSink::new());
        let gate = EpochGate::new();
        let epoch = gate.advance();
        let store = MatrixStore::from_rows(&rows(A), &rows(B)).unwrap();

        let job = WorkerJob {
            range: assign(2, 1)[0],
            operands: store.operands(),
            reporter: Reporter {
                context: ctx,
                sink: sink.clone(),
                gate: gate.clone(),
                epoch,
            },
            pacing: Pacing::instant(),
            speed: 1.0,
        };
        gate.advance();

        assert!(matches!(job.run().await, Err(SimError::StaleEpoch { .. })));
        assert!(sink.is_empty());
    }
}
