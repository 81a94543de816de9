//! ScatterView Simulator CLI
//!
//! Runs named scenarios or a single custom run of the matrix
//! multiplication animation, on a virtual clock or in real time.

use clap::Parser;
use scatterview_core::{
    mpi_template, ChannelSink, EntryMode, EventSink, ExecutionMode, MatrixName, RunOutcome,
    SimulationConfig, SimulationEngine, StepOutcome, TracingSink,
};
use scatterview_env::{ScatterContext, TokioContext};
use scatterview_sim::scenarios::ScenarioId;
use scatterview_sim::{Oracle, ScenarioResult, ScenarioRunner, SimConfig, SimExport, SimWorld};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// ScatterView Simulation CLI
#[derive(Parser, Debug)]
#[command(name = "scatterview-sim")]
#[command(about = "Simulate row-wise distributed matrix multiplication", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Matrix side length N
    #[arg(short = 'n', long)]
    size: Option<usize>,

    /// Number of worker processes
    #[arg(short, long)]
    workers: Option<usize>,

    /// Execution mode (continuous, stepwise)
    #[arg(short, long)]
    mode: Option<ExecutionMode>,

    /// Animation speed multiplier
    #[arg(long)]
    speed: Option<f64>,

    /// Input entry (random, manual)
    #[arg(long)]
    entry: Option<EntryMode>,

    /// JSON file with a run configuration; flags override its fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// JSON file with `{"a": [[..]], "b": [[..]]}` for manual entry
    #[arg(long)]
    matrices: Option<PathBuf>,

    /// Scenario to run (textbook, uneven_rows, idle_workers, mode_parity,
    /// full_grid, reset_midway, all). Without it a single custom run is made.
    #[arg(short = 'S', long)]
    scenario: Option<String>,

    /// Export the run timeline to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Write the equivalent C/MPI program to this file or directory
    #[arg(long)]
    emit_mpi: Option<PathBuf>,

    /// Use the wall clock instead of the virtual clock
    #[arg(long)]
    realtime: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Manually entered inputs.
#[derive(Debug, Deserialize)]
struct ManualInput {
    a: Vec<Vec<i64>>,
    b: Vec<Vec<i64>>,
}

impl ManualInput {
    fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("{}: {}", path.display(), e))?;
        serde_json::from_str(&text).map_err(|e| format!("{}: {}", path.display(), e))
    }
}

impl Args {
    /// Config file (or defaults) with the explicit flags applied on top.
    fn engine_config(&self) -> Result<SimulationConfig, String> {
        let mut config = match &self.config {
            Some(path) => SimulationConfig::from_json_file(path).map_err(|e| e.to_string())?,
            None => SimulationConfig::default(),
        };
        if let Some(size) = self.size {
            config.matrix_size = size;
        }
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        if let Some(mode) = self.mode {
            config.execution_mode = mode;
        }
        if let Some(speed) = self.speed {
            config.speed_multiplier = speed;
        }
        if let Some(entry) = self.entry {
            config.entry_mode = entry;
        }
        config.validate().map_err(|e| e.to_string())?;
        Ok(config)
    }
}

/// Outcome of a custom run.
struct CustomRun {
    passed: bool,
    failure_reason: Option<String>,
    final_c: Vec<Vec<i64>>,
    /// `(label, status)` per worker at the end of the run
    workers: Vec<(String, String)>,
}

/// Drives one run to the end in the engine's configured mode.
async fn drive<Ctx: ScatterContext>(engine: &mut SimulationEngine<Ctx>) -> Result<(), String> {
    match engine.start().await {
        RunOutcome::Completed => Ok(()),
        RunOutcome::Failed { message } => Err(message),
        RunOutcome::Ignored => Err("engine was already running".to_string()),
        RunOutcome::Stepping { total_steps } => {
            debug!("Stepping through {} steps", total_steps);
            loop {
                match engine.execute_next_step().await {
                    StepOutcome::Executed { index, total, step } => {
                        debug!("step {}/{}: {}", index + 1, total, step.description());
                    }
                    StepOutcome::Completed | StepOutcome::Idle => return Ok(()),
                }
            }
        }
    }
}

fn load_manual<Ctx: ScatterContext>(
    engine: &mut SimulationEngine<Ctx>,
    args: &Args,
) -> Result<(), String> {
    if engine.config().entry_mode != EntryMode::Manual {
        return Ok(());
    }
    match &args.matrices {
        Some(path) => {
            let input = ManualInput::load(path)?;
            engine
                .load_matrices(&input.a, &input.b)
                .map_err(|e| e.to_string())
        }
        None => {
            warn!("Manual entry without --matrices; keeping generated inputs");
            Ok(())
        }
    }
}

fn check<Ctx: ScatterContext>(
    engine: &SimulationEngine<Ctx>,
    driven: Result<(), String>,
) -> CustomRun {
    let verdict = driven.and_then(|()| {
        Oracle::new(engine.store())
            .verify(engine.store())
            .map_err(|m| m.to_string())
    });
    CustomRun {
        passed: verdict.is_ok(),
        failure_reason: verdict.err(),
        final_c: engine.store().rows(MatrixName::C),
        workers: engine
            .workers()
            .iter()
            .map(|w| (w.label(), w.status.to_string()))
            .collect(),
    }
}

/// Custom run on the virtual clock.
async fn run_virtual(args: &Args, seed: u64, config: SimulationConfig) -> Result<CustomRun, String> {
    let mut world = SimWorld::new(SimConfig {
        seed,
        engine: config.clone(),
    })
    .map_err(|e| e.to_string())?;
    load_manual(&mut world.engine, args)?;

    let driven = drive(&mut world.engine).await;
    let run = check(&world.engine, driven);
    info!("Virtual time elapsed: {} ms", world.elapsed_ms());

    if let Some(path) = &args.export {
        let mut export = SimExport::new("custom", seed, config);
        export.capture(&world);
        export.finalize(run.passed, run.failure_reason.clone());
        write_export(&export, path);
    }
    Ok(run)
}

/// Custom run on the wall clock, with events streamed to the log.
async fn run_realtime(args: &Args, seed: u64, config: SimulationConfig) -> Result<CustomRun, String> {
    let (sink, mut rx) = ChannelSink::new();
    let forward = tokio::spawn(async move {
        let live = TracingSink;
        let mut timeline = Vec::new();
        while let Some(emitted) = rx.recv().await {
            live.emit(emitted.clone());
            timeline.push(emitted);
        }
        timeline
    });

    let context = TokioContext::shared();
    let mut engine = SimulationEngine::new(context.clone(), Arc::new(sink), config.clone())
        .map_err(|e| e.to_string())?;
    load_manual(&mut engine, args)?;

    let driven = drive(&mut engine).await;
    let run = check(&engine, driven);
    let elapsed_ms = context.now().as_millis() as u64;
    drop(engine);

    let timeline = forward.await.unwrap_or_default();
    info!("Wall time elapsed: {} ms, {} events", elapsed_ms, timeline.len());

    if let Some(path) = &args.export {
        let mut export = SimExport::new("custom", seed, config);
        export.record(timeline, run.final_c.clone(), elapsed_ms);
        export.finalize(run.passed, run.failure_reason.clone());
        write_export(&export, path);
    }
    Ok(run)
}

fn write_export(export: &SimExport, path: &Path) {
    match export.write_to_file(path) {
        Ok(()) => info!("Exported {} events to {}", export.events.len(), path.display()),
        Err(e) => error!("Failed to write export: {:?}", e),
    }
}

fn emit_mpi(path: &Path, config: &SimulationConfig) -> std::io::Result<PathBuf> {
    let (w, n) = (config.worker_count, config.matrix_size);
    let target = if path.is_dir() {
        path.join(mpi_template::file_name(w, n))
    } else {
        path.to_path_buf()
    };
    std::fs::write(&target, mpi_template::generate(w, n))?;
    Ok(target)
}

fn print_matrix(label: &str, rows: &[Vec<i64>]) {
    info!("{}:", label);
    for row in rows {
        let cells: Vec<String> = row.iter().map(|v| format!("{:>4}", v)).collect();
        info!("  [{}]", cells.join(""));
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    if !args.json {
        info!("ScatterView Simulator v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let config = args.engine_config().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    // Determine base seed
    let seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(42)
    } else {
        args.seed
    };

    if let Some(path) = &args.emit_mpi {
        match emit_mpi(path, &config) {
            Ok(target) => info!("Wrote MPI program to {}", target.display()),
            Err(e) => {
                error!("Failed to write MPI program: {}", e);
                std::process::exit(1);
            }
        }
    }

    match &args.scenario {
        Some(name) => run_scenarios(&args, name, seed).await,
        None => run_custom(&args, seed, config).await,
    }
}

async fn run_custom(args: &Args, seed: u64, config: SimulationConfig) {
    let n = config.matrix_size;
    let w = config.worker_count;
    let result = if args.realtime {
        run_realtime(args, seed, config).await
    } else {
        run_virtual(args, seed, config).await
    };

    let run = result.unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    });

    if args.json {
        let summary = serde_json::json!({
            "seed": seed,
            "matrix_size": n,
            "worker_count": w,
            "passed": run.passed,
            "failure_reason": run.failure_reason,
            "c": run.final_c,
            "workers": run.workers.iter().map(|(label, status)| {
                serde_json::json!({ "label": label, "status": status })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
    } else {
        print_matrix("C", &run.final_c);
        for (label, status) in &run.workers {
            info!("  {}: {}", label, status);
        }
        if run.passed {
            info!("✓ {}x{} on {} workers (seed={}) PASSED", n, n, w, seed);
        } else {
            error!(
                "✗ {}x{} on {} workers FAILED: {}",
                n,
                n,
                w,
                run.failure_reason.as_deref().unwrap_or("unknown")
            );
        }
    }

    if !run.passed {
        std::process::exit(1);
    }
}

async fn run_scenarios(args: &Args, name: &str, seed: u64) {
    let scenarios: Vec<ScenarioId> = if name == "all" {
        ScenarioId::all()
    } else {
        vec![name.parse().unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            eprintln!(
                "Available scenarios: textbook, uneven_rows, idle_workers, mode_parity, full_grid, reset_midway, all"
            );
            std::process::exit(1);
        })]
    };

    if args.export.is_some() {
        warn!("--export applies to custom runs only; ignoring it for scenarios");
    }

    let runner = ScenarioRunner::new(seed).with_speed(args.speed.unwrap_or(1.0));
    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for scenario in &scenarios {
        let result = runner.run(*scenario).await;

        if !args.json {
            if result.passed {
                info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                debug!("  {}", scenario.description());
            } else {
                error!(
                    "✗ {} (seed={}) FAILED: {}",
                    scenario.name(),
                    seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }

        if !result.passed {
            failed_count += 1;
        }
        all_results.push(result);
    }

    // Summary
    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "steps": r.metrics.steps_executed,
                    "events": r.metrics.events_emitted,
                    "cells": r.metrics.cells_computed,
                    "virtual_time_ms": r.metrics.virtual_time_ms,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&summary).unwrap_or_default());
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
        }
    }

    // Exit with proper code for CI
    if failed_count > 0 {
        std::process::exit(1);
    }
}
