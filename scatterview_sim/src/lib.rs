//! ScatterView Deterministic Simulation Harness
//!
//! Runs the scatter/compute/gather engine on a virtual clock so that a
//! full animated run finishes instantly and replays identically for a seed.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                   SimWorld                    │
//! │  ┌────────────┐   events   ┌───────────────┐  │
//! │  │   Engine   │───────────►│ RecordingSink │  │
//! │  └─────┬──────┘            └───────────────┘  │
//! │        │ sleep / jitter / derive_rng          │
//! │  ┌─────▼──────┐            ┌───────────────┐  │
//! │  │ SimContext │            │    Oracle     │  │
//! │  │ (virtual)  │            │  (A x B)      │  │
//! │  └────────────┘            └───────────────┘  │
//! └───────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use scatterview_sim::{SimConfig, SimWorld};
//!
//! let mut world = SimWorld::new(SimConfig::default())?;
//! world.run_continuous().await?;
//! world.verify()?;
//! ```

mod context;
mod exporter;
mod oracle;
mod runner;
mod world;
pub mod scenarios;

pub use context::SimContext;
pub use exporter::SimExport;
pub use oracle::{Mismatch, Oracle};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
pub use world::{SimConfig, SimWorld};
