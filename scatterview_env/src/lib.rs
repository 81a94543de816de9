//! ScatterView Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the ScatterView
//! simulation engine to run against either a **Real** clock (tokio) or a
//! **Virtual** clock (deterministic simulation harness).
//!
//! # Core Concept
//!
//! Everything that makes an animated run non-reproducible is intercepted:
//! - Time (`now()`, `sleep()`)
//! - Cosmetic jitter (`jitter()`)
//! - Randomness for matrix generation (`derive_rng()`)
//!
//! By deriving all entropy from a single 64-bit seed, any run becomes
//! reproducible via its seed number.
//!
//! # Example
//!
//! ```ignore
//! use scatterview_env::ScatterContext;
//!
//! async fn pause<Ctx: ScatterContext>(ctx: &Ctx, speed: f64) {
//!     ctx.sleep(Duration::from_millis(1000).div_f64(speed)).await;
//! }
//! ```

mod context;
mod tokio_impl;
mod types;

pub use context::ScatterContext;
pub use tokio_impl::TokioContext;
pub use types::WorkerId;
