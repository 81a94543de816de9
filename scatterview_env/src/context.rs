//! Core environment context trait for the simulation engine.

use async_trait::async_trait;
use rand::rngs::StdRng;
use std::time::Duration;

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the engine can animate a run
/// in real time (tokio) or replay it instantly on a virtual clock.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, thread RNG
/// - **Simulation**: `SimContext` - virtual clock, `ChaCha8Rng(seed)`
///
/// # Determinism
///
/// All methods that would normally introduce non-determinism
/// (time, randomness) are controlled by the implementation.
#[async_trait]
pub trait ScatterContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances the virtual clock
    async fn sleep(&self, duration: Duration);

    /// Draws a uniformly distributed delay in `[min, max)`.
    ///
    /// Returns `min` when the range is empty. Used only for animation
    /// pacing, never for anything that affects a computed value.
    fn jitter(&self, min: Duration, max: Duration) -> Duration;

    /// Returns an RNG for matrix generation.
    ///
    /// The implementation combines the global seed with `seed_extension`
    /// so that repeated generations within one run differ but stay
    /// reproducible.
    fn derive_rng(&self, seed_extension: u64) -> StdRng;

    /// Returns the context's seed (for logging/debugging).
    ///
    /// In production, returns 0 (not seeded).
    fn seed(&self) -> u64;
}
