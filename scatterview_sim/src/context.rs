//! Simulation context implementing ScatterContext for deterministic replay.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Uniform};
use scatterview_env::ScatterContext;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Simulation context backed by deterministic time and RNG.
///
/// This implements `ScatterContext` using:
/// - A virtual clock that `sleep` advances instead of blocking
/// - A seeded ChaCha8 RNG for cosmetic jitter
/// - Seed-derived RNGs for matrix generation
///
/// A full continuous run of an 8x8 product takes no wall-clock time.
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,

    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,

    /// Deterministic RNG for jitter
    rng: Arc<Mutex<ChaCha8Rng>>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(Mutex::new(0)),
            rng: Arc::new(Mutex::new(ChaCha8Rng::seed_from_u64(seed))),
        }
    }

    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        if let Ok(mut time) = self.virtual_time_ns.lock() {
            let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
            *time = time.saturating_add(nanos);
        }
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.virtual_time_ns.lock().map(|t| *t).unwrap_or(0)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
            rng: Arc::clone(&self.rng),
        }
    }
}

#[async_trait]
impl ScatterContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        // Sleeping only moves the virtual clock forward
        self.advance_time(duration);
    }

    fn jitter(&self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        let between = Uniform::new(min.as_nanos() as u64, max.as_nanos() as u64);
        match self.rng.lock() {
            Ok(mut rng) => Duration::from_nanos(between.sample(&mut *rng)),
            Err(_) => min,
        }
    }

    fn derive_rng(&self, seed_extension: u64) -> StdRng {
        // Combine master seed with extension for a reproducible stream
        let combined_seed = self.seed.wrapping_mul(0x517cc1b727220a95) ^ seed_extension;
        StdRng::seed_from_u64(combined_seed)
    }

    fn seed(&self) -> u64 {
        self.seed
    }
}
