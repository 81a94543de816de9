//! Production implementation of ScatterContext using Tokio.

use crate::ScatterContext;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Production context backed by Tokio and OS entropy.
///
/// This is the "real" implementation used when a run is animated live.
/// Time comes from the system clock, randomness from the thread RNG.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
}

impl TokioContext {
    /// Creates a new TokioContext.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScatterContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }

    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    fn jitter(&self, min: Duration, max: Duration) -> Duration {
        if max <= min {
            return min;
        }
        rand::thread_rng().gen_range(min..max)
    }

    fn derive_rng(&self, _seed_extension: u64) -> StdRng {
        // Live runs get fresh matrices every time
        StdRng::from_entropy()
    }

    fn seed(&self) -> u64 {
        0
    }
}
