//! Animation pacing. Delays never influence computed values.

use std::time::Duration;

/// Nominal delays, in milliseconds, before speed scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct Pacing {
    /// Scatter communication animation
    pub scatter_ms: u64,
    /// Gather communication animation
    pub gather_ms: u64,
    /// Continuous mode: per-term multiply highlight, uniform in `[min, max)`
    pub multiply_jitter_ms: (u64, u64),
    /// Continuous mode: pause after each cell, uniform in `[min, max)`
    pub settle_jitter_ms: (u64, u64),
    /// Stepwise mode: per-term multiply highlight
    pub step_multiply_ms: u64,
    /// Stepwise mode: pause after each cell
    pub step_settle_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            scatter_ms: 1000,
            gather_ms: 1000,
            multiply_jitter_ms: (15, 45),
            settle_jitter_ms: (10, 30),
            step_multiply_ms: 100,
            step_settle_ms: 200,
        }
    }
}

impl Pacing {
    /// No delays at all.
    pub fn instant() -> Self {
        Self {
            scatter_ms: 0,
            gather_ms: 0,
            multiply_jitter_ms: (0, 0),
            settle_jitter_ms: (0, 0),
            step_multiply_ms: 0,
            step_settle_ms: 0,
        }
    }

    /// Divides a nominal delay by the speed multiplier.
    ///
    /// The multiplier is validated positive and finite before it gets here.
    /// Results too large for a `Duration` saturate at `Duration::MAX`.
    pub fn scale(base: Duration, speed: f64) -> Duration {
        Duration::try_from_secs_f64(base.as_secs_f64() / speed).unwrap_or(Duration::MAX)
    }

    /// Scales a nominal millisecond delay.
    pub fn scaled_ms(ms: u64, speed: f64) -> Duration {
        Self::scale(Duration::from_millis(ms), speed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scale() {
        assert_eq!(Pacing::scaled_ms(1000, 2.0), Duration::from_millis(500));
        assert_eq!(Pacing::scaled_ms(1000, 0.5), Duration::from_millis(2000));
        assert_eq!(Pacing::scaled_ms(100, 1.0), Duration::from_millis(100));
    }

    #[test]
    fn test_tiny_speed_saturates() {
        assert_eq!(Pacing::scaled_ms(1000, 1e-300), Duration::MAX);
        assert_eq!(Pacing::scaled_ms(0, 1e-300), Duration::ZERO);
        assert_eq!(
            Pacing::scale(Duration::from_millis(15), f64::MIN_POSITIVE),
            Duration::MAX
        );
    }

    #[test]
    fn test_defaults() {
        let p = Pacing::default();
        assert_eq!(p.scatter_ms, 1000);
        assert_eq!(p.step_settle_ms, 200);
        assert_eq!(p.multiply_jitter_ms, (15, 45));
        assert_eq!(Pacing::instant().gather_ms, 0);
    }
}
