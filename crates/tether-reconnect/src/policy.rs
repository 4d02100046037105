//! Backoff delay calculation.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::time::Duration;

/// Exponential backoff with an upper bound and optional seeded jitter.
///
/// `delay(a) = min(base × rate^a, max_delay)`. The policy is a plain value: the same
/// inputs always produce the same delay, including the jittered one, which draws its
/// randomness from `seed` and the attempt number rather than a shared generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReconnectPolicy {
    base: Duration,
    rate: f64,
    max_delay: Duration,
    jitter: f64,
    seed: u64,
}

impl ReconnectPolicy {
    /// Creates a policy without jitter.
    ///
    /// # Arguments
    /// * `base` - Delay before the first retry
    /// * `rate` - Growth factor per attempt, at least 1.0
    /// * `max_delay` - Upper bound on any delay
    pub fn new(base: Duration, rate: f64, max_delay: Duration) -> Self {
        Self {
            base,
            rate: rate.max(1.0),
            max_delay,
            jitter: 0.0,
            seed: 0,
        }
    }

    /// Spreads each delay uniformly within `±factor` of its nominal value.
    ///
    /// `factor` is clamped to `0.0..=1.0`. Zero disables jitter.
    pub fn with_jitter(mut self, factor: f64, seed: u64) -> Self {
        self.jitter = if factor.is_finite() {
            factor.clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.seed = seed;
        self
    }

    /// Delay before the first retry.
    pub fn base(&self) -> Duration {
        self.base
    }

    /// Growth factor.
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Upper bound on any delay.
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    /// Jitter factor.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Nominal delay after `attempts` failed attempts.
    pub fn delay(&self, attempts: u32) -> Duration {
        let exponent = i32::try_from(attempts).unwrap_or(i32::MAX);
        let secs = self.base.as_secs_f64() * self.rate.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay after `attempts` failed attempts with jitter applied, clamped to
    /// `max_delay`.
    pub fn jittered_delay(&self, attempts: u32) -> Duration {
        let nominal = self.delay(attempts);
        if self.jitter == 0.0 {
            return nominal;
        }
        let mut rng = StdRng::seed_from_u64(
            self.seed ^ u64::from(attempts).wrapping_mul(0x9E37_79B9_7F4A_7C15),
        );
        let spread = rng.random_range(-self.jitter..=self.jitter);
        Duration::try_from_secs_f64(nominal.as_secs_f64() * (1.0 + spread))
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

impl Default for ReconnectPolicy {
    /// 1 second growing by 1.5 up to 30 seconds, no jitter.
    fn default() -> Self {
        Self::new(Duration::from_secs(1), 1.5, Duration::from_secs(30))
    }
}
