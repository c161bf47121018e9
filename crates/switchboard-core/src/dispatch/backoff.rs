//! Exponential backoff with equal jitter.

use std::time::Duration;

use rand::Rng;

use switchboard_types::config::RouterSettings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub base: Duration,
    pub max: Duration,
    pub jitter: bool,
}

impl Backoff {
    pub fn from_settings(settings: &RouterSettings) -> Self {
        Self {
            base: Duration::from_millis(settings.backoff_base_ms),
            max: Duration::from_millis(settings.backoff_max_ms),
            jitter: settings.jitter,
        }
    }

    /// Upper bound for retry `attempt` (0-based): `min(base * 2^attempt, max)`.
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Delay before retry `attempt`.
    ///
    /// With jitter the delay lands in `[ceiling / 2, ceiling]`, so successive
    /// delays still grow while concurrent retries spread out.
    pub fn delay(&self, attempt: u32) -> Duration {
        let ceiling = self.ceiling(attempt);
        if !self.jitter {
            return ceiling;
        }
        let half = ceiling / 2;
        let spread = (ceiling - half).as_millis() as u64;
        half + Duration::from_millis(rand::rng().random_range(0..=spread))
    }
}
