use std::time::Duration;

/// Exponential backoff with jitter for outbound model requests.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum attempts including the first request.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Cap for later retries.
    pub max_delay: Duration,
    /// Jitter ratio (0.0..=1.0) applied symmetrically to each delay.
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_ratio: 0.2,
        }
    }
}

impl RetryPolicy {
    /// Single attempt, no retries.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Backoff for the given retry (1-based), before jitter.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << shift)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    pub fn with_jitter(&self, delay: Duration) -> Duration {
        let ratio = self.jitter_ratio.clamp(0.0, 1.0);
        if ratio == 0.0 {
            return delay;
        }
        let millis = delay.as_millis() as f64;
        let low = millis * (1.0 - ratio);
        let high = millis * (1.0 + ratio);
        let sampled = low + rand::random::<f64>() * (high - low);
        Duration::from_millis(sampled.round() as u64)
    }
}
