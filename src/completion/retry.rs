use rand::Rng;
use std::time::Duration;

use crate::app_config::CompletionCommonConfig;

/// Bounded retry schedule for one completion call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: usize,
    /// Delay before the first retry, doubled afterwards
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound of the random delay added to each wait
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            jitter: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    /// Retry without waiting between attempts
    pub fn immediate(max_attempts: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            jitter: Duration::ZERO,
        }
    }

    pub fn from_config(common: &CompletionCommonConfig) -> Self {
        Self {
            max_attempts: (common.retry_count as usize).max(1),
            base_delay: Duration::from_millis(common.retry_backoff_ms),
            max_delay: Duration::from_millis(common.retry_backoff_max_ms),
            ..Default::default()
        }
    }

    /// Wait before retry number `retry` (0-based)
    pub fn delay_for(&self, retry: usize) -> Duration {
        let factor = 1u32.checked_shl(retry.min(16) as u32).unwrap_or(u32::MAX);
        let backoff = self.base_delay.saturating_mul(factor).min(self.max_delay);
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            backoff
        } else {
            backoff + Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        }
    }

    /// Make the prompt of attempt `attempt` differ from earlier ones
    ///
    /// Trailing padding keeps the meaning while defeating upstream caching
    /// of a bad answer.
    pub fn perturb(prompt: &str, attempt: usize) -> String {
        let mut perturbed = String::with_capacity(prompt.len() + attempt);
        perturbed.push_str(prompt);
        perturbed.extend(std::iter::repeat_n(' ', attempt));
        perturbed
    }
}
