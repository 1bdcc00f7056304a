/*!
 * Shared backoff controller for outbound completion calls.
 *
 * One `RateLimiterContext` is built per run and handed to every component that
 * talks to the completion service. A 429 answer starts (or doubles) a cooldown
 * that every later call waits out; runs of successes shrink it again.
 */

use log::{debug, warn};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct LimiterState {
    last_rate_limited: Option<Instant>,
    cooldown: Duration,
    consecutive_successes: u32,
}

/// Process-wide cooldown state guarding the completion service
#[derive(Debug)]
pub struct RateLimiterContext {
    state: Mutex<LimiterState>,
    initial_cooldown: Duration,
    max_cooldown: Duration,
    decay_step: Duration,
    successes_per_decay: u32,
}

impl Default for RateLimiterContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiterContext {
    /// Cooldown starts at 2s, doubles up to 60s and decays by 1s per 3 successes
    pub fn new() -> Self {
        Self::with_limits(
            Duration::from_secs(2),
            Duration::from_secs(60),
            Duration::from_secs(1),
            3,
        )
    }

    pub fn with_limits(
        initial_cooldown: Duration,
        max_cooldown: Duration,
        decay_step: Duration,
        successes_per_decay: u32,
    ) -> Self {
        Self {
            state: Mutex::new(LimiterState {
                last_rate_limited: None,
                cooldown: Duration::ZERO,
                consecutive_successes: 0,
            }),
            initial_cooldown,
            max_cooldown,
            decay_step,
            successes_per_decay: successes_per_decay.max(1),
        }
    }

    /// Current cooldown
    pub fn cooldown(&self) -> Duration {
        self.state.lock().cooldown
    }

    /// How long a call starting at `now` still has to wait
    pub fn remaining_wait(&self, now: Instant) -> Duration {
        let state = self.state.lock();
        match state.last_rate_limited {
            Some(at) if !state.cooldown.is_zero() => {
                let elapsed = now.saturating_duration_since(at);
                state.cooldown.saturating_sub(elapsed)
            }
            _ => Duration::ZERO,
        }
    }

    /// Sleep out the remaining cooldown, if any
    ///
    /// The lock is only held while computing the wait.
    pub async fn wait_if_needed(&self) {
        let wait = self.remaining_wait(Instant::now());
        if !wait.is_zero() {
            debug!("Rate limit cooldown: waiting {:.1}s", wait.as_secs_f64());
            tokio::time::sleep(wait).await;
        }
    }

    /// Record a rate-limit answer and return the new cooldown
    pub fn record_rate_limited(&self) -> Duration {
        self.record_rate_limited_at(Instant::now())
    }

    pub fn record_rate_limited_at(&self, now: Instant) -> Duration {
        let mut state = self.state.lock();
        state.cooldown = if state.cooldown.is_zero() {
            self.initial_cooldown
        } else {
            (state.cooldown * 2).min(self.max_cooldown)
        };
        state.last_rate_limited = Some(now);
        state.consecutive_successes = 0;
        warn!("Rate limited; cooldown is now {:.1}s", state.cooldown.as_secs_f64());
        state.cooldown
    }

    /// Record a successful call
    pub fn record_success(&self) {
        let mut state = self.state.lock();
        state.consecutive_successes += 1;
        if state.consecutive_successes >= self.successes_per_decay && !state.cooldown.is_zero() {
            state.cooldown = state.cooldown.saturating_sub(self.decay_step);
            state.consecutive_successes = 0;
            debug!("Rate limit cooldown decayed to {:.1}s", state.cooldown.as_secs_f64());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recordRateLimited_repeated_shouldDoubleUpToCap() {
        let limiter = RateLimiterContext::new();
        let expected = [2, 4, 8, 16, 32, 60, 60];
        for secs in expected {
            assert_eq!(limiter.record_rate_limited(), Duration::from_secs(secs));
        }
    }

    #[test]
    fn test_recordSuccess_threeInARow_shouldDecayByOneSecond() {
        let limiter = RateLimiterContext::new();
        limiter.record_rate_limited();
        limiter.record_rate_limited();
        assert_eq!(limiter.cooldown(), Duration::from_secs(4));

        limiter.record_success();
        limiter.record_success();
        assert_eq!(limiter.cooldown(), Duration::from_secs(4));
        limiter.record_success();
        assert_eq!(limiter.cooldown(), Duration::from_secs(3));
    }

    #[test]
    fn test_recordSuccess_noCooldown_shouldStayZero() {
        let limiter = RateLimiterContext::new();
        for _ in 0..10 {
            limiter.record_success();
        }
        assert_eq!(limiter.cooldown(), Duration::ZERO);
    }

    #[test]
    fn test_remainingWait_partiallyElapsed_shouldReturnRest() {
        let limiter = RateLimiterContext::new();
        let start = Instant::now();
        limiter.record_rate_limited_at(start);

        assert_eq!(limiter.remaining_wait(start), Duration::from_secs(2));
        let later = start + Duration::from_millis(1500);
        assert_eq!(limiter.remaining_wait(later), Duration::from_millis(500));
        let much_later = start + Duration::from_secs(10);
        assert_eq!(limiter.remaining_wait(much_later), Duration::ZERO);
    }

    #[tokio::test]
    async fn test_waitIfNeeded_noRateLimit_shouldReturnImmediately() {
        let limiter = RateLimiterContext::new();
        let started = Instant::now();
        limiter.wait_if_needed().await;
        assert!(started.elapsed() < Duration::from_millis(100));
    }
}
