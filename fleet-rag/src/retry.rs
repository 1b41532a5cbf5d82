//! Bounded exponential backoff shared by every provider call site.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::warn;

/// Retry schedule for calls to hosted model providers.
///
/// Attempt `n` (1-based) that fails is followed by a pause of
/// `initial_delay * multiplier^(n-1)`, capped at `max_delay`, unless it was the
/// last attempt. With jitter enabled the pause is drawn uniformly from
/// `[delay / 2, delay]`.
///
/// Transient and permanent failures are treated alike: both consume the same
/// attempt budget.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Pause after the first failed attempt.
    pub initial_delay: Duration,
    /// Upper bound for any single pause.
    pub max_delay: Duration,
    /// Growth factor between consecutive pauses.
    pub multiplier: f64,
    /// Randomize pauses to spread out concurrent retries.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(4),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// A policy that retries `max_attempts` times without pausing.
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            multiplier: 1.0,
            jitter: false,
        }
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// The un-jittered pause that follows failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }

    fn pause_for(&self, attempt: u32) -> Duration {
        let delay = self.delay_for(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let secs = delay.as_secs_f64();
        Duration::from_secs_f64(rand::rng().random_range(secs / 2.0..=secs))
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    ///
    /// Returns the last error when every attempt fails.
    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < max_attempts => {
                    let pause = self.pause_for(attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts,
                        retry_in_ms = pause.as_millis() as u64,
                        error = %e,
                        "attempt failed, retrying"
                    );
                    tokio::time::sleep(pause).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    #[test]
    fn delays_grow_exponentially_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(4));
        assert_eq!(policy.delay_for(2), Duration::from_secs(8));
        assert_eq!(policy.delay_for(3), Duration::from_secs(10));
        assert_eq!(policy.delay_for(30), Duration::from_secs(10));
    }

    #[test]
    fn jittered_pause_stays_within_half_to_full_delay() {
        let policy = RetryPolicy::default().with_jitter(true);
        for attempt in 1..=4 {
            let full = policy.delay_for(attempt);
            let pause = policy.pause_for(attempt);
            assert!(pause <= full);
            assert!(pause >= full / 2);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_max_attempts() {
        let calls = &AtomicU32::new(0);
        let result: Result<(), String> = RetryPolicy::default()
            .run("always_fails", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("boom".to_string())
            })
            .await;
        assert_eq!(result, Err("boom".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_success() {
        let calls = &AtomicU32::new(0);
        let result: Result<u32, String> = RetryPolicy::default()
            .run("flaky", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 2 { Err("transient".to_string()) } else { Ok(n) }
            })
            .await;
        assert_eq!(result, Ok(2));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_between_attempts() {
        let start = tokio::time::Instant::now();
        let _: Result<(), &str> = RetryPolicy::default().run("slow", || async { Err("no") }).await;
        // 4s after the first failure, 8s after the second, none after the last.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(12) && elapsed < Duration::from_secs(13));
    }
}
