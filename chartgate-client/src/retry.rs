//! Exponential backoff with jitter, and a generic retry-policy trait. Used
//! both by the reconnection supervisor (§4.5) and as the one-shot retry
//! policies described in §4.1 and §6.

use std::time::Duration;

use rand::Rng;

/// Generates a sequence of backoff delays: base, doubling each step, capped,
/// with `+/- 20%` jitter applied to every value, per §4.5.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base: Duration,
    cap: Duration,
    factor: u32,
    jitter: f64,
    attempt: u32,
    max_attempts: Option<u32>,
}

impl ExponentialBackoff {
    /// `base`, doubling (`factor = 2`), capped at `cap`, `+/- 20%` jitter.
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            factor: 2,
            jitter: 0.2,
            attempt: 0,
            max_attempts: None,
        }
    }

    /// Limit the number of retries this backoff will produce before
    /// returning `None` forever. Used by the one-shot retry policies (§4.1,
    /// §6) by passing `Some(1)`.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// The next delay to wait before retrying, or `None` if retries are
    /// exhausted.
    pub fn next(&mut self) -> Option<Duration> {
        if let Some(max) = self.max_attempts {
            if self.attempt >= max {
                return None;
            }
        }

        let exp = self.factor.saturating_pow(self.attempt);
        let raw = self.base.saturating_mul(exp).min(self.cap);
        self.attempt += 1;

        let jittered = jitter(raw, self.jitter);
        Some(jittered)
    }

    /// Reset the attempt counter, e.g. after a connection has been stably
    /// `Ready` for a while.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

fn jitter(d: Duration, fraction: f64) -> Duration {
    let mut rng = rand::thread_rng();
    let factor = 1.0 + rng.gen_range(-fraction..=fraction);
    let nanos = (d.as_nanos() as f64 * factor).max(0.0);
    Duration::from_nanos(nanos as u64)
}

/// Generic retry policy trait: given the error that just occurred, decide
/// whether and how long to wait before retrying.
pub trait RetryPolicy<E> {
    fn next_delay(&mut self, error: &E) -> Option<Duration>;
}

impl<E> RetryPolicy<E> for ExponentialBackoff {
    fn next_delay(&mut self, _error: &E) -> Option<Duration> {
        self.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut b = ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(30));
        // With jitter, check bounds rather than exact values.
        for expected_base_ms in [500u64, 1000, 2000, 4000] {
            let d = b.next().unwrap();
            let lower = (expected_base_ms as f64 * 0.8) as u64;
            let upper = (expected_base_ms as f64 * 1.2) as u64;
            let ms = d.as_millis() as u64;
            assert!(
                ms >= lower && ms <= upper,
                "expected ~{expected_base_ms}ms, got {ms}ms"
            );
        }
    }

    #[test]
    fn backoff_respects_cap() {
        let mut b = ExponentialBackoff::new(Duration::from_millis(500), Duration::from_secs(30));
        for _ in 0..20 {
            let d = b.next().unwrap();
            assert!(d <= Duration::from_secs(36)); // cap + max jitter
        }
    }

    #[test]
    fn one_shot_retry_stops_after_single_attempt() {
        let mut b = ExponentialBackoff::new(Duration::from_millis(100), Duration::from_secs(1))
            .with_max_attempts(1);
        assert!(b.next().is_some());
        assert!(b.next().is_none());
    }
}
