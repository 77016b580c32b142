//! Continuous-refill token bucket
//!
//! The bucket accrues fractional tokens at a fixed rate and never waits:
//! a consume attempt either succeeds immediately or fails immediately,
//! which makes it suitable for proactive client-side throttling where
//! queueing requests is not an option.

use std::time::{Duration, SystemTime};

use super::PolicyError;

/// A token bucket with continuous refill
///
/// Tokens accrue lazily: every operation first credits the elapsed time
/// since the last touch (`elapsed_secs * refill_rate`, clamped to the
/// capacity) and then acts on the updated balance. The bucket starts full
/// so configured bursts are available immediately.
///
/// Capacity, rate, and consume amounts are all `f64`, so sub-unit rates
/// (half a token per second) and weighted requests are first-class.
///
/// All time-dependent operations take an explicit `now: SystemTime` so
/// callers control the clock and tests never sleep.
///
/// # Example
///
/// ```
/// use gatelimit::TokenBucket;
/// use std::time::{Duration, SystemTime};
///
/// let now = SystemTime::now();
/// // 10-request burst, restored over a minute
/// let mut bucket = TokenBucket::new(10.0, 10.0 / 60.0, now)?;
///
/// assert!(bucket.try_consume(1.0, now));
/// assert!(bucket.available(now) < 10.0);
///
/// // A minute later the bucket is full again
/// let later = now + Duration::from_secs(60);
/// assert_eq!(bucket.available(later), 10.0);
/// # Ok::<(), gatelimit::PolicyError>(())
/// ```
#[derive(Debug, Clone)]
pub struct TokenBucket {
    capacity: f64,
    /// Tokens credited per second
    refill_rate: f64,
    tokens: f64,
    last_refill: SystemTime,
}

impl TokenBucket {
    /// Create a full bucket
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidCapacity`] or
    /// [`PolicyError::InvalidRefillRate`] when either number is zero,
    /// negative, or not finite.
    pub fn new(capacity: f64, refill_rate: f64, now: SystemTime) -> Result<Self, PolicyError> {
        if !capacity.is_finite() || capacity <= 0.0 {
            return Err(PolicyError::InvalidCapacity(capacity));
        }
        if !refill_rate.is_finite() || refill_rate <= 0.0 {
            return Err(PolicyError::InvalidRefillRate(refill_rate));
        }
        Ok(TokenBucket {
            capacity,
            refill_rate,
            tokens: capacity,
            last_refill: now,
        })
    }

    /// Maximum number of tokens the bucket can hold
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Tokens credited per second
    pub fn refill_rate(&self) -> f64 {
        self.refill_rate
    }

    /// Consume `tokens` if the refreshed balance covers them
    ///
    /// On failure the balance is left unchanged, but the refill that
    /// preceded the attempt persists. Requests that are negative or not
    /// finite never succeed.
    pub fn try_consume(&mut self, tokens: f64, now: SystemTime) -> bool {
        if !tokens.is_finite() || tokens < 0.0 {
            return false;
        }
        self.refill(now);
        if self.tokens >= tokens {
            self.tokens -= tokens;
            true
        } else {
            false
        }
    }

    /// Current token balance after crediting elapsed time
    ///
    /// Reading the balance advances the refill clock. This is intentional:
    /// the balance is only meaningful at `now`, and updating `last_refill`
    /// here keeps later accruals from double-counting the same interval.
    pub fn available(&mut self, now: SystemTime) -> f64 {
        self.refill(now);
        self.tokens
    }

    /// How long until a single token is available
    ///
    /// Returns [`Duration::ZERO`] when at least one token is already
    /// available, otherwise the time to accrue one token at the configured
    /// rate, rounded up to whole milliseconds.
    pub fn retry_after(&mut self, now: SystemTime) -> Duration {
        self.refill(now);
        if self.tokens >= 1.0 {
            return Duration::ZERO;
        }
        Duration::from_millis((1000.0 / self.refill_rate).ceil() as u64)
    }

    fn refill(&mut self, now: SystemTime) {
        // A clock that moved backwards accrues nothing and does not
        // disturb the refill anchor.
        let Ok(elapsed) = now.duration_since(self.last_refill) else {
            return;
        };
        if elapsed.is_zero() {
            return;
        }
        self.tokens = (self.tokens + elapsed.as_secs_f64() * self.refill_rate).min(self.capacity);
        self.last_refill = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[test]
    fn test_starts_full() {
        let now = base();
        let mut bucket = TokenBucket::new(10.0, 1.0, now).unwrap();
        assert_eq!(bucket.available(now), 10.0);
    }

    #[test]
    fn test_rejects_invalid_parameters() {
        let now = base();
        assert!(matches!(
            TokenBucket::new(0.0, 1.0, now),
            Err(PolicyError::InvalidCapacity(_))
        ));
        assert!(matches!(
            TokenBucket::new(-5.0, 1.0, now),
            Err(PolicyError::InvalidCapacity(_))
        ));
        assert!(matches!(
            TokenBucket::new(f64::NAN, 1.0, now),
            Err(PolicyError::InvalidCapacity(_))
        ));
        assert!(matches!(
            TokenBucket::new(10.0, 0.0, now),
            Err(PolicyError::InvalidRefillRate(_))
        ));
        assert!(matches!(
            TokenBucket::new(10.0, f64::INFINITY, now),
            Err(PolicyError::InvalidRefillRate(_))
        ));
    }

    #[test]
    fn test_burst_capacity_then_denial() {
        let now = base();
        let mut bucket = TokenBucket::new(10.0, 10.0 / 60.0, now).unwrap();
        for _ in 0..10 {
            assert!(bucket.try_consume(1.0, now));
        }
        assert!(!bucket.try_consume(1.0, now));
    }

    #[test]
    fn test_one_token_returns_after_six_seconds() {
        let now = base();
        let mut bucket = TokenBucket::new(10.0, 10.0 / 60.0, now).unwrap();
        for _ in 0..10 {
            assert!(bucket.try_consume(1.0, now));
        }
        // 10 tokens per 60s is one token every 6s; nudge past the boundary
        // to stay clear of float rounding.
        let later = now + Duration::from_millis(6_050);
        assert!(bucket.try_consume(1.0, later));
        assert!(!bucket.try_consume(1.0, later));
    }

    #[test]
    fn test_refill_is_proportional_and_clamped() {
        let now = base();
        let mut bucket = TokenBucket::new(10.0, 10.0 / 60.0, now).unwrap();
        assert!(bucket.try_consume(10.0, now));

        let half = now + Duration::from_secs(30);
        assert!((bucket.available(half) - 5.0).abs() < 1e-6);

        // Well past a full refill period the balance clamps at capacity
        let long_after = now + Duration::from_secs(600);
        assert_eq!(bucket.available(long_after), 10.0);
    }

    #[test]
    fn test_weighted_consume() {
        let now = base();
        let mut bucket = TokenBucket::new(10.0, 1.0, now).unwrap();
        assert!(bucket.try_consume(7.0, now));
        assert!(!bucket.try_consume(7.0, now));
        assert!(bucket.try_consume(3.0, now));
    }

    #[test]
    fn test_fractional_rates_accrue() {
        let now = base();
        let mut bucket = TokenBucket::new(2.0, 0.5, now).unwrap();
        assert!(bucket.try_consume(2.0, now));
        assert!(!bucket.try_consume(1.0, now + Duration::from_secs(1)));
        assert!(bucket.try_consume(1.0, now + Duration::from_secs(2)));
    }

    #[test]
    fn test_retry_after_hint() {
        let now = base();
        let mut bucket = TokenBucket::new(1.0, 0.5, now).unwrap();
        assert_eq!(bucket.retry_after(now), Duration::ZERO);
        assert!(bucket.try_consume(1.0, now));
        // One token at 0.5 tokens/s takes two seconds
        assert_eq!(bucket.retry_after(now), Duration::from_millis(2000));

        let mut fast = TokenBucket::new(1.0, 3.0, now).unwrap();
        assert!(fast.try_consume(1.0, now));
        assert_eq!(fast.retry_after(now), Duration::from_millis(334));
    }

    #[test]
    fn test_clock_regression_accrues_nothing() {
        let now = base();
        let mut bucket = TokenBucket::new(10.0, 1.0, now).unwrap();
        assert!(bucket.try_consume(10.0, now));

        let past = now - Duration::from_secs(30);
        assert_eq!(bucket.available(past), 0.0);

        // The anchor did not move backwards: one second after the original
        // touch, exactly one token has accrued.
        let later = now + Duration::from_secs(1);
        assert!((bucket.available(later) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_requests_never_succeed() {
        let now = base();
        let mut bucket = TokenBucket::new(10.0, 1.0, now).unwrap();
        assert!(!bucket.try_consume(-1.0, now));
        assert!(!bucket.try_consume(f64::NAN, now));
        assert_eq!(bucket.available(now), 10.0);
        // A zero-cost request trivially succeeds
        assert!(bucket.try_consume(0.0, now));
    }
}
