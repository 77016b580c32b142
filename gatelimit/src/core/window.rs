//! Exact sliding window admission
//!
//! Every key owns an ordered log of admission timestamps. A check prunes
//! the log to the live window and admits only while fewer than the limit
//! survive, so the quota holds over *any* window-length interval, not just
//! aligned buckets. Memory is bounded by periodic sweeps that drop keys
//! whose logs have gone empty.

use std::collections::VecDeque;
use std::time::{Duration, SystemTime};

#[cfg(feature = "ahash")]
use ahash::AHashMap as HashMap;
#[cfg(not(feature = "ahash"))]
use std::collections::HashMap;

use super::PolicyError;
use super::policy::RateLimitPolicy;

// Configuration constants
const DEFAULT_CAPACITY: usize = 1000;
const CAPACITY_OVERHEAD_FACTOR: f64 = 1.3;
const DEFAULT_WINDOW_SECS: u64 = 60;
const DEFAULT_MAX_REQUESTS: u32 = 60;

/// Quota snapshot for a single key
///
/// `retry_after` is populated only when the quota is exhausted
/// (`remaining == 0`): the gap until the oldest logged admission leaves the
/// window, rounded up to whole seconds. `reset` is the wall-clock instant
/// the window fully drains; for a key with no live entries it is the
/// hypothetical horizon `now + window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitInfo {
    /// Maximum admissions per window
    pub limit: u32,
    /// Admissions left before the quota is exhausted
    pub remaining: u32,
    /// When the current window fully drains
    pub reset: SystemTime,
    /// Whole-second wait until a slot frees, present only at quota
    pub retry_after: Option<Duration>,
}

/// Sliding window rate limiter over per-key timestamp logs
///
/// Unlike fixed buckets, the window slides continuously: an admission at
/// `t` counts against every check in `(t, t + window]`, so a burst just
/// before a bucket boundary cannot be doubled just after it. Denied checks
/// leave no trace.
///
/// The limiter is single-writer by design. Wrap it in a mutex for shared
/// use, or give it to a dedicated task and communicate through channels.
///
/// # Example
///
/// ```
/// use gatelimit::SlidingWindowLimiter;
/// use std::time::{Duration, SystemTime};
///
/// let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 2)?;
/// let now = SystemTime::now();
///
/// assert!(limiter.check("user:42", now));
/// assert!(limiter.check("user:42", now));
/// assert!(!limiter.check("user:42", now));
///
/// let info = limiter.info("user:42", now);
/// assert_eq!(info.remaining, 0);
/// assert!(info.retry_after.is_some());
/// # Ok::<(), gatelimit::PolicyError>(())
/// ```
pub struct SlidingWindowLimiter {
    window: Duration,
    max_requests: u32,
    hits: HashMap<String, VecDeque<SystemTime>>,
    sweep_interval: Duration,
    next_sweep: SystemTime,
}

/// Builder for configuring a [`SlidingWindowLimiter`]
///
/// # Example
///
/// ```
/// use gatelimit::SlidingWindowLimiter;
/// use std::time::Duration;
///
/// let limiter = SlidingWindowLimiter::builder()
///     .window(Duration::from_secs(900))
///     .max_requests(100)
///     .capacity(100_000)
///     .build()?;
/// # Ok::<(), gatelimit::PolicyError>(())
/// ```
pub struct SlidingWindowLimiterBuilder {
    window: Duration,
    max_requests: u32,
    capacity: usize,
    sweep_interval: Option<Duration>,
}

impl SlidingWindowLimiter {
    /// Create a limiter admitting `max_requests` per `window`
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidWindow`] or
    /// [`PolicyError::InvalidLimit`] when either parameter is zero.
    pub fn new(window: Duration, max_requests: u32) -> Result<Self, PolicyError> {
        Self::builder().window(window).max_requests(max_requests).build()
    }

    /// Create a limiter from a [`RateLimitPolicy`]'s window and limit
    pub fn from_policy(policy: &RateLimitPolicy) -> Result<Self, PolicyError> {
        Self::new(policy.window, policy.max_requests)
    }

    /// Create a new builder for configuring a limiter
    pub fn builder() -> SlidingWindowLimiterBuilder {
        SlidingWindowLimiterBuilder::new()
    }

    /// The configured window length
    pub fn window(&self) -> Duration {
        self.window
    }

    /// The configured per-window admission limit
    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    /// Number of keys currently holding state
    pub fn tracked_keys(&self) -> usize {
        self.hits.len()
    }

    /// Record one admission attempt for `key` at `now`
    ///
    /// Prunes the key's log to entries still inside the window, then admits
    /// and logs the attempt if the quota allows. A denied attempt is not
    /// logged, so callers hammering a full window do not push their own
    /// recovery further out.
    pub fn check(&mut self, key: &str, now: SystemTime) -> bool {
        self.maybe_sweep(now);
        let window_start = self.window_start(now);
        match self.hits.get_mut(key) {
            Some(log) => {
                prune(log, window_start);
                if log.len() < self.max_requests as usize {
                    log.push_back(now);
                    true
                } else {
                    false
                }
            }
            None => {
                // max_requests is at least one, so a fresh key always admits
                let mut log = VecDeque::new();
                log.push_back(now);
                self.hits.insert(key.to_string(), log);
                true
            }
        }
    }

    /// Quota snapshot for `key` at `now`, without consuming an admission
    ///
    /// Prunes the key's log the same way [`check`](Self::check) does but
    /// never appends. Unknown keys report a full quota.
    pub fn info(&mut self, key: &str, now: SystemTime) -> RateLimitInfo {
        let window_start = self.window_start(now);
        let (used, oldest) = match self.hits.get_mut(key) {
            Some(log) => {
                prune(log, window_start);
                (log.len() as u32, log.front().copied())
            }
            None => (0, None),
        };

        let remaining = self.max_requests.saturating_sub(used);
        let reset = oldest.unwrap_or(now) + self.window;
        let retry_after = if remaining == 0 {
            Some(ceil_secs(reset.duration_since(now).unwrap_or_default()))
        } else {
            None
        };

        RateLimitInfo {
            limit: self.max_requests,
            remaining,
            reset,
            retry_after,
        }
    }

    /// Drop every key whose log holds no live entries
    ///
    /// Returns the number of keys removed. The limiter also runs this
    /// opportunistically from [`check`](Self::check) once per
    /// `sweep_interval`, so embedded use stays bounded without a timer;
    /// services with their own scheduler can call it directly.
    pub fn sweep(&mut self, now: SystemTime) -> usize {
        let window_start = self.window_start(now);
        let before = self.hits.len();
        self.hits.retain(|_, log| {
            prune(log, window_start);
            !log.is_empty()
        });
        before - self.hits.len()
    }

    fn maybe_sweep(&mut self, now: SystemTime) {
        if now >= self.next_sweep {
            self.sweep(now);
            self.next_sweep = now + self.sweep_interval;
        }
    }

    fn window_start(&self, now: SystemTime) -> SystemTime {
        now.checked_sub(self.window).unwrap_or(SystemTime::UNIX_EPOCH)
    }
}

/// Drop leading entries at or before `window_start`
///
/// Only strictly newer timestamps count against the quota, so an entry
/// aged exactly one window frees its slot.
fn prune(log: &mut VecDeque<SystemTime>, window_start: SystemTime) {
    while log.front().is_some_and(|&t| t <= window_start) {
        log.pop_front();
    }
}

fn ceil_secs(d: Duration) -> Duration {
    if d.subsec_nanos() == 0 {
        d
    } else {
        Duration::from_secs(d.as_secs() + 1)
    }
}

impl Default for SlidingWindowLimiterBuilder {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(DEFAULT_WINDOW_SECS),
            max_requests: DEFAULT_MAX_REQUESTS,
            capacity: DEFAULT_CAPACITY,
            sweep_interval: None,
        }
    }
}

impl SlidingWindowLimiterBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window length
    pub fn window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Set the per-window admission limit
    pub fn max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    /// Set the expected number of unique keys
    ///
    /// The key map allocates 30% more space to reduce rehashing.
    pub fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the interval between opportunistic sweeps
    ///
    /// Defaults to the window length: sooner is wasted work, since no
    /// entry can expire in less than a window.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval);
        self
    }

    /// Build the limiter with the configured settings
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidWindow`] or
    /// [`PolicyError::InvalidLimit`] when either parameter is zero.
    pub fn build(self) -> Result<SlidingWindowLimiter, PolicyError> {
        if self.window.is_zero() {
            return Err(PolicyError::InvalidWindow);
        }
        if self.max_requests == 0 {
            return Err(PolicyError::InvalidLimit);
        }
        Ok(SlidingWindowLimiter {
            window: self.window,
            max_requests: self.max_requests,
            // Pre-allocate with overhead to avoid rehashing
            hits: HashMap::with_capacity((self.capacity as f64 * CAPACITY_OVERHEAD_FACTOR) as usize),
            sweep_interval: self.sweep_interval.unwrap_or(self.window),
            // The first check sweeps immediately and schedules the next
            // one from its own clock, keeping synthetic clocks viable.
            next_sweep: SystemTime::UNIX_EPOCH,
        })
    }
}
