//! # Gatelimit
//!
//! Rate limiting and admission control primitives for Rust services.
//!
//! ## Overview
//!
//! Gatelimit provides two complementary enforcement mechanisms:
//! - **Sliding window**: exact per-key admission over a timestamp log. The
//!   quota holds over *any* window-length interval, so bursts cannot be
//!   doubled across bucket boundaries.
//! - **Token bucket**: continuous fractional refill for proactive
//!   client-side throttling that never queues and never waits.
//!
//! Decisions are instantaneous allow/deny; denied work is dropped, not
//! delayed. All time-dependent operations take an explicit
//! `now: SystemTime`, so callers own the clock and tests never sleep.
//!
//! ## Quick Start
//!
//! ```
//! use gatelimit::SlidingWindowLimiter;
//! use std::time::{Duration, SystemTime};
//!
//! // 60 requests per rolling minute, per key
//! let mut limiter = SlidingWindowLimiter::new(Duration::from_secs(60), 60)?;
//!
//! let now = SystemTime::now();
//! if limiter.check("rate-limit:203.0.113.7", now) {
//!     // handle the request
//! } else {
//!     let info = limiter.info("rate-limit:203.0.113.7", now);
//!     println!(
//!         "limited, retry in {} seconds",
//!         info.retry_after.unwrap_or_default().as_secs()
//!     );
//! }
//! # Ok::<(), gatelimit::PolicyError>(())
//! ```
//!
//! ## Presets
//!
//! [`Preset`] carries the shared limit profiles (`strict`, `normal`,
//! `relaxed`, `api`, `auth`, `search`, `compute`) so route configuration
//! stays declarative:
//!
//! ```
//! use gatelimit::{Preset, SlidingWindowLimiter};
//!
//! // Five authentication attempts per 15 minutes
//! let policy = Preset::Auth.policy();
//! let limiter = SlidingWindowLimiter::from_policy(&policy)?;
//! assert_eq!(limiter.max_requests(), 5);
//! # Ok::<(), gatelimit::PolicyError>(())
//! ```
//!
//! ## Guarding individual operations
//!
//! [`OperationGuard`] protects one named operation with its own private
//! window, independent of any shared limiter:
//!
//! ```
//! use gatelimit::OperationGuard;
//! use std::time::{Duration, SystemTime};
//!
//! let guard = OperationGuard::new("ReportService.generate", Duration::from_secs(60), 5)?;
//! if let Err(denied) = guard.try_acquire(SystemTime::now()) {
//!     // "Rate limit exceeded for ReportService.generate. Retry after N seconds"
//!     println!("{denied}");
//! }
//! # Ok::<(), gatelimit::PolicyError>(())
//! ```
//!
//! ## Memory
//!
//! The window limiter holds one timestamp per admitted request and one map
//! entry per active key. Entries age out of the log as the window slides;
//! idle keys are dropped by [`SlidingWindowLimiter::sweep`], which also
//! runs opportunistically from `check` once per sweep interval.
//!
//! ## Thread Safety
//!
//! Limiters are single-writer. For concurrent access either wrap one in a
//! mutex or give it to a dedicated task and communicate through channels;
//! the `gatelimit-server` crate does the latter.
//!
//! ## Features
//!
//! - `ahash` (default): use AHash for faster key hashing

pub mod core;

pub use core::{
    DEFAULT_MESSAGE, OperationGuard, PolicyError, Preset, RateLimitExceeded, RateLimitInfo,
    RateLimitPolicy, SlidingWindowLimiter, SlidingWindowLimiterBuilder, TokenBucket,
};
