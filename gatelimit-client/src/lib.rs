//! Client-side rate limit guard for outbound calls
//!
//! This crate provides a proactive guard built on the `gatelimit` core:
//! per-endpoint token buckets sized by path heuristics, so callers can
//! skip requests a server-side limiter would reject anyway.

pub mod error;
pub mod limiter;

pub use error::{ClientError, Result};
pub use limiter::{ClientRateLimiter, ClientRateLimiterBuilder, DEFAULT_CAPACITY};
