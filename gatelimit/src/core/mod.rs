//! Core components of the gatelimit rate limiting library
//!
//! This module contains the fundamental building blocks:
//! - [`bucket`]: Continuous-refill token buckets for proactive throttling
//! - [`window`]: Exact sliding window admission over per-key timestamp logs
//! - [`policy`]: Limit policies and the built-in presets
//! - [`guard`]: Per-operation guards for protecting individual methods

pub mod bucket;
pub mod guard;
pub mod policy;
pub mod window;

pub use bucket::TokenBucket;
pub use guard::{OperationGuard, RateLimitExceeded};
pub use policy::{DEFAULT_MESSAGE, Preset, RateLimitPolicy};
pub use window::{RateLimitInfo, SlidingWindowLimiter, SlidingWindowLimiterBuilder};

use std::error::Error;
use std::fmt;

/// Errors produced when constructing limiters from invalid parameters
///
/// Every constructor that accepts tunable numbers validates them eagerly:
/// nothing is clamped or silently corrected, a bad configuration fails at
/// build time rather than misbehaving under load.
///
/// # Example
///
/// ```
/// use gatelimit::{PolicyError, SlidingWindowLimiter};
/// use std::time::Duration;
///
/// match SlidingWindowLimiter::new(Duration::ZERO, 10) {
///     Err(PolicyError::InvalidWindow) => println!("zero-length window rejected"),
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyError {
    /// The window duration was zero
    InvalidWindow,
    /// The request limit was zero
    InvalidLimit,
    /// Token bucket capacity was not a positive finite number
    InvalidCapacity(f64),
    /// Token bucket refill rate was not a positive finite number
    InvalidRefillRate(f64),
    /// A preset name that matches no built-in preset
    UnknownPreset(String),
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyError::InvalidWindow => write!(f, "window duration must be greater than zero"),
            PolicyError::InvalidLimit => write!(f, "request limit must be greater than zero"),
            PolicyError::InvalidCapacity(c) => {
                write!(f, "bucket capacity must be positive and finite, got {c}")
            }
            PolicyError::InvalidRefillRate(r) => {
                write!(f, "refill rate must be positive and finite, got {r}")
            }
            PolicyError::UnknownPreset(name) => write!(f, "unknown rate limit preset: {name}"),
        }
    }
}

impl Error for PolicyError {}
