//! Standalone admission control service
//!
//! Wraps the [`gatelimit`] core in a long-running service: a single actor
//! task owns the sliding window state, an axum middleware enforces the
//! policy per request, and a small HTTP API serves programmatic checks,
//! health and metrics.
//!
//! The crate is consumed two ways: as the `gatelimit-server` binary, and
//! as a library for embedding the middleware in an existing axum app.

pub mod actor;
pub mod config;
pub mod http;
pub mod keys;
pub mod metrics;
pub mod middleware;
pub mod service;
pub mod types;

pub use config::Config;
pub use keys::{ClientIp, KeyExtractor};
pub use metrics::Metrics;
pub use service::{RateLimiter, RateLimiterBuilder};
pub use types::{CheckRequest, CheckResponse, Decision};
