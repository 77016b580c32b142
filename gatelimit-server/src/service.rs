//! Admission service wrapping the limiter actor
//!
//! [`RateLimiter`] is the long-lived handle the middleware and the HTTP
//! API share. It owns the policy, the key extractor, the metrics registry
//! and the channel to the actor that holds the sliding window state.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use anyhow::Result;
use axum::extract::Request;
use gatelimit::{PolicyError, Preset, RateLimitPolicy, SlidingWindowLimiter};

use crate::actor::{LimiterActor, LimiterHandle};
use crate::keys::{GLOBAL_KEY, KeyExtractor};
use crate::metrics::Metrics;
use crate::types::Decision;

/// Default actor channel capacity
pub const DEFAULT_BUFFER_SIZE: usize = 100_000;

/// Default number of keys the window store pre-allocates for
pub const DEFAULT_STORE_CAPACITY: usize = 100_000;

/// Shared admission-control service
///
/// Cheap to share behind an [`Arc`]; every method takes `&self` because
/// all mutable state lives in the actor task.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    policy: RateLimitPolicy,
    handle: LimiterHandle,
    keys: KeyExtractor,
    metrics: Arc<Metrics>,
}

impl RateLimiter {
    /// Create a service enforcing `policy` with default sizing
    pub fn new(policy: RateLimitPolicy) -> Result<Self, PolicyError> {
        Self::builder(policy).build()
    }

    /// Create a service from a named preset
    pub fn from_preset(preset: Preset) -> Result<Self, PolicyError> {
        Self::new(preset.policy())
    }

    /// Start building a service with non-default sizing or key derivation
    pub fn builder(policy: RateLimitPolicy) -> RateLimiterBuilder {
        RateLimiterBuilder::new(policy)
    }

    /// The policy this service enforces
    pub fn policy(&self) -> &RateLimitPolicy {
        &self.policy
    }

    /// Metrics registry shared with the actor
    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Number of keys currently tracked by the window store
    pub async fn tracked_keys(&self) -> Result<usize> {
        self.handle.tracked_keys().await
    }

    /// Take a decision against the shared global key
    ///
    /// For callers with no request context, e.g. guarding a batch job.
    pub async fn check(&self) -> Result<Decision> {
        self.check_key(GLOBAL_KEY).await
    }

    /// Take a decision for an explicit key
    pub async fn check_key(&self, key: &str) -> Result<Decision> {
        let decision = self
            .handle
            .check(key.to_string(), SystemTime::now())
            .await?;
        self.metrics.record_decision(decision.allowed);
        Ok(decision)
    }

    /// Take a decision for an incoming request
    ///
    /// The key is derived by the configured [`KeyExtractor`] before any
    /// await, so the returned future does not borrow `req` and is `Send`
    /// even though the request body is not `Sync`.
    pub fn check_request(
        &self,
        req: &Request,
    ) -> impl Future<Output = Result<Decision>> + Send {
        let key = self.keys.extract(req);
        async move { self.check_key(&key).await }
    }

    /// Stop the actor task
    ///
    /// In-flight checks finish; later checks return an error.
    pub async fn close(&self) {
        self.handle.shutdown().await;
    }
}

/// Builder for [`RateLimiter`]
pub struct RateLimiterBuilder {
    policy: RateLimitPolicy,
    buffer_size: usize,
    store_capacity: usize,
    sweep_interval: Option<Duration>,
    keys: KeyExtractor,
    metrics: Option<Arc<Metrics>>,
}

impl RateLimiterBuilder {
    fn new(policy: RateLimitPolicy) -> Self {
        Self {
            policy,
            buffer_size: DEFAULT_BUFFER_SIZE,
            store_capacity: DEFAULT_STORE_CAPACITY,
            sweep_interval: None,
            keys: KeyExtractor::default(),
            metrics: None,
        }
    }

    /// Actor channel capacity (default: 100,000; minimum 1)
    ///
    /// A zero-capacity channel cannot be constructed, so zero is raised
    /// to one.
    pub fn buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size.max(1);
        self
    }

    /// Expected number of distinct keys (default: 100,000)
    pub fn store_capacity(mut self, store_capacity: usize) -> Self {
        self.store_capacity = store_capacity;
        self
    }

    /// How often the actor evicts idle keys (default: one window; minimum 1ms)
    ///
    /// The actor's timer requires a non-zero period, so zero is raised to
    /// one millisecond.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = Some(interval.max(Duration::from_millis(1)));
        self
    }

    /// Key derivation strategy (default: peer IP)
    pub fn key_extractor(mut self, keys: KeyExtractor) -> Self {
        self.keys = keys;
        self
    }

    /// Use an existing metrics registry instead of a fresh one
    pub fn metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate the policy, spawn the actor and return the service
    pub fn build(self) -> Result<RateLimiter, PolicyError> {
        self.policy.validate()?;

        let sweep_interval = self.sweep_interval.unwrap_or(self.policy.window);
        let limiter = SlidingWindowLimiter::builder()
            .window(self.policy.window)
            .max_requests(self.policy.max_requests)
            .capacity(self.store_capacity)
            .sweep_interval(sweep_interval)
            .build()?;

        let metrics = self.metrics.unwrap_or_else(|| Arc::new(Metrics::new()));
        let handle = LimiterActor::spawn(
            self.buffer_size,
            limiter,
            sweep_interval,
            Arc::clone(&metrics),
        );

        Ok(RateLimiter {
            policy: self.policy,
            handle,
            keys: self.keys,
            metrics,
        })
    }
}
