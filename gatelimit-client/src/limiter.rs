//! Proactive outbound call guard
//!
//! Per-endpoint token buckets that let a client skip calls a server-side
//! limiter would reject anyway. Denials are advisory: the guard never
//! waits and never errors, it only answers whether a call should proceed
//! right now.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, SystemTime};

use gatelimit::TokenBucket;
use parking_lot::Mutex;

use crate::error::{ClientError, Result};

/// Tokens granted to endpoints matching no rule
pub const DEFAULT_CAPACITY: f64 = 60.0;

/// Seconds over which a drained bucket refills completely
const RECOVERY_SECS: f64 = 60.0;

#[derive(Debug, Clone)]
struct EndpointRule {
    fragment: String,
    capacity: f64,
}

fn builtin_rules() -> Vec<EndpointRule> {
    vec![
        EndpointRule {
            fragment: "/auth".to_string(),
            capacity: 5.0,
        },
        EndpointRule {
            fragment: "/compute".to_string(),
            capacity: 10.0,
        },
        EndpointRule {
            fragment: "/search".to_string(),
            capacity: 30.0,
        },
    ]
}

/// Client-side rate limit guard
///
/// Buckets are created lazily the first time an endpoint is seen, sized
/// by the longest rule fragment the endpoint contains. Every bucket
/// refills its full capacity over one minute.
#[derive(Debug)]
pub struct ClientRateLimiter {
    buckets: Mutex<HashMap<String, TokenBucket>>,
    rules: Vec<EndpointRule>,
    default_capacity: f64,
    enabled: AtomicBool,
}

impl ClientRateLimiter {
    /// Create a guard with the built-in endpoint table
    pub fn new() -> Self {
        Self::from_parts(builtin_rules(), DEFAULT_CAPACITY, true)
    }

    /// Create a guard builder
    pub fn builder() -> ClientRateLimiterBuilder {
        ClientRateLimiterBuilder::new()
    }

    /// Check whether a call to `endpoint` should proceed
    pub fn check_call(&self, endpoint: &str) -> bool {
        self.check_call_with_weight_at(endpoint, 1.0, SystemTime::now())
    }

    /// Check a call that consumes more than one token
    pub fn check_call_with_weight(&self, endpoint: &str, weight: f64) -> bool {
        self.check_call_with_weight_at(endpoint, weight, SystemTime::now())
    }

    /// Decision for `endpoint` at an explicit instant
    pub fn check_call_at(&self, endpoint: &str, now: SystemTime) -> bool {
        self.check_call_with_weight_at(endpoint, 1.0, now)
    }

    /// Weighted decision at an explicit instant
    pub fn check_call_with_weight_at(&self, endpoint: &str, weight: f64, now: SystemTime) -> bool {
        if !self.is_enabled() {
            return true;
        }

        let mut buckets = self.buckets.lock();
        let bucket = match buckets.entry(endpoint.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let capacity = self.capacity_for(entry.key());
                // Rules are validated at build time, construction cannot fail
                let Ok(bucket) = TokenBucket::new(capacity, capacity / RECOVERY_SECS, now) else {
                    return true;
                };
                entry.insert(bucket)
            }
        };

        let allowed = bucket.try_consume(weight, now);
        if !allowed {
            let retry_after = bucket.retry_after(now);
            tracing::debug!(
                endpoint,
                retry_after_ms = retry_after.as_millis() as u64,
                "Skipping call, client-side limit hit"
            );
        }
        allowed
    }

    /// How long until `endpoint` would admit a one-token call
    ///
    /// Zero for endpoints never seen and for a disabled guard.
    pub fn retry_after(&self, endpoint: &str) -> Duration {
        self.retry_after_at(endpoint, SystemTime::now())
    }

    /// Retry hint at an explicit instant
    pub fn retry_after_at(&self, endpoint: &str, now: SystemTime) -> Duration {
        if !self.is_enabled() {
            return Duration::ZERO;
        }

        let mut buckets = self.buckets.lock();
        match buckets.get_mut(endpoint) {
            Some(bucket) => bucket.retry_after(now),
            None => Duration::ZERO,
        }
    }

    /// Kill switch; a disabled guard admits everything and touches no state
    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Whether the guard is currently enforcing
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    fn capacity_for(&self, endpoint: &str) -> f64 {
        self.rules
            .iter()
            .filter(|rule| endpoint.contains(&rule.fragment))
            .max_by_key(|rule| rule.fragment.len())
            .map_or(self.default_capacity, |rule| rule.capacity)
    }

    fn from_parts(rules: Vec<EndpointRule>, default_capacity: f64, enabled: bool) -> Self {
        ClientRateLimiter {
            buckets: Mutex::new(HashMap::new()),
            rules,
            default_capacity,
            enabled: AtomicBool::new(enabled),
        }
    }
}

impl Default for ClientRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for guards with custom endpoint rules
pub struct ClientRateLimiterBuilder {
    rules: Vec<EndpointRule>,
    default_capacity: f64,
    enabled: bool,
}

impl Default for ClientRateLimiterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRateLimiterBuilder {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            default_capacity: DEFAULT_CAPACITY,
            enabled: true,
        }
    }

    /// Add an endpoint rule; custom rules win length ties against built-ins
    pub fn rule(mut self, fragment: impl Into<String>, capacity: f64) -> Self {
        self.rules.push(EndpointRule {
            fragment: fragment.into(),
            capacity,
        });
        self
    }

    /// Capacity for endpoints matching no rule
    pub fn default_capacity(mut self, capacity: f64) -> Self {
        self.default_capacity = capacity;
        self
    }

    /// Start the guard enabled or disabled
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Validate the rules and build the guard
    pub fn build(self) -> Result<ClientRateLimiter> {
        for rule in &self.rules {
            if rule.fragment.is_empty() || !rule.capacity.is_finite() || rule.capacity <= 0.0 {
                return Err(ClientError::InvalidRule {
                    fragment: rule.fragment.clone(),
                    capacity: rule.capacity,
                });
            }
        }
        if !self.default_capacity.is_finite() || self.default_capacity <= 0.0 {
            return Err(ClientError::InvalidDefaultCapacity(self.default_capacity));
        }

        let mut rules = builtin_rules();
        rules.extend(self.rules);
        Ok(ClientRateLimiter::from_parts(
            rules,
            self.default_capacity,
            self.enabled,
        ))
    }
}
