//! Common types shared by the actor, middleware, and HTTP surface

use gatelimit::RateLimitInfo;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Outcome of one admission check
///
/// `info` is populated on allow and deny alike, so callers can surface
/// quota headers proactively instead of only when a request is rejected.
#[derive(Debug, Clone, Copy)]
pub struct Decision {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Quota snapshot taken in the same actor turn as the decision
    pub info: RateLimitInfo,
}

/// Request body for `POST /check`
///
/// An absent `key` checks the shared global key, mirroring programmatic
/// checks that carry no request context.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckRequest {
    /// Key to check, used verbatim
    pub key: Option<String>,
}

/// Response body for `POST /check`
///
/// A denied check is still a successful HTTP exchange; the decision is the
/// payload. `retry_after` appears only when the quota is exhausted.
#[derive(Debug, Serialize, Deserialize)]
pub struct CheckResponse {
    /// Whether the request may proceed
    pub allowed: bool,
    /// Maximum admissions per window
    pub limit: u32,
    /// Admissions left before the quota is exhausted
    pub remaining: u32,
    /// Unix seconds when the current window fully drains
    pub reset: u64,
    /// Seconds to wait before retrying, present only at quota
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

impl From<Decision> for CheckResponse {
    fn from(decision: Decision) -> Self {
        CheckResponse {
            allowed: decision.allowed,
            limit: decision.info.limit,
            remaining: decision.info.remaining,
            reset: unix_secs(decision.info.reset),
            retry_after: decision.info.retry_after.map(|d| d.as_secs()),
        }
    }
}

/// JSON body for middleware rejections and internal errors
#[derive(Debug, Serialize, Deserialize)]
pub struct RejectionBody {
    /// Human-readable reason
    pub error: String,
    /// Seconds to wait before retrying
    #[serde(rename = "retryAfter", skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
}

pub(crate) fn unix_secs(t: SystemTime) -> u64 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
