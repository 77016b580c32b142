//! Limit policies and built-in presets
//!
//! A [`RateLimitPolicy`] bundles everything an enforcement point needs:
//! the window, the per-window limit, the rejection message, and how quota
//! headers should be rendered. [`Preset`] provides the profiles shared
//! across services so route configuration stays declarative.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use super::PolicyError;

/// Rejection body text used when a policy carries no custom message
pub const DEFAULT_MESSAGE: &str = "Too many requests, please try again later.";

const AUTH_MESSAGE: &str = "Too many authentication attempts, please try again later.";
const COMPUTE_MESSAGE: &str = "Rate limit exceeded for compute-intensive operations.";

/// Configuration for one enforcement point
///
/// Built from a [`Preset`] or [`RateLimitPolicy::new`], then adjusted with
/// the consuming `with_*` methods; the last write wins. Policies built
/// through [`new`](Self::new) are validated eagerly; hand-adjusted values
/// are re-validated wherever a limiter is constructed from the policy.
///
/// # Example
///
/// ```
/// use gatelimit::Preset;
/// use std::time::Duration;
///
/// // The api profile, tightened for one expensive route
/// let policy = Preset::Api
///     .policy()
///     .with_max_requests(20)
///     .with_message("Report generation is limited, try again shortly.");
/// assert_eq!(policy.window, Duration::from_secs(900));
/// assert_eq!(policy.max_requests, 20);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RateLimitPolicy {
    /// Window length
    pub window: Duration,
    /// Admissions allowed per window
    pub max_requests: u32,
    /// Rejection body text; `None` falls back to [`DEFAULT_MESSAGE`]
    pub message: Option<String>,
    /// Emit quota headers on responses
    pub headers: bool,
    /// Use draft `RateLimit-*` headers instead of legacy `X-RateLimit-*`
    pub draft_headers: bool,
    /// Accepted for configuration compatibility; no code path consults it
    pub skip_successful_requests: bool,
    /// Accepted for configuration compatibility; no code path consults it
    pub skip_failed_requests: bool,
}

impl RateLimitPolicy {
    /// Create a policy admitting `max_requests` per `window`
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidWindow`] or
    /// [`PolicyError::InvalidLimit`] when either parameter is zero.
    pub fn new(window: Duration, max_requests: u32) -> Result<Self, PolicyError> {
        let policy = Self::unchecked(window, max_requests, None);
        policy.validate()?;
        Ok(policy)
    }

    /// Check the tunable numbers without consuming the policy
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.window.is_zero() {
            return Err(PolicyError::InvalidWindow);
        }
        if self.max_requests == 0 {
            return Err(PolicyError::InvalidLimit);
        }
        Ok(())
    }

    /// Replace the window length
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Replace the per-window admission limit
    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }

    /// Replace the rejection message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Enable or disable quota headers
    pub fn with_headers(mut self, headers: bool) -> Self {
        self.headers = headers;
        self
    }

    /// Switch between draft `RateLimit-*` and legacy `X-RateLimit-*` headers
    pub fn with_draft_headers(mut self, draft_headers: bool) -> Self {
        self.draft_headers = draft_headers;
        self
    }

    /// The rejection message, falling back to [`DEFAULT_MESSAGE`]
    pub fn message_or_default(&self) -> &str {
        self.message.as_deref().unwrap_or(DEFAULT_MESSAGE)
    }

    fn unchecked(window: Duration, max_requests: u32, message: Option<String>) -> Self {
        RateLimitPolicy {
            window,
            max_requests,
            message,
            headers: true,
            draft_headers: false,
            skip_successful_requests: false,
            skip_failed_requests: false,
        }
    }
}

/// Built-in limit profiles
///
/// | Preset | Window | Limit | Message |
/// |---|---|---|---|
/// | `strict` | 60 s | 10 | default |
/// | `normal` | 60 s | 60 | default |
/// | `relaxed` | 60 s | 100 | default |
/// | `api` | 15 min | 100 | default |
/// | `auth` | 15 min | 5 | custom lockout message |
/// | `search` | 60 s | 30 | default |
/// | `compute` | 60 s | 5 | custom cost message |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Sensitive or abuse-prone routes
    Strict,
    /// General traffic
    Normal,
    /// High-volume read paths
    Relaxed,
    /// Public API quota
    Api,
    /// Login and credential endpoints
    Auth,
    /// Search queries
    Search,
    /// Expensive computations
    Compute,
}

impl Preset {
    /// Every built-in preset, in declaration order
    pub const ALL: [Preset; 7] = [
        Preset::Strict,
        Preset::Normal,
        Preset::Relaxed,
        Preset::Api,
        Preset::Auth,
        Preset::Search,
        Preset::Compute,
    ];

    /// The preset's configuration name
    pub fn name(self) -> &'static str {
        match self {
            Preset::Strict => "strict",
            Preset::Normal => "normal",
            Preset::Relaxed => "relaxed",
            Preset::Api => "api",
            Preset::Auth => "auth",
            Preset::Search => "search",
            Preset::Compute => "compute",
        }
    }

    /// The policy this preset stands for
    pub fn policy(self) -> RateLimitPolicy {
        let (window_secs, max_requests) = match self {
            Preset::Strict => (60, 10),
            Preset::Normal => (60, 60),
            Preset::Relaxed => (60, 100),
            Preset::Api => (900, 100),
            Preset::Auth => (900, 5),
            Preset::Search => (60, 30),
            Preset::Compute => (60, 5),
        };
        let message = match self {
            Preset::Auth => Some(AUTH_MESSAGE.to_string()),
            Preset::Compute => Some(COMPUTE_MESSAGE.to_string()),
            _ => None,
        };
        RateLimitPolicy::unchecked(Duration::from_secs(window_secs), max_requests, message)
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(Preset::Strict),
            "normal" => Ok(Preset::Normal),
            "relaxed" => Ok(Preset::Relaxed),
            "api" => Ok(Preset::Api),
            "auth" => Ok(Preset::Auth),
            "search" => Ok(Preset::Search),
            "compute" => Ok(Preset::Compute),
            _ => Err(PolicyError::UnknownPreset(s.to_string())),
        }
    }
}
