//! Per-operation admission guards
//!
//! The guard protects one named operation with its own private window,
//! independent of any shared limiter. A service struct holds one guard per
//! protected method and consults it before doing the work.

use std::fmt;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use super::PolicyError;
use super::policy::RateLimitPolicy;
use super::window::SlidingWindowLimiter;

/// An operation was denied by its [`OperationGuard`]
///
/// Formats as
/// `Rate limit exceeded for <operation>. Retry after <n> seconds`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitExceeded {
    /// Display name of the guarded operation
    pub operation: String,
    /// Whole-second wait until the operation can run again
    pub retry_after: Duration,
}

impl fmt::Display for RateLimitExceeded {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rate limit exceeded for {}. Retry after {} seconds",
            self.operation,
            self.retry_after.as_secs()
        )
    }
}

impl std::error::Error for RateLimitExceeded {}

/// Admission guard for a single named operation
///
/// The name doubles as the limiter key and the identity callers see in
/// rejections; the convention is `Service.method`.
///
/// # Example
///
/// ```
/// use gatelimit::OperationGuard;
/// use std::time::{Duration, SystemTime};
///
/// let guard = OperationGuard::new("ReportService.generate", Duration::from_secs(60), 1)?;
/// let now = SystemTime::now();
///
/// assert!(guard.try_acquire(now).is_ok());
/// let denied = guard.try_acquire(now).unwrap_err();
/// assert!(denied.to_string().starts_with("Rate limit exceeded for ReportService.generate"));
/// # Ok::<(), gatelimit::PolicyError>(())
/// ```
pub struct OperationGuard {
    name: String,
    limiter: Mutex<SlidingWindowLimiter>,
}

impl OperationGuard {
    /// Create a guard admitting `max_requests` runs per `window`
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidWindow`] or
    /// [`PolicyError::InvalidLimit`] when either parameter is zero.
    pub fn new(
        name: impl Into<String>,
        window: Duration,
        max_requests: u32,
    ) -> Result<Self, PolicyError> {
        Ok(OperationGuard {
            name: name.into(),
            limiter: Mutex::new(SlidingWindowLimiter::new(window, max_requests)?),
        })
    }

    /// Create a guard from a policy's window and limit
    pub fn from_policy(name: impl Into<String>, policy: &RateLimitPolicy) -> Result<Self, PolicyError> {
        Self::new(name, policy.window, policy.max_requests)
    }

    /// The guarded operation's display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Take one admission at `now`
    ///
    /// The denial carries the retry hint computed under the same lock, so
    /// it is consistent with the check that produced it.
    pub fn try_acquire(&self, now: SystemTime) -> Result<(), RateLimitExceeded> {
        // A poisoned lock only means another caller panicked mid-check;
        // the log itself is still consistent.
        let mut limiter = self.limiter.lock().unwrap_or_else(|e| e.into_inner());
        if limiter.check(&self.name, now) {
            return Ok(());
        }
        let info = limiter.info(&self.name, now);
        Err(RateLimitExceeded {
            operation: self.name.clone(),
            retry_after: info.retry_after.unwrap_or_default(),
        })
    }

    /// Run `op` if the guard admits it
    ///
    /// The admission is taken before the future is constructed; a denied
    /// call never starts the underlying work.
    pub async fn run<F, Fut>(&self, op: F) -> Result<Fut::Output, RateLimitExceeded>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        self.try_acquire(SystemTime::now())?;
        Ok(op().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SystemTime {
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000)
    }

    #[test]
    fn test_denial_message_format() {
        let guard = OperationGuard::new("ReportService.generate", Duration::from_secs(60), 2).unwrap();
        let now = base();
        assert!(guard.try_acquire(now).is_ok());
        assert!(guard.try_acquire(now).is_ok());

        let err = guard.try_acquire(now).unwrap_err();
        assert_eq!(err.operation, "ReportService.generate");
        assert_eq!(err.retry_after, Duration::from_secs(60));
        assert_eq!(
            err.to_string(),
            "Rate limit exceeded for ReportService.generate. Retry after 60 seconds"
        );
    }

    #[test]
    fn test_window_frees_the_guard() {
        let guard = OperationGuard::new("Indexer.rebuild", Duration::from_secs(60), 1).unwrap();
        let now = base();
        assert!(guard.try_acquire(now).is_ok());
        assert!(guard.try_acquire(now + Duration::from_secs(30)).is_err());
        assert!(guard.try_acquire(now + Duration::from_secs(61)).is_ok());
    }

    #[test]
    fn test_guards_are_independent() {
        let generate = OperationGuard::new("ReportService.generate", Duration::from_secs(60), 1).unwrap();
        let export = OperationGuard::new("ReportService.export", Duration::from_secs(60), 1).unwrap();
        let now = base();
        assert!(generate.try_acquire(now).is_ok());
        assert!(export.try_acquire(now).is_ok());
        assert!(generate.try_acquire(now).is_err());
        assert!(export.try_acquire(now).is_err());
    }

    #[tokio::test]
    async fn test_run_skips_denied_work() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let guard = OperationGuard::new("Mailer.send", Duration::from_secs(60), 1).unwrap();
        let calls = AtomicUsize::new(0);

        let first = guard
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                "sent"
            })
            .await;
        assert_eq!(first.unwrap(), "sent");

        let second = guard
            .run(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                "sent"
            })
            .await;
        assert!(second.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
