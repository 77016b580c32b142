//! Axum middleware enforcing the admission policy
//!
//! Layered with `axum::middleware::from_fn_with_state` over an
//! `Arc<RateLimiter>`. Allowed requests pass through with quota headers
//! attached; denied requests short-circuit with `429` and a JSON body.
//! A failed check is an infrastructure error, not a denial, and maps to
//! `500`.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Request, State};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, SecondsFormat, Utc};
use gatelimit::{RateLimitInfo, RateLimitPolicy};

use crate::service::RateLimiter;
use crate::types::{RejectionBody, unix_secs};

const RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("ratelimit-limit");
const RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("ratelimit-remaining");
const RATELIMIT_RESET: HeaderName = HeaderName::from_static("ratelimit-reset");
const X_RATELIMIT_LIMIT: HeaderName = HeaderName::from_static("x-ratelimit-limit");
const X_RATELIMIT_REMAINING: HeaderName = HeaderName::from_static("x-ratelimit-remaining");
const X_RATELIMIT_RESET: HeaderName = HeaderName::from_static("x-ratelimit-reset");

/// Admission check for one request
pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    req: Request,
    next: Next,
) -> Response {
    let decision = match limiter.check_request(&req).await {
        Ok(decision) => decision,
        Err(error) => {
            tracing::error!(%error, "Admission check failed");
            limiter.metrics().record_handle_error();
            let body = RejectionBody {
                error: "Internal server error".to_string(),
                retry_after: None,
            };
            return (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response();
        }
    };

    let policy = limiter.policy();
    let headers = policy.headers.then(|| quota_headers(policy, &decision.info));

    if decision.allowed {
        let mut response = next.run(req).await;
        if let Some(headers) = headers {
            response.headers_mut().extend(headers);
        }
        return response;
    }

    let body = RejectionBody {
        error: policy.message_or_default().to_string(),
        retry_after: decision.info.retry_after.map(|d| d.as_secs()),
    };
    let mut response = (StatusCode::TOO_MANY_REQUESTS, Json(body)).into_response();
    if let Some(headers) = headers {
        response.headers_mut().extend(headers);
    }
    response
}

/// Render quota headers for `info` in the style the policy selects
fn quota_headers(policy: &RateLimitPolicy, info: &RateLimitInfo) -> HeaderMap {
    let mut headers = HeaderMap::with_capacity(4);

    if policy.draft_headers {
        headers.insert(RATELIMIT_LIMIT, HeaderValue::from(info.limit));
        headers.insert(RATELIMIT_REMAINING, HeaderValue::from(info.remaining));
        let reset = DateTime::<Utc>::from(info.reset).to_rfc3339_opts(SecondsFormat::Secs, true);
        // RFC 3339 text is always a valid header value
        if let Ok(value) = HeaderValue::from_str(&reset) {
            headers.insert(RATELIMIT_RESET, value);
        }
    } else {
        headers.insert(X_RATELIMIT_LIMIT, HeaderValue::from(info.limit));
        headers.insert(X_RATELIMIT_REMAINING, HeaderValue::from(info.remaining));
        headers.insert(X_RATELIMIT_RESET, HeaderValue::from(unix_secs(info.reset)));
    }

    // Retry-After accompanies either convention
    if let Some(retry_after) = info.retry_after {
        headers.insert(RETRY_AFTER, HeaderValue::from(retry_after.as_secs()));
    }

    headers
}
