//! End-to-end tests for the admission middleware and HTTP surface

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use axum::routing::get;
use gatelimit::{DEFAULT_MESSAGE, Preset, RateLimitPolicy};
use gatelimit_server::middleware;
use gatelimit_server::service::RateLimiter;
use tower::ServiceExt;

/// A one-route app behind the admission middleware
fn protected_app(policy: RateLimitPolicy) -> (Router, Arc<RateLimiter>) {
    let limiter = Arc::new(RateLimiter::new(policy).unwrap());
    let app = Router::new()
        .route("/", get(|| async { "hello" }))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&limiter),
            middleware::rate_limit,
        ));
    (app, limiter)
}

fn get_from(client: &str) -> Request<Body> {
    Request::builder()
        .uri("/")
        .header("x-forwarded-for", client)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1 << 20)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn header_str<'a>(response: &'a Response, name: &str) -> Option<&'a str> {
    response.headers().get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn test_allowed_requests_carry_legacy_quota_headers() {
    let policy = RateLimitPolicy::new(Duration::from_secs(60), 2).unwrap();
    let (app, _limiter) = protected_app(policy);

    let response = app.oneshot(get_from("198.51.100.1")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(header_str(&response, "x-ratelimit-limit"), Some("2"));
    assert_eq!(header_str(&response, "x-ratelimit-remaining"), Some("1"));
    let reset: u64 = header_str(&response, "x-ratelimit-reset")
        .unwrap()
        .parse()
        .unwrap();
    assert!(reset > 0);
    // First of two admissions leaves quota, so no retry hint
    assert!(header_str(&response, "retry-after").is_none());
    assert!(header_str(&response, "ratelimit-limit").is_none());
}

#[tokio::test]
async fn test_denials_return_429_with_body_and_headers() {
    let policy = RateLimitPolicy::new(Duration::from_secs(60), 1).unwrap();
    let (app, limiter) = protected_app(policy);

    let first = app.clone().oneshot(get_from("198.51.100.1")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let denied = app.oneshot(get_from("198.51.100.1")).await.unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(header_str(&denied, "x-ratelimit-remaining"), Some("0"));
    let header_hint: u64 = header_str(&denied, "retry-after")
        .unwrap()
        .parse()
        .unwrap();

    let body = body_json(denied).await;
    assert_eq!(body["error"].as_str(), Some(DEFAULT_MESSAGE));
    let body_hint = body["retryAfter"].as_u64().unwrap();
    assert_eq!(body_hint, header_hint);
    assert!(body_hint >= 1 && body_hint <= 60);

    let metrics = limiter.metrics();
    assert_eq!(metrics.requests_total.load(Ordering::Relaxed), 2);
    assert_eq!(metrics.requests_denied.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_draft_mode_renders_rfc3339_reset_and_retry_after() {
    let policy = RateLimitPolicy::new(Duration::from_secs(60), 1)
        .unwrap()
        .with_draft_headers(true);
    let (app, _limiter) = protected_app(policy);

    let allowed = app.clone().oneshot(get_from("198.51.100.1")).await.unwrap();
    assert_eq!(header_str(&allowed, "ratelimit-limit"), Some("1"));
    assert_eq!(header_str(&allowed, "ratelimit-remaining"), Some("0"));
    let reset = header_str(&allowed, "ratelimit-reset").unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(reset).is_ok());
    assert!(header_str(&allowed, "x-ratelimit-limit").is_none());
    // This admission consumed the last slot, so the hint already applies
    assert!(header_str(&allowed, "retry-after").is_some());

    let denied = app.oneshot(get_from("198.51.100.1")).await.unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    let header_hint: u64 = header_str(&denied, "retry-after")
        .unwrap()
        .parse()
        .unwrap();
    assert!(header_hint >= 1 && header_hint <= 60);
    let body = body_json(denied).await;
    assert_eq!(body["retryAfter"].as_u64(), Some(header_hint));
}

#[tokio::test]
async fn test_disabled_headers_emit_nothing() {
    let policy = RateLimitPolicy::new(Duration::from_secs(60), 1)
        .unwrap()
        .with_headers(false);
    let (app, _limiter) = protected_app(policy);

    let allowed = app.clone().oneshot(get_from("198.51.100.1")).await.unwrap();
    assert!(header_str(&allowed, "x-ratelimit-limit").is_none());
    assert!(header_str(&allowed, "ratelimit-limit").is_none());

    let denied = app.oneshot(get_from("198.51.100.1")).await.unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
    assert!(header_str(&denied, "x-ratelimit-limit").is_none());
    assert!(header_str(&denied, "retry-after").is_none());

    let body = body_json(denied).await;
    assert_eq!(body["error"].as_str(), Some(DEFAULT_MESSAGE));
}

#[tokio::test]
async fn test_clients_are_limited_independently() {
    let policy = RateLimitPolicy::new(Duration::from_secs(60), 1).unwrap();
    let (app, _limiter) = protected_app(policy);

    let first = app.clone().oneshot(get_from("198.51.100.1")).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let other = app.clone().oneshot(get_from("198.51.100.2")).await.unwrap();
    assert_eq!(other.status(), StatusCode::OK);

    let denied = app.oneshot(get_from("198.51.100.1")).await.unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn test_auth_preset_reports_its_lockout_message() {
    let limiter = Arc::new(RateLimiter::from_preset(Preset::Auth).unwrap());
    let app = Router::new()
        .route("/login", get(|| async { "form" }))
        .layer(axum::middleware::from_fn_with_state(
            Arc::clone(&limiter),
            middleware::rate_limit,
        ));

    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/login")
                    .header("x-forwarded-for", "198.51.100.9")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let denied = app
        .oneshot(
            Request::builder()
                .uri("/login")
                .header("x-forwarded-for", "198.51.100.9")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);

    let body = body_json(denied).await;
    assert_eq!(
        body["error"].as_str(),
        Some("Too many authentication attempts, please try again later.")
    );
}

#[tokio::test]
async fn test_protected_service_shields_its_own_routes() {
    let limiter = Arc::new(RateLimiter::from_preset(Preset::Strict).unwrap());
    let app = gatelimit_server::http::router(limiter, true);

    for _ in 0..10 {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("x-forwarded-for", "198.51.100.1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let denied = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-forwarded-for", "198.51.100.1")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(denied.status(), StatusCode::TOO_MANY_REQUESTS);

    // Another caller is unaffected
    let other = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-forwarded-for", "198.51.100.2")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(other.status(), StatusCode::OK);
}
