//! HTTP surface of the admission service
//!
//! Three routes: `POST /check` for programmatic decisions, `GET /health`
//! and `GET /metrics`. With self-protection enabled the whole router sits
//! behind the admission middleware, keyed by peer identity.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio::net::TcpListener;

use crate::middleware;
use crate::service::RateLimiter;
use crate::types::{CheckRequest, CheckResponse};

/// Build the service router
pub fn router(limiter: Arc<RateLimiter>, protect: bool) -> Router {
    let mut app = Router::new()
        .route("/check", post(handle_check))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics));

    if protect {
        app = app.layer(axum::middleware::from_fn_with_state(
            Arc::clone(&limiter),
            middleware::rate_limit,
        ));
    }

    app.with_state(limiter)
}

/// Serve the router on `addr` until ctrl-c
pub async fn serve(addr: SocketAddr, limiter: Arc<RateLimiter>, protect: bool) -> Result<()> {
    let app = router(limiter, protect);

    tracing::info!("HTTP server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

/// Programmatic admission check
///
/// A denied check is still a successful HTTP exchange; the decision is
/// the payload.
async fn handle_check(
    State(limiter): State<Arc<RateLimiter>>,
    Json(request): Json<CheckRequest>,
) -> Response {
    let result = match &request.key {
        Some(key) => limiter.check_key(key).await,
        None => limiter.check().await,
    };

    match result {
        Ok(decision) => Json(CheckResponse::from(decision)).into_response(),
        Err(error) => {
            tracing::error!(%error, "Admission check failed");
            limiter.metrics().record_handle_error();
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn handle_health() -> &'static str {
    "OK"
}

async fn handle_metrics(State(limiter): State<Arc<RateLimiter>>) -> String {
    // Refresh the population gauge on scrape; counters are already current
    if let Ok(active) = limiter.tracked_keys().await {
        limiter.metrics().update_active_keys(active);
    }
    limiter.metrics().export_prometheus()
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(%error, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
