//! Loopback HTTP surface: `/health` and `/state`.
//!
//! Both endpoints are answered by the relay actor, so they observe the same
//! state the heartbeat mutates.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::orchestrator::actor::RelayHandle;
use crate::{AppError, Result};

/// Build the router over `handle`.
#[must_use]
pub fn router(handle: RelayHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/state", get(state))
        .with_state(handle)
}

async fn health(State(handle): State<RelayHandle>) -> Response {
    match handle.health().await {
        Ok(report) if report.healthy => (StatusCode::OK, "ok").into_response(),
        Ok(report) => {
            let reason = report.reason.unwrap_or_default();
            (
                StatusCode::SERVICE_UNAVAILABLE,
                format!("degraded: {reason}"),
            )
                .into_response()
        }
        Err(err) => unavailable(&err),
    }
}

async fn state(State(handle): State<RelayHandle>) -> Response {
    match handle.state().await {
        Ok(state) => Json(state).into_response(),
        Err(err) => unavailable(&err),
    }
}

fn unavailable(err: &AppError) -> Response {
    warn!(%err, "relay unavailable for http request");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        format!("degraded: {err}"),
    )
        .into_response()
}

/// Serve the router on `listener` until `ct` is cancelled.
///
/// # Errors
///
/// Returns `AppError::Io` if the server fails.
pub async fn serve_http(
    listener: TcpListener,
    handle: RelayHandle,
    ct: CancellationToken,
) -> Result<()> {
    let addr = listener.local_addr()?;
    info!(%addr, "http health endpoint listening");

    axum::serve(listener, router(handle))
        .with_graceful_shutdown(async move { ct.cancelled().await })
        .await
        .map_err(|err| AppError::Io(format!("http server error: {err}")))?;

    info!("http health endpoint shut down");
    Ok(())
}
