//! HTTP gateway: JSON routes over the job registry.
//!
//! `POST /jobs` starts, `GET /jobs[/{id}]` reports, `POST /jobs/{id}/cancel`
//! and `DELETE /jobs/{id}` cancel. Errors carry `{code, message}` with the
//! status mapped from the error code.

use std::sync::Arc;

use anyhow::Result;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::error::{ErrorCode, SupervisorError};
use crate::jobs::{JobOptions, JobRecord, Registry};

/// Shared state for the HTTP server.
#[derive(Clone)]
pub struct GatewayState {
    /// Registry every route delegates to.
    pub registry: Arc<Registry>,
}

/// Response body for `POST /jobs`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartResponse {
    /// Id of the admitted job.
    pub id: String,
}

/// Response body for `GET /jobs` and `GET /jobs/{id}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Snapshots, ordered by start time.
    pub jobs: Vec<JobRecord>,
}

/// Response body for the health endpoint.
#[derive(Debug, Serialize)]
pub struct GatewayHealthResponse {
    /// Always `healthy` while the server answers.
    pub status: &'static str,
    /// Kind of the injected driver.
    pub driver: &'static str,
    /// Concurrency ceiling.
    pub concurrency: usize,
    /// Registered jobs, finished-but-unobserved ones included.
    pub live_jobs: usize,
}

/// Error body: `{"code": "NOT_FOUND", "message": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Stable error code.
    pub code: ErrorCode,
    /// Human-readable detail.
    pub message: String,
}

/// Error returned by gateway handlers.
#[derive(Debug)]
pub struct GatewayError(SupervisorError);

impl From<SupervisorError> for GatewayError {
    fn from(error: SupervisorError) -> Self {
        Self(error)
    }
}

impl From<JsonRejection> for GatewayError {
    fn from(rejection: JsonRejection) -> Self {
        Self(SupervisorError::InvalidArgument(rejection.body_text()))
    }
}

/// HTTP status for an error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::InvalidArgument => StatusCode::BAD_REQUEST,
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let body = ErrorResponse {
            code,
            message: self.0.to_string(),
        };
        (status_for(code), Json(body)).into_response()
    }
}

async fn handle_start(
    State(state): State<GatewayState>,
    body: Result<Json<JobOptions>, JsonRejection>,
) -> Result<Json<StartResponse>, GatewayError> {
    let Json(options) = body?;
    let id = state.registry.start(options).await?;
    Ok(Json(StartResponse { id }))
}

async fn handle_list(
    State(state): State<GatewayState>,
) -> Result<Json<StatusResponse>, GatewayError> {
    let jobs = state.registry.status("").await?;
    Ok(Json(StatusResponse { jobs }))
}

async fn handle_status(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, GatewayError> {
    let jobs = state.registry.status(&id).await?;
    Ok(Json(StatusResponse { jobs }))
}

async fn handle_cancel(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<JobRecord>, GatewayError> {
    let job = state.registry.cancel(&id).await?;
    Ok(Json(job))
}

async fn handle_health(State(state): State<GatewayState>) -> Json<GatewayHealthResponse> {
    Json(GatewayHealthResponse {
        status: "healthy",
        driver: state.registry.driver_kind(),
        concurrency: state.registry.concurrency(),
        live_jobs: state.registry.len().await,
    })
}

/// Build the gateway router.
pub fn router(registry: Arc<Registry>) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/jobs", post(handle_start).get(handle_list))
        .route("/jobs/{id}", get(handle_status).delete(handle_cancel))
        .route("/jobs/{id}/cancel", post(handle_cancel))
        .with_state(GatewayState { registry })
}

/// Run the HTTP server; binds to `bind_addr` (e.g. `0.0.0.0:8790`).
/// Graceful shutdown on Ctrl+C (SIGINT) and SIGTERM (Unix); in-flight requests complete before exit.
pub async fn run_http(registry: Arc<Registry>, bind_addr: &str) -> Result<()> {
    let driver = registry.driver_kind();
    let concurrency = registry.concurrency();
    let app = router(registry);
    let listener = TcpListener::bind(bind_addr).await?;
    tracing::info!(
        bind = %bind_addr,
        driver,
        concurrency,
        "gateway listening (Ctrl+C/SIGTERM to stop)"
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(error) => {
                tracing::warn!(%error, "failed to listen for SIGTERM; Ctrl+C only");
                wait_ctrl_c().await;
                return;
            }
        };
        tokio::select! {
            () = wait_ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    wait_ctrl_c().await;
}

async fn wait_ctrl_c() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(%error, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
